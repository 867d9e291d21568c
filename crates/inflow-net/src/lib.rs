// Event source adapter: normalizes snapshot polling and live push frames
// into one typed feed of inbox events.

pub mod api;
pub mod config;
pub mod push;
pub mod snapshot;
pub mod source;

mod error;

pub use api::HttpApi;
pub use config::SourceConfig;
pub use error::NetError;
pub use push::PushFrame;
pub use source::{spawn_source, SourceCommand, SourceNotification};

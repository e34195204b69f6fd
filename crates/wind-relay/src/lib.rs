pub mod addr;
pub mod auth;
pub mod conf;
mod error;
pub mod listener;
pub mod pipeline;
pub mod request;
pub mod session;
pub mod tls;
pub mod udp_frame;

pub use error::ProtoError;

pub type Error = eyre::Report;
pub type Result<T> = eyre::Result<T>;

/// Config shared by every session spawned from one listener.
pub mod config;
pub use config::SessionConfig;

mod resolve;
pub use resolve::resolve_endpoints;

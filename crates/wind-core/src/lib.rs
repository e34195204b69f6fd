//! Ambient helpers shared by the relay crates: the crate-name-prefixed
//! logging macros (`info!`/`warn!`/`error!`) and the plain address type used
//! to describe a relay target before it is resolved to a socket address.

pub mod log;
pub mod types;

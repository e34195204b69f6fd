//! Session-facing configuration (component of §6 External Interfaces). This
//! is the subset of configuration the session state machine consults
//! directly; the layered file/env loading that produces it lives in the
//! binary crate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Maximum size a UDP frame's declared length may reach before the session
/// treats it as a protocol violation and destroys itself (§4.6 `udp_sent`).
pub const MAX_BUF_LENGTH: usize = 32 * 1024;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TcpOptions {
	/// Prefer IPv4 endpoints when a resolver returns both families.
	#[serde(default)]
	pub prefer_ipv4: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SslOptions {
	/// ALPN identifier -> fallback port override, consulted when a session
	/// falls through to the disguise origin (§4.6 step 3).
	#[serde(default)]
	pub alpn_port_override: HashMap<String, u16>,
}

/// Config every session is constructed with. Immutable for the lifetime of
/// the session; shared (via `Arc`) across all sessions spawned by one
/// listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
	/// password -> identity label, checked before falling back to the
	/// [`crate::auth::Authenticator`] port.
	#[serde(default)]
	pub password: HashMap<String, String>,

	/// Disguise origin dialed for any request that does not parse, or that
	/// parses with a password absent from `password` and rejected by the
	/// authenticator.
	pub remote_addr: String,
	pub remote_port: u16,

	#[serde(default)]
	pub tcp: TcpOptions,
	#[serde(default)]
	pub ssl: SslOptions,

	/// Raw bytes written on the underlying TCP socket, bypassing TLS, when
	/// the client's first bytes look like a plaintext HTTP request (§6, §9).
	/// Empty disables the fallback write.
	#[serde(default)]
	pub fallback_http_response: String,

	/// Ceiling on pending unparsed UDP backlog (§4.6 `udp_sent`). Defaults to
	/// [`MAX_BUF_LENGTH`]; overridable per-deployment (§10.3).
	#[serde(default = "default_max_buf_length")]
	pub max_buf_length: usize,
}

fn default_max_buf_length() -> usize {
	MAX_BUF_LENGTH
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			password: HashMap::new(),
			remote_addr: String::new(),
			remote_port: 0,
			tcp: TcpOptions::default(),
			ssl: SslOptions::default(),
			fallback_http_response: String::new(),
			max_buf_length: MAX_BUF_LENGTH,
		}
	}
}

impl SessionConfig {
	/// Resolves the fallback port for an invalid/unauthenticated request,
	/// given the ALPN identifier negotiated during the TLS handshake (if
	/// any).
	pub fn fallback_port(&self, negotiated_alpn: Option<&str>) -> u16 {
		negotiated_alpn
			.and_then(|proto| self.ssl.alpn_port_override.get(proto))
			.copied()
			.unwrap_or(self.remote_port)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn fallback_port_prefers_alpn_override() {
		let mut config = SessionConfig {
			remote_addr: "origin.example".into(),
			remote_port: 443,
			..Default::default()
		};
		config.ssl.alpn_port_override.insert("h2".into(), 8443);

		assert_eq!(config.fallback_port(Some("h2")), 8443);
		assert_eq!(config.fallback_port(Some("http/1.1")), 443);
		assert_eq!(config.fallback_port(None), 443);
	}
}

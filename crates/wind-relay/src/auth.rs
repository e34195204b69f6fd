//! Authenticator port (component C4).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// Backing store consulted when a presented password is not present in the
/// static `password` config map. Implementations must be safe to call from
/// many sessions concurrently — the trait requires `Send + Sync` and takes
/// `&self`, never `&mut self`.
pub trait Authenticator: Send + Sync {
	fn auth(&self, password: &str) -> impl Future<Output = bool> + Send;

	fn record(&self, password: &str, downlink_bytes: u64, uplink_bytes: u64) -> impl Future<Output = ()> + Send;
}

/// Default backing store: denies every password not already in the static
/// config map, and never records anything. Safe to use when the deployment
/// only wants the config-file passwords to work.
#[derive(Debug, Default)]
pub struct DenyAllAuthenticator;

impl Authenticator for DenyAllAuthenticator {
	async fn auth(&self, _password: &str) -> bool {
		false
	}

	async fn record(&self, _password: &str, _downlink_bytes: u64, _uplink_bytes: u64) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
	downlink: u64,
	uplink:   u64,
}

/// Minimal concrete backing store: an in-memory table of extra passwords
/// plus accumulated byte counters per password, guarded by an
/// [`tokio::sync::RwLock`] — mirrors the per-connection auth-state guard
/// pattern used for QUIC connections elsewhere in this workspace.
#[derive(Debug, Default)]
pub struct InMemoryAuthenticator {
	extra:    std::collections::HashSet<String>,
	counters: RwLock<HashMap<String, Counters>>,
}

impl InMemoryAuthenticator {
	pub fn new(extra_passwords: impl IntoIterator<Item = String>) -> Arc<Self> {
		Arc::new(Self {
			extra:    extra_passwords.into_iter().collect(),
			counters: RwLock::new(HashMap::new()),
		})
	}

	pub async fn counters_for(&self, password: &str) -> Option<(u64, u64)> {
		self.counters.read().await.get(password).map(|c| (c.downlink, c.uplink))
	}
}

impl Authenticator for InMemoryAuthenticator {
	async fn auth(&self, password: &str) -> bool {
		self.extra.contains(password)
	}

	async fn record(&self, password: &str, downlink_bytes: u64, uplink_bytes: u64) {
		let mut guard = self.counters.write().await;
		let entry = guard.entry(password.to_string()).or_default();
		entry.downlink += downlink_bytes;
		entry.uplink += uplink_bytes;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn deny_all_denies_everything() {
		let auth = DenyAllAuthenticator;
		assert!(!auth.auth("anything").await);
	}

	#[tokio::test]
	async fn in_memory_accepts_configured_password_and_accumulates() {
		let auth = InMemoryAuthenticator::new([String::from("secret")]);
		assert!(auth.auth("secret").await);
		assert!(!auth.auth("other").await);

		auth.record("secret", 10, 20).await;
		auth.record("secret", 5, 5).await;
		assert_eq!(auth.counters_for("secret").await, Some((15, 25)));
	}
}

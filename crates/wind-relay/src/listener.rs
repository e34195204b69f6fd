//! Listener accept loop (§10.6). Out of scope for the session core itself
//! (§1), but needed for a runnable service: a `TcpListener::accept` loop
//! that hands each accepted stream, wrapped with a monotonic session id, to
//! a freshly constructed [`Session::start`], spawned as its own task —
//! matching the shape of `TrojanX`'s `Server::run`/`ServerSession::run` pair
//! (see `examples/other_examples`).
//!
//! No concrete pipeline transport ships in this crate (§4.5, §10.9), so the
//! listener only ever constructs non-pipelined sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::auth::Authenticator;
use crate::config::SessionConfig;
use crate::pipeline::NoPipeline;
use crate::session::Session;

/// Drives the accept loop for one `(listen_addr, TLS config)` pair. Never
/// returns except on a fatal bind/accept error.
pub struct Listener<A> {
	listen_addr: std::net::SocketAddr,
	config:      Arc<SessionConfig>,
	acceptor:    TlsAcceptor,
	authenticator: Arc<A>,
	next_id:     AtomicU64,
}

impl<A: Authenticator + 'static> Listener<A> {
	pub fn new(listen_addr: std::net::SocketAddr, config: Arc<SessionConfig>, tls_config: Arc<rustls::ServerConfig>, authenticator: Arc<A>) -> Self {
		Self {
			listen_addr,
			config,
			acceptor: TlsAcceptor::from(tls_config),
			authenticator,
			next_id: AtomicU64::new(1),
		}
	}

	pub async fn run(self) -> crate::Result<()> {
		let listener = TcpListener::bind(self.listen_addr).await?;
		wind_core::info!("wind-relay listening on {}", self.listen_addr);

		loop {
			let (stream, peer_addr) = match listener.accept().await {
				Ok(x) => x,
				Err(e) => {
					wind_core::warn!("accept failed: {e}");
					continue;
				}
			};

			let id = self.next_id.fetch_add(1, Ordering::Relaxed);
			let config = self.config.clone();
			let acceptor = self.acceptor.clone();
			let authenticator = self.authenticator.clone();

			tokio::spawn(async move {
				let session: Arc<Session<A, NoPipeline>> = Arc::new(Session::new(id, peer_addr, config, authenticator, None));
				session.start(stream, acceptor).await;
			});
		}
	}
}

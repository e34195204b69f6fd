//! Session state machine (component C6). Owns the inbound TLS stream and
//! the outbound TCP/UDP sockets for one client connection and drives the
//! HANDSHAKE → {FORWARD, UDP_FORWARD} → DESTROY lifecycle described in the
//! state diagram.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, Notify};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tokio_util::codec::{Decoder, Encoder};

use crate::addr::{Address, AddressCodec};
use crate::auth::Authenticator;
use crate::config::SessionConfig;
use crate::pipeline::{Pipeline, PipelineFlowControl, PipelineRef, SessionId};
use crate::request::{self, Command};
use crate::resolve::{pick_endpoint, resolve_endpoints};
use crate::udp_frame::{UdpFrame, UdpFrameCodec};

/// Session lifecycle, mirrored 1:1 on the state diagram in §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	Handshake,
	Forward,
	UdpForward,
	Destroy,
}

struct StatusCell(std::sync::atomic::AtomicU8);

impl StatusCell {
	fn new(s: Status) -> Self {
		Self(std::sync::atomic::AtomicU8::new(s as u8))
	}

	fn get(&self) -> Status {
		match self.0.load(Ordering::Acquire) {
			0 => Status::Handshake,
			1 => Status::Forward,
			2 => Status::UdpForward,
			_ => Status::Destroy,
		}
	}

	fn set(&self, s: Status) {
		self.0.store(s as u8, Ordering::Release);
	}
}

/// A single client connection. `A` is the authenticator backing store; `P`
/// is the pipeline transport. Plain (non-pipelined) sessions should
/// instantiate `P = crate::pipeline::NoPipeline` (see that type's docs).
pub struct Session<A, P> {
	pub id: SessionId,

	config:     Arc<SessionConfig>,
	authenticator: Arc<A>,
	pipeline:   Option<PipelineRef<P>>,
	flow:       PipelineFlowControl,

	status: StatusCell,

	peer_addr: SocketAddr,

	auth_password: Mutex<Option<String>>,
	has_queried_out: AtomicBool,
	fell_back: AtomicBool,

	recv_len: AtomicU64,
	sent_len: AtomicU64,
	start: tokio::time::Instant,

	/// Ingress channel fed by [`Self::push_chunk`] while pipelined; `None`
	/// until [`Self::start_pipelined`] has set up the driver loop.
	ingress_tx: std::sync::Mutex<Option<UnboundedSender<Bytes>>>,
	/// Woken by [`Self::on_pipeline_ack`] to resume an `out_async_read`
	/// deferred by [`PipelineFlowControl::pre_call_ack_func`].
	ack_notify: Notify,
}

/// Outcome of driving a session to completion. Exposed mainly for tests and
/// for the listener's logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionSummary {
	pub recv_len:  u64,
	pub sent_len:  u64,
	pub duration:  std::time::Duration,
	pub fell_back: bool,
}

impl<A: Authenticator, P: Pipeline> Session<A, P> {
	pub fn new(id: SessionId, peer_addr: SocketAddr, config: Arc<SessionConfig>, authenticator: Arc<A>, pipeline: Option<PipelineRef<P>>) -> Self {
		let using_pipeline = pipeline.is_some();
		Self {
			id,
			config,
			authenticator,
			pipeline,
			flow: PipelineFlowControl::new(using_pipeline),
			status: StatusCell::new(Status::Handshake),
			peer_addr,
			auth_password: Mutex::new(None),
			has_queried_out: AtomicBool::new(false),
			fell_back: AtomicBool::new(false),
			recv_len: AtomicU64::new(0),
			sent_len: AtomicU64::new(0),
			start: tokio::time::Instant::now(),
			ingress_tx: std::sync::Mutex::new(None),
			ack_notify: Notify::new(),
		}
	}

	pub fn status(&self) -> Status {
		self.status.get()
	}

	fn is_destroyed(&self) -> bool {
		self.status.get() == Status::Destroy
	}

	/// Runs the full non-pipelined lifecycle for one accepted TCP stream:
	/// TLS handshake, then inbound/outbound shuttling until one side closes
	/// or errors, then `destroy`. `fallback_response` is written verbatim on
	/// the raw socket if the handshake fails because the peer spoke plain
	/// HTTP (§4.6 `start`, §9 resolved Open Question).
	pub async fn start(self: Arc<Self>, mut tcp: TcpStream, acceptor: TlsAcceptor) -> SessionSummary {
		let _ = tcp.set_nodelay(true);

		if looks_like_plain_http(&mut tcp).await {
			wind_core::warn!("session {} plaintext HTTP probe from {}", self.id, self.peer_addr);
			if !self.config.fallback_http_response.is_empty() {
				let _ = tcp.write_all(self.config.fallback_http_response.as_bytes()).await;
			}
			return self.destroy(false).await;
		}

		let (tls, alpn) = match acceptor.accept(tcp).await {
			Ok(stream) => {
				let alpn = stream.get_ref().1.alpn_protocol().map(|p| String::from_utf8_lossy(p).into_owned());
				(stream, alpn)
			}
			Err(e) => {
				wind_core::warn!("session {} TLS handshake failed from {}: {e}", self.id, self.peer_addr);
				return self.destroy(false).await;
			}
		};

		self.drive_handshake(tls, alpn).await
	}

	/// Entry point for pipeline-delivered sessions: no TLS handshake of its
	/// own, inbound bytes arrive via [`Self::push_chunk`] instead of a TLS
	/// read. Spawns the driver loop as its own task and returns immediately;
	/// the returned handle is otherwise driven entirely through `push_chunk`
	/// and [`Self::on_pipeline_ack`].
	pub fn start_pipelined(self: &Arc<Self>) {
		debug_assert!(self.flow.is_using_pipeline(), "start_pipelined on a non-pipeline session");
		let (tx, rx) = mpsc::unbounded_channel();
		*self.ingress_tx.lock().unwrap() = Some(tx);
		let this = self.clone();
		tokio::spawn(async move {
			this.drive_pipelined(rx).await;
		});
	}

	/// §4.5 `push_chunk`: hands an inbound plaintext chunk delivered by the
	/// pipeline to this session's ingress queue. Calling this on a session
	/// that was not started with [`Self::start_pipelined`] is a logic error
	/// (§7 "Misuse: pipeline-push on non-pipeline session").
	pub fn push_chunk(&self, data: Bytes) {
		assert!(self.flow.is_using_pipeline(), "push_chunk on a session not using the pipeline");
		if self.is_destroyed() {
			return;
		}
		if let Some(tx) = self.ingress_tx.lock().unwrap().as_ref() {
			let _ = tx.send(data);
		}
	}

	/// Resumes an `out_async_read` deferred by the flow-control gate (§4.6
	/// "Inbound-read interlock with pipeline flow control"). Called by the
	/// pipeline when the peer's ACK for this session arrives.
	pub fn on_pipeline_ack(&self) {
		self.flow.on_ack();
		self.ack_notify.notify_one();
	}

	async fn drive_pipelined(self: Arc<Self>, mut rx: UnboundedReceiver<Bytes>) -> SessionSummary {
		loop {
			if self.is_destroyed() {
				return self.finish();
			}
			let data = match rx.recv().await {
				Some(d) => d,
				None => return self.destroy(false).await,
			};
			match self.in_recv(&data, None).await {
				InRecvOutcome::Continue => {}
				InRecvOutcome::DialOut { query_addr, query_port, udp_associate, first_write } => {
					if udp_associate {
						return self.run_udp_forward_pipelined(rx, first_write).await;
					}
					return self.run_forward_pipelined(rx, query_addr, query_port, first_write).await;
				}
				InRecvOutcome::Destroyed => return self.finish(),
			}
		}
	}

	async fn drive_handshake(self: Arc<Self>, mut tls: TlsStream<TcpStream>, alpn: Option<String>) -> SessionSummary {
		let mut buf = vec![0u8; 16 * 1024];
		loop {
			if self.is_destroyed() {
				return self.finish();
			}
			let n = match tls.read(&mut buf).await {
				Ok(0) | Err(_) => return self.destroy(false).await,
				Ok(n) => n,
			};

			match self.in_recv(&buf[..n], alpn.as_deref()).await {
				InRecvOutcome::Continue => {}
				InRecvOutcome::DialOut { query_addr, query_port, udp_associate, first_write } => {
					if udp_associate {
						return self.run_udp_forward(tls, first_write).await;
					}
					return self.run_forward(tls, query_addr, query_port, first_write).await;
				}
				InRecvOutcome::Destroyed => return self.finish(),
			}
		}
	}

	/// §4.6 `in_recv`. Returns what the caller (the per-mode driver loop)
	/// should do next; pure HANDSHAKE-phase dispatch lives here so it is
	/// shared between the TLS-direct and pipelined entry points.
	async fn in_recv(self: &Arc<Self>, data: &[u8], negotiated_alpn: Option<&str>) -> InRecvOutcome {
		match self.status.get() {
			Status::Handshake => self.in_recv_handshake(data, negotiated_alpn).await,
			Status::Forward => InRecvOutcome::Continue,
			Status::UdpForward => InRecvOutcome::Continue,
			Status::Destroy => InRecvOutcome::Destroyed,
		}
	}

	async fn in_recv_handshake(self: &Arc<Self>, data: &[u8], negotiated_alpn: Option<&str>) -> InRecvOutcome {
		if self.has_queried_out.load(Ordering::Acquire) {
			self.sent_len.fetch_add(data.len() as u64, Ordering::Relaxed);
			return InRecvOutcome::Continue;
		}

		let parsed = request::parse(data);
		let mut valid = parsed.is_some();
		let mut udp_associate = false;
		let mut payload: Bytes = Bytes::copy_from_slice(data);
		let mut query_addr = self.config.remote_addr.clone();
		let mut query_port = self.config.fallback_port(negotiated_alpn);

		if let Some(req) = parsed {
			let authed = if self.config.password.contains_key(&req.password) {
				true
			} else {
				let ok = self.authenticator.auth(&req.password).await;
				if ok {
					let mut guard = self.auth_password.lock().await;
					*guard = Some(req.password.clone());
					let prefix: String = req.password.chars().take(7).collect();
					wind_core::info!("session {} authenticated via extra password {prefix}...", self.id);
				} else {
					wind_core::warn!("session {} unknown password, falling back to disguise origin", self.id);
				}
				ok
			};

			if authed {
				query_addr = req.address_host();
				query_port = req.address_port();
				udp_associate = matches!(req.command, Command::UdpAssociate);
				payload = req.payload;
			} else {
				valid = false;
			}
		}

		if !valid {
			// Disguise property: wrong-password / unparseable traffic lands on
			// the same fallback origin every time, never an attacker-chosen one.
			query_addr = self.config.remote_addr.clone();
			query_port = self.config.fallback_port(negotiated_alpn);
			self.fell_back.store(true, Ordering::Relaxed);
		}

		if udp_associate {
			self.status.set(Status::UdpForward);
			return InRecvOutcome::DialOut { query_addr, query_port, udp_associate: true, first_write: payload };
		}

		self.sent_len.fetch_add(payload.len() as u64, Ordering::Relaxed);
		self.has_queried_out.store(true, Ordering::Release);
		InRecvOutcome::DialOut { query_addr, query_port, udp_associate: false, first_write: payload }
	}

	async fn run_forward(self: Arc<Self>, mut tls: TlsStream<TcpStream>, query_addr: String, query_port: u16, first_write: Bytes) -> SessionSummary {
		let endpoints = match resolve_endpoints(&query_addr, query_port).await {
			Ok(e) if !e.is_empty() => e,
			_ => {
				wind_core::warn!("session {} failed to resolve {query_addr}:{query_port}", self.id);
				return self.destroy(false).await;
			}
		};
		let endpoint = pick_endpoint(&endpoints, self.config.tcp.prefer_ipv4).expect("non-empty endpoints");

		let mut out = match TcpStream::connect(endpoint).await {
			Ok(s) => s,
			Err(e) => {
				wind_core::warn!("session {} failed to connect {endpoint}: {e}", self.id);
				return self.destroy(false).await;
			}
		};
		wind_core::info!("session {} connected to {endpoint}", self.id);
		self.status.set(Status::Forward);

		if !first_write.is_empty() && out.write_all(&first_write).await.is_err() {
			return self.destroy(false).await;
		}

		let mut in_buf = vec![0u8; 16 * 1024];
		let mut out_buf = vec![0u8; 16 * 1024];
		loop {
			if self.is_destroyed() {
				return self.finish();
			}
			tokio::select! {
				res = tls.read(&mut in_buf) => match res {
					Ok(0) | Err(_) => return self.destroy(false).await,
					Ok(n) => {
						self.sent_len.fetch_add(n as u64, Ordering::Relaxed);
						if out.write_all(&in_buf[..n]).await.is_err() {
							return self.destroy(false).await;
						}
					}
				},
				res = out.read(&mut out_buf) => match res {
					Ok(0) | Err(_) => return self.destroy(false).await,
					Ok(n) => {
						self.recv_len.fetch_add(n as u64, Ordering::Relaxed);
						if tls.write_all(&out_buf[..n]).await.is_err() {
							return self.destroy(false).await;
						}
					}
				},
			}
		}
	}

	async fn run_udp_forward(self: Arc<Self>, mut tls: TlsStream<TcpStream>, first_chunk: Bytes) -> SessionSummary {
		let mut pending = BytesMut::from(&first_chunk[..]);
		let mut udp_socket: Option<UdpSocket> = None;
		let mut in_buf = vec![0u8; 16 * 1024];
		let mut recv_buf = vec![0u8; 16 * 1024];

		loop {
			if self.is_destroyed() {
				return self.finish();
			}

			let mut codec = UdpFrameCodec;
			match codec.decode(&mut pending) {
				Ok(Some(frame)) => {
					if let Err(summary) = self.udp_send_frame(&mut udp_socket, frame).await {
						return summary;
					}
					continue;
				}
				Ok(None) => {
					if pending.len() > self.config.max_buf_length {
						wind_core::warn!("session {} oversized UDP frame, destroying", self.id);
						return self.destroy(false).await;
					}
				}
				Err(e) => {
					wind_core::warn!("session {} malformed UDP frame: {e}", self.id);
					return self.destroy(false).await;
				}
			}

			let recv_fut = async {
				match &udp_socket {
					Some(sock) => Some(sock.recv_from(&mut recv_buf).await),
					None => None,
				}
			};

			tokio::select! {
				res = tls.read(&mut in_buf) => match res {
					Ok(0) | Err(_) => return self.destroy(false).await,
					Ok(n) => pending.extend_from_slice(&in_buf[..n]),
				},
				maybe = recv_fut, if udp_socket.is_some() => {
					match maybe {
						Some(Ok((n, from))) => {
							self.recv_len.fetch_add(n as u64, Ordering::Relaxed);
							let frame = UdpFrame { address: Address::from(socket_addr_to_target(from)), payload: Bytes::copy_from_slice(&recv_buf[..n]) };
							let mut out = BytesMut::new();
							if UdpFrameCodec.encode(frame, &mut out).is_err() || tls.write_all(&out).await.is_err() {
								return self.destroy(false).await;
							}
						}
						Some(Err(_)) | None => return self.destroy(false).await,
					}
				}
			}
		}
	}

	/// Pipelined counterpart of [`Self::run_forward`]: the inbound direction
	/// is `rx` (fed by [`Self::push_chunk`]) instead of a TLS read, and the
	/// outbound-to-inbound direction is written through the pipeline port
	/// instead of `tls.write_all`. Implements the invariant-6 interlock:
	/// every delivered outbound-origin chunk is ACKed, and the next
	/// `out_async_read` is gated on [`PipelineFlowControl::pre_call_ack_func`].
	async fn run_forward_pipelined(self: Arc<Self>, mut rx: UnboundedReceiver<Bytes>, query_addr: String, query_port: u16, first_write: Bytes) -> SessionSummary {
		let Some(pipeline_ref) = self.pipeline.clone() else {
			wind_core::error!("session {} run_forward_pipelined without a pipeline reference", self.id);
			return self.destroy(false).await;
		};

		let endpoints = match resolve_endpoints(&query_addr, query_port).await {
			Ok(e) if !e.is_empty() => e,
			_ => {
				wind_core::warn!("session {} failed to resolve {query_addr}:{query_port}", self.id);
				return self.destroy(false).await;
			}
		};
		let endpoint = pick_endpoint(&endpoints, self.config.tcp.prefer_ipv4).expect("non-empty endpoints");

		let mut out = match TcpStream::connect(endpoint).await {
			Ok(s) => s,
			Err(e) => {
				wind_core::warn!("session {} failed to connect {endpoint}: {e}", self.id);
				return self.destroy(false).await;
			}
		};
		wind_core::info!("session {} connected to {endpoint} (pipelined)", self.id);
		self.status.set(Status::Forward);

		if !first_write.is_empty() && out.write_all(&first_write).await.is_err() {
			return self.destroy(false).await;
		}

		let mut out_buf = vec![0u8; 16 * 1024];
		loop {
			if self.is_destroyed() {
				return self.finish();
			}

			let Some(pipeline) = pipeline_ref.upgrade() else {
				wind_core::warn!("session {} pipeline expired mid-forward", self.id);
				return self.destroy(false).await;
			};

			if !self.flow.pre_call_ack_func() {
				// Deferred: wait for the peer's ACK before reading `out` again.
				// Inbound-origin chunks keep flowing to `out` while we wait.
				tokio::select! {
					_ = self.ack_notify.notified() => {}
					maybe = rx.recv() => match maybe {
						Some(data) => {
							self.sent_len.fetch_add(data.len() as u64, Ordering::Relaxed);
							if out.write_all(&data).await.is_err() {
								return self.destroy(false).await;
							}
						}
						None => return self.destroy(false).await,
					}
				}
				continue;
			}

			tokio::select! {
				res = out.read(&mut out_buf) => match res {
					Ok(0) | Err(_) => return self.destroy(false).await,
					Ok(n) => {
						self.recv_len.fetch_add(n as u64, Ordering::Relaxed);
						pipeline.session_write_data(self.id, Bytes::copy_from_slice(&out_buf[..n])).await;
						pipeline.session_write_ack(self.id).await;
					}
				},
				maybe = rx.recv() => match maybe {
					Some(data) => {
						self.sent_len.fetch_add(data.len() as u64, Ordering::Relaxed);
						if out.write_all(&data).await.is_err() {
							return self.destroy(false).await;
						}
					}
					None => return self.destroy(false).await,
				}
			}
		}
	}

	/// Pipelined counterpart of [`Self::run_udp_forward`]. UDP datagrams
	/// relayed back to the client are written through the pipeline port; no
	/// flow-control gating applies here (§4.6 invariant 6 is scoped to the
	/// TCP `FORWARD` direction).
	async fn run_udp_forward_pipelined(self: Arc<Self>, mut rx: UnboundedReceiver<Bytes>, first_chunk: Bytes) -> SessionSummary {
		let Some(pipeline_ref) = self.pipeline.clone() else {
			wind_core::error!("session {} run_udp_forward_pipelined without a pipeline reference", self.id);
			return self.destroy(false).await;
		};

		let mut pending = BytesMut::from(&first_chunk[..]);
		let mut udp_socket: Option<UdpSocket> = None;
		let mut recv_buf = vec![0u8; 16 * 1024];

		loop {
			if self.is_destroyed() {
				return self.finish();
			}

			let mut codec = UdpFrameCodec;
			match codec.decode(&mut pending) {
				Ok(Some(frame)) => {
					if let Err(summary) = self.udp_send_frame(&mut udp_socket, frame).await {
						return summary;
					}
					continue;
				}
				Ok(None) => {
					if pending.len() > self.config.max_buf_length {
						wind_core::warn!("session {} oversized UDP frame, destroying", self.id);
						return self.destroy(false).await;
					}
				}
				Err(e) => {
					wind_core::warn!("session {} malformed UDP frame: {e}", self.id);
					return self.destroy(false).await;
				}
			}

			let Some(pipeline) = pipeline_ref.upgrade() else {
				wind_core::warn!("session {} pipeline expired mid-udp-forward", self.id);
				return self.destroy(false).await;
			};

			let recv_fut = async {
				match &udp_socket {
					Some(sock) => Some(sock.recv_from(&mut recv_buf).await),
					None => None,
				}
			};

			tokio::select! {
				maybe = rx.recv() => match maybe {
					Some(data) => pending.extend_from_slice(&data),
					None => return self.destroy(false).await,
				},
				maybe = recv_fut, if udp_socket.is_some() => {
					match maybe {
						Some(Ok((n, from))) => {
							self.recv_len.fetch_add(n as u64, Ordering::Relaxed);
							let frame = UdpFrame { address: Address::from(socket_addr_to_target(from)), payload: Bytes::copy_from_slice(&recv_buf[..n]) };
							let mut encoded = BytesMut::new();
							if UdpFrameCodec.encode(frame, &mut encoded).is_err() {
								return self.destroy(false).await;
							}
							pipeline.session_write_data(self.id, encoded.freeze()).await;
						}
						Some(Err(_)) | None => return self.destroy(false).await,
					}
				}
			}
		}
	}

	async fn udp_send_frame(self: &Arc<Self>, udp_socket: &mut Option<UdpSocket>, frame: UdpFrame) -> Result<(), SessionSummary> {
		let target = frame.address.to_target();
		let (host, port) = target_host_port(&target);
		let endpoints = match resolve_endpoints(&host, port).await {
			Ok(e) if !e.is_empty() => e,
			_ => {
				wind_core::warn!("session {} failed to resolve UDP target {host}:{port}", self.id);
				return Err(self.destroy(false).await);
			}
		};
		let endpoint = pick_endpoint(&endpoints, self.config.tcp.prefer_ipv4).expect("non-empty endpoints");

		if udp_socket.is_none() {
			let bind: SocketAddr = if endpoint.is_ipv4() { "0.0.0.0:0".parse().unwrap() } else { "[::]:0".parse().unwrap() };
			*udp_socket = match UdpSocket::bind(bind).await {
				Ok(s) => Some(s),
				Err(e) => {
					wind_core::warn!("session {} failed to bind UDP socket: {e}", self.id);
					return Err(self.destroy(false).await);
				}
			};
		}

		self.sent_len.fetch_add(frame.payload.len() as u64, Ordering::Relaxed);
		if let Some(sock) = udp_socket.as_ref()
			&& sock.send_to(&frame.payload, endpoint).await.is_err()
		{
			return Err(self.destroy(false).await);
		}
		Ok(())
	}

	/// §4.6 `destroy`. Idempotent; records final accounting, tears down
	/// whatever sockets were open, and notifies the pipeline unless the
	/// pipeline itself is the one tearing this session down.
	pub async fn destroy(self: Arc<Self>, called_from_pipeline: bool) -> SessionSummary {
		if self.status.get() == Status::Destroy {
			return self.finish();
		}
		self.status.set(Status::Destroy);
		self.ingress_tx.lock().unwrap().take();
		self.ack_notify.notify_one();

		let summary = self.finish();

		if let Some(password) = self.auth_password.lock().await.take() {
			self.authenticator.record(&password, summary.recv_len, summary.sent_len).await;
		}

		if let Some(pipeline_ref) = &self.pipeline
			&& !called_from_pipeline
			&& let Some(pipeline) = pipeline_ref.upgrade()
		{
			pipeline.remove_session_after_destroy(self.id);
		}

		wind_core::info!(
			"session {} destroyed after {:?}: recv={} sent={}",
			self.id,
			summary.duration,
			summary.recv_len,
			summary.sent_len
		);

		summary
	}

	fn finish(&self) -> SessionSummary {
		SessionSummary {
			recv_len:  self.recv_len.load(Ordering::Relaxed),
			sent_len:  self.sent_len.load(Ordering::Relaxed),
			duration:  self.start.elapsed(),
			fell_back: self.fell_back.load(Ordering::Relaxed),
		}
	}
}

enum InRecvOutcome {
	Continue,
	DialOut { query_addr: String, query_port: u16, udp_associate: bool, first_write: Bytes },
	Destroyed,
}

impl request::Request {
	fn address_host(&self) -> String {
		match &self.address {
			Address::Domain(d, _) => d.clone(),
			Address::IPv4(ip, _) => ip.to_string(),
			Address::IPv6(ip, _) => ip.to_string(),
		}
	}

	fn address_port(&self) -> u16 {
		match &self.address {
			Address::Domain(_, p) | Address::IPv4(_, p) | Address::IPv6(_, p) => *p,
		}
	}
}

fn target_host_port(target: &wind_core::types::TargetAddr) -> (String, u16) {
	match target {
		wind_core::types::TargetAddr::Domain(d, p) => (d.clone(), *p),
		wind_core::types::TargetAddr::IPv4(ip, p) => (ip.to_string(), *p),
		wind_core::types::TargetAddr::IPv6(ip, p) => (ip.to_string(), *p),
	}
}

fn socket_addr_to_target(addr: SocketAddr) -> wind_core::types::TargetAddr {
	match addr {
		SocketAddr::V4(v4) => wind_core::types::TargetAddr::IPv4(*v4.ip(), v4.port()),
		SocketAddr::V6(v6) => wind_core::types::TargetAddr::IPv6(*v6.ip(), v6.port()),
	}
}

/// Heuristic used only on the TLS-handshake-failure path (§9): a plaintext
/// HTTP request starts with a recognizable method keyword. Peeks without
/// consuming data the caller may still need to log.
async fn looks_like_plain_http(stream: &mut TcpStream) -> bool {
	let mut probe = [0u8; 16];
	match stream.peek(&mut probe).await {
		Ok(n) if n > 0 => {
			const METHODS: &[&[u8]] = &[b"GET ", b"POST ", b"HEAD ", b"PUT ", b"OPTIONS ", b"CONNECT "];
			METHODS.iter().any(|m| probe.starts_with(m))
		}
		_ => false,
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::auth::DenyAllAuthenticator;
	use crate::pipeline::{NoPipeline, Pipeline as _};

	fn config() -> Arc<SessionConfig> {
		Arc::new(SessionConfig {
			remote_addr: "example.org".into(),
			remote_port: 443,
			..Default::default()
		})
	}

	#[tokio::test]
	async fn new_session_starts_in_handshake() {
		let session: Arc<Session<DenyAllAuthenticator, NoPipeline>> =
			Arc::new(Session::new(1, "127.0.0.1:1".parse().unwrap(), config(), Arc::new(DenyAllAuthenticator), None));
		assert_eq!(session.status(), Status::Handshake);
	}

	#[tokio::test]
	async fn destroy_is_idempotent_and_reports_zero_traffic() {
		let session: Arc<Session<DenyAllAuthenticator, NoPipeline>> =
			Arc::new(Session::new(2, "127.0.0.1:1".parse().unwrap(), config(), Arc::new(DenyAllAuthenticator), None));
		let first = session.clone().destroy(false).await;
		let second = session.clone().destroy(false).await;
		assert_eq!(first.recv_len, 0);
		assert_eq!(second.sent_len, 0);
		assert_eq!(session.status(), Status::Destroy);
	}

	#[tokio::test]
	async fn unknown_password_falls_back_to_configured_origin() {
		let session: Arc<Session<DenyAllAuthenticator, NoPipeline>> =
			Arc::new(Session::new(3, "127.0.0.1:1".parse().unwrap(), config(), Arc::new(DenyAllAuthenticator), None));
		let password = "f".repeat(crate::request::PASSWORD_HEX_LEN);
		let mut frame = bytes::BytesMut::new();
		frame.extend_from_slice(password.as_bytes());
		frame.extend_from_slice(b"\r\n");
		frame.extend_from_slice(&[1]);
		let mut codec = AddressCodec;
		Encoder::encode(&mut codec, Address::Domain("attacker-target.example".into(), 9999), &mut frame).unwrap();
		frame.extend_from_slice(b"\r\npayload");

		let outcome = session.in_recv_handshake(&frame, None).await;
		match outcome {
			InRecvOutcome::DialOut { query_addr, query_port, udp_associate, .. } => {
				assert_eq!(query_addr, "example.org");
				assert_eq!(query_port, 443);
				assert!(!udp_associate);
			}
			_ => panic!("expected a fallback dial"),
		}
	}

	#[test]
	fn no_pipeline_is_never_gated() {
		let _ = NoPipeline;
	}
}

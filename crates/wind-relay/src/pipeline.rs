//! Pipeline port (component C5): the contract a session needs from an
//! optional shared-transport multiplexer. No concrete multiplexer ships in
//! this crate — only the port and the session-side flow-control helper.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity a pipeline uses to route chunks back to the session that
/// asked for them.
pub type SessionId = u64;

/// What a session needs from its shared transport. A session only ever
/// holds a non-owning [`std::sync::Weak`] reference to its pipeline — see
/// [`PipelineRef`].
pub trait Pipeline: Send + Sync {
	fn session_write_data(
		&self,
		session: SessionId,
		data: bytes::Bytes,
	) -> impl Future<Output = ()> + Send;

	fn session_write_ack(&self, session: SessionId) -> impl Future<Output = ()> + Send;

	fn remove_session_after_destroy(&self, session: SessionId);
}

/// Placeholder `P` type parameter for sessions constructed with
/// `pipeline: None`. A session only calls through a [`PipelineRef<P>`] it
/// actually holds, and non-pipelined sessions never hold one — so these
/// methods are unreachable in practice; they exist only so
/// `Session<A, NoPipeline>` type-checks as the non-pipelined instantiation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPipeline;

impl Pipeline for NoPipeline {
	async fn session_write_data(&self, _session: SessionId, _data: bytes::Bytes) {
		unreachable!("NoPipeline is never reached through a live PipelineRef")
	}

	async fn session_write_ack(&self, _session: SessionId) {
		unreachable!("NoPipeline is never reached through a live PipelineRef")
	}

	fn remove_session_after_destroy(&self, _session: SessionId) {
		unreachable!("NoPipeline is never reached through a live PipelineRef")
	}
}

/// Non-owning handle a session keeps on its pipeline. Every use re-upgrades
/// the weak reference; if the pipeline has already gone away the session
/// must destroy itself rather than treat this as an error to retry.
pub struct PipelineRef<P> {
	inner: std::sync::Weak<P>,
}

impl<P> Clone for PipelineRef<P> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}

impl<P: Pipeline> PipelineRef<P> {
	pub fn new(pipeline: &std::sync::Arc<P>) -> Self {
		Self { inner: std::sync::Arc::downgrade(pipeline) }
	}

	pub fn upgrade(&self) -> Option<std::sync::Arc<P>> {
		self.inner.upgrade()
	}
}

/// Session-side flow control for pipeline mode: bounds unacknowledged
/// outbound-origin bytes by gating the next `out_async_read` on a peer ACK.
#[derive(Default)]
pub struct PipelineFlowControl {
	/// `true` once the session is using a shared transport instead of its own
	/// TLS socket.
	using_pipeline: bool,
	waiting_ack:    std::sync::atomic::AtomicBool,
	ack_counter:    AtomicU64,
}

impl PipelineFlowControl {
	pub fn new(using_pipeline: bool) -> Self {
		Self {
			using_pipeline,
			waiting_ack: std::sync::atomic::AtomicBool::new(false),
			ack_counter: AtomicU64::new(0),
		}
	}

	pub fn is_using_pipeline(&self) -> bool {
		self.using_pipeline
	}

	/// Call before issuing `out_async_read`. Returns `false` when the read
	/// must be deferred until [`Self::on_ack`] is called.
	pub fn pre_call_ack_func(&self) -> bool {
		if !self.using_pipeline {
			return true;
		}
		!self.waiting_ack.swap(true, Ordering::AcqRel)
	}

	pub fn on_ack(&self) {
		self.waiting_ack.store(false, Ordering::Release);
		self.ack_counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn ack_count(&self) -> u64 {
		self.ack_counter.load(Ordering::Relaxed)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn non_pipeline_sessions_are_never_gated() {
		let fc = PipelineFlowControl::new(false);
		assert!(fc.pre_call_ack_func());
		assert!(fc.pre_call_ack_func());
	}

	#[test]
	fn pipeline_sessions_gate_until_ack() {
		let fc = PipelineFlowControl::new(true);
		assert!(fc.pre_call_ack_func());
		assert!(!fc.pre_call_ack_func());
		fc.on_ack();
		assert!(fc.pre_call_ack_func());
		assert_eq!(fc.ack_count(), 1);
	}
}

//! Shutdown trigger and the handle returned by a successful build.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::{Running, stop_all};
use peerlink_types::error::StopFailure;
use peerlink_types::prelude::*;

/// Asks the hosting process to shut the node down. Firing it does not stop
/// anything by itself; whoever owns the [`ShutdownHandle`] watches for it.
#[derive(Debug, Clone, Default)]
pub struct ShutdownTrigger(CancellationToken);

impl ShutdownTrigger {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn trigger(&self) {
		self.0.cancel();
	}

	pub fn is_triggered(&self) -> bool {
		self.0.is_cancelled()
	}

	pub async fn triggered(&self) {
		self.0.cancelled().await;
	}
}

/// Cancelled as soon as the node starts shutting down
#[derive(Debug, Clone, Default)]
pub struct Closing(pub CancellationToken);

type Teardown = Shared<BoxFuture<'static, Result<(), Vec<StopFailure>>>>;

struct Inner {
	running: Mutex<Option<Vec<Running>>>,
	teardown: Mutex<Option<Teardown>>,
	closing: Closing,
}

/// Stops a running node. Clones share the same node: the first `shutdown`
/// call starts the teardown and every call, concurrent or later, waits for
/// that same teardown and gets its outcome.
#[derive(Clone)]
pub struct ShutdownHandle {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for ShutdownHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ShutdownHandle").field("closing", &self.is_closing()).finish()
	}
}

impl ShutdownHandle {
	pub(crate) fn new(running: Vec<Running>, closing: Closing) -> Self {
		Self {
			inner: Arc::new(Inner {
				running: Mutex::new(Some(running)),
				teardown: Mutex::new(None),
				closing,
			}),
		}
	}

	pub fn is_closing(&self) -> bool {
		self.inner.closing.0.is_cancelled()
	}

	pub fn closing(&self) -> CancellationToken {
		self.inner.closing.0.clone()
	}

	pub async fn shutdown(&self) -> PlResult<()> {
		let teardown = {
			let mut guard = self.inner.teardown.lock();
			if let Some(teardown) = &*guard {
				teardown.clone()
			} else {
				info!("node shutting down");
				self.inner.closing.0.cancel();
				let running = self.inner.running.lock().take().unwrap_or_default();
				// a detached task finishes the teardown even if every caller goes away
				let task = tokio::spawn(stop_all(running));
				let teardown = async move {
					match task.await {
						Ok(failures) if failures.is_empty() => Ok(()),
						Ok(failures) => Err(failures),
						Err(err) => Err(vec![StopFailure {
							component: "node".into(),
							message: format!("teardown task failed: {}", err),
						}]),
					}
				}
				.boxed()
				.shared();
				*guard = Some(teardown.clone());
				teardown
			}
		};

		teardown.await.map_err(|failures| {
			for failure in &failures {
				warn!(%failure, "component failed to stop");
			}
			Error::Shutdown(failures)
		})
	}
}


// vim: ts=4

//! Waits for a reason to stop the process and runs the shutdown handlers.

use futures::future::BoxFuture;

use crate::shutdown::ShutdownTrigger;
use peerlink_types::prelude::*;

/// A named step of process shutdown
pub struct ShutdownHandler {
	pub component: &'static str,
	stop: Box<dyn FnOnce() -> BoxFuture<'static, PlResult<()>> + Send>,
}

impl ShutdownHandler {
	pub fn new<F, Fut>(component: &'static str, stop: F) -> Self
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = PlResult<()>> + Send + 'static,
	{
		Self {
			component,
			stop: Box::new(move || -> BoxFuture<'static, PlResult<()>> { Box::pin(stop()) }),
		}
	}
}

#[cfg(unix)]
async fn terminate() {
	use tokio::signal::unix::{SignalKind, signal};
	match signal(SignalKind::terminate()) {
		Ok(mut sig) => {
			sig.recv().await;
		}
		Err(err) => {
			warn!(%err, "cannot listen for SIGTERM");
			std::future::pending::<()>().await;
		}
	}
}

#[cfg(not(unix))]
async fn terminate() {
	std::future::pending::<()>().await;
}

/// Resolve on the first of: the trigger, SIGINT, SIGTERM
pub async fn wait_for_shutdown(trigger: &ShutdownTrigger) {
	tokio::select! {
		() = trigger.triggered() => info!("shutdown requested"),
		res = tokio::signal::ctrl_c() => match res {
			Ok(()) => info!("received interrupt, shutting down"),
			Err(err) => warn!(%err, "cannot listen for interrupt, shutting down"),
		},
		() = terminate() => info!("received SIGTERM, shutting down"),
	}
}

/// Run every handler in order. A failing handler is logged and the next one
/// still runs. Returns the number of failures.
pub async fn run_handlers(handlers: Vec<ShutdownHandler>) -> usize {
	let mut failures = 0;
	for handler in handlers {
		debug!(component = handler.component, "shutting down");
		match (handler.stop)().await {
			Ok(()) => info!(component = handler.component, "shut down"),
			Err(err) => {
				error!(component = handler.component, %err, "shutdown failed");
				failures += 1;
			}
		}
	}
	failures
}

/// Wait for a shutdown reason, then run `handlers` in order
pub async fn monitor_shutdown(trigger: ShutdownTrigger, handlers: Vec<ShutdownHandler>) -> usize {
	wait_for_shutdown(&trigger).await;
	let failures = run_handlers(handlers).await;
	if failures == 0 {
		info!("graceful shutdown complete");
	}
	failures
}


// vim: ts=4

//! Start and stop hooks of constructed components.
//!
//! Hooks start in registration order. A start hook may hand back the task it
//! spawned; the task receives its own cancellation token. Components stop in
//! reverse start order: the token is cancelled, the task joined, then the stop
//! hook runs. If a start hook fails, everything started so far is stopped
//! before the error is returned.

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use peerlink_types::error::StopFailure;
use peerlink_types::prelude::*;

type StartFn = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, PlResult<Option<JoinHandle<()>>>> + Send>;
type StopFn = Box<dyn FnOnce() -> BoxFuture<'static, PlResult<()>> + Send>;

pub struct Hook {
	name: String,
	on_start: Option<StartFn>,
	on_stop: Option<StopFn>,
}

impl Hook {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), on_start: None, on_stop: None }
	}

	pub fn on_start<F, Fut>(mut self, f: F) -> Self
	where
		F: FnOnce(CancellationToken) -> Fut + Send + 'static,
		Fut: Future<Output = PlResult<Option<JoinHandle<()>>>> + Send + 'static,
	{
		self.on_start = Some(Box::new(
			move |cancel: CancellationToken| -> BoxFuture<'static, PlResult<Option<JoinHandle<()>>>> {
				Box::pin(f(cancel))
			},
		));
		self
	}

	pub fn on_stop<F, Fut>(mut self, f: F) -> Self
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = PlResult<()>> + Send + 'static,
	{
		self.on_stop = Some(Box::new(move || -> BoxFuture<'static, PlResult<()>> { Box::pin(f()) }));
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

#[derive(Default)]
pub struct Lifecycle {
	hooks: Vec<Hook>,
}

impl Lifecycle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn append(&mut self, hook: Hook) {
		self.hooks.push(hook);
	}

	pub fn len(&self) -> usize {
		self.hooks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.hooks.is_empty()
	}

	/// Run every start hook in order
	pub(crate) async fn start(self) -> PlResult<Vec<Running>> {
		let mut running = Vec::with_capacity(self.hooks.len());

		for hook in self.hooks {
			let cancel = CancellationToken::new();
			let task = match hook.on_start {
				Some(start) => {
					debug!(component = %hook.name, "starting");
					match start(cancel.clone()).await {
						Ok(task) => task,
						Err(err) => {
							error!(component = %hook.name, %err, "start failed, rolling back");
							for failure in stop_all(running).await {
								warn!(%failure, "rollback stop failed");
							}
							return Err(Error::Start { component: hook.name, source: Box::new(err) });
						}
					}
				}
				None => None,
			};
			running.push(Running { name: hook.name, cancel, task, on_stop: hook.on_stop });
		}

		Ok(running)
	}
}

/// A started component
pub(crate) struct Running {
	name: String,
	cancel: CancellationToken,
	task: Option<JoinHandle<()>>,
	on_stop: Option<StopFn>,
}

/// Stop components in reverse order. Every component is stopped even if an
/// earlier one fails; failures are collected.
pub(crate) async fn stop_all(running: Vec<Running>) -> Vec<StopFailure> {
	let mut failures = Vec::new();

	for component in running.into_iter().rev() {
		debug!(component = %component.name, "stopping");
		component.cancel.cancel();

		if let Some(task) = component.task
			&& let Err(err) = task.await
		{
			failures.push(StopFailure {
				component: component.name.as_str().into(),
				message: format!("task failed: {}", err),
			});
		}

		if let Some(stop) = component.on_stop
			&& let Err(err) = stop().await
		{
			failures.push(StopFailure { component: component.name.as_str().into(), message: err.to_string() });
		}
	}

	failures
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use std::sync::Arc;

	fn recording_hook(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Hook {
		let start_log = Arc::clone(log);
		let stop_log = Arc::clone(log);
		Hook::new(name)
			.on_start(move |_| async move {
				start_log.lock().push(format!("start {}", name));
				Ok(None)
			})
			.on_stop(move || async move {
				stop_log.lock().push(format!("stop {}", name));
				Ok(())
			})
	}

	#[tokio::test]
	async fn test_stop_runs_in_reverse_start_order() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let mut lc = Lifecycle::new();
		lc.append(recording_hook("a", &log));
		lc.append(recording_hook("b", &log));
		lc.append(recording_hook("c", &log));

		let running = lc.start().await.expect("start");
		assert!(stop_all(running).await.is_empty());
		assert_eq!(*log.lock(), vec!["start a", "start b", "start c", "stop c", "stop b", "stop a"]);
	}

	#[tokio::test]
	async fn test_failed_start_rolls_back_started_components() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let mut lc = Lifecycle::new();
		lc.append(recording_hook("a", &log));
		lc.append(recording_hook("b", &log));
		lc.append(Hook::new("broken").on_start(|_| async { Err(Error::Network("bind failed".into())) }));
		lc.append(recording_hook("never", &log));

		let res = lc.start().await;
		assert!(matches!(res, Err(Error::Start { ref component, .. }) if component == "broken"));
		assert_eq!(*log.lock(), vec!["start a", "start b", "stop b", "stop a"]);
	}

	#[tokio::test]
	async fn test_tasks_are_cancelled_and_joined() {
		let finished = Arc::new(Mutex::new(false));
		let flag = Arc::clone(&finished);
		let mut lc = Lifecycle::new();
		lc.append(Hook::new("worker").on_start(move |cancel| async move {
			let task = tokio::spawn(async move {
				cancel.cancelled().await;
				*flag.lock() = true;
			});
			Ok(Some(task))
		}));

		let running = lc.start().await.expect("start");
		assert!(!*finished.lock());
		assert!(stop_all(running).await.is_empty());
		assert!(*finished.lock());
	}

	#[tokio::test]
	async fn test_stop_failures_are_collected() {
		let log = Arc::new(Mutex::new(Vec::new()));
		let mut lc = Lifecycle::new();
		lc.append(recording_hook("a", &log));
		lc.append(Hook::new("flaky").on_stop(|| async { Err(Error::Internal("stuck".into())) }));
		lc.append(recording_hook("c", &log));

		let running = lc.start().await.expect("start");
		let failures = stop_all(running).await;
		assert_eq!(failures.len(), 1);
		assert_eq!(&*failures[0].component, "flaky");
		assert_eq!(*log.lock(), vec!["start a", "start c", "stop c", "stop a"]);
	}
}

// vim: ts=4

//! Per-method call counters and latency, collected through `wrap`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::around::{AnyValue, Around, Next};
use peerlink_types::prelude::*;

/// Context tag carrying the name of the method being served
pub const ENDPOINT_TAG: &str = "endpoint";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodStats {
	pub calls: u64,
	pub errors: u64,
	pub total_time: Duration,
}

#[derive(Debug, Default)]
pub struct CallStats {
	methods: Mutex<BTreeMap<&'static str, MethodStats>>,
}

impl CallStats {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, method: &str) -> Option<MethodStats> {
		self.methods.lock().get(method).copied()
	}

	pub fn snapshot(&self) -> BTreeMap<&'static str, MethodStats> {
		self.methods.lock().clone()
	}
}

#[async_trait]
impl Around for CallStats {
	async fn around(&self, method: &'static str, ctx: CallCtx, next: Next) -> PlResult<AnyValue> {
		let started = Instant::now();
		let res = next.run(ctx.with_tag(ENDPOINT_TAG, method)).await;
		let elapsed = started.elapsed();

		{
			let mut methods = self.methods.lock();
			let entry = methods.entry(method).or_default();
			entry.calls += 1;
			entry.total_time += elapsed;
			if res.is_err() {
				entry.errors += 1;
			}
		}

		match &res {
			Ok(_) => debug!(method, elapsed = ?elapsed, "api call"),
			Err(err) => debug!(method, elapsed = ?elapsed, %err, "api call failed"),
		}
		res
	}
}

// vim: ts=4

//! The full-node capability: `Common` plus `Net`.

use serde_json::Value;
use std::sync::Arc;

use crate::around::Around;
use crate::common::{Common, CommonProxy};
use crate::dispatch::RpcDispatch;
use crate::handler::{CallFuture, MethodDesc};
use crate::net::{Net, NetProxy};
use peerlink_types::prelude::*;

pub trait FullNode: Common + Net {}

impl<T: Common + Net + ?Sized> FullNode for T {}

#[derive(Clone, Default)]
pub struct FullNodeProxy {
	pub common: CommonProxy,
	pub net: NetProxy,
}

impl FullNodeProxy {
	pub fn new(common: CommonProxy, net: NetProxy) -> Self {
		Self { common, net }
	}

	pub fn stub() -> Self {
		Self::default()
	}

	pub fn from_impl<T: FullNode + 'static>(inner: Arc<T>) -> Self {
		Self { common: CommonProxy::from_impl(Arc::clone(&inner)), net: NetProxy::from_impl(inner) }
	}

	pub fn wrap(&self, around: Arc<dyn Around>) -> Self {
		Self { common: self.common.wrap(Arc::clone(&around)), net: self.net.wrap(around) }
	}

	pub fn supported(&self) -> Vec<&'static str> {
		let mut out = self.common.supported();
		out.extend(self.net.supported());
		out
	}
}

impl RpcDispatch for FullNodeProxy {
	fn methods(&self) -> Vec<MethodDesc> {
		CommonProxy::METHODS.iter().chain(NetProxy::METHODS).copied().collect()
	}

	fn call(&self, method: &str, ctx: CallCtx, params: Vec<Value>) -> CallFuture<Value> {
		if CommonProxy::METHODS.iter().any(|m| m.name == method) {
			self.common.call(method, ctx, params)
		} else {
			self.net.call(method, ctx, params)
		}
	}
}

// vim: ts=4

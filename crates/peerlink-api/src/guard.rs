//! Permission enforcement as an interceptor.
//!
//! The guard compares the permissions carried by the call context with the
//! level each method declares. Methods it does not know are refused.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::around::{AnyValue, Around, Next};
use crate::dispatch::RpcDispatch;
use crate::full::FullNodeProxy;
use crate::handler::MethodDesc;
use peerlink_types::prelude::*;

#[derive(Debug, Clone)]
pub struct PermissionGuard {
	required: HashMap<&'static str, Permission>,
}

impl PermissionGuard {
	pub fn new(methods: impl IntoIterator<Item = MethodDesc>) -> Self {
		Self { required: methods.into_iter().map(|m| (m.name, m.perm)).collect() }
	}
}

#[async_trait]
impl Around for PermissionGuard {
	async fn around(&self, method: &'static str, ctx: CallCtx, next: Next) -> PlResult<AnyValue> {
		let Some(required) = self.required.get(method) else {
			warn!(method, "refusing call to undeclared method");
			return Err(Error::Unauthorized);
		};
		if !ctx.has_permission(*required) {
			debug!(method, %required, "caller lacks permission");
			return Err(Error::Unauthorized);
		}
		next.run(ctx).await
	}
}

/// Full-node proxy that enforces per-method permissions on every call
pub fn permissioned(api: &FullNodeProxy) -> FullNodeProxy {
	api.wrap(Arc::new(PermissionGuard::new(api.methods())))
}

// vim: ts=4

//! Method handlers and per-method metadata.

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

use peerlink_types::prelude::*;

/// Future returned by every capability call
pub type CallFuture<T> = BoxFuture<'static, PlResult<T>>;

/// One method implementation. `A` is the argument tuple.
pub type Handler<A, R> = Arc<dyn Fn(CallCtx, A) -> CallFuture<R> + Send + Sync>;

/// Build a handler from an async closure-like function
pub fn handler<A, R, F, Fut>(f: F) -> Handler<A, R>
where
	F: Fn(CallCtx, A) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = PlResult<R>> + Send + 'static,
{
	Arc::new(move |ctx: CallCtx, args: A| -> CallFuture<R> { f(ctx, args).boxed() })
}

/// Wire name and required permission of an interface method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDesc {
	pub name: &'static str,
	pub perm: Permission,
}


// vim: ts=4

//! Call interception.
//!
//! `wrap` routes every method of a proxy through an [`Around`] implementation,
//! which receives the method name, the call context and a [`Next`] continuation.
//! The interceptor either runs `next` (possibly with a derived context) or
//! returns a result of its own. Results travel type-erased and are downcast
//! back to the method's return type after the interceptor returns.

use async_trait::async_trait;
use futures::future::FutureExt;
use std::any::Any;
use std::sync::Arc;

use crate::handler::{CallFuture, Handler};
use peerlink_types::prelude::*;

pub type AnyValue = Box<dyn Any + Send>;

/// Box a substituted result
pub fn value<T: Send + 'static>(v: T) -> AnyValue {
	Box::new(v)
}

/// The rest of the call chain
pub struct Next {
	call: Box<dyn FnOnce(CallCtx) -> CallFuture<AnyValue> + Send>,
}

impl Next {
	pub fn new<F>(call: F) -> Self
	where
		F: FnOnce(CallCtx) -> CallFuture<AnyValue> + Send + 'static,
	{
		Self { call: Box::new(call) }
	}

	pub async fn run(self, ctx: CallCtx) -> PlResult<AnyValue> {
		(self.call)(ctx).await
	}
}

#[async_trait]
pub trait Around: Send + Sync {
	async fn around(&self, method: &'static str, ctx: CallCtx, next: Next) -> PlResult<AnyValue>;
}

/// Adapter turning a plain function into an [`Around`]
pub struct FnAround<F>(F);

#[async_trait]
impl<F, Fut> Around for FnAround<F>
where
	F: Fn(&'static str, CallCtx, Next) -> Fut + Send + Sync,
	Fut: Future<Output = PlResult<AnyValue>> + Send + 'static,
{
	async fn around(&self, method: &'static str, ctx: CallCtx, next: Next) -> PlResult<AnyValue> {
		(self.0)(method, ctx, next).await
	}
}

pub fn around_fn<F, Fut>(f: F) -> Arc<dyn Around>
where
	F: Fn(&'static str, CallCtx, Next) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = PlResult<AnyValue>> + Send + 'static,
{
	Arc::new(FnAround(f))
}

/// Wrap one handler slot. Absent handlers are wrapped too: the interceptor
/// runs and `next` answers `Error::NotSupported`.
pub fn wrap_handler<A, R>(
	method: &'static str,
	inner: Option<Handler<A, R>>,
	around: Arc<dyn Around>,
) -> Handler<A, R>
where
	A: Send + 'static,
	R: Send + 'static,
{
	Arc::new(move |ctx: CallCtx, args: A| -> CallFuture<R> {
		let inner = inner.clone();
		let around = Arc::clone(&around);
		async move {
			let next = Next::new(move |ctx: CallCtx| -> CallFuture<AnyValue> {
				async move {
					match inner {
						Some(handler) => Ok(Box::new(handler(ctx, args).await?) as AnyValue),
						None => Err(Error::NotSupported),
					}
				}
				.boxed()
			});
			let out = around.around(method, ctx, next).await?;
			out.downcast::<R>().map(|r| *r).map_err(|_| {
				Error::Internal(format!("interceptor for {} returned a value of the wrong type", method))
			})
		}
		.boxed()
	})
}

// vim: ts=4

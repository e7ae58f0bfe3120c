//! Implementation of the methods every node exposes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::modules::api_secret::ApiAlg;
use crate::shutdown::{Closing, ShutdownTrigger};
use peerlink_api::Common;
use peerlink_types::prelude::*;
use peerlink_types::types::{API_VERSION, BUILD_VERSION, NetworkName, VersionInfo};

#[derive(Debug)]
pub struct CommonApi {
	alg: ApiAlg,
	session: Uuid,
	trigger: ShutdownTrigger,
	closing: Closing,
	network: NetworkName,
}

impl CommonApi {
	pub fn new(alg: ApiAlg, trigger: ShutdownTrigger, closing: Closing, network: NetworkName) -> Self {
		Self { alg, session: Uuid::new_v4(), trigger, closing, network }
	}
}

#[async_trait]
impl Common for CommonApi {
	async fn auth_new(&self, _ctx: CallCtx, perms: Vec<Permission>) -> PlResult<String> {
		self.alg.sign(&perms)
	}

	async fn auth_verify(&self, _ctx: CallCtx, token: String) -> PlResult<Vec<Permission>> {
		self.alg.verify(&token)
	}

	async fn closing(&self, ctx: CallCtx) -> PlResult<()> {
		tokio::select! {
			() = self.closing.0.cancelled() => Ok(()),
			() = ctx.cancelled() => Err(Error::Cancelled),
		}
	}

	async fn session(&self, _ctx: CallCtx) -> PlResult<Uuid> {
		Ok(self.session)
	}

	async fn shutdown(&self, _ctx: CallCtx) -> PlResult<()> {
		info!("shutdown requested over the api");
		self.trigger.trigger();
		Ok(())
	}

	async fn version(&self, _ctx: CallCtx) -> PlResult<VersionInfo> {
		Ok(VersionInfo { version: BUILD_VERSION.into(), api_version: API_VERSION, network: self.network })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn api() -> CommonApi {
		CommonApi::new(
			ApiAlg::from_secret(b"0123456789abcdef0123456789abcdef"),
			ShutdownTrigger::new(),
			Closing::default(),
			NetworkName::Devnet,
		)
	}

	#[tokio::test]
	async fn test_closing_waits_for_shutdown() {
		let api = api();
		let closing = api.closing.clone();
		let ctx = CallCtx::new();

		let waiter = api.closing(ctx.clone());
		tokio::pin!(waiter);
		assert!(futures::poll!(waiter.as_mut()).is_pending());
		closing.0.cancel();
		assert!(waiter.await.is_ok());
	}

	#[tokio::test]
	async fn test_closing_gives_up_when_caller_leaves() {
		let api = api();
		let ctx = CallCtx::new();
		ctx.cancel_token().cancel();
		assert!(matches!(api.closing(ctx).await, Err(Error::Cancelled)));
	}

	#[tokio::test]
	async fn test_shutdown_fires_trigger() {
		let api = api();
		api.shutdown(CallCtx::new()).await.expect("shutdown");
		assert!(api.trigger.is_triggered());
		assert!(!api.closing.0.is_cancelled());
	}

	#[tokio::test]
	async fn test_session_is_stable() {
		let api = api();
		let a = api.session(CallCtx::new()).await.expect("session");
		let b = api.session(CallCtx::new()).await.expect("session");
		assert_eq!(a, b);
	}
}

// vim: ts=4

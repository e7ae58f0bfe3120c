//! Modules derived from the locked repo.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::lifecycle::Hook;
use crate::provider::Scope;
use peerlink_types::prelude::*;
use peerlink_types::repo_adapter::{KeyStore, KvStore, LockedRepo};

/// Namespace of the datastore holding node metadata
pub const METADATA_NAMESPACE: &str = "/metadata";

/// Address the API server is expected to listen on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiEndpoint(pub SocketAddr);

/// Hand out the locked repo and release it when the node stops
pub fn locked_repo(scope: &mut Scope<'_>, repo: Arc<dyn LockedRepo>) -> Arc<dyn LockedRepo> {
	let closer = Arc::clone(&repo);
	scope.append_hook(Hook::new("repo").on_stop(move || async move {
		info!("closing repo");
		closer.close()
	}));
	repo
}

pub fn key_store(repo: &dyn LockedRepo) -> PlResult<Arc<dyn KeyStore>> {
	repo.key_store()
}

pub fn metadata_ds(repo: &dyn LockedRepo) -> PlResult<Arc<dyn KvStore>> {
	repo.datastore(METADATA_NAMESPACE)
}

pub fn set_api_endpoint(repo: &dyn LockedRepo, endpoint: ApiEndpoint) -> PlResult<()> {
	debug!(endpoint = %endpoint.0, "recording api endpoint");
	repo.set_api_endpoint(&endpoint.0.to_string())
}

// vim: ts=4

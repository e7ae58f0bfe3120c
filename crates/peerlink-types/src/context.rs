//! Per-call context passed as the first argument of every capability method.
//!
//! A context carries a cancellation token, the permissions granted to the
//! caller and a small set of string tags (endpoint name, request id). Derived
//! contexts share the cancellation token of their parent.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, PlResult};
use crate::permission::{ALL_PERMISSIONS, Permission};

#[derive(Debug, Clone, Default)]
pub struct CallCtx {
	cancel: CancellationToken,
	perms: Option<Arc<[Permission]>>,
	tags: Arc<Vec<(&'static str, Box<str>)>>,
}

impl CallCtx {
	pub fn new() -> Self {
		Self::default()
	}

	/// Context observing an existing cancellation token
	pub fn with_cancel(cancel: CancellationToken) -> Self {
		Self { cancel, ..Self::default() }
	}

	pub fn cancel_token(&self) -> &CancellationToken {
		&self.cancel
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Resolves once the call is cancelled
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Fails with `Error::Cancelled` if the call was cancelled
	pub fn check_cancelled(&self) -> PlResult<()> {
		if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
	}

	/// Derive a context carrying the given caller permissions
	pub fn with_permissions(&self, perms: impl Into<Arc<[Permission]>>) -> Self {
		Self { perms: Some(perms.into()), ..self.clone() }
	}

	/// Permissions of the caller. Local calls that never crossed the RPC
	/// boundary carry every permission.
	pub fn permissions(&self) -> &[Permission] {
		self.perms.as_deref().unwrap_or(&ALL_PERMISSIONS)
	}

	pub fn has_permission(&self, required: Permission) -> bool {
		required.check(self.permissions())
	}

	/// Derive a context with an added (or replaced) tag
	pub fn with_tag(&self, key: &'static str, value: impl Into<Box<str>>) -> Self {
		let mut tags: Vec<_> = self.tags.iter().filter(|(k, _)| *k != key).cloned().collect();
		tags.push((key, value.into()));
		Self { tags: Arc::new(tags), ..self.clone() }
	}

	pub fn tag(&self, key: &str) -> Option<&str> {
		self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_ref())
	}
}


// vim: ts=4

//! Filesystem repository for the Peerlink node.
//!
//! # Layout
//!
//! - `config.toml` - node configuration
//! - `keystore/` - one JSON file per key
//! - `datastore.redb` - namespaced key-value stores
//! - `repo.lock` - present while a process holds the repo, contains its pid
//! - `api` - endpoint of the running node's API
//! - `token` - admin API token
//!
//! A lock left behind by a crashed process has to be removed by hand.

use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use peerlink_types::config::FullNodeConfig;
use peerlink_types::prelude::*;
use peerlink_types::repo_adapter::{KeyStore, KvStore, LockedRepo, Repo};
use peerlink_types::types::NodeType;

pub mod datastore;
mod error;
pub mod keystore;

use datastore::RedbStore;
use error::{from_redb_error, not_found};
use keystore::FsKeyStore;

pub const CONFIG_FILE: &str = "config.toml";
pub const KEYSTORE_DIR: &str = "keystore";
pub const DATASTORE_FILE: &str = "datastore.redb";
pub const LOCK_FILE: &str = "repo.lock";
pub const API_FILE: &str = "api";
pub const TOKEN_FILE: &str = "token";

#[derive(Debug, Clone)]
pub struct FsRepo {
	path: Box<Path>,
}

impl FsRepo {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into().into_boxed_path() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_trimmed(&self, file: &str) -> PlResult<String> {
		let data = fs::read_to_string(self.path.join(file)).map_err(not_found)?;
		Ok(data.trim().to_string())
	}
}

impl Repo for FsRepo {
	fn exists(&self) -> PlResult<bool> {
		Ok(self.path.join(CONFIG_FILE).is_file())
	}

	fn init(&self, node_type: NodeType) -> PlResult<()> {
		if self.exists()? {
			return Err(Error::RepoExists);
		}
		fs::create_dir_all(self.path.join(KEYSTORE_DIR))?;
		fs::write(self.path.join(CONFIG_FILE), FullNodeConfig::default().to_toml()?)?;
		info!(path = %self.path.display(), %node_type, "repo initialized");
		Ok(())
	}

	fn lock(&self, node_type: NodeType) -> PlResult<Arc<dyn LockedRepo>> {
		if !self.exists()? {
			return Err(Error::RepoNotInitialized);
		}

		let lock_path = self.path.join(LOCK_FILE);
		let mut lock = match fs::OpenOptions::new().write(true).create_new(true).open(&lock_path) {
			Ok(file) => file,
			Err(err) if err.kind() == ErrorKind::AlreadyExists => return Err(Error::RepoLocked),
			Err(err) => return Err(err.into()),
		};
		lock.write_all(std::process::id().to_string().as_bytes())?;

		let held = LockFile(lock_path);
		let db = redb::Database::create(self.path.join(DATASTORE_FILE)).map_err(from_redb_error)?;
		datastore::init_tables(&db)?;
		debug!(path = %self.path.display(), "repo locked");

		Ok(Arc::new(FsLockedRepo {
			path: self.path.clone(),
			node_type,
			db: Arc::new(db),
			lock: Mutex::new(Some(held)),
		}))
	}

	fn api_endpoint(&self) -> PlResult<String> {
		self.read_trimmed(API_FILE)
	}

	fn api_token(&self) -> PlResult<String> {
		self.read_trimmed(TOKEN_FILE)
	}
}

/// Removes the lock file when dropped
#[derive(Debug)]
struct LockFile(PathBuf);

impl Drop for LockFile {
	fn drop(&mut self) {
		if let Err(err) = fs::remove_file(&self.0) {
			warn!(path = %self.0.display(), %err, "cannot remove repo lock");
		}
	}
}

#[derive(Debug)]
pub struct FsLockedRepo {
	path: Box<Path>,
	node_type: NodeType,
	db: Arc<redb::Database>,
	lock: Mutex<Option<LockFile>>,
}

impl LockedRepo for FsLockedRepo {
	fn node_type(&self) -> NodeType {
		self.node_type
	}

	fn config(&self) -> PlResult<FullNodeConfig> {
		FullNodeConfig::from_toml(&fs::read_to_string(self.path.join(CONFIG_FILE))?)
	}

	fn datastore(&self, namespace: &str) -> PlResult<Arc<dyn KvStore>> {
		if !namespace.starts_with('/') {
			return Err(Error::Parse(format!("datastore namespace must start with '/': {}", namespace)));
		}
		Ok(Arc::new(RedbStore::new(Arc::clone(&self.db), namespace)))
	}

	fn key_store(&self) -> PlResult<Arc<dyn KeyStore>> {
		Ok(Arc::new(FsKeyStore::new(self.path.join(KEYSTORE_DIR))))
	}

	fn set_api_endpoint(&self, endpoint: &str) -> PlResult<()> {
		fs::write(self.path.join(API_FILE), endpoint)?;
		Ok(())
	}

	fn set_api_token(&self, token: &str) -> PlResult<()> {
		let path = self.path.join(TOKEN_FILE);
		fs::write(&path, token)?;
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
		}
		Ok(())
	}

	fn close(&self) -> PlResult<()> {
		let Some(lock) = self.lock.lock().take() else {
			return Err(Error::Internal("repo is already closed".into()));
		};
		// the endpoint is only meaningful while the node runs
		if let Err(err) = fs::remove_file(self.path.join(API_FILE))
			&& err.kind() != ErrorKind::NotFound
		{
			warn!(%err, "cannot remove api endpoint file");
		}
		drop(lock);
		debug!(path = %self.path.display(), "repo closed");
		Ok(())
	}
}

// vim: ts=4

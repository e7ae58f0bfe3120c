//! Repository adapter traits.
//!
//! A repo is the node's on-disk home: configuration, key store, namespaced
//! datastores and the files API clients use to find the node (endpoint and
//! token). Only one process may hold the lock on a repo at a time.
//!
//! The traits are synchronous because node options run synchronously while
//! the dependency graph is assembled.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::FullNodeConfig;
use crate::error::{Error, PlResult};
use crate::types::NodeType;

/// Name of the key holding the API token signing secret
pub const JWT_SECRET_KEY: &str = "auth-jwt-private";
/// Key type recorded for the API token signing secret
pub const JWT_SECRET_TYPE: &str = "jwt-hmac-secret";
/// Name of the key holding the networking host key
pub const HOST_KEY: &str = "libp2p-host";
/// Key type recorded for the networking host key
pub const HOST_KEY_TYPE: &str = "p256-secret";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
	pub key_type: Box<str>,
	#[serde(with = "key_bytes")]
	pub private_key: Vec<u8>,
}

mod key_bytes {
	use base64::Engine;
	use base64::engine::general_purpose::STANDARD;
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
		s.serialize_str(&STANDARD.encode(bytes))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
		let encoded = String::deserialize(d)?;
		STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
	}
}

pub trait Repo: Debug + Send + Sync {
	fn exists(&self) -> PlResult<bool>;

	/// Create the repo layout with a default configuration.
	/// Fails with `Error::RepoExists` if the repo is already initialized.
	fn init(&self, node_type: NodeType) -> PlResult<()>;

	/// Take the exclusive lock. Fails with `Error::RepoLocked` if another
	/// process holds it.
	fn lock(&self, node_type: NodeType) -> PlResult<Arc<dyn LockedRepo>>;

	/// Endpoint the running node's API listens on
	fn api_endpoint(&self) -> PlResult<String>;

	/// Admin token written by the running node
	fn api_token(&self) -> PlResult<String>;
}

pub trait LockedRepo: Debug + Send + Sync {
	fn node_type(&self) -> NodeType;

	fn config(&self) -> PlResult<FullNodeConfig>;

	fn datastore(&self, namespace: &str) -> PlResult<Arc<dyn KvStore>>;

	fn key_store(&self) -> PlResult<Arc<dyn KeyStore>>;

	fn set_api_endpoint(&self, endpoint: &str) -> PlResult<()>;

	fn set_api_token(&self, token: &str) -> PlResult<()>;

	/// Release the lock. Closing twice is an error.
	fn close(&self) -> PlResult<()>;
}

pub trait KvStore: Debug + Send + Sync {
	fn get(&self, key: &str) -> PlResult<Option<Vec<u8>>>;
	fn put(&self, key: &str, value: &[u8]) -> PlResult<()>;
	fn delete(&self, key: &str) -> PlResult<()>;

	/// Keys starting with `prefix`, in ascending order
	fn keys(&self, prefix: &str) -> PlResult<Vec<String>>;

	fn has(&self, key: &str) -> PlResult<bool> {
		Ok(self.get(key)?.is_some())
	}
}

pub trait KeyStore: Debug + Send + Sync {
	fn list(&self) -> PlResult<Vec<String>>;

	/// Fails with `Error::NotFound` if no key has this name
	fn get(&self, name: &str) -> PlResult<KeyInfo>;

	/// Fails if the name is already taken
	fn put(&self, name: &str, info: KeyInfo) -> PlResult<()>;

	fn delete(&self, name: &str) -> PlResult<()>;
}

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemKvStore {
	data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemKvStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KvStore for MemKvStore {
	fn get(&self, key: &str) -> PlResult<Option<Vec<u8>>> {
		Ok(self.data.read().get(key).cloned())
	}

	fn put(&self, key: &str, value: &[u8]) -> PlResult<()> {
		self.data.write().insert(key.to_string(), value.to_vec());
		Ok(())
	}

	fn delete(&self, key: &str) -> PlResult<()> {
		self.data.write().remove(key);
		Ok(())
	}

	fn keys(&self, prefix: &str) -> PlResult<Vec<String>> {
		Ok(self.data.read().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
	}
}

/// In-memory key store
#[derive(Debug, Default)]
pub struct MemKeyStore {
	keys: RwLock<BTreeMap<String, KeyInfo>>,
}

impl MemKeyStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KeyStore for MemKeyStore {
	fn list(&self) -> PlResult<Vec<String>> {
		Ok(self.keys.read().keys().cloned().collect())
	}

	fn get(&self, name: &str) -> PlResult<KeyInfo> {
		self.keys.read().get(name).cloned().ok_or(Error::NotFound)
	}

	fn put(&self, name: &str, info: KeyInfo) -> PlResult<()> {
		let mut keys = self.keys.write();
		if keys.contains_key(name) {
			return Err(Error::ConfigError(format!("key {} already exists", name)));
		}
		keys.insert(name.to_string(), info);
		Ok(())
	}

	fn delete(&self, name: &str) -> PlResult<()> {
		self.keys.write().remove(name).map(|_| ()).ok_or(Error::NotFound)
	}
}


// vim: ts=4

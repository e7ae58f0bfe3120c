//! Namespaced key-value stores sharing one redb database.
//!
//! Every namespace lives in the same table; keys are stored as
//! `<namespace><key>`.

use redb::ReadableDatabase;
use std::sync::Arc;

use crate::error::from_redb_error;
use peerlink_types::prelude::*;
use peerlink_types::repo_adapter::KvStore;

pub const TABLE_KV: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("kv");

/// Create the table so read transactions can open it
pub fn init_tables(db: &redb::Database) -> PlResult<()> {
	let tx = db.begin_write().map_err(from_redb_error)?;
	let _ = tx.open_table(TABLE_KV).map_err(from_redb_error)?;
	tx.commit().map_err(from_redb_error)?;
	Ok(())
}

#[derive(Debug)]
pub struct RedbStore {
	db: Arc<redb::Database>,
	namespace: Box<str>,
}

impl RedbStore {
	pub fn new(db: Arc<redb::Database>, namespace: &str) -> Self {
		Self { db, namespace: namespace.trim_end_matches('/').into() }
	}

	fn full_key(&self, key: &str) -> String {
		format!("{}{}", self.namespace, key)
	}
}

impl KvStore for RedbStore {
	fn get(&self, key: &str) -> PlResult<Option<Vec<u8>>> {
		let tx = self.db.begin_read().map_err(from_redb_error)?;
		let table = tx.open_table(TABLE_KV).map_err(from_redb_error)?;
		let value = table.get(self.full_key(key).as_str()).map_err(from_redb_error)?;
		Ok(value.map(|v| v.value().to_vec()))
	}

	fn put(&self, key: &str, value: &[u8]) -> PlResult<()> {
		let tx = self.db.begin_write().map_err(from_redb_error)?;
		{
			let mut table = tx.open_table(TABLE_KV).map_err(from_redb_error)?;
			table.insert(self.full_key(key).as_str(), value).map_err(from_redb_error)?;
		}
		tx.commit().map_err(from_redb_error)?;
		Ok(())
	}

	fn delete(&self, key: &str) -> PlResult<()> {
		let tx = self.db.begin_write().map_err(from_redb_error)?;
		{
			let mut table = tx.open_table(TABLE_KV).map_err(from_redb_error)?;
			table.remove(self.full_key(key).as_str()).map_err(from_redb_error)?;
		}
		tx.commit().map_err(from_redb_error)?;
		Ok(())
	}

	fn keys(&self, prefix: &str) -> PlResult<Vec<String>> {
		let start = self.full_key(prefix);
		let tx = self.db.begin_read().map_err(from_redb_error)?;
		let table = tx.open_table(TABLE_KV).map_err(from_redb_error)?;

		let mut keys = Vec::new();
		for entry in table.range(start.as_str()..).map_err(from_redb_error)? {
			let (key, _) = entry.map_err(from_redb_error)?;
			let key = key.value();
			if !key.starts_with(&start) {
				break;
			}
			keys.push(key[self.namespace.len()..].to_string());
		}
		Ok(keys)
	}
}


// vim: ts=4

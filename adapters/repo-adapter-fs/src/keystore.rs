//! Key store keeping one JSON file per key

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::not_found;
use peerlink_types::prelude::*;
use peerlink_types::repo_adapter::{KeyInfo, KeyStore};

#[derive(Debug)]
pub struct FsKeyStore {
	dir: Box<Path>,
}

impl FsKeyStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into().into_boxed_path() }
	}

	fn key_path(&self, name: &str) -> PlResult<PathBuf> {
		if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
			return Err(Error::Parse(format!("invalid key name: {:?}", name)));
		}
		Ok(self.dir.join(name))
	}
}

impl KeyStore for FsKeyStore {
	fn list(&self) -> PlResult<Vec<String>> {
		let mut names = Vec::new();
		for entry in fs::read_dir(&self.dir)? {
			let entry = entry?;
			if let Some(name) = entry.file_name().to_str()
				&& !name.starts_with('.')
			{
				names.push(name.to_string());
			}
		}
		names.sort();
		Ok(names)
	}

	fn get(&self, name: &str) -> PlResult<KeyInfo> {
		let data = fs::read(self.key_path(name)?).map_err(not_found)?;
		Ok(serde_json::from_slice(&data)?)
	}

	fn put(&self, name: &str, info: KeyInfo) -> PlResult<()> {
		let path = self.key_path(name)?;
		let mut file = match open_private(&path) {
			Ok(file) => file,
			Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
				return Err(Error::ConfigError(format!("key {} already exists", name)));
			}
			Err(err) => return Err(err.into()),
		};
		file.write_all(&serde_json::to_vec(&info)?)?;
		file.sync_all()?;
		debug!(name, key_type = %info.key_type, "key stored");
		Ok(())
	}

	fn delete(&self, name: &str) -> PlResult<()> {
		fs::remove_file(self.key_path(name)?).map_err(not_found)
	}
}

/// Create a file only the owner can read
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
	use std::os::unix::fs::OpenOptionsExt;
	fs::OpenOptions::new().write(true).create_new(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
	fs::OpenOptions::new().write(true).create_new(true).open(path)
}


// vim: ts=4

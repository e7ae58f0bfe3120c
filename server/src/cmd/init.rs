use std::path::Path;

use crate::prelude::*;
use peerlink_node::modules::repo::METADATA_NAMESPACE;
use peerlink_repo_adapter_fs::FsRepo;
use peerlink_types::repo_adapter::Repo;
use peerlink_types::types::NodeType;

/// Metadata key holding the name given at init
pub const NODE_NAME_KEY: &str = "/node-name";

/// Create a full-node repo at `path` and record `name` in its metadata. An
/// existing repo is kept and only gets the new name.
pub fn init(path: &Path, name: &str) -> PlResult<()> {
	let repo = FsRepo::new(path);
	info!(path = %path.display(), "initializing repo");
	match repo.init(NodeType::FullNode) {
		Ok(()) => {}
		Err(Error::RepoExists) => info!(path = %path.display(), "repo already initialized"),
		Err(err) => return Err(err),
	}

	let locked = repo.lock(NodeType::FullNode)?;
	let res = locked.datastore(METADATA_NAMESPACE).and_then(|ds| ds.put(NODE_NAME_KEY, name.as_bytes()));
	locked.close()?;
	res?;

	println!("initialized {} repo at {}", NodeType::FullNode, path.display());
	Ok(())
}

// vim: ts=4

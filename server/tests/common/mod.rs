//! Shared setup for the daemon tests

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use tempfile::TempDir;

use peerlink::cmd;
use peerlink_repo_adapter_fs::CONFIG_FILE;
use peerlink_types::config::FullNodeConfig;

pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.try_init();
}

/// Initialize a repo in a fresh temporary directory, listening on loopback
/// only. The TempDir removes the repo when dropped.
pub fn init_repo(name: &str) -> (TempDir, PathBuf) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let path = temp_dir.path().join("node");
	cmd::init::init(&path, name).expect("Failed to init repo");

	let mut cfg = FullNodeConfig::default();
	cfg.network.listen_addresses = vec!["127.0.0.1:0".into()];
	std::fs::write(path.join(CONFIG_FILE), cfg.to_toml().expect("config toml"))
		.expect("Failed to write config");
	(temp_dir, path)
}

/// A loopback address nothing is listening on right now
pub fn free_addr() -> SocketAddr {
	let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
	listener.local_addr().expect("local addr")
}

// vim: ts=4

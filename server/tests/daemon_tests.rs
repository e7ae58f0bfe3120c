//! The daemon started from an initialized repo and driven over JSON-RPC

#![allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]

mod common;

use clap::Parser;
use serde_json::json;
use std::time::Duration;

use peerlink::cli::{Cli, RunArgs};
use peerlink::client::{ApiInfo, RpcClient};
use peerlink::cmd::init::NODE_NAME_KEY;
use peerlink::cmd::run;
use peerlink_node::modules::repo::METADATA_NAMESPACE;
use peerlink_repo_adapter_fs::FsRepo;
use peerlink_types::error::Error;
use peerlink_types::permission::Permission;
use peerlink_types::repo_adapter::Repo;
use peerlink_types::types::{API_VERSION, AddrInfo, NodeType, PeerId, VersionInfo};

fn run_args() -> RunArgs {
	RunArgs { api: Some(common::free_addr()), lite: false, no_bootstrap: true, api_max_req_size: None }
}

fn cli(path: &std::path::Path, args: &[&str]) -> Cli {
	let mut argv = vec!["peerlink", "--repo", path.to_str().unwrap()];
	argv.extend_from_slice(args);
	Cli::try_parse_from(argv).unwrap()
}

#[test]
fn test_init_records_the_node_name() {
	let (_dir, path) = common::init_repo("alpha");
	let repo = FsRepo::new(&path);
	let name = |repo: &FsRepo| {
		let locked = repo.lock(NodeType::FullNode).unwrap();
		let value = locked.datastore(METADATA_NAMESPACE).unwrap().get(NODE_NAME_KEY).unwrap();
		locked.close().unwrap();
		value
	};
	assert_eq!(name(&repo).as_deref(), Some(&b"alpha"[..]));
	let config = std::fs::read_to_string(path.join("config.toml")).unwrap();

	// running init again keeps the repo and its config
	peerlink::cmd::init::init(&path, "beta").unwrap();
	assert_eq!(name(&repo).as_deref(), Some(&b"beta"[..]));
	assert_eq!(std::fs::read_to_string(path.join("config.toml")).unwrap(), config);
}

#[test]
fn test_init_of_a_locked_repo_fails() {
	let (_dir, path) = common::init_repo("alpha");
	let locked = FsRepo::new(&path).lock(NodeType::FullNode).unwrap();
	assert!(matches!(peerlink::cmd::init::init(&path, "beta"), Err(Error::RepoLocked)));
	locked.close().unwrap();
}

#[tokio::test]
async fn test_daemon_serves_the_node_api() {
	common::setup_test_logging();
	let (_dir, path) = common::init_repo("alpha");
	let args = run_args();

	let daemon = run::start(&path, &args).await.unwrap();
	let addr = daemon.api_addr();
	assert_eq!(Some(addr), args.api);
	let wait = tokio::spawn(daemon.wait());

	// the repo holds the endpoint and an admin token
	let admin = RpcClient::connect(&cli(&path, &["net", "id"])).unwrap();
	let version: VersionInfo = admin.call("Version", Vec::new()).await.unwrap();
	assert_eq!(version.api_version, API_VERSION);
	let id: PeerId = admin.call("ID", Vec::new()).await.unwrap();
	assert!(id.as_str().starts_with("pl"));

	let token: String = admin.call("AuthNew", vec![json!(["read"])]).await.unwrap();
	let perms: Vec<Permission> = admin.call("AuthVerify", vec![json!(token)]).await.unwrap();
	assert_eq!(perms, vec![Permission::Read]);

	// a read token may look but not dial
	let reader = RpcClient::new(ApiInfo { addr, token: Some(token) });
	let peers: Vec<AddrInfo> = reader.call("NetPeers", Vec::new()).await.unwrap();
	assert!(peers.is_empty());
	let target = json!(AddrInfo::parse("plX@127.0.0.1:9").unwrap());
	assert!(matches!(reader.call::<()>("NetConnect", vec![target]).await, Err(Error::Unauthorized)));

	// no token at all reads too, but cannot stop the node
	let anon = RpcClient::new(ApiInfo { addr, token: None });
	let _: VersionInfo = anon.call("Version", Vec::new()).await.unwrap();
	assert!(matches!(anon.call::<()>("Shutdown", Vec::new()).await, Err(Error::Unauthorized)));

	// a bad token is refused outright
	let forged = RpcClient::new(ApiInfo { addr, token: Some("forged".into()) });
	assert!(matches!(forged.call::<VersionInfo>("Version", Vec::new()).await, Err(Error::Unauthorized)));

	peerlink::execute(cli(&path, &["stop"])).await.unwrap();
	tokio::time::timeout(Duration::from_secs(10), wait).await.unwrap().unwrap().unwrap();

	// the node released the repo and took its endpoint with it
	let repo = FsRepo::new(&path);
	assert!(matches!(repo.api_endpoint(), Err(Error::NotFound)));
	repo.lock(NodeType::FullNode).unwrap().close().unwrap();
}

#[tokio::test]
async fn test_second_daemon_on_the_same_repo_is_refused() {
	let (_dir, path) = common::init_repo("alpha");

	let daemon = run::start(&path, &run_args()).await.unwrap();
	assert!(matches!(run::start(&path, &run_args()).await, Err(Error::RepoLocked)));

	daemon.trigger().trigger();
	daemon.wait().await.unwrap();
	let again = run::start(&path, &run_args()).await.unwrap();
	again.trigger().trigger();
	again.wait().await.unwrap();
}

#[tokio::test]
async fn test_pending_closing_call_answers_on_shutdown() {
	let (_dir, path) = common::init_repo("alpha");
	let daemon = run::start(&path, &run_args()).await.unwrap();
	let client = RpcClient::new(ApiInfo { addr: daemon.api_addr(), token: None });
	let closing = tokio::spawn(async move { client.call::<()>("Closing", Vec::new()).await });

	tokio::time::sleep(Duration::from_millis(200)).await;
	assert!(!closing.is_finished());
	daemon.trigger().trigger();

	// well inside the server's drain grace period
	tokio::time::timeout(Duration::from_secs(3), daemon.wait()).await.unwrap().unwrap();
	closing.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_client_needs_a_running_node() {
	let (_dir, path) = common::init_repo("alpha");
	let res = peerlink::execute(cli(&path, &["net", "peers"])).await;
	assert!(matches!(res, Err(Error::Network(_))));
}

#[tokio::test]
async fn test_uninitialized_repo_does_not_start() {
	let dir = tempfile::TempDir::new().unwrap();
	let res = run::start(&dir.path().join("missing"), &run_args()).await;
	assert!(matches!(res, Err(Error::RepoNotInitialized)));
}

// vim: ts=4

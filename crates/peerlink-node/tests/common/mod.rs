//! Shared fixtures: in-memory repo and a recording networking provider

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use peerlink_types::config::FullNodeConfig;
use peerlink_types::error::{Error, PlResult};
use peerlink_types::net_adapter::{AddrsFilter, ConnLimits, NetAdapter};
use peerlink_types::repo_adapter::{KeyStore, KvStore, LockedRepo, MemKeyStore, MemKvStore, Repo};
use peerlink_types::types::{
	AddrInfo, BandwidthByKey, BandwidthStats, Connectedness, ExtendedPeerInfo, NatInfo,
	NetBlockList, NodeType, PeerId, Reachability,
};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
	Arc::new(Mutex::new(Vec::new()))
}

pub fn logged(log: &Log, prefix: &str) -> Vec<String> {
	log.lock().iter().filter(|e| e.starts_with(prefix)).cloned().collect()
}

#[derive(Debug, Default)]
pub struct RepoState {
	pub config: Mutex<FullNodeConfig>,
	pub locked: AtomicBool,
	pub closes: AtomicUsize,
	pub keys: Arc<MemKeyStore>,
	pub stores: Mutex<HashMap<String, Arc<MemKvStore>>>,
	pub endpoint: Mutex<Option<String>>,
	pub token: Mutex<Option<String>>,
}

#[derive(Debug, Default)]
pub struct MemRepo {
	pub state: Arc<RepoState>,
}

impl MemRepo {
	pub fn with_config(config: FullNodeConfig) -> Arc<Self> {
		let repo = Self::default();
		*repo.state.config.lock() = config;
		Arc::new(repo)
	}
}

impl Repo for MemRepo {
	fn exists(&self) -> PlResult<bool> {
		Ok(true)
	}

	fn init(&self, _node_type: NodeType) -> PlResult<()> {
		Err(Error::RepoExists)
	}

	fn lock(&self, node_type: NodeType) -> PlResult<Arc<dyn LockedRepo>> {
		if self.state.locked.swap(true, Ordering::SeqCst) {
			return Err(Error::RepoLocked);
		}
		Ok(Arc::new(MemLockedRepo {
			state: Arc::clone(&self.state),
			node_type,
			closed: AtomicBool::new(false),
		}))
	}

	fn api_endpoint(&self) -> PlResult<String> {
		self.state.endpoint.lock().clone().ok_or(Error::NotFound)
	}

	fn api_token(&self) -> PlResult<String> {
		self.state.token.lock().clone().ok_or(Error::NotFound)
	}
}

#[derive(Debug)]
pub struct MemLockedRepo {
	state: Arc<RepoState>,
	node_type: NodeType,
	closed: AtomicBool,
}

impl LockedRepo for MemLockedRepo {
	fn node_type(&self) -> NodeType {
		self.node_type
	}

	fn config(&self) -> PlResult<FullNodeConfig> {
		Ok(self.state.config.lock().clone())
	}

	fn datastore(&self, namespace: &str) -> PlResult<Arc<dyn KvStore>> {
		let mut stores = self.state.stores.lock();
		let store = stores.entry(namespace.to_string()).or_insert_with(|| Arc::new(MemKvStore::new()));
		Ok(Arc::clone(store) as Arc<dyn KvStore>)
	}

	fn key_store(&self) -> PlResult<Arc<dyn KeyStore>> {
		Ok(Arc::clone(&self.state.keys) as Arc<dyn KeyStore>)
	}

	fn set_api_endpoint(&self, endpoint: &str) -> PlResult<()> {
		*self.state.endpoint.lock() = Some(endpoint.to_string());
		Ok(())
	}

	fn set_api_token(&self, token: &str) -> PlResult<()> {
		*self.state.token.lock() = Some(token.to_string());
		Ok(())
	}

	fn close(&self) -> PlResult<()> {
		if self.closed.swap(true, Ordering::SeqCst) {
			return Err(Error::Internal("repo closed twice".into()));
		}
		self.state.closes.fetch_add(1, Ordering::SeqCst);
		self.state.locked.store(false, Ordering::SeqCst);
		Ok(())
	}
}

impl Drop for MemLockedRepo {
	fn drop(&mut self) {
		if !self.closed.load(Ordering::SeqCst) {
			self.state.locked.store(false, Ordering::SeqCst);
		}
	}
}

/// Networking provider that records what the node asks of it
#[derive(Debug)]
pub struct FakeNet {
	pub id: PeerId,
	pub log: Log,
	pub fail_listen: bool,
	listening: Mutex<Vec<Box<str>>>,
	blocked: Mutex<NetBlockList>,
	connected: Mutex<Vec<AddrInfo>>,
}

impl FakeNet {
	pub fn new(id: PeerId, log: &Log) -> Self {
		Self {
			id,
			log: Arc::clone(log),
			fail_listen: false,
			listening: Mutex::new(Vec::new()),
			blocked: Mutex::new(NetBlockList::default()),
			connected: Mutex::new(Vec::new()),
		}
	}

	fn record(&self, event: String) {
		self.log.lock().push(event);
	}
}

#[async_trait]
impl NetAdapter for FakeNet {
	fn local_peer(&self) -> PeerId {
		self.id.clone()
	}

	fn listen_addrs(&self) -> Vec<Box<str>> {
		self.listening.lock().clone()
	}

	async fn start_listening(
		&self,
		addrs: &[Box<str>],
		cancel: CancellationToken,
	) -> PlResult<JoinHandle<()>> {
		if self.fail_listen {
			return Err(Error::Network("address in use".into()));
		}
		self.record(format!("listen {}", addrs.join(",")));
		*self.listening.lock() = addrs.to_vec();
		let log = Arc::clone(&self.log);
		Ok(tokio::spawn(async move {
			cancel.cancelled().await;
			log.lock().push("listener stopped".into());
		}))
	}

	async fn connect(&self, peer: &AddrInfo) -> PlResult<()> {
		self.record(format!("connect {}", peer.addrs.join(",")));
		self.connected.lock().push(peer.clone());
		Ok(())
	}

	async fn disconnect(&self, peer: &PeerId) -> PlResult<()> {
		self.record(format!("disconnect {}", peer));
		self.connected.lock().retain(|p| &p.id != peer);
		Ok(())
	}

	fn peers(&self) -> Vec<AddrInfo> {
		self.connected.lock().clone()
	}

	fn connectedness(&self, peer: &PeerId) -> Connectedness {
		if self.connected.lock().iter().any(|p| &p.id == peer) {
			Connectedness::Connected
		} else {
			Connectedness::NotConnected
		}
	}

	fn find_peer(&self, peer: &PeerId) -> Option<AddrInfo> {
		self.connected.lock().iter().find(|p| &p.id == peer).cloned()
	}

	fn peer_info(&self, _peer: &PeerId) -> Option<ExtendedPeerInfo> {
		None
	}

	fn set_conn_limits(&self, limits: ConnLimits) {
		self.record(format!("limits {}-{}", limits.low, limits.high));
	}

	fn protect(&self, peer: &PeerId) {
		self.record(format!("protect {}", peer));
	}

	fn set_addrs_filter(&self, filter: AddrsFilter) {
		self.record(format!("announce {}", filter.apply(&self.listen_addrs()).join(",")));
	}

	fn nat_status(&self) -> NatInfo {
		NatInfo { reachability: Reachability::Unknown, public_addr: None }
	}

	fn bandwidth_stats(&self) -> BandwidthStats {
		BandwidthStats::default()
	}

	fn bandwidth_by_peer(&self) -> BandwidthByKey {
		BandwidthByKey::new()
	}

	fn bandwidth_by_protocol(&self) -> BandwidthByKey {
		BandwidthByKey::new()
	}

	fn block(&self, list: &NetBlockList) {
		let mut blocked = self.blocked.lock();
		blocked.peers.extend(list.peers.iter().cloned());
		blocked.ip_addrs.extend(list.ip_addrs.iter().cloned());
		blocked.ip_subnets.extend(list.ip_subnets.iter().cloned());
	}

	fn unblock(&self, list: &NetBlockList) {
		let mut blocked = self.blocked.lock();
		blocked.peers.retain(|p| !list.peers.contains(p));
		blocked.ip_addrs.retain(|a| !list.ip_addrs.contains(a));
		blocked.ip_subnets.retain(|s| !list.ip_subnets.contains(s));
	}

	fn block_list(&self) -> NetBlockList {
		self.blocked.lock().clone()
	}
}

/// Configuration with small limits, one bootstrap peer and one protected peer
pub fn test_config() -> FullNodeConfig {
	let mut cfg = FullNodeConfig::default();
	cfg.network.listen_addresses = vec!["127.0.0.1:4567".into()];
	cfg.network.no_announce_addresses = vec!["127.0.0.1:4567".into()];
	cfg.network.announce_addresses = vec!["203.0.113.7:4567".into(), "127.0.0.1:4567".into()];
	cfg.network.bootstrap_peers = vec!["plboot@192.0.2.1:4567".into()];
	cfg.network.protected_peers = vec!["plfriend".into()];
	cfg.network.conn_mgr_low = 10;
	cfg.network.conn_mgr_high = 20;
	cfg
}

// vim: ts=4

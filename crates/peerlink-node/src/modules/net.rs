//! Networking modules: connection gater, net API and bootstrap peer manager.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use peerlink_api::Net;
use peerlink_types::net_adapter::NetAdapter;
use peerlink_types::prelude::*;
use peerlink_types::repo_adapter::KvStore;
use peerlink_types::types::{
	AddrInfo, BandwidthByKey, BandwidthStats, Connectedness, ExtendedPeerInfo, NatInfo,
	NetBlockList, PubsubScore,
};

/// Datastore key of the persisted block list
pub const BLOCK_LIST_KEY: &str = "/conngater/blocklist";

/// Bootstrap peers the peer manager keeps us connected to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapPeers(pub Vec<AddrInfo>);

/// Keeps the provider's block list and the persisted copy in step
#[derive(Debug)]
pub struct ConnGater {
	net: Arc<dyn NetAdapter>,
	ds: Arc<dyn KvStore>,
	lock: Mutex<()>,
}

impl ConnGater {
	pub fn new(net: Arc<dyn NetAdapter>, ds: Arc<dyn KvStore>) -> Self {
		Self { net, ds, lock: Mutex::new(()) }
	}

	fn stored(&self) -> PlResult<NetBlockList> {
		match self.ds.get(BLOCK_LIST_KEY)? {
			Some(data) => Ok(serde_json::from_slice(&data)?),
			None => Ok(NetBlockList::default()),
		}
	}

	fn store(&self, list: &NetBlockList) -> PlResult<()> {
		self.ds.put(BLOCK_LIST_KEY, &serde_json::to_vec(list)?)
	}

	/// Re-apply the persisted block list to the provider
	pub fn restore(&self) -> PlResult<()> {
		let list = self.stored()?;
		if !list.is_empty() {
			info!(
				peers = list.peers.len(),
				addrs = list.ip_addrs.len(),
				subnets = list.ip_subnets.len(),
				"restoring block list"
			);
			self.net.block(&list);
		}
		Ok(())
	}

	pub fn block(&self, add: &NetBlockList) -> PlResult<()> {
		let _guard = self.lock.lock();
		let mut list = self.stored()?;
		extend_unique(&mut list.peers, &add.peers);
		extend_unique(&mut list.ip_addrs, &add.ip_addrs);
		extend_unique(&mut list.ip_subnets, &add.ip_subnets);
		self.store(&list)?;
		self.net.block(add);
		Ok(())
	}

	pub fn unblock(&self, remove: &NetBlockList) -> PlResult<()> {
		let _guard = self.lock.lock();
		let mut list = self.stored()?;
		list.peers.retain(|p| !remove.peers.contains(p));
		list.ip_addrs.retain(|a| !remove.ip_addrs.contains(a));
		list.ip_subnets.retain(|s| !remove.ip_subnets.contains(s));
		self.store(&list)?;
		self.net.unblock(remove);
		Ok(())
	}

	pub fn list(&self) -> NetBlockList {
		self.net.block_list()
	}
}

fn extend_unique<T: PartialEq + Clone>(into: &mut Vec<T>, from: &[T]) {
	for item in from {
		if !into.contains(item) {
			into.push(item.clone());
		}
	}
}

/// Net methods over the networking provider
#[derive(Debug)]
pub struct NetApi {
	net: Arc<dyn NetAdapter>,
	gater: Arc<ConnGater>,
	peer_id: PeerId,
}

impl NetApi {
	pub fn new(net: Arc<dyn NetAdapter>, gater: Arc<ConnGater>, peer_id: PeerId) -> Self {
		Self { net, gater, peer_id }
	}
}

#[async_trait]
impl Net for NetApi {
	async fn id(&self, _ctx: CallCtx) -> PlResult<PeerId> {
		Ok(self.peer_id.clone())
	}

	async fn net_addrs_listen(&self, _ctx: CallCtx) -> PlResult<AddrInfo> {
		Ok(AddrInfo { id: self.peer_id.clone(), addrs: self.net.listen_addrs() })
	}

	async fn net_agent_version(&self, _ctx: CallCtx, peer: PeerId) -> PlResult<String> {
		self.net.peer_info(&peer).map(|info| info.agent.into()).ok_or(Error::NotFound)
	}

	async fn net_auto_nat_status(&self, _ctx: CallCtx) -> PlResult<NatInfo> {
		Ok(self.net.nat_status())
	}

	async fn net_bandwidth_stats(&self, _ctx: CallCtx) -> PlResult<BandwidthStats> {
		Ok(self.net.bandwidth_stats())
	}

	async fn net_bandwidth_stats_by_peer(&self, _ctx: CallCtx) -> PlResult<BandwidthByKey> {
		Ok(self.net.bandwidth_by_peer())
	}

	async fn net_bandwidth_stats_by_protocol(&self, _ctx: CallCtx) -> PlResult<BandwidthByKey> {
		Ok(self.net.bandwidth_by_protocol())
	}

	async fn net_block_add(&self, _ctx: CallCtx, list: NetBlockList) -> PlResult<()> {
		self.gater.block(&list)
	}

	async fn net_block_list(&self, _ctx: CallCtx) -> PlResult<NetBlockList> {
		Ok(self.gater.list())
	}

	async fn net_block_remove(&self, _ctx: CallCtx, list: NetBlockList) -> PlResult<()> {
		self.gater.unblock(&list)
	}

	async fn net_connect(&self, ctx: CallCtx, info: AddrInfo) -> PlResult<()> {
		tokio::select! {
			res = self.net.connect(&info) => res,
			() = ctx.cancelled() => Err(Error::Cancelled),
		}
	}

	async fn net_connectedness(&self, _ctx: CallCtx, peer: PeerId) -> PlResult<Connectedness> {
		Ok(self.net.connectedness(&peer))
	}

	async fn net_disconnect(&self, _ctx: CallCtx, peer: PeerId) -> PlResult<()> {
		self.net.disconnect(&peer).await
	}

	async fn net_find_peer(&self, _ctx: CallCtx, peer: PeerId) -> PlResult<AddrInfo> {
		self.net.find_peer(&peer).ok_or(Error::NotFound)
	}

	async fn net_peer_info(&self, _ctx: CallCtx, peer: PeerId) -> PlResult<ExtendedPeerInfo> {
		self.net.peer_info(&peer).ok_or(Error::NotFound)
	}

	async fn net_peers(&self, _ctx: CallCtx) -> PlResult<Vec<AddrInfo>> {
		Ok(self.net.peers())
	}

	async fn net_pubsub_scores(&self, _ctx: CallCtx) -> PlResult<Vec<PubsubScore>> {
		Ok(self.net.pubsub_scores())
	}
}

/// Dials the bootstrap peers whenever the node has fewer connections than it
/// wants
#[derive(Debug)]
pub struct PeerMgr {
	net: Arc<dyn NetAdapter>,
	bootstrap: Vec<AddrInfo>,
	min_peers: usize,
	interval: Duration,
}

impl PeerMgr {
	pub const DEFAULT_MIN_PEERS: usize = 4;
	pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

	pub fn new(net: Arc<dyn NetAdapter>, bootstrap: BootstrapPeers) -> Self {
		Self {
			net,
			bootstrap: bootstrap.0,
			min_peers: Self::DEFAULT_MIN_PEERS,
			interval: Self::DEFAULT_INTERVAL,
		}
	}

	pub fn with_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	/// One round: dial every bootstrap peer we are not connected to, if we are
	/// below the wanted peer count. Returns the number of successful dials.
	pub async fn reconcile(&self) -> usize {
		if self.net.peers().len() >= self.min_peers {
			return 0;
		}
		let mut dialed = 0;
		for peer in &self.bootstrap {
			if !peer.id.as_str().is_empty()
				&& self.net.connectedness(&peer.id) == Connectedness::Connected
			{
				continue;
			}
			match self.net.connect(peer).await {
				Ok(()) => dialed += 1,
				Err(err) => debug!(peer = %peer.id, %err, "bootstrap dial failed"),
			}
		}
		dialed
	}

	pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
		tokio::spawn(async move {
			info!(peers = self.bootstrap.len(), "peer manager running");
			loop {
				let dialed = self.reconcile().await;
				if dialed > 0 {
					debug!(dialed, "connected to bootstrap peers");
				}
				tokio::select! {
					() = cancel.cancelled() => break,
					() = tokio::time::sleep(self.interval) => {}
				}
			}
			debug!("peer manager stopped");
		})
	}
}

// vim: ts=4

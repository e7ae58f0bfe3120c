//! Networking provider adapter trait.
//!
//! The node treats peer-to-peer transport as an opaque provider: it asks the
//! adapter to listen, to dial and drop peers, and for bookkeeping the API
//! exposes (peer table, bandwidth, block list).

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::PlResult;
use crate::types::{
	AddrInfo, BandwidthByKey, BandwidthStats, Connectedness, ExtendedPeerInfo, NatInfo,
	NetBlockList, PeerId, PubsubScore,
};

/// Connection manager watermarks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnLimits {
	pub low: u32,
	pub high: u32,
	pub grace: Duration,
}

impl Default for ConnLimits {
	fn default() -> Self {
		Self { low: 150, high: 180, grace: Duration::from_secs(20) }
	}
}

/// Which addresses are announced to other peers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddrsFilter {
	/// Announced instead of the listen addresses when non-empty
	pub announce: Vec<Box<str>>,
	/// Never announced
	pub no_announce: Vec<Box<str>>,
}

impl AddrsFilter {
	pub fn apply(&self, listen: &[Box<str>]) -> Vec<Box<str>> {
		let base = if self.announce.is_empty() { listen } else { &self.announce[..] };
		base.iter().filter(|addr| !self.no_announce.contains(addr)).cloned().collect()
	}
}

#[async_trait]
pub trait NetAdapter: Debug + Send + Sync {
	fn local_peer(&self) -> PeerId;

	/// Addresses currently bound, empty before `start_listening`
	fn listen_addrs(&self) -> Vec<Box<str>>;

	/// Bind the given addresses and accept peers until `cancel` fires.
	/// The returned task finishes once every listener is closed.
	async fn start_listening(
		&self,
		addrs: &[Box<str>],
		cancel: CancellationToken,
	) -> PlResult<JoinHandle<()>>;

	async fn connect(&self, peer: &AddrInfo) -> PlResult<()>;

	async fn disconnect(&self, peer: &PeerId) -> PlResult<()>;

	/// Connected peers
	fn peers(&self) -> Vec<AddrInfo>;

	fn connectedness(&self, peer: &PeerId) -> Connectedness;

	/// Peer we know about, connected or not
	fn find_peer(&self, peer: &PeerId) -> Option<AddrInfo>;

	fn peer_info(&self, peer: &PeerId) -> Option<ExtendedPeerInfo>;

	fn set_conn_limits(&self, limits: ConnLimits);

	/// Exempt a peer from connection trimming
	fn protect(&self, peer: &PeerId);

	/// Replace the filter deciding which addresses are announced
	fn set_addrs_filter(&self, filter: AddrsFilter);

	fn nat_status(&self) -> NatInfo;

	fn bandwidth_stats(&self) -> BandwidthStats;

	fn bandwidth_by_peer(&self) -> BandwidthByKey;

	fn bandwidth_by_protocol(&self) -> BandwidthByKey;

	fn block(&self, list: &NetBlockList);

	fn unblock(&self, list: &NetBlockList);

	fn block_list(&self) -> NetBlockList;

	fn pubsub_scores(&self) -> Vec<PubsubScore> {
		Vec::new()
	}
}


// vim: ts=4

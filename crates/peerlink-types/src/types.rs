//! Wire types shared between the node, its adapters and API clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Build version reported by the `Version` API call
pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// API version, bumped on incompatible changes of the RPC surface
pub const API_VERSION: u32 = 0;

/// Peer identifier, derived from the host public key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub Box<str>);

impl PeerId {
	pub fn new(id: impl Into<Box<str>>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PeerId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Node flavour, used to pick a repo layout and a configuration type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
	#[default]
	Unset,
	FullNode,
}

impl fmt::Display for NodeType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			NodeType::Unset => f.write_str("unset"),
			NodeType::FullNode => f.write_str("full-node"),
		}
	}
}

/// Network this build talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkName {
	#[default]
	Devnet,
	Mainnet,
}

impl NetworkName {
	pub fn as_str(self) -> &'static str {
		match self {
			NetworkName::Devnet => "devnet",
			NetworkName::Mainnet => "mainnet",
		}
	}
}

/// A peer and the addresses it can be reached at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddrInfo {
	pub id: PeerId,
	pub addrs: Vec<Box<str>>,
}

impl AddrInfo {
	/// Parse `<peer-id>@<host:port>` as used for bootstrap peers.
	/// A bare `host:port` yields an empty peer id.
	pub fn parse(s: &str) -> crate::error::PlResult<Self> {
		let (id, addr) = match s.split_once('@') {
			Some((id, addr)) => (id, addr),
			None => ("", s),
		};
		if addr.parse::<std::net::SocketAddr>().is_err() && !addr.contains(':') {
			return Err(crate::error::Error::Parse(format!("invalid peer address: {}", s)));
		}
		Ok(Self { id: PeerId::new(id), addrs: vec![addr.into()] })
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Connectedness {
	NotConnected,
	Connected,
	CanConnect,
	CannotConnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reachability {
	Unknown,
	Public,
	Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatInfo {
	pub reachability: Reachability,
	pub public_addr: Option<Box<str>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthStats {
	pub total_in: u64,
	pub total_out: u64,
	pub rate_in: f64,
	pub rate_out: f64,
}

pub type BandwidthByKey = HashMap<String, BandwidthStats>;

/// Peers, addresses and subnets the connection gater refuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetBlockList {
	#[serde(default)]
	pub peers: Vec<PeerId>,
	#[serde(default)]
	pub ip_addrs: Vec<Box<str>>,
	#[serde(default)]
	pub ip_subnets: Vec<Box<str>>,
}

impl NetBlockList {
	pub fn is_empty(&self) -> bool {
		self.peers.is_empty() && self.ip_addrs.is_empty() && self.ip_subnets.is_empty()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnMgrInfo {
	pub first_seen: DateTime<Utc>,
	pub value: i64,
	pub tags: HashMap<String, i64>,
	pub conns: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedPeerInfo {
	pub id: PeerId,
	pub agent: Box<str>,
	pub addrs: Vec<Box<str>>,
	pub protocols: Vec<Box<str>>,
	pub conn_mgr_meta: Option<ConnMgrInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubScore {
	pub id: PeerId,
	pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
	pub version: Box<str>,
	pub api_version: u32,
	pub network: NetworkName,
}


// vim: ts=4

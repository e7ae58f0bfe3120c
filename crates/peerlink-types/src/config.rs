//! Node configuration, stored as `config.toml` inside the repo.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::{Error, PlResult};
use crate::types::AddrInfo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
	/// Address the JSON-RPC server binds to
	pub listen_address: String,
	/// Address advertised to remote API clients, if different
	pub remote_listen_address: String,
	/// Request timeout in seconds
	pub timeout_secs: u64,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			listen_address: "127.0.0.1:3456".into(),
			remote_listen_address: String::new(),
			timeout_secs: 30,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
	pub listen_addresses: Vec<String>,
	/// Addresses to announce instead of the listen addresses
	pub announce_addresses: Vec<String>,
	/// Listen addresses that must never be announced
	pub no_announce_addresses: Vec<String>,
	/// `<peer-id>@<host:port>` entries the peer manager keeps connected
	pub bootstrap_peers: Vec<String>,
	/// Peers the connection manager never trims
	pub protected_peers: Vec<String>,
	pub conn_mgr_low: u32,
	pub conn_mgr_high: u32,
	pub conn_mgr_grace_secs: u64,
}

impl Default for NetworkConfig {
	fn default() -> Self {
		Self {
			listen_addresses: vec!["0.0.0.0:4567".into()],
			announce_addresses: Vec::new(),
			no_announce_addresses: Vec::new(),
			bootstrap_peers: Vec::new(),
			protected_peers: Vec::new(),
			conn_mgr_low: 150,
			conn_mgr_high: 180,
			conn_mgr_grace_secs: 20,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FullNodeConfig {
	pub api: ApiConfig,
	pub network: NetworkConfig,
}

impl FullNodeConfig {
	pub fn from_toml(s: &str) -> PlResult<Self> {
		Ok(toml::from_str(s)?)
	}

	pub fn to_toml(&self) -> PlResult<String> {
		Ok(toml::to_string_pretty(self)?)
	}

	/// Check values that serde cannot
	pub fn validate(&self) -> PlResult<()> {
		self.api.listen_address.parse::<SocketAddr>().map_err(|e| {
			Error::ConfigError(format!(
				"api.listen_address {:?}: {}",
				self.api.listen_address, e
			))
		})?;

		let net = &self.network;
		if net.conn_mgr_low > net.conn_mgr_high {
			return Err(Error::ConfigError(format!(
				"network.conn_mgr_low ({}) is above network.conn_mgr_high ({})",
				net.conn_mgr_low, net.conn_mgr_high
			)));
		}
		for addr in &net.listen_addresses {
			addr.parse::<SocketAddr>().map_err(|e| {
				Error::ConfigError(format!("network.listen_addresses {:?}: {}", addr, e))
			})?;
		}
		for peer in &net.bootstrap_peers {
			AddrInfo::parse(peer).map_err(|_| {
				Error::ConfigError(format!("network.bootstrap_peers: invalid entry {:?}", peer))
			})?;
		}
		Ok(())
	}
}


// vim: ts=4

//! Components the node stages register in the graph.

pub mod api_secret;
pub mod common;
pub mod keys;
pub mod net;
pub mod repo;

pub use api_secret::ApiAlg;
pub use common::CommonApi;
pub use keys::{PrivKey, PubKey};
pub use net::{BootstrapPeers, ConnGater, NetApi, PeerMgr};
pub use repo::ApiEndpoint;

// vim: ts=4

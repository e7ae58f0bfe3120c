//! Networking methods, backed by the node's networking provider.

use peerlink_types::types::{
	AddrInfo, BandwidthByKey, BandwidthStats, Connectedness, ExtendedPeerInfo, NatInfo,
	NetBlockList, PeerId, PubsubScore,
};

use crate::interface::capability_interface;

capability_interface! {
	/// Peer-to-peer networking operations
	pub interface Net {
		proxy: NetProxy,
		stub: NetStub,
		methods {
			/// Peer id of the networking host
			[Read] fn id = "ID" () -> PeerId;
			[Read] fn net_addrs_listen = "NetAddrsListen" () -> AddrInfo;
			[Read] fn net_agent_version = "NetAgentVersion" (peer: PeerId) -> String;
			[Read] fn net_auto_nat_status = "NetAutoNatStatus" () -> NatInfo;
			[Read] fn net_bandwidth_stats = "NetBandwidthStats" () -> BandwidthStats;
			[Read] fn net_bandwidth_stats_by_peer = "NetBandwidthStatsByPeer" () -> BandwidthByKey;
			[Read] fn net_bandwidth_stats_by_protocol = "NetBandwidthStatsByProtocol" () -> BandwidthByKey;
			/// Refuse connections from the listed peers, addresses and subnets
			[Admin] fn net_block_add = "NetBlockAdd" (list: NetBlockList) -> ();
			[Read] fn net_block_list = "NetBlockList" () -> NetBlockList;
			[Admin] fn net_block_remove = "NetBlockRemove" (list: NetBlockList) -> ();
			[Write] fn net_connect = "NetConnect" (info: AddrInfo) -> ();
			[Read] fn net_connectedness = "NetConnectedness" (peer: PeerId) -> Connectedness;
			[Write] fn net_disconnect = "NetDisconnect" (peer: PeerId) -> ();
			[Read] fn net_find_peer = "NetFindPeer" (peer: PeerId) -> AddrInfo;
			[Read] fn net_peer_info = "NetPeerInfo" (peer: PeerId) -> ExtendedPeerInfo;
			/// Currently connected peers
			[Read] fn net_peers = "NetPeers" () -> Vec<AddrInfo>;
			[Read] fn net_pubsub_scores = "NetPubsubScores" () -> Vec<PubsubScore>;
		}
	}
}

// vim: ts=4

//! Two or more adapters talking over loopback

#![allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use peerlink_net_adapter_tcp::TcpNetAdapter;
use peerlink_types::error::Error;
use peerlink_types::net_adapter::{AddrsFilter, ConnLimits, NetAdapter};
use peerlink_types::types::{AddrInfo, Connectedness, NetBlockList, NetworkName, PeerId, Reachability};

struct Node {
	net: TcpNetAdapter,
	cancel: CancellationToken,
	task: JoinHandle<()>,
}

async fn listening(id: &str, network: NetworkName) -> Node {
	let net = TcpNetAdapter::new(PeerId::new(id), network);
	let cancel = CancellationToken::new();
	let addrs: [Box<str>; 1] = ["127.0.0.1:0".into()];
	let task = net.start_listening(&addrs, cancel.clone()).await.expect("Failed to listen");
	Node { net, cancel, task }
}

fn addr_of(net: &TcpNetAdapter) -> AddrInfo {
	AddrInfo { id: net.local_peer(), addrs: net.listen_addrs() }
}

async fn eventually(what: &str, cond: impl Fn() -> bool) {
	for _ in 0..250 {
		if cond() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	panic!("timed out waiting for: {}", what);
}

#[tokio::test]
async fn test_peers_connect_both_ways() {
	let a = listening("plA", NetworkName::Devnet).await;
	let b = listening("plB", NetworkName::Devnet).await;
	let (a_id, b_id) = (a.net.local_peer(), b.net.local_peer());

	b.net.connect(&addr_of(&a.net)).await.unwrap();
	assert_eq!(b.net.connectedness(&a_id), Connectedness::Connected);
	eventually("inbound side", || a.net.connectedness(&b_id) == Connectedness::Connected).await;

	// the inbound side learns the addresses the dialer announced
	assert_eq!(a.net.find_peer(&b_id).unwrap().addrs, b.net.listen_addrs());
	let info = a.net.peer_info(&b_id).unwrap();
	assert!(info.agent.starts_with("peerlink/"));
	assert_eq!(info.protocols.len(), 1);

	// dialing a connected peer is a no-op
	b.net.connect(&addr_of(&a.net)).await.unwrap();
	assert_eq!(b.net.peers().len(), 1);
	assert!(b.net.bandwidth_stats().total_out > 0);
	assert!(b.net.bandwidth_by_peer().contains_key(a_id.as_str()));
}

#[tokio::test]
async fn test_other_network_is_refused() {
	let a = listening("plA", NetworkName::Devnet).await;
	let c = TcpNetAdapter::new(PeerId::new("plC"), NetworkName::Mainnet);

	assert!(matches!(c.connect(&addr_of(&a.net)).await, Err(Error::Network(_))));
	assert!(c.peers().is_empty());
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert!(a.net.peers().is_empty());
}

#[tokio::test]
async fn test_unexpected_peer_id_is_dropped() {
	let a = listening("plA", NetworkName::Devnet).await;
	let b = TcpNetAdapter::new(PeerId::new("plB"), NetworkName::Devnet);

	let wrong = AddrInfo { id: PeerId::new("plSomeoneElse"), addrs: a.net.listen_addrs() };
	assert!(b.connect(&wrong).await.is_err());
	assert!(b.peers().is_empty());
	eventually("inbound side drops", || a.net.peers().is_empty()).await;

	// an empty id accepts whoever answers
	let any = AddrInfo { id: PeerId::new(""), addrs: a.net.listen_addrs() };
	b.connect(&any).await.unwrap();
	assert_eq!(b.connectedness(&a.net.local_peer()), Connectedness::Connected);
}

#[tokio::test]
async fn test_disconnect_closes_both_sides() {
	let a = listening("plA", NetworkName::Devnet).await;
	let b = TcpNetAdapter::new(PeerId::new("plB"), NetworkName::Devnet);
	let a_id = a.net.local_peer();

	b.connect(&addr_of(&a.net)).await.unwrap();
	eventually("inbound side", || a.net.peers().len() == 1).await;

	b.disconnect(&a_id).await.unwrap();
	eventually("dialer side", || b.peers().is_empty()).await;
	eventually("inbound side", || a.net.peers().is_empty()).await;
	assert!(matches!(b.disconnect(&a_id).await, Err(Error::NotFound)));
	assert!(b.bandwidth_stats().total_in > 0);
}

#[tokio::test]
async fn test_block_list() {
	let a = listening("plA", NetworkName::Devnet).await;
	let b = TcpNetAdapter::new(PeerId::new("plB"), NetworkName::Devnet);
	let b_id = b.local_peer();

	b.connect(&addr_of(&a.net)).await.unwrap();
	eventually("inbound side", || a.net.peers().len() == 1).await;

	let by_peer = NetBlockList { peers: vec![b_id.clone()], ..Default::default() };
	a.net.block(&by_peer);
	assert_eq!(a.net.connectedness(&b_id), Connectedness::CannotConnect);
	eventually("blocked peer dropped", || a.net.peers().is_empty() && b.peers().is_empty()).await;
	a.net.unblock(&by_peer);

	let by_subnet = NetBlockList { ip_subnets: vec!["127.0.0.0/8".into()], ..Default::default() };
	a.net.block(&by_subnet);
	assert_eq!(a.net.block_list(), by_subnet);
	assert!(b.connect(&addr_of(&a.net)).await.is_err());

	a.net.unblock(&by_subnet);
	assert!(a.net.block_list().is_empty());
	b.connect(&addr_of(&a.net)).await.unwrap();
}

#[tokio::test]
async fn test_stop_listening_closes_connections() {
	let a = listening("plA", NetworkName::Devnet).await;
	let b = TcpNetAdapter::new(PeerId::new("plB"), NetworkName::Devnet);

	b.connect(&addr_of(&a.net)).await.unwrap();
	eventually("inbound side", || a.net.peers().len() == 1).await;

	a.cancel.cancel();
	tokio::time::timeout(Duration::from_secs(5), a.task).await.unwrap().unwrap();
	assert!(a.net.listen_addrs().is_empty());
	assert!(a.net.peers().is_empty());
	eventually("remote side notified", || b.peers().is_empty()).await;
	assert!(a.net.connect(&addr_of(&a.net)).await.is_err());
}

#[tokio::test]
async fn test_trim_keeps_protected_peers() {
	let a = listening("plA", NetworkName::Devnet).await;
	let b = TcpNetAdapter::new(PeerId::new("plB"), NetworkName::Devnet);
	let c = TcpNetAdapter::new(PeerId::new("plC"), NetworkName::Devnet);

	b.connect(&addr_of(&a.net)).await.unwrap();
	c.connect(&addr_of(&a.net)).await.unwrap();
	eventually("both connected", || a.net.peers().len() == 2).await;

	// b is the oldest connection, but protected
	a.net.protect(&b.local_peer());
	a.net.set_conn_limits(ConnLimits { low: 1, high: 1, grace: Duration::ZERO });
	eventually("trimmed", || a.net.peers().len() == 1).await;
	assert_eq!(a.net.peers()[0].id, b.local_peer());
	let meta = a.net.peer_info(&b.local_peer()).unwrap().conn_mgr_meta.unwrap();
	assert_eq!(meta.tags.get("protected"), Some(&1));
}

#[tokio::test]
async fn test_nat_status_follows_announced_addresses() {
	let idle = TcpNetAdapter::new(PeerId::new("plIdle"), NetworkName::Devnet);
	assert_eq!(idle.nat_status().reachability, Reachability::Unknown);

	let a = listening("plA", NetworkName::Devnet).await;
	assert_eq!(a.net.nat_status().reachability, Reachability::Private);

	a.net.set_addrs_filter(AddrsFilter { announce: vec!["203.0.113.7:4567".into()], no_announce: Vec::new() });
	let nat = a.net.nat_status();
	assert_eq!(nat.reachability, Reachability::Public);
	assert_eq!(nat.public_addr.as_deref(), Some("203.0.113.7:4567"));
}

// vim: ts=4

//! TCP networking adapter for the Peerlink node.
//!
//! Peers exchange a `HELLO` frame right after the TCP connection is set up,
//! carrying their peer id, agent, network and dialable addresses. Peers on
//! another network, blocked peers and duplicate connections are dropped.
//! Connections then stay open, sending heartbeats, until either side
//! disconnects or listening stops.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use peerlink_types::net_adapter::{AddrsFilter, ConnLimits, NetAdapter};
use peerlink_types::prelude::*;
use peerlink_types::types::{
	AddrInfo, BandwidthByKey, BandwidthStats, ConnMgrInfo, Connectedness, ExtendedPeerInfo,
	NatInfo, NetBlockList, NetworkName, Reachability,
};

pub mod block;
pub mod frame;

use frame::{Frame, HELLO_PROTOCOL, read_frame, write_frame};

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Connection manager tag for peers that are never trimmed
const PROTECTED_TAG: &str = "protected";

#[derive(Debug)]
struct Conn {
	id: PeerId,
	agent: Box<str>,
	remote: SocketAddr,
	/// Addresses the peer announced
	addrs: Vec<Box<str>>,
	opened: DateTime<Utc>,
	cancel: CancellationToken,
	bytes_in: AtomicU64,
	bytes_out: AtomicU64,
}

impl Conn {
	fn addr_info(&self) -> AddrInfo {
		let addrs =
			if self.addrs.is_empty() { vec![self.remote.to_string().into()] } else { self.addrs.clone() };
		AddrInfo { id: self.id.clone(), addrs }
	}

	fn stats(&self) -> BandwidthStats {
		BandwidthStats {
			total_in: self.bytes_in.load(Ordering::Relaxed),
			total_out: self.bytes_out.load(Ordering::Relaxed),
			rate_in: 0.0,
			rate_out: 0.0,
		}
	}
}

#[derive(Debug)]
struct Shared {
	id: PeerId,
	agent: Box<str>,
	network: NetworkName,
	/// Cancelled when listening stops, closes every connection
	closed: CancellationToken,
	tasks: TaskTracker,
	listen: RwLock<Vec<Box<str>>>,
	filter: RwLock<AddrsFilter>,
	conns: Mutex<HashMap<PeerId, Arc<Conn>>>,
	limits: Mutex<ConnLimits>,
	protected: Mutex<HashSet<PeerId>>,
	blocked: RwLock<NetBlockList>,
	/// Traffic of closed connections
	closed_in: AtomicU64,
	closed_out: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct TcpNetAdapter {
	shared: Arc<Shared>,
}

impl TcpNetAdapter {
	pub fn new(id: PeerId, network: NetworkName) -> Self {
		Self::with_agent(id, network, format!("peerlink/{}", peerlink_types::types::BUILD_VERSION))
	}

	pub fn with_agent(id: PeerId, network: NetworkName, agent: impl Into<Box<str>>) -> Self {
		Self {
			shared: Arc::new(Shared {
				id,
				agent: agent.into(),
				network,
				closed: CancellationToken::new(),
				tasks: TaskTracker::new(),
				listen: RwLock::new(Vec::new()),
				filter: RwLock::new(AddrsFilter::default()),
				conns: Mutex::new(HashMap::new()),
				limits: Mutex::new(ConnLimits::default()),
				protected: Mutex::new(HashSet::new()),
				blocked: RwLock::new(NetBlockList::default()),
				closed_in: AtomicU64::new(0),
				closed_out: AtomicU64::new(0),
			}),
		}
	}
}

impl Shared {
	fn announced(&self) -> Vec<Box<str>> {
		self.filter.read().apply(&self.listen.read())
	}

	fn hello(&self) -> Frame {
		Frame::Hello {
			id: self.id.clone(),
			agent: self.agent.clone(),
			network: self.network,
			addrs: self.announced(),
		}
	}

	fn peer_blocked(&self, peer: &PeerId) -> bool {
		self.blocked.read().peers.contains(peer)
	}

	/// Exchange hellos and register the connection
	async fn handshake(
		self: &Arc<Self>,
		stream: TcpStream,
		expect: Option<&PeerId>,
	) -> PlResult<Arc<Conn>> {
		let remote = stream.peer_addr()?;
		let (read, mut write) = stream.into_split();
		let mut reader = BufReader::new(read);
		let mut line = String::new();

		let exchange = async {
			let sent = write_frame(&mut write, &self.hello()).await?;
			let received = read_frame(&mut reader, &mut line).await?;
			Ok::<_, Error>((sent, received))
		};
		let (sent, received) = tokio::time::timeout(HANDSHAKE_TIMEOUT, exchange)
			.await
			.map_err(|_| Error::Network(format!("handshake with {} timed out", remote)))??;

		let Some((Frame::Hello { id, agent, network, addrs }, received)) = received else {
			return Err(Error::Network(format!("{} did not say hello", remote)));
		};
		if network != self.network {
			return Err(Error::Network(format!("{} is on {}", remote, network.as_str())));
		}
		if id == self.id || id.as_str().is_empty() {
			return Err(Error::Network(format!("{} sent an invalid peer id", remote)));
		}
		if let Some(expect) = expect
			&& !expect.as_str().is_empty()
			&& expect != &id
		{
			return Err(Error::Network(format!("{} is {}, not {}", remote, id, expect)));
		}
		if self.peer_blocked(&id) {
			return Err(Error::Network(format!("peer {} is blocked", id)));
		}

		let conn = Arc::new(Conn {
			id: id.clone(),
			agent,
			remote,
			addrs,
			opened: Utc::now(),
			cancel: self.closed.child_token(),
			bytes_in: AtomicU64::new(received as u64),
			bytes_out: AtomicU64::new(sent as u64),
		});
		{
			let mut conns = self.conns.lock();
			if conns.contains_key(&id) {
				return Err(Error::Network(format!("already connected to {}", id)));
			}
			conns.insert(id, Arc::clone(&conn));
		}
		info!(peer = %conn.id, %remote, agent = %conn.agent, "peer connected");

		self.tasks.spawn(Arc::clone(self).run_conn(Arc::clone(&conn), reader, write));
		self.trim();
		Ok(conn)
	}

	async fn run_conn(
		self: Arc<Self>,
		conn: Arc<Conn>,
		mut reader: BufReader<OwnedReadHalf>,
		mut write: OwnedWriteHalf,
	) {
		// reads run in their own future so a heartbeat never interrupts a
		// partially read line
		let read_loop = async {
			let mut line = String::new();
			loop {
				match read_frame(&mut reader, &mut line).await {
					Ok(Some((frame, n))) => {
						conn.bytes_in.fetch_add(n as u64, Ordering::Relaxed);
						if frame == Frame::Disconnect {
							break;
						}
					}
					Ok(None) => break,
					Err(err) => {
						debug!(peer = %conn.id, %err, "connection failed");
						break;
					}
				}
			}
		};
		tokio::pin!(read_loop);

		let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
		heartbeat.tick().await;

		loop {
			tokio::select! {
				() = &mut read_loop => break,
				() = conn.cancel.cancelled() => {
					if let Ok(n) = write_frame(&mut write, &Frame::Disconnect).await {
						conn.bytes_out.fetch_add(n as u64, Ordering::Relaxed);
					}
					break;
				}
				_ = heartbeat.tick() => match write_frame(&mut write, &Frame::Heartbeat).await {
					Ok(n) => {
						conn.bytes_out.fetch_add(n as u64, Ordering::Relaxed);
					}
					Err(err) => {
						debug!(peer = %conn.id, %err, "heartbeat failed");
						break;
					}
				},
			}
		}

		self.remove(&conn);
		info!(peer = %conn.id, "peer disconnected");
	}

	fn remove(&self, conn: &Arc<Conn>) {
		let mut conns = self.conns.lock();
		if conns.get(&conn.id).is_some_and(|c| Arc::ptr_eq(c, conn)) {
			conns.remove(&conn.id);
			self.closed_in.fetch_add(conn.bytes_in.load(Ordering::Relaxed), Ordering::Relaxed);
			self.closed_out.fetch_add(conn.bytes_out.load(Ordering::Relaxed), Ordering::Relaxed);
		}
	}

	/// Close the oldest unprotected connections once above the high
	/// watermark, down to the low watermark. Connections younger than the
	/// grace period are kept.
	fn trim(&self) {
		let limits = *self.limits.lock();
		let conns = self.conns.lock();
		if conns.len() <= limits.high as usize {
			return;
		}

		let protected = self.protected.lock();
		let grace = chrono::Duration::from_std(limits.grace).unwrap_or(chrono::Duration::zero());
		let now = Utc::now();
		let mut candidates: Vec<&Arc<Conn>> = conns
			.values()
			.filter(|c| !protected.contains(&c.id) && now - c.opened >= grace)
			.collect();
		candidates.sort_by_key(|c| c.opened);

		let excess = conns.len().saturating_sub(limits.low as usize);
		for conn in candidates.into_iter().take(excess) {
			debug!(peer = %conn.id, "trimming connection");
			conn.cancel.cancel();
		}
	}

	async fn accept_loop(self: Arc<Self>, listener: TcpListener, cancel: CancellationToken) {
		loop {
			tokio::select! {
				() = cancel.cancelled() => break,
				res = listener.accept() => match res {
					Ok((stream, remote)) => {
						if block::ip_blocked(&self.blocked.read(), remote.ip()) {
							debug!(%remote, "refused blocked address");
							continue;
						}
						let shared = Arc::clone(&self);
						self.tasks.spawn(async move {
							if let Err(err) = shared.handshake(stream, None).await {
								debug!(%remote, %err, "inbound handshake failed");
							}
						});
					}
					Err(err) => {
						warn!(%err, "accept failed");
						tokio::time::sleep(Duration::from_millis(100)).await;
					}
				},
			}
		}
	}
}

#[async_trait]
impl NetAdapter for TcpNetAdapter {
	fn local_peer(&self) -> PeerId {
		self.shared.id.clone()
	}

	fn listen_addrs(&self) -> Vec<Box<str>> {
		self.shared.listen.read().clone()
	}

	async fn start_listening(
		&self,
		addrs: &[Box<str>],
		cancel: CancellationToken,
	) -> PlResult<JoinHandle<()>> {
		let mut listeners = Vec::with_capacity(addrs.len());
		for addr in addrs {
			let listener = TcpListener::bind(&**addr)
				.await
				.map_err(|err| Error::Network(format!("cannot listen on {}: {}", addr, err)))?;
			listeners.push(listener);
		}

		let bound = listeners
			.iter()
			.map(|listener| Ok(listener.local_addr()?.to_string().into()))
			.collect::<PlResult<Vec<Box<str>>>>()?;
		*self.shared.listen.write() = bound;

		let mut accept_loops = JoinSet::new();
		for listener in listeners {
			accept_loops.spawn(Arc::clone(&self.shared).accept_loop(listener, cancel.clone()));
		}

		let shared = Arc::clone(&self.shared);
		Ok(tokio::spawn(async move {
			while accept_loops.join_next().await.is_some() {}
			shared.closed.cancel();
			shared.tasks.close();
			shared.tasks.wait().await;
			shared.listen.write().clear();
			debug!("listeners closed");
		}))
	}

	async fn connect(&self, peer: &AddrInfo) -> PlResult<()> {
		let shared = &self.shared;
		if !peer.id.as_str().is_empty() {
			if peer.id == shared.id {
				return Err(Error::Network("cannot dial self".into()));
			}
			if shared.peer_blocked(&peer.id) {
				return Err(Error::Network(format!("peer {} is blocked", peer.id)));
			}
			if shared.conns.lock().contains_key(&peer.id) {
				return Ok(());
			}
		}
		if shared.closed.is_cancelled() {
			return Err(Error::Network("networking is shut down".into()));
		}

		let mut last_err = Error::Network(format!("no address to dial {}", peer.id));
		for addr in &peer.addrs {
			let stream = match tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(&**addr)).await {
				Ok(Ok(stream)) => stream,
				Ok(Err(err)) => {
					last_err = Error::Network(format!("dial {}: {}", addr, err));
					continue;
				}
				Err(_) => {
					last_err = Error::Network(format!("dial {}: timed out", addr));
					continue;
				}
			};
			if let Ok(remote) = stream.peer_addr()
				&& block::ip_blocked(&shared.blocked.read(), remote.ip())
			{
				return Err(Error::Network(format!("address {} is blocked", remote)));
			}
			match shared.handshake(stream, Some(&peer.id)).await {
				Ok(_) => return Ok(()),
				Err(err) => last_err = err,
			}
		}
		Err(last_err)
	}

	async fn disconnect(&self, peer: &PeerId) -> PlResult<()> {
		let conn = self.shared.conns.lock().get(peer).cloned().ok_or(Error::NotFound)?;
		conn.cancel.cancel();
		Ok(())
	}

	fn peers(&self) -> Vec<AddrInfo> {
		let mut peers: Vec<AddrInfo> = self.shared.conns.lock().values().map(|c| c.addr_info()).collect();
		peers.sort_by(|a, b| a.id.cmp(&b.id));
		peers
	}

	fn connectedness(&self, peer: &PeerId) -> Connectedness {
		if self.shared.conns.lock().contains_key(peer) {
			Connectedness::Connected
		} else if self.shared.peer_blocked(peer) {
			Connectedness::CannotConnect
		} else {
			Connectedness::NotConnected
		}
	}

	fn find_peer(&self, peer: &PeerId) -> Option<AddrInfo> {
		self.shared.conns.lock().get(peer).map(|c| c.addr_info())
	}

	fn peer_info(&self, peer: &PeerId) -> Option<ExtendedPeerInfo> {
		let conn = self.shared.conns.lock().get(peer).cloned()?;
		let protected = self.shared.protected.lock().contains(peer);
		let mut tags = HashMap::new();
		if protected {
			tags.insert(PROTECTED_TAG.to_string(), 1);
		}
		Some(ExtendedPeerInfo {
			id: conn.id.clone(),
			agent: conn.agent.clone(),
			addrs: conn.addr_info().addrs,
			protocols: vec![HELLO_PROTOCOL.into()],
			conn_mgr_meta: Some(ConnMgrInfo {
				first_seen: conn.opened,
				value: i64::from(protected),
				tags,
				conns: HashMap::from([(conn.remote.to_string(), conn.opened)]),
			}),
		})
	}

	fn set_conn_limits(&self, limits: ConnLimits) {
		*self.shared.limits.lock() = limits;
		self.shared.trim();
	}

	fn protect(&self, peer: &PeerId) {
		self.shared.protected.lock().insert(peer.clone());
	}

	fn set_addrs_filter(&self, filter: AddrsFilter) {
		*self.shared.filter.write() = filter;
	}

	fn nat_status(&self) -> NatInfo {
		let public = self.shared.announced().into_iter().find(|addr| {
			addr.parse::<SocketAddr>().is_ok_and(|addr| block::is_public(addr.ip()))
		});
		let reachability = match (&public, self.shared.listen.read().is_empty()) {
			(Some(_), _) => Reachability::Public,
			(None, false) => Reachability::Private,
			(None, true) => Reachability::Unknown,
		};
		NatInfo { reachability, public_addr: public }
	}

	fn bandwidth_stats(&self) -> BandwidthStats {
		let mut total = BandwidthStats {
			total_in: self.shared.closed_in.load(Ordering::Relaxed),
			total_out: self.shared.closed_out.load(Ordering::Relaxed),
			..BandwidthStats::default()
		};
		for conn in self.shared.conns.lock().values() {
			let stats = conn.stats();
			total.total_in += stats.total_in;
			total.total_out += stats.total_out;
		}
		total
	}

	fn bandwidth_by_peer(&self) -> BandwidthByKey {
		self.shared.conns.lock().values().map(|c| (c.id.to_string(), c.stats())).collect()
	}

	fn bandwidth_by_protocol(&self) -> BandwidthByKey {
		BandwidthByKey::from([(HELLO_PROTOCOL.to_string(), self.bandwidth_stats())])
	}

	fn block(&self, list: &NetBlockList) {
		{
			let mut blocked = self.shared.blocked.write();
			for peer in &list.peers {
				if !blocked.peers.contains(peer) {
					blocked.peers.push(peer.clone());
				}
			}
			for addr in &list.ip_addrs {
				if !blocked.ip_addrs.contains(addr) {
					blocked.ip_addrs.push(addr.clone());
				}
			}
			for subnet in &list.ip_subnets {
				if !blocked.ip_subnets.contains(subnet) {
					blocked.ip_subnets.push(subnet.clone());
				}
			}
		}

		let blocked = self.shared.blocked.read();
		for conn in self.shared.conns.lock().values() {
			if blocked.peers.contains(&conn.id) || block::ip_blocked(&blocked, conn.remote.ip()) {
				info!(peer = %conn.id, "closing blocked peer");
				conn.cancel.cancel();
			}
		}
	}

	fn unblock(&self, list: &NetBlockList) {
		let mut blocked = self.shared.blocked.write();
		blocked.peers.retain(|p| !list.peers.contains(p));
		blocked.ip_addrs.retain(|a| !list.ip_addrs.contains(a));
		blocked.ip_subnets.retain(|s| !list.ip_subnets.contains(s));
	}

	fn block_list(&self) -> NetBlockList {
		self.shared.blocked.read().clone()
	}
}

// vim: ts=4

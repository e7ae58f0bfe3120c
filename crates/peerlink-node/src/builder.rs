//! Node stages and the entry point that builds a node from options.
//!
//! A full node is assembled as
//!
//! ```text
//! new([full_api(&slot, [lite(false)]), base(), repo(r), net_adapter(..), ...])
//! ```
//!
//! `full_api` marks the node type and turns networking on, `base` adds the
//! networking modules when networking is on, and `repo` locks the repo, reads
//! its configuration and applies the config stage for the node type. Any
//! option after these may override or unset what they registered.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use crate::graph::Graph;
use crate::key::{InvokeKey, ModuleKey};
use crate::lifecycle::{Hook, Lifecycle};
use crate::modules::{
	self, ApiAlg, ApiEndpoint, BootstrapPeers, CommonApi, ConnGater, PeerMgr, PrivKey, PubKey,
};
use crate::option::{
	NodeOption, apply_if, is_type, options, override_invoke, override_module, when,
};
use crate::provider::{Invoke, Provider};
use crate::settings::Settings;
use crate::shutdown::{Closing, ShutdownHandle, ShutdownTrigger};
use peerlink_api::{CommonProxy, FullNodeProxy, NetProxy};
use peerlink_types::config::{FullNodeConfig, NetworkConfig};
use peerlink_types::net_adapter::{AddrsFilter, ConnLimits, NetAdapter};
use peerlink_types::prelude::*;
use peerlink_types::repo_adapter::{KeyStore, KvStore, LockedRepo, Repo};
use peerlink_types::types::{AddrInfo, NetworkName, NodeType};

/// Receives the full-node API once the node is built
#[derive(Clone, Default)]
pub struct ApiSlot(Arc<OnceLock<FullNodeProxy>>);

impl ApiSlot {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self) -> Option<FullNodeProxy> {
		self.0.get().cloned()
	}

	fn set(&self, api: FullNodeProxy) -> PlResult<()> {
		self.0.set(api).map_err(|_| Error::Internal("api slot filled twice".into()))
	}
}

/// Build and start a node. On success the returned handle stops it.
pub async fn new(opts: impl IntoIterator<Item = NodeOption>) -> PlResult<ShutdownHandle> {
	let closing = Closing::default();
	let mut settings = Settings::new();
	options([defaults(closing.clone()), options(opts)])
		.apply(&mut settings)
		.inspect_err(|err| error!(%err, "invalid node options"))?;

	let graph = Graph::new(settings);
	let order = graph.resolve().inspect_err(|err| error!(%err, "unresolvable node graph"))?;

	let mut lifecycle = Lifecycle::new();
	let values = graph.build(&order, &mut lifecycle)?;
	debug!(modules = values.len(), hooks = lifecycle.len(), "node constructed");

	let running = lifecycle.start().await?;
	info!("node started");
	Ok(ShutdownHandle::new(running, closing))
}

/// Modules every node has
pub fn defaults(closing: Closing) -> NodeOption {
	options([
		override_module(ModuleKey::ShutdownTrigger, Provider::value(ShutdownTrigger::new())),
		override_module(ModuleKey::Closing, Provider::value(closing)),
		override_module(ModuleKey::NetworkName, Provider::value(NetworkName::default())),
	])
}

/// Base stage. Must come before the config stage.
pub fn base() -> NodeOption {
	options([
		NodeOption::new(|settings| {
			settings.base = true;
			Ok(())
		}),
		apply_if(Settings::network_enabled, [network()]),
	])
}

/// Start listening on `addrs` once the node starts
pub fn start_listening(addrs: Vec<Box<str>>) -> NodeOption {
	override_invoke(
		InvokeKey::StartListening,
		Invoke::new([ModuleKey::NetAdapter, ModuleKey::AddrsFilter], move |s| {
			let net: Arc<dyn NetAdapter> = s.get(&ModuleKey::NetAdapter)?;
			let filter: AddrsFilter = s.get(&ModuleKey::AddrsFilter)?;
			s.append_hook(Hook::new("listener").on_start(move |cancel| async move {
				let task = net.start_listening(&addrs, cancel).await?;
				net.set_addrs_filter(filter);
				info!(addrs = ?net.listen_addrs(), "listening");
				Ok(Some(task))
			}));
			Ok(())
		}),
	)
}

/// Apply connection limits and protect `protected` from trimming
pub fn connection_manager(limits: ConnLimits, protected: Vec<PeerId>) -> NodeOption {
	override_invoke(
		InvokeKey::ConnectionManager,
		Invoke::new([ModuleKey::NetAdapter], move |s| {
			let net: Arc<dyn NetAdapter> = s.get(&ModuleKey::NetAdapter)?;
			net.set_conn_limits(limits);
			for peer in &protected {
				net.protect(peer);
			}
			Ok(())
		}),
	)
}

/// Use `ctor` to create the networking provider once the peer identity is
/// known
pub fn net_adapter<F>(ctor: F) -> NodeOption
where
	F: FnOnce(PeerId, NetworkName) -> PlResult<Arc<dyn NetAdapter>> + Send + 'static,
{
	override_module(
		ModuleKey::NetAdapter,
		Provider::new([ModuleKey::PeerId, ModuleKey::NetworkName], move |s| {
			ctor(s.get(&ModuleKey::PeerId)?, s.get(&ModuleKey::NetworkName)?)
		}),
	)
}

fn network() -> NodeOption {
	let defaults = NetworkConfig::default();
	options([
		override_module(ModuleKey::AddrsFilter, Provider::value(AddrsFilter::default())),
		override_module(ModuleKey::BootstrapPeers, Provider::value(BootstrapPeers::default())),
		override_module(
			ModuleKey::ConnGater,
			Provider::new([ModuleKey::NetAdapter, ModuleKey::MetadataDs], |s| {
				Ok(Arc::new(ConnGater::new(s.get(&ModuleKey::NetAdapter)?, s.get(&ModuleKey::MetadataDs)?)))
			}),
		),
		start_listening(defaults.listen_addresses.iter().map(|a| a.as_str().into()).collect()),
		connection_manager(ConnLimits::default(), Vec::new()),
		override_invoke(
			InvokeKey::ConnGater,
			Invoke::new([ModuleKey::ConnGater], |s| {
				s.get::<Arc<ConnGater>>(&ModuleKey::ConnGater)?.restore()
			}),
		),
		apply_if(
			|settings| !settings.is_lite(),
			[
				override_module(
					ModuleKey::PeerMgr,
					Provider::new([ModuleKey::NetAdapter, ModuleKey::BootstrapPeers], |s| {
						Ok(Arc::new(PeerMgr::new(
							s.get(&ModuleKey::NetAdapter)?,
							s.get(&ModuleKey::BootstrapPeers)?,
						)))
					}),
				),
				override_invoke(
					InvokeKey::RunPeerMgr,
					Invoke::new([ModuleKey::PeerMgr], |s| {
						let mgr: Arc<PeerMgr> = s.get(&ModuleKey::PeerMgr)?;
						s.append_hook(
							Hook::new("peer manager")
								.on_start(move |cancel| async move { Ok(Some(mgr.spawn(cancel))) }),
						);
						Ok(())
					}),
				),
			],
		),
	])
}

/// Lock `repo` and register what derives from it: key store, host key and
/// identity, API secret. The configuration stored in the repo is applied for
/// the node type selected so far.
pub fn repo(repo: Arc<dyn Repo>) -> NodeOption {
	NodeOption::new(move |settings| {
		let locked = repo.lock(settings.node_type())?;
		let cfg = locked.config()?;
		debug!(node_type = %settings.node_type(), "repo locked");

		options([
			override_module(
				ModuleKey::LockedRepo,
				Provider::new([], move |s| Ok(modules::repo::locked_repo(s, locked))),
			),
			override_module(
				ModuleKey::KeyStore,
				Provider::new([ModuleKey::LockedRepo], |s| {
					modules::repo::key_store(&*s.get::<Arc<dyn LockedRepo>>(&ModuleKey::LockedRepo)?)
				}),
			),
			override_module(
				ModuleKey::PrivKey,
				Provider::new([ModuleKey::KeyStore], |s| {
					modules::keys::host_key(&*s.get::<Arc<dyn KeyStore>>(&ModuleKey::KeyStore)?)
				}),
			),
			override_module(
				ModuleKey::PubKey,
				Provider::new([ModuleKey::PrivKey], |s| {
					Ok(modules::keys::pub_key(&s.get::<PrivKey>(&ModuleKey::PrivKey)?))
				}),
			),
			override_module(
				ModuleKey::PeerId,
				Provider::new([ModuleKey::PubKey], |s| {
					Ok(modules::keys::peer_id(&s.get::<PubKey>(&ModuleKey::PubKey)?))
				}),
			),
			override_module(
				ModuleKey::ApiSecret,
				Provider::new([ModuleKey::KeyStore, ModuleKey::LockedRepo], |s| {
					let ks: Arc<dyn KeyStore> = s.get(&ModuleKey::KeyStore)?;
					let repo: Arc<dyn LockedRepo> = s.get(&ModuleKey::LockedRepo)?;
					modules::api_secret::api_secret(&*ks, &*repo)
				}),
			),
			apply_if(is_type(NodeType::FullNode), [config_full_node(cfg)]),
		])
		.apply(settings)
	})
}

/// Config stage of a full node
pub fn config_full_node(cfg: FullNodeConfig) -> NodeOption {
	NodeOption::new(move |settings| {
		cfg.validate()?;
		config_common(cfg, true).apply(settings)
	})
}

/// Config stage shared by every node type. With networking disabled the net
/// API is the stub.
pub fn config_common(cfg: FullNodeConfig, enable_network: bool) -> NodeOption {
	NodeOption::new(move |settings| {
		if !settings.is_base() {
			return Err(Error::OptionOrder("the base option must be set before the config option"));
		}
		settings.config = true;

		let endpoint: SocketAddr = cfg.api.listen_address.parse().map_err(|e| {
			Error::ConfigError(format!("api.listen_address {:?}: {}", cfg.api.listen_address, e))
		})?;
		let net = cfg.network;
		let bootstrap = net
			.bootstrap_peers
			.iter()
			.map(|peer| AddrInfo::parse(peer))
			.collect::<PlResult<Vec<_>>>()?;
		let limits = ConnLimits {
			low: net.conn_mgr_low,
			high: net.conn_mgr_high,
			grace: std::time::Duration::from_secs(net.conn_mgr_grace_secs),
		};
		let protected = net.protected_peers.iter().map(|p| PeerId::new(p.as_str())).collect();
		let filter = AddrsFilter {
			announce: net.announce_addresses.iter().map(|a| a.as_str().into()).collect(),
			no_announce: net.no_announce_addresses.iter().map(|a| a.as_str().into()).collect(),
		};
		let listen = net.listen_addresses.iter().map(|a| a.as_str().into()).collect();

		options([
			override_module(ModuleKey::ApiEndpoint, Provider::value(ApiEndpoint(endpoint))),
			override_invoke(
				InvokeKey::SetApiEndpoint,
				Invoke::new([ModuleKey::LockedRepo, ModuleKey::ApiEndpoint], |s| {
					let repo: Arc<dyn LockedRepo> = s.get(&ModuleKey::LockedRepo)?;
					modules::repo::set_api_endpoint(&*repo, s.get(&ModuleKey::ApiEndpoint)?)
				}),
			),
			override_module(
				ModuleKey::CommonApi,
				Provider::new(
					[
						ModuleKey::ApiSecret,
						ModuleKey::ShutdownTrigger,
						ModuleKey::Closing,
						ModuleKey::NetworkName,
					],
					|s| {
						let api = CommonApi::new(
							s.get::<ApiAlg>(&ModuleKey::ApiSecret)?,
							s.get(&ModuleKey::ShutdownTrigger)?,
							s.get(&ModuleKey::Closing)?,
							s.get(&ModuleKey::NetworkName)?,
						);
						Ok(CommonProxy::from_impl(Arc::new(api)))
					},
				),
			),
			when(!enable_network, [override_module(ModuleKey::NetApi, Provider::value(NetProxy::stub()))]),
			when(
				enable_network,
				[
					override_module(
						ModuleKey::NetApi,
						Provider::new(
							[ModuleKey::NetAdapter, ModuleKey::ConnGater, ModuleKey::PeerId],
							|s| {
								let api = modules::NetApi::new(
									s.get(&ModuleKey::NetAdapter)?,
									s.get(&ModuleKey::ConnGater)?,
									s.get(&ModuleKey::PeerId)?,
								);
								Ok(NetProxy::from_impl(Arc::new(api)))
							},
						),
					),
					start_listening(listen),
					connection_manager(limits, protected),
					override_module(ModuleKey::AddrsFilter, Provider::value(filter)),
					when(
						!bootstrap.is_empty(),
						[override_module(ModuleKey::BootstrapPeers, Provider::value(BootstrapPeers(bootstrap)))],
					),
				],
			),
			override_module(
				ModuleKey::MetadataDs,
				Provider::new([ModuleKey::LockedRepo], |s| {
					let ds: Arc<dyn KvStore> =
						modules::repo::metadata_ds(&*s.get::<Arc<dyn LockedRepo>>(&ModuleKey::LockedRepo)?)?;
					Ok(ds)
				}),
			),
		])
		.apply(settings)
	})
}

/// Full-node API stage: selects the node type, turns networking on, applies
/// `fopts` and hands the assembled API to `out` after construction
pub fn full_api(out: &ApiSlot, fopts: impl IntoIterator<Item = NodeOption>) -> NodeOption {
	let out = out.clone();
	options([
		NodeOption::new(|settings| {
			settings.node_type = NodeType::FullNode;
			settings.enable_network = true;
			Ok(())
		}),
		options(fopts),
		override_module(
			ModuleKey::FullNodeApi,
			Provider::new([ModuleKey::CommonApi, ModuleKey::NetApi], |s| {
				Ok(FullNodeProxy::new(s.get(&ModuleKey::CommonApi)?, s.get(&ModuleKey::NetApi)?))
			}),
		),
		override_invoke(
			InvokeKey::ExtractApi,
			Invoke::new([ModuleKey::FullNodeApi], move |s| out.set(s.get(&ModuleKey::FullNodeApi)?)),
		),
	])
}

/// Lite mode: run without the bootstrap peer manager. Must come before
/// `base` to take effect.
pub fn lite(enable: bool) -> NodeOption {
	NodeOption::new(move |settings| {
		settings.lite = enable;
		Ok(())
	})
}

// vim: ts=4

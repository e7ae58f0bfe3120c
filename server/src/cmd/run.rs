//! The node daemon: build a full node from the repo, serve its API, wait for
//! a reason to stop.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::prelude::*;
use peerlink_net_adapter_tcp::TcpNetAdapter;
use peerlink_node::modules::ApiEndpoint;
use peerlink_node::monitor::{ShutdownHandler, monitor_shutdown};
use peerlink_node::rpc::{RpcOptions, RpcServer, full_node_handler, serve_rpc};
use peerlink_node::{
	ApiSlot, InvokeKey, ModuleKey, NodeOption, Provider, ShutdownHandle, ShutdownTrigger, base,
	full_api, lite, net_adapter, options, override_module, repo, unset, when,
};
use peerlink_repo_adapter_fs::FsRepo;
use peerlink_types::net_adapter::NetAdapter;
use peerlink_types::repo_adapter::Repo;

/// A running node and its API server
#[derive(Debug)]
pub struct Daemon {
	node: ShutdownHandle,
	server: RpcServer,
	trigger: ShutdownTrigger,
}

impl Daemon {
	pub fn api_addr(&self) -> SocketAddr {
		self.server.local_addr()
	}

	/// Fires when something asks the process to stop
	pub fn trigger(&self) -> &ShutdownTrigger {
		&self.trigger
	}

	/// Wait for the trigger or a signal, then stop the API server and the node
	pub async fn wait(self) -> PlResult<()> {
		let Daemon { node, server, trigger } = self;
		let closing = node.closing();
		let handlers = vec![
			// pending `Closing` calls answer before the server drains
			ShutdownHandler::new("rpc server", move || {
				closing.cancel();
				server.stop()
			}),
			ShutdownHandler::new("node", move || async move { node.shutdown().await }),
		];
		match monitor_shutdown(trigger, handlers).await {
			0 => Ok(()),
			failures => Err(Error::Internal(format!("{} shutdown steps failed", failures))),
		}
	}
}

fn node_options(repo_path: &Path, args: &RunArgs, slot: &ApiSlot, trigger: &ShutdownTrigger) -> NodeOption {
	let fs_repo: Arc<dyn Repo> = Arc::new(FsRepo::new(repo_path));
	options([
		full_api(slot, [lite(args.lite)]),
		base(),
		repo(fs_repo),
		net_adapter(|id, network| {
			let net: Arc<dyn NetAdapter> = Arc::new(TcpNetAdapter::new(id, network));
			Ok(net)
		}),
		override_module(ModuleKey::ShutdownTrigger, Provider::value(trigger.clone())),
		when(args.no_bootstrap, [unset(InvokeKey::RunPeerMgr), unset(ModuleKey::PeerMgr)]),
		options(args.api.map(|addr| override_module(ModuleKey::ApiEndpoint, Provider::value(ApiEndpoint(addr))))),
	])
}

/// Build and start the node, then serve its API
pub async fn start(repo_path: &Path, args: &RunArgs) -> PlResult<Daemon> {
	let slot = ApiSlot::new();
	let trigger = ShutdownTrigger::new();
	let node = peerlink_node::new([node_options(repo_path, args, &slot, &trigger)]).await?;

	match serve(repo_path, args, &slot).await {
		Ok(server) => Ok(Daemon { node, server, trigger }),
		Err(err) => {
			error!(%err, "cannot serve the node api");
			if let Err(stop_err) = node.shutdown().await {
				warn!(err = %stop_err, "node shutdown after failed start");
			}
			Err(err)
		}
	}
}

async fn serve(repo_path: &Path, args: &RunArgs, slot: &ApiSlot) -> PlResult<RpcServer> {
	let api = slot.get().ok_or_else(|| Error::Internal("node built without an api".into()))?;
	let endpoint = FsRepo::new(repo_path).api_endpoint()?;
	let addr: SocketAddr = endpoint
		.parse()
		.map_err(|_| Error::ConfigError(format!("invalid api endpoint: {}", endpoint)))?;

	let opts = RpcOptions { max_request_size: args.api_max_req_size, ..Default::default() };
	serve_rpc(full_node_handler(&api, true, opts), addr).await
}

pub async fn run(repo_path: &Path, args: &RunArgs) -> PlResult<()> {
	let daemon = start(repo_path, args).await?;
	println!("node api listening on {}", daemon.api_addr());
	daemon.wait().await
}

// vim: ts=4

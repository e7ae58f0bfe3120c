use serde_json::json;

use crate::cli::Cli;
use crate::client::RpcClient;
use crate::prelude::*;
use peerlink_types::types::AddrInfo;

pub async fn id(cli: &Cli) -> PlResult<()> {
	let id: PeerId = RpcClient::connect(cli)?.call("ID", Vec::new()).await?;
	println!("{}", id);
	Ok(())
}

pub async fn peers(cli: &Cli) -> PlResult<()> {
	let peers: Vec<AddrInfo> = RpcClient::connect(cli)?.call("NetPeers", Vec::new()).await?;
	for peer in peers {
		println!("{}, [{}]", peer.id, peer.addrs.join(", "));
	}
	Ok(())
}

pub async fn connect(cli: &Cli, peers: &[AddrInfo]) -> PlResult<()> {
	let client = RpcClient::connect(cli)?;
	for peer in peers {
		print!("connect {}: ", peer.id);
		client.call::<()>("NetConnect", vec![json!(peer)]).await?;
		println!("success");
	}
	Ok(())
}

pub async fn disconnect(cli: &Cli, peers: &[String]) -> PlResult<()> {
	let client = RpcClient::connect(cli)?;
	for peer in peers {
		print!("disconnect {}: ", peer);
		client.call::<()>("NetDisconnect", vec![json!(PeerId::new(peer.as_str()))]).await?;
		println!("success");
	}
	Ok(())
}

// vim: ts=4

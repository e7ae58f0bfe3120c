use serde_json::json;

use crate::cli::Cli;
use crate::client::RpcClient;
use crate::prelude::*;
use peerlink_types::permission::up_to;

/// Print a token granting `perm` and every lower permission
pub async fn create_token(cli: &Cli, perm: Permission) -> PlResult<()> {
	let client = RpcClient::connect(cli)?;
	let token: String = client.call("AuthNew", vec![json!(up_to(perm))]).await?;
	println!("{}", token);
	Ok(())
}

// vim: ts=4

use crate::cli::Cli;
use crate::client::RpcClient;
use crate::prelude::*;

pub async fn stop(cli: &Cli) -> PlResult<()> {
	let client = RpcClient::connect(cli)?;
	client.call::<()>("Shutdown", Vec::new()).await?;
	println!("shutdown requested");
	Ok(())
}

// vim: ts=4

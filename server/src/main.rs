use clap::Parser;
use std::process::ExitCode;

use peerlink::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	match peerlink::execute(Cli::parse()).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("ERROR: {}", err);
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4

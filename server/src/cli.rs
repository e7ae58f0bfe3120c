//! Command line definition

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::prelude::*;
use peerlink_types::types::{AddrInfo, BUILD_VERSION};

/// Repo directory under `$HOME` when no path is given
pub const DEFAULT_REPO_DIR: &str = ".peerlink";

#[derive(Debug, Parser)]
#[command(name = "peerlink", version = BUILD_VERSION, about = "Peerlink peer-to-peer node")]
pub struct Cli {
	/// Path of the node repo
	#[arg(long, global = true, env = "PEERLINK_PATH")]
	pub repo: Option<PathBuf>,

	/// Where to reach a running node, as `token:host:port`
	#[arg(long, global = true, env = "PEERLINK_API_INFO", hide_env_values = true)]
	pub api_info: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

impl Cli {
	pub fn repo_path(&self) -> PlResult<PathBuf> {
		if let Some(path) = &self.repo {
			return Ok(path.clone());
		}
		std::env::var_os("HOME")
			.map(|home| PathBuf::from(home).join(DEFAULT_REPO_DIR))
			.ok_or_else(|| Error::ConfigError("no repo path given and HOME is not set".into()))
	}
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Create a new repo with the default configuration
	Init {
		/// Name recorded in the node metadata
		#[arg(long, default_value = "peerlink")]
		name: String,
	},
	/// Start the node and serve its API
	Run(RunArgs),
	/// Ask a running node to shut down
	Stop,
	/// Manage API tokens
	Auth {
		#[command(subcommand)]
		command: AuthCommand,
	},
	/// Inspect and manage peer connections
	Net {
		#[command(subcommand)]
		command: NetCommand,
	},
}

#[derive(Debug, Args)]
pub struct RunArgs {
	/// Serve the API on this address instead of the configured one
	#[arg(long)]
	pub api: Option<SocketAddr>,

	/// Run without the bootstrap peer manager
	#[arg(long)]
	pub lite: bool,

	/// Do not dial the bootstrap peers
	#[arg(long)]
	pub no_bootstrap: bool,

	/// Largest accepted API request body, in bytes
	#[arg(long)]
	pub api_max_req_size: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
	/// Create a token carrying every permission up to `--perm`
	CreateToken {
		#[arg(long)]
		perm: Permission,
	},
}

#[derive(Debug, Subcommand)]
pub enum NetCommand {
	/// Print the peer id of the node
	Id,
	/// List connected peers
	Peers,
	/// Connect to peers given as `peer-id@host:port`
	Connect {
		#[arg(required = true, value_parser = AddrInfo::parse)]
		peers: Vec<AddrInfo>,
	},
	/// Close the connections to the given peers
	Disconnect {
		#[arg(required = true)]
		peers: Vec<String>,
	},
}


// vim: ts=4

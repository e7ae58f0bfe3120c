//! The `peerlink` command: a daemon that assembles and runs a full node, and
//! a set of client commands that talk to it over JSON-RPC.

pub mod cli;
pub mod client;
pub mod cmd;
pub mod prelude;

use cli::{AuthCommand, Cli, Command, NetCommand};

/// Execute a parsed command line
pub async fn execute(cli: Cli) -> prelude::PlResult<()> {
	match &cli.command {
		Command::Init { name } => cmd::init::init(&cli.repo_path()?, name),
		Command::Run(args) => cmd::run::run(&cli.repo_path()?, args).await,
		Command::Stop => cmd::stop::stop(&cli).await,
		Command::Auth { command: AuthCommand::CreateToken { perm } } => {
			cmd::auth::create_token(&cli, *perm).await
		}
		Command::Net { command } => match command {
			NetCommand::Id => cmd::net::id(&cli).await,
			NetCommand::Peers => cmd::net::peers(&cli).await,
			NetCommand::Connect { peers } => cmd::net::connect(&cli, peers).await,
			NetCommand::Disconnect { peers } => cmd::net::disconnect(&cli, peers).await,
		},
	}
}

// vim: ts=4

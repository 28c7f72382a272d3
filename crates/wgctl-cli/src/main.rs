// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wgctl_config::{load_config, load_config_with_file, LoggingConfig};
use wgctl_peers::{ErrorKind, PeerError, WgPeerServices};

use commands::peers::{AddArgs, GetArgs, RemoveArgs};
use commands::CliContext;

#[derive(Debug, Parser)]
#[command(name = "wgctl", version, about = "Manage the peers of a WireGuard endpoint")]
struct Cli {
	/// Config file (defaults to /etc/wgctl/wgctl.toml)
	#[arg(long, global = true, env = "WGCTL_CONFIG")]
	config: Option<PathBuf>,

	/// Print machine-readable JSON
	#[arg(long, global = true)]
	json: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// List registered peers
	List,
	/// Show one peer with its client config
	Get(GetArgs),
	/// Create a peer
	Add(AddArgs),
	/// Remove a peer (its private key is kept)
	Remove(RemoveArgs),
	/// Show live connection status
	Status,
	/// Stream connection status until interrupted
	Watch,
	/// Ask the daemon to reload the registry again
	Reapply,
}

fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);

	// stdout carries command output; logs go to stderr.
	if logging.json {
		registry
			.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
			.init();
	} else {
		registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init();
	}
}

fn kind_label(err: &anyhow::Error) -> &'static str {
	match err.downcast_ref::<PeerError>().map(PeerError::kind) {
		Some(ErrorKind::ClientInput) => "invalid request",
		Some(ErrorKind::ServiceUnavailable) => "unavailable",
		Some(ErrorKind::ExternalTool) => "daemon",
		Some(ErrorKind::Internal) => "internal",
		None => "error",
	}
}

async fn run(cli: Cli) -> anyhow::Result<()> {
	let config = match &cli.config {
		Some(path) => load_config_with_file(path)?,
		None => load_config()?,
	};
	init_tracing(&config.logging);

	let ctx = CliContext {
		services: WgPeerServices::new(config),
		json: cli.json,
	};

	match cli.command {
		Command::List => commands::peers::handle_list(&ctx).await,
		Command::Get(args) => commands::peers::handle_get(args, &ctx).await,
		Command::Add(args) => commands::peers::handle_add(args, &ctx).await,
		Command::Remove(args) => commands::peers::handle_remove(args, &ctx).await,
		Command::Status => commands::status::handle_status(&ctx).await,
		Command::Watch => commands::status::handle_watch(&ctx).await,
		Command::Reapply => commands::peers::handle_reapply(&ctx).await,
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	match run(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("{} {e:#}", style(format!("{}:", kind_label(&e))).red().bold());
			ExitCode::FAILURE
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn global_flags_after_subcommand() {
		let cli = Cli::try_parse_from(["wgctl", "get", "3", "--json", "--config", "/tmp/w.toml"]).unwrap();
		assert!(cli.json);
		assert_eq!(cli.config, Some(PathBuf::from("/tmp/w.toml")));
		match cli.command {
			Command::Get(args) => assert_eq!(args.id, 3),
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn add_accepts_name_and_address() {
		let cli =
			Cli::try_parse_from(["wgctl", "add", "--name", "laptop", "--address", "10.10.0.7"]).unwrap();
		match cli.command {
			Command::Add(args) => {
				assert_eq!(args.name.as_deref(), Some("laptop"));
				assert_eq!(args.address.as_deref(), Some("10.10.0.7"));
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn remove_requires_numeric_id() {
		assert!(Cli::try_parse_from(["wgctl", "remove", "first"]).is_err());
	}

	#[test]
	fn error_kind_labels() {
		let err = anyhow::Error::new(PeerError::PeerNotFound(2));
		assert_eq!(kind_label(&err), "invalid request");
		assert_eq!(kind_label(&anyhow::anyhow!("boom")), "error");
	}
}

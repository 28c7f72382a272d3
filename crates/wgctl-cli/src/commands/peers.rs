// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Args;
use console::style;
use serde_json::json;
use tracing::instrument;
use wgctl_common::PeerRecord;
use wgctl_peers::NewPeer;

use super::{describe_apply, print_json, CliContext};

#[derive(Debug, Clone, Args)]
pub struct GetArgs {
	/// Peer number as shown by `list`
	pub id: usize,
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
	/// Label written above the peer block
	#[arg(long)]
	pub name: Option<String>,

	/// Address to assign instead of the next free one
	#[arg(long)]
	pub address: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RemoveArgs {
	/// Peer number as shown by `list`
	pub id: usize,
}

const SERVER_KEY_HINT: &str = "Server public key unknown; set tunnel.server_public_key \
	(WGCTL_TUNNEL_SERVER_PUBLIC_KEY) or add a PrivateKey to the [Interface] section, then run `wgctl get`";

fn peer_json(peer: &PeerRecord) -> serde_json::Value {
	json!({
		"id": peer.ordinal,
		"name": peer.display_name(),
		"public_key": peer.public_key.as_str(),
		"allowed_ips": peer.allowed_ips,
		"address": peer.address.to_string(),
	})
}

#[instrument(skip(ctx))]
pub async fn handle_list(ctx: &CliContext) -> anyhow::Result<()> {
	let peers = ctx.services.peers.list().await?;

	if ctx.json {
		return print_json(&json!(peers.iter().map(peer_json).collect::<Vec<_>>()));
	}

	if peers.is_empty() {
		println!("No peers registered");
		return Ok(());
	}

	println!(
		"{:<4} {:<20} {:<16} {}",
		style("ID").bold().underlined(),
		style("NAME").bold().underlined(),
		style("ADDRESS").bold().underlined(),
		style("PUBLIC KEY").bold().underlined()
	);
	for peer in &peers {
		println!(
			"{:<4} {:<20} {:<16} {}",
			peer.ordinal,
			peer.display_name(),
			peer.address,
			style(peer.public_key.as_str()).dim()
		);
	}

	if ctx.services.peers.reapply_pending() {
		println!("{}", style("Daemon reload pending; run `wgctl reapply`").yellow());
	}

	Ok(())
}

#[instrument(skip(ctx))]
pub async fn handle_get(args: GetArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let detail = ctx.services.peers.get(args.id).await?;

	if ctx.json {
		let mut value = peer_json(&detail.peer);
		value["private_key"] = json!(detail.private_key.as_ref().map(|k| k.expose()));
		value["client_config"] = json!(detail.client_config.as_ref().map(|c| c.expose()));
		return print_json(&value);
	}

	let peer = &detail.peer;
	println!("{} {}", style("Peer").bold(), peer.ordinal);
	println!("  Name:        {}", peer.display_name());
	println!("  Address:     {}", peer.address);
	println!("  Allowed IPs: {}", peer.allowed_ips);
	println!("  Public key:  {}", peer.public_key);

	match &detail.client_config {
		Some(config) => {
			println!();
			print!("{}", config.expose());
		}
		None if detail.private_key.is_none() => {
			println!("  {}", style("No private key on file for this peer").yellow());
		}
		None => {
			println!("  {}", style(SERVER_KEY_HINT).yellow());
		}
	}

	Ok(())
}

#[instrument(skip(ctx, args))]
pub async fn handle_add(args: AddArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let outcome = ctx
		.services
		.peers
		.add(NewPeer {
			name: args.name,
			address: args.address,
		})
		.await?;

	if ctx.json {
		let mut value = peer_json(&outcome.peer);
		value["client_config"] = json!(outcome.client_config.as_ref().map(|c| c.expose()));
		value["apply"] = serde_json::to_value(&outcome.apply)?;
		return print_json(&value);
	}

	println!(
		"{} peer {} ({}) at {}",
		style("Added").green().bold(),
		outcome.peer.ordinal,
		outcome.peer.display_name(),
		outcome.peer.address
	);
	println!("Daemon: {}", describe_apply(&outcome.apply));

	match &outcome.client_config {
		Some(config) => {
			println!();
			print!("{}", config.expose());
		}
		None => println!("{}", style(SERVER_KEY_HINT).yellow()),
	}

	Ok(())
}

#[instrument(skip(ctx))]
pub async fn handle_remove(args: RemoveArgs, ctx: &CliContext) -> anyhow::Result<()> {
	let outcome = ctx.services.peers.remove(args.id).await?;

	if ctx.json {
		let mut value = peer_json(&outcome.peer);
		value["apply"] = serde_json::to_value(&outcome.apply)?;
		return print_json(&value);
	}

	println!(
		"{} peer {} ({}) at {}",
		style("Removed").green().bold(),
		outcome.peer.ordinal,
		outcome.peer.display_name(),
		outcome.peer.address
	);
	println!("Daemon: {}", describe_apply(&outcome.apply));

	Ok(())
}

#[instrument(skip(ctx))]
pub async fn handle_reapply(ctx: &CliContext) -> anyhow::Result<()> {
	ctx.services.peers.reapply().await?;

	if ctx.json {
		return print_json(&json!({ "apply": { "state": "applied" } }));
	}
	println!("{}", style("Daemon configuration reloaded").green());
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::Ipv4Addr;
	use wgctl_common::PublicKey;

	#[test]
	fn peer_json_uses_display_name() {
		let peer = PeerRecord {
			ordinal: 2,
			name: None,
			public_key: PublicKey::new("INmRQAZI6vPcKW3FolLYSb0xOaPCb7TufQp6BdyuizY="),
			allowed_ips: "10.10.0.3/32".to_string(),
			address: Ipv4Addr::new(10, 10, 0, 3),
		};
		let value = peer_json(&peer);
		assert_eq!(value["id"], 2);
		assert_eq!(value["name"], "Client 2");
		assert_eq!(value["address"], "10.10.0.3");
	}
}

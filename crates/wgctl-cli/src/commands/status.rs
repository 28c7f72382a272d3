// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use console::style;
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use wgctl_common::{ConnectionSnapshot, PeerRecord, PeerStatus};

use super::{print_json, CliContext};

fn format_age(status: &PeerStatus) -> String {
	match status.last_handshake_age_secs {
		None => "never".to_string(),
		Some(secs) if secs < 60 => format!("{secs}s ago"),
		Some(secs) if secs < 3600 => format!("{}m {}s ago", secs / 60, secs % 60),
		Some(secs) => format!("{}h {}m ago", secs / 3600, (secs % 3600) / 60),
	}
}

fn print_snapshot(snapshot: &ConnectionSnapshot, peers: &[PeerRecord]) {
	println!(
		"{} {} of {} connected",
		style(snapshot.taken_at.format("%H:%M:%S")).dim(),
		snapshot.connected_count(),
		snapshot.peers.len()
	);

	for peer in peers {
		let Some(status) = snapshot.get(&peer.public_key) else {
			continue;
		};
		let state = if status.connected {
			style("connected").green()
		} else {
			style("offline").red()
		};
		println!(
			"  {:<4} {:<20} {:<16} {:<10} {:<14} rx {} tx {}",
			peer.ordinal,
			peer.display_name(),
			peer.address,
			state,
			format_age(status),
			status.bytes_received,
			status.bytes_sent
		);
	}

	for (key, status) in &snapshot.peers {
		if peers.iter().any(|p| &p.public_key == key) {
			continue;
		}
		println!(
			"  {:<4} {:<20} {:<16} {:<10} {}",
			"?",
			style("unregistered").yellow(),
			key.as_str(),
			if status.connected { "connected" } else { "offline" },
			format_age(status)
		);
	}
}

async fn known_peers(ctx: &CliContext) -> Vec<PeerRecord> {
	match ctx.services.peers.list().await {
		Ok(peers) => peers,
		Err(e) => {
			warn!(error = %e, "could not read registry for peer names");
			Vec::new()
		}
	}
}

#[instrument(skip(ctx))]
pub async fn handle_status(ctx: &CliContext) -> anyhow::Result<()> {
	let snapshot = ctx.services.status.status().await;

	if ctx.json {
		return print_json(&serde_json::to_value(&*snapshot)?);
	}

	if snapshot.is_empty() {
		println!("No status available (no peers, or the daemon could not be queried)");
		return Ok(());
	}
	print_snapshot(&snapshot, &known_peers(ctx).await);
	Ok(())
}

/// Run the shared poller and print every snapshot until Ctrl-C.
#[instrument(skip(ctx))]
pub async fn handle_watch(ctx: &CliContext) -> anyhow::Result<()> {
	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let reconciler = ctx.services.status.clone();
	let poller = tokio::spawn(async move { reconciler.run(shutdown_rx).await });

	let mut feed = ctx.services.status.subscribe().await;
	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("interrupted");
				break;
			}
			next = feed.next() => {
				let Some(snapshot) = next else {
					break;
				};
				if ctx.json {
					println!("{}", serde_json::to_string(&*snapshot)?);
				} else {
					print_snapshot(&snapshot, &known_peers(ctx).await);
				}
			}
		}
	}

	let _ = shutdown_tx.send(true);
	poller.await?;
	Ok(())
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace, warn};
use wgctl_common::{KeyPair, PrivateKey, PublicKey, SessionTelemetry};
use wgctl_config::DaemonConfig;

#[derive(Error, Debug)]
pub enum DaemonError {
	#[error("failed to run {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{operation} timed out after {after_secs}s")]
	Timeout {
		operation: &'static str,
		after_secs: u64,
	},

	#[error("{program} exited with {}: {stderr}", exit_label(.status))]
	Failed {
		program: String,
		status: Option<i32>,
		stderr: String,
	},

	#[error("malformed output: {0}")]
	MalformedOutput(String),
}

fn exit_label(status: &Option<i32>) -> String {
	match status {
		Some(code) => code.to_string(),
		None => "signal".to_string(),
	}
}

/// What the control plane needs from the tunnel daemon.
#[async_trait]
pub trait TunnelDaemon: Send + Sync {
	/// Create a fresh keypair.
	async fn generate_keypair(&self) -> Result<KeyPair, DaemonError>;

	/// Public half of an existing private key.
	async fn derive_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey, DaemonError>;

	/// Make the daemon pick up the current registry.
	async fn reload(&self) -> Result<(), DaemonError>;

	/// Live per-peer session telemetry.
	async fn dump_sessions(&self) -> Result<Vec<SessionTelemetry>, DaemonError>;
}

/// [`TunnelDaemon`] backed by the `wg` tool and configurable reload/dump commands.
#[derive(Debug, Clone)]
pub struct CommandTunnelDaemon {
	config: DaemonConfig,
}

impl CommandTunnelDaemon {
	pub fn new(config: DaemonConfig) -> Self {
		Self { config }
	}

	async fn run(
		&self,
		operation: &'static str,
		argv: &[String],
		stdin: Option<&str>,
	) -> Result<String, DaemonError> {
		let (program, args) = argv.split_first().ok_or_else(|| DaemonError::Spawn {
			program: String::new(),
			source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
		})?;

		trace!(operation, cmd = %argv.join(" "), "running daemon command");

		let spawn_err = |source| DaemonError::Spawn {
			program: program.clone(),
			source,
		};

		let mut cmd = Command::new(program);
		cmd.args(args)
			.stdin(if stdin.is_some() {
				Stdio::piped()
			} else {
				Stdio::null()
			})
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		let mut child = cmd.spawn().map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				warn!(%program, "daemon command not found in PATH");
			}
			spawn_err(e)
		})?;

		let io = async move {
			if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
				pipe.write_all(input.as_bytes()).await?;
				pipe.shutdown().await?;
			}
			child.wait_with_output().await
		};

		let output = tokio::time::timeout(self.config.timeout(), io)
			.await
			.map_err(|_| DaemonError::Timeout {
				operation,
				after_secs: self.config.timeout_secs,
			})?
			.map_err(spawn_err)?;

		if output.status.success() {
			Ok(String::from_utf8_lossy(&output.stdout).into_owned())
		} else {
			Err(DaemonError::Failed {
				program: program.clone(),
				status: output.status.code(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			})
		}
	}

	fn wg(&self, subcommand: &str) -> Vec<String> {
		vec![self.config.wg_binary.clone(), subcommand.to_string()]
	}
}

#[async_trait]
impl TunnelDaemon for CommandTunnelDaemon {
	async fn generate_keypair(&self) -> Result<KeyPair, DaemonError> {
		let out = self.run("genkey", &self.wg("genkey"), None).await?;
		let private_key = PrivateKey::parse(out.trim())
			.map_err(|e| DaemonError::MalformedOutput(format!("genkey: {e}")))?;
		let public_key = self.derive_public_key(&private_key).await?;
		debug!(%public_key, "generated keypair");
		Ok(KeyPair::new(private_key, public_key))
	}

	async fn derive_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey, DaemonError> {
		let input = format!("{}\n", private_key.expose());
		let out = self.run("pubkey", &self.wg("pubkey"), Some(&input)).await?;
		PublicKey::parse(out.trim()).map_err(|e| DaemonError::MalformedOutput(format!("pubkey: {e}")))
	}

	async fn reload(&self) -> Result<(), DaemonError> {
		self.run("reload", &self.config.reload_command, None).await?;
		debug!("daemon reloaded");
		Ok(())
	}

	async fn dump_sessions(&self) -> Result<Vec<SessionTelemetry>, DaemonError> {
		let out = self.run("dump", &self.config.dump_command, None).await?;
		parse_dump(&out)
	}
}

fn parse_field<T: std::str::FromStr>(
	fields: &[&str],
	index: usize,
	name: &str,
	line: usize,
) -> Result<T, DaemonError> {
	fields[index].trim().parse().map_err(|_| {
		DaemonError::MalformedOutput(format!(
			"line {line}: {name} '{}' is not a number",
			fields[index]
		))
	})
}

/// Parse `wg show <interface> dump`.
///
/// The first line describes the interface and is skipped. Every other line is
/// `public-key, preshared-key, endpoint, allowed-ips, latest-handshake,
/// transfer-rx, transfer-tx, persistent-keepalive` separated by tabs. One bad
/// line fails the whole dump.
pub fn parse_dump(text: &str) -> Result<Vec<SessionTelemetry>, DaemonError> {
	let mut sessions = Vec::new();

	for (n, line) in text.lines().enumerate().skip(1) {
		let line_no = n + 1;
		if line.trim().is_empty() {
			continue;
		}

		let fields: Vec<&str> = line.split('\t').collect();
		if fields.len() < 7 {
			return Err(DaemonError::MalformedOutput(format!(
				"line {line_no}: expected 8 fields, got {}",
				fields.len()
			)));
		}

		let public_key = fields[0].trim();
		if public_key.is_empty() {
			return Err(DaemonError::MalformedOutput(format!(
				"line {line_no}: empty public key"
			)));
		}

		let endpoint = Some(fields[2].trim())
			.filter(|e| !e.is_empty() && *e != "(none)")
			.map(str::to_string);
		let persistent_keepalive = fields
			.get(7)
			.and_then(|k| k.trim().parse::<u16>().ok())
			.filter(|k| *k > 0);

		sessions.push(SessionTelemetry {
			public_key: PublicKey::new(public_key),
			endpoint,
			allowed_ips: fields[3].trim().to_string(),
			latest_handshake: parse_field(&fields, 4, "latest-handshake", line_no)?,
			rx_bytes: parse_field(&fields, 5, "transfer-rx", line_no)?,
			tx_bytes: parse_field(&fields, 6, "transfer-tx", line_no)?,
			persistent_keepalive,
		});
	}

	Ok(sessions)
}

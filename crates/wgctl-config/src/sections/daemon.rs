// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! How the tunnel daemon is driven.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

fn default_wg_binary() -> String {
	"wg".to_string()
}

fn default_reload_command() -> Vec<String> {
	["docker", "restart", "wireguard"]
		.iter()
		.map(|s| s.to_string())
		.collect()
}

fn default_dump_command() -> Vec<String> {
	["docker", "exec", "wireguard", "wg", "show", "wg0", "dump"]
		.iter()
		.map(|s| s.to_string())
		.collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfigLayer {
	pub wg_binary: Option<String>,
	pub reload_command: Option<Vec<String>>,
	pub dump_command: Option<Vec<String>>,
	pub timeout_secs: Option<u64>,
}

impl DaemonConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.wg_binary.is_some() {
			self.wg_binary = other.wg_binary;
		}
		if other.reload_command.is_some() {
			self.reload_command = other.reload_command;
		}
		if other.dump_command.is_some() {
			self.dump_command = other.dump_command;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> DaemonConfig {
		DaemonConfig {
			wg_binary: self.wg_binary.unwrap_or_else(default_wg_binary),
			reload_command: self.reload_command.unwrap_or_else(default_reload_command),
			dump_command: self.dump_command.unwrap_or_else(default_dump_command),
			timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
	/// Used for `genkey` and `pubkey`.
	pub wg_binary: String,
	/// argv run after every registry change.
	pub reload_command: Vec<String>,
	/// argv whose stdout is a `wg show <iface> dump`.
	pub dump_command: Vec<String>,
	pub timeout_secs: u64,
}

impl DaemonConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

impl Default for DaemonConfig {
	fn default() -> Self {
		DaemonConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deserialize_commands_from_toml() {
		let layer: DaemonConfigLayer = toml::from_str(
			r#"
reload_command = ["wg-quick", "strip", "wg0"]
timeout_secs = 3
"#,
		)
		.unwrap();
		let config = layer.finalize();
		assert_eq!(config.reload_command, vec!["wg-quick", "strip", "wg0"]);
		assert_eq!(config.dump_command[0], "docker");
		assert_eq!(config.timeout(), Duration::from_secs(3));
	}
}

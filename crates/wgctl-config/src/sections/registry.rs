// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registry and key store locations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_REGISTRY_PATH: &str = "/wireguard-config/wg_confs/wg0.conf";
pub const DEFAULT_KEYS_PATH: &str = "/wireguard-config/private_keys.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfigLayer {
	pub config_path: Option<PathBuf>,
	pub keys_path: Option<PathBuf>,
}

impl RegistryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.config_path.is_some() {
			self.config_path = other.config_path;
		}
		if other.keys_path.is_some() {
			self.keys_path = other.keys_path;
		}
	}

	pub fn finalize(self) -> RegistryConfig {
		RegistryConfig {
			config_path: self
				.config_path
				.unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY_PATH)),
			keys_path: self
				.keys_path
				.unwrap_or_else(|| PathBuf::from(DEFAULT_KEYS_PATH)),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfig {
	/// The tunnel interface config file holding the `[Peer]` blocks.
	pub config_path: PathBuf,
	/// JSON map of public key to private key.
	pub keys_path: PathBuf,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		RegistryConfigLayer::default().finalize()
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Settings written into generated client configurations.

use serde::{Deserialize, Serialize};

fn default_endpoint() -> String {
	"YOUR_SERVER_IP:51820".to_string()
}

fn default_dns() -> String {
	"1.1.1.1".to_string()
}

fn default_client_allowed_ips() -> String {
	"0.0.0.0/0".to_string()
}

const DEFAULT_PERSISTENT_KEEPALIVE: u16 = 25;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TunnelConfigLayer {
	pub server_public_key: Option<String>,
	pub endpoint: Option<String>,
	pub dns: Option<String>,
	pub client_allowed_ips: Option<String>,
	pub persistent_keepalive: Option<u16>,
}

impl TunnelConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.server_public_key.is_some() {
			self.server_public_key = other.server_public_key;
		}
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.dns.is_some() {
			self.dns = other.dns;
		}
		if other.client_allowed_ips.is_some() {
			self.client_allowed_ips = other.client_allowed_ips;
		}
		if other.persistent_keepalive.is_some() {
			self.persistent_keepalive = other.persistent_keepalive;
		}
	}

	pub fn finalize(self) -> TunnelConfig {
		TunnelConfig {
			server_public_key: self.server_public_key.filter(|k| !k.trim().is_empty()),
			endpoint: self.endpoint.unwrap_or_else(default_endpoint),
			dns: self.dns.unwrap_or_else(default_dns),
			client_allowed_ips: self
				.client_allowed_ips
				.unwrap_or_else(default_client_allowed_ips),
			persistent_keepalive: self
				.persistent_keepalive
				.unwrap_or(DEFAULT_PERSISTENT_KEEPALIVE),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TunnelConfig {
	/// When unset, derived from the `[Interface]` private key in the registry.
	/// With neither available, peers are still created but no client config is
	/// rendered for them.
	pub server_public_key: Option<String>,
	pub endpoint: String,
	pub dns: String,
	pub client_allowed_ips: String,
	pub persistent_keepalive: u16,
}

impl Default for TunnelConfig {
	fn default() -> Self {
		TunnelConfigLayer::default().finalize()
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::keys::PublicKey;

/// One peer as parsed from the registry.
///
/// `ordinal` is the 1-based position among valid records in the current parse.
/// It is re-derived on every read, so removing peer 2 renumbers peer 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
	pub ordinal: usize,
	#[serde(default)]
	pub name: Option<String>,
	pub public_key: PublicKey,
	pub allowed_ips: String,
	pub address: Ipv4Addr,
}

impl PeerRecord {
	pub fn display_name(&self) -> String {
		self
			.name
			.clone()
			.unwrap_or_else(|| default_peer_name(self.ordinal))
	}
}

/// Label written for a peer created without a name.
pub fn default_peer_name(ordinal: usize) -> String {
	format!("Client {ordinal}")
}

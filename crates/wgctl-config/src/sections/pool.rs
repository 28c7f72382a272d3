// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Address pool configuration section.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_POOL_NETWORK: &str = "10.10.0.0/16";

/// Peers roll over the third and fourth octets, so the pool is always a /16.
const POOL_PREFIX_LEN: u8 = 16;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PoolConfigLayer {
	pub network: Option<String>,
}

impl PoolConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.network.is_some() {
			self.network = other.network;
		}
	}

	pub fn finalize(self) -> Result<PoolConfig, ConfigError> {
		let raw = self
			.network
			.unwrap_or_else(|| DEFAULT_POOL_NETWORK.to_string());

		let network: Ipv4Net = raw.parse().map_err(|e| ConfigError::InvalidValue {
			key: "pool.network".to_string(),
			message: format!("'{raw}' is not an IPv4 network: {e}"),
		})?;

		if network.prefix_len() != POOL_PREFIX_LEN {
			return Err(ConfigError::InvalidValue {
				key: "pool.network".to_string(),
				message: format!("'{raw}' must be a /{POOL_PREFIX_LEN}"),
			});
		}

		Ok(PoolConfig {
			network: network.trunc(),
		})
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
	pub network: Ipv4Net,
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			network: Ipv4Net::new(std::net::Ipv4Addr::new(10, 10, 0, 0), POOL_PREFIX_LEN)
				.unwrap_or_default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn default_pool_is_10_10() {
		let config = PoolConfigLayer::default().finalize().unwrap();
		assert_eq!(config.network.to_string(), "10.10.0.0/16");
		assert_eq!(config, PoolConfig::default());
	}

	#[test]
	fn host_bits_are_truncated() {
		let config = PoolConfigLayer {
			network: Some("10.20.3.4/16".to_string()),
		}
		.finalize()
		.unwrap();
		assert_eq!(config.network.to_string(), "10.20.0.0/16");
	}

	#[test]
	fn rejects_other_prefix_lengths() {
		let err = PoolConfigLayer {
			network: Some("10.10.0.0/24".to_string()),
		}
		.finalize()
		.unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
	}

	#[test]
	fn rejects_ipv6() {
		let result = PoolConfigLayer {
			network: Some("fd00::/16".to_string()),
		}
		.finalize();
		assert!(result.is_err());
	}

	proptest! {
		#[test]
		fn only_slash_16_is_accepted(
			a in any::<u8>(),
			b in any::<u8>(),
			c in any::<u8>(),
			d in any::<u8>(),
			prefix in 0u8..=32
		) {
			let raw = format!("{a}.{b}.{c}.{d}/{prefix}");
			let result = PoolConfigLayer { network: Some(raw) }.finalize();
			if prefix == 16 {
				let config = result.unwrap();
				prop_assert_eq!(config.network.network().octets(), [a, b, 0, 0]);
			} else {
				prop_assert!(result.is_err());
			}
		}
	}
}

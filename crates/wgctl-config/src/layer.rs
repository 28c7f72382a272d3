// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	DaemonConfigLayer, LoggingConfigLayer, PoolConfigLayer, RegistryConfigLayer, StatusConfigLayer,
	TunnelConfigLayer,
};

/// Every section is optional so sources can be stacked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WgctlConfigLayer {
	#[serde(default)]
	pub registry: Option<RegistryConfigLayer>,
	#[serde(default)]
	pub pool: Option<PoolConfigLayer>,
	#[serde(default)]
	pub tunnel: Option<TunnelConfigLayer>,
	#[serde(default)]
	pub daemon: Option<DaemonConfigLayer>,
	#[serde(default)]
	pub status: Option<StatusConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl WgctlConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: WgctlConfigLayer) {
		merge_option(&mut self.registry, other.registry, RegistryConfigLayer::merge);
		merge_option(&mut self.pool, other.pool, PoolConfigLayer::merge);
		merge_option(&mut self.tunnel, other.tunnel, TunnelConfigLayer::merge);
		merge_option(&mut self.daemon, other.daemon, DaemonConfigLayer::merge);
		merge_option(&mut self.status, other.status, StatusConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = WgctlConfigLayer::default();
		base.merge(WgctlConfigLayer::default());
		assert!(base.registry.is_none());
		assert!(base.daemon.is_none());
	}

	#[test]
	fn test_merge_other_overwrites_field_by_field() {
		let mut base = WgctlConfigLayer {
			tunnel: Some(TunnelConfigLayer {
				endpoint: Some("vpn.example.com:51820".to_string()),
				dns: Some("9.9.9.9".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		let other = WgctlConfigLayer {
			tunnel: Some(TunnelConfigLayer {
				dns: Some("1.0.0.1".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);

		let tunnel = base.tunnel.unwrap();
		assert_eq!(tunnel.endpoint.as_deref(), Some("vpn.example.com:51820"));
		assert_eq!(tunnel.dns.as_deref(), Some("1.0.0.1"));
	}

	#[test]
	fn test_merge_adds_missing_sections() {
		let mut base = WgctlConfigLayer::default();
		base.merge(WgctlConfigLayer {
			status: Some(StatusConfigLayer {
				poll_interval_ms: Some(500),
				..Default::default()
			}),
			..Default::default()
		});
		assert_eq!(base.status.unwrap().poll_interval_ms, Some(500));
	}

	#[test]
	fn test_deserialize_full_toml() {
		let layer: WgctlConfigLayer = toml::from_str(
			r#"
[registry]
config_path = "/etc/wireguard/wg0.conf"

[pool]
network = "10.42.0.0/16"

[tunnel]
endpoint = "vpn.example.com:51820"

[daemon]
reload_command = ["systemctl", "reload", "wg-quick@wg0"]
"#,
		)
		.unwrap();

		assert_eq!(
			layer.registry.unwrap().config_path.unwrap().to_str(),
			Some("/etc/wireguard/wg0.conf")
		);
		assert_eq!(layer.pool.unwrap().network.as_deref(), Some("10.42.0.0/16"));
		assert!(layer.logging.is_none());
	}
}

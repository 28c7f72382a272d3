// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for wgctl.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`WGCTL_*`)
//! 2. Config file (`/etc/wgctl/wgctl.toml`, or `--config`)
//! 3. Built-in defaults
//!
//! # Usage
//!
//! ```ignore
//! use wgctl_config::load_config;
//!
//! let config = load_config()?;
//! println!("registry at {}", config.registry.config_path.display());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::WgctlConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct WgctlConfig {
	pub registry: RegistryConfig,
	pub pool: PoolConfig,
	pub tunnel: TunnelConfig,
	pub daemon: DaemonConfig,
	pub status: StatusConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from defaults, the system config file and the environment.
pub fn load_config() -> Result<WgctlConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<WgctlConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<WgctlConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WgctlConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: WgctlConfigLayer) -> Result<WgctlConfig, ConfigError> {
	let registry = layer.registry.unwrap_or_default().finalize();
	let pool = layer.pool.unwrap_or_default().finalize()?;
	let tunnel = layer.tunnel.unwrap_or_default().finalize();
	let daemon = layer.daemon.unwrap_or_default().finalize();
	let status = layer.status.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&daemon, &status)?;

	info!(
		registry = %registry.config_path.display(),
		keys = %registry.keys_path.display(),
		pool = %pool.network,
		endpoint = %tunnel.endpoint,
		server_key_configured = tunnel.server_public_key.is_some(),
		daemon_timeout_secs = daemon.timeout_secs,
		poll_interval_ms = status.poll_interval_ms,
		"wgctl configuration loaded"
	);

	Ok(WgctlConfig {
		registry,
		pool,
		tunnel,
		daemon,
		status,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(daemon: &DaemonConfig, status: &StatusConfig) -> Result<(), ConfigError> {
	if daemon.wg_binary.trim().is_empty() {
		return Err(ConfigError::Validation("daemon.wg_binary is empty".to_string()));
	}
	if daemon.reload_command.is_empty() {
		return Err(ConfigError::Validation(
			"daemon.reload_command must name a program".to_string(),
		));
	}
	if daemon.dump_command.is_empty() {
		return Err(ConfigError::Validation(
			"daemon.dump_command must name a program".to_string(),
		));
	}
	if daemon.timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"daemon.timeout_secs must be greater than zero".to_string(),
		));
	}
	if status.poll_interval_ms == 0 {
		return Err(ConfigError::Validation(
			"status.poll_interval_ms must be greater than zero".to_string(),
		));
	}
	if status.connected_threshold_secs == 0 {
		return Err(ConfigError::Validation(
			"status.connected_threshold_secs must be greater than zero".to_string(),
		));
	}
	if status.channel_capacity == 0 {
		return Err(ConfigError::Validation(
			"status.channel_capacity must be greater than zero".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	#[test]
	fn test_finalize_defaults() {
		let config = finalize(WgctlConfigLayer::default()).unwrap();
		assert_eq!(
			config.registry.config_path.to_str(),
			Some(DEFAULT_REGISTRY_PATH)
		);
		assert_eq!(config.pool.network.to_string(), DEFAULT_POOL_NETWORK);
		assert_eq!(config.status.poll_interval_ms, 2000);
		assert_eq!(config.status.connected_threshold_secs, 180);
		assert_eq!(config.daemon.timeout_secs, 10);
	}

	#[test]
	fn test_empty_reload_command_rejected() {
		let layer = WgctlConfigLayer {
			daemon: Some(DaemonConfigLayer {
				reload_command: Some(Vec::new()),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_zero_poll_interval_rejected() {
		let layer = WgctlConfigLayer {
			status: Some(StatusConfigLayer {
				poll_interval_ms: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(layer).is_err());
	}

	#[test]
	fn test_bad_pool_surfaces_invalid_value() {
		let layer = WgctlConfigLayer {
			pool: Some(PoolConfigLayer {
				network: Some("not-a-network".to_string()),
			}),
			..Default::default()
		};
		assert!(matches!(
			finalize(layer),
			Err(ConfigError::InvalidValue { .. })
		));
	}

	#[test]
	fn test_file_layer_applied_over_defaults() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[tunnel]\nendpoint = \"vpn.example.com:51820\"\n\n[logging]\njson = true"
		)
		.unwrap();

		let config = load_from_sources(vec![
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();

		assert_eq!(config.tunnel.endpoint, "vpn.example.com:51820");
		assert!(config.logging.json);
		assert_eq!(config.tunnel.dns, "1.1.1.1");
	}
}

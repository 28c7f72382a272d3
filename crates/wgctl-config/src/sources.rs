// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::WgctlConfigLayer;
use crate::sections::{
	DaemonConfigLayer, LoggingConfigLayer, PoolConfigLayer, RegistryConfigLayer, StatusConfigLayer,
	TunnelConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/wgctl/wgctl.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<WgctlConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<WgctlConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(WgctlConfigLayer::default())
	}
}

/// TOML file source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<WgctlConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(WgctlConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: WgctlConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: WGCTL_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<WgctlConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(WgctlConfigLayer {
			registry: Some(load_registry_from_env()),
			pool: Some(load_pool_from_env()),
			tunnel: Some(load_tunnel_from_env()?),
			daemon: Some(load_daemon_from_env()?),
			status: Some(load_status_from_env()?),
			logging: Some(load_logging_from_env()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}'"),
		}),
		None => Ok(None),
	}
}

/// Commands are given as whitespace-separated argv.
fn env_argv(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| v.split_whitespace().map(str::to_string).collect())
}

fn load_registry_from_env() -> RegistryConfigLayer {
	RegistryConfigLayer {
		config_path: env_var("WGCTL_REGISTRY_CONFIG_PATH").map(PathBuf::from),
		keys_path: env_var("WGCTL_REGISTRY_KEYS_PATH").map(PathBuf::from),
	}
}

fn load_pool_from_env() -> PoolConfigLayer {
	PoolConfigLayer {
		network: env_var("WGCTL_POOL_NETWORK"),
	}
}

fn load_tunnel_from_env() -> Result<TunnelConfigLayer, ConfigError> {
	Ok(TunnelConfigLayer {
		server_public_key: env_var("WGCTL_TUNNEL_SERVER_PUBLIC_KEY"),
		endpoint: env_var("WGCTL_TUNNEL_ENDPOINT"),
		dns: env_var("WGCTL_TUNNEL_DNS"),
		client_allowed_ips: env_var("WGCTL_TUNNEL_CLIENT_ALLOWED_IPS"),
		persistent_keepalive: env_parse("WGCTL_TUNNEL_PERSISTENT_KEEPALIVE")?,
	})
}

fn load_daemon_from_env() -> Result<DaemonConfigLayer, ConfigError> {
	Ok(DaemonConfigLayer {
		wg_binary: env_var("WGCTL_DAEMON_WG_BINARY"),
		reload_command: env_argv("WGCTL_DAEMON_RELOAD_COMMAND"),
		dump_command: env_argv("WGCTL_DAEMON_DUMP_COMMAND"),
		timeout_secs: env_parse("WGCTL_DAEMON_TIMEOUT_SECS")?,
	})
}

fn load_status_from_env() -> Result<StatusConfigLayer, ConfigError> {
	Ok(StatusConfigLayer {
		poll_interval_ms: env_parse("WGCTL_STATUS_POLL_INTERVAL_MS")?,
		connected_threshold_secs: env_parse("WGCTL_STATUS_CONNECTED_THRESHOLD_SECS")?,
		channel_capacity: env_parse("WGCTL_STATUS_CHANNEL_CAPACITY")?,
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("WGCTL_LOG_LEVEL"),
		json: env_bool("WGCTL_LOG_JSON"),
	}
}

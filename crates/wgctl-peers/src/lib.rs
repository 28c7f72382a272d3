// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer lifecycle and address management for a WireGuard endpoint.

pub mod allocator;
pub mod client_config;
pub mod daemon;
pub mod error;
mod fsio;
pub mod keystore;
pub mod lifecycle;
pub mod registry;
pub mod status;

pub use allocator::{AddressPool, AddressRejection, AllocationError};
pub use client_config::render_client_config;
pub use daemon::{parse_dump, CommandTunnelDaemon, DaemonError, TunnelDaemon};
pub use error::{ErrorKind, PeerError, Result};
pub use keystore::KeyStore;
pub use lifecycle::{AddPeerOutcome, ApplyStatus, NewPeer, PeerDetail, PeerService, RemovePeerOutcome};
pub use registry::{parse_peers, RegistryDocument, RegistryStore, RegistryTransaction};
pub use status::{ReconcilerState, StatusReconciler, StatusSubscription};

use std::sync::Arc;

use wgctl_config::WgctlConfig;

/// Everything a front end needs, wired from one resolved config.
#[derive(Clone)]
pub struct WgPeerServices {
	pub peers: Arc<PeerService>,
	pub status: Arc<StatusReconciler>,
	pub registry: Arc<RegistryStore>,
	pub config: Arc<WgctlConfig>,
}

impl WgPeerServices {
	/// Wire services against the real daemon commands from `config.daemon`.
	pub fn new(config: WgctlConfig) -> Self {
		let daemon = Arc::new(CommandTunnelDaemon::new(config.daemon.clone()));
		Self::with_daemon(config, daemon)
	}

	pub fn with_daemon(config: WgctlConfig, daemon: Arc<dyn TunnelDaemon>) -> Self {
		let config = Arc::new(config);
		let registry = Arc::new(RegistryStore::new(config.registry.config_path.clone()));
		let keys = Arc::new(KeyStore::new(config.registry.keys_path.clone()));
		let peers = Arc::new(PeerService::new(
			registry.clone(),
			keys,
			AddressPool::new(&config.pool),
			daemon.clone(),
			config.tunnel.clone(),
		));
		let status = Arc::new(StatusReconciler::new(
			daemon,
			registry.clone(),
			config.status.clone(),
		));

		Self {
			peers,
			status,
			registry,
			config,
		}
	}
}

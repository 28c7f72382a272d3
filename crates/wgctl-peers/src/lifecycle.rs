// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use wgctl_common::{default_peer_name, PeerRecord, PrivateKey, PublicKey, SecretString};
use wgctl_config::TunnelConfig;

use crate::allocator::AddressPool;
use crate::client_config::render_client_config;
use crate::daemon::{DaemonError, TunnelDaemon};
use crate::error::{PeerError, Result};
use crate::keystore::KeyStore;
use crate::registry::RegistryStore;

/// Whether the daemon picked up the latest registry write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ApplyStatus {
	Applied,
	/// The write is durable but the daemon has not loaded it yet.
	Pending { reason: String },
}

impl ApplyStatus {
	pub fn is_applied(&self) -> bool {
		matches!(self, ApplyStatus::Applied)
	}
}

#[derive(Debug, Clone, Default)]
pub struct NewPeer {
	pub name: Option<String>,
	pub address: Option<String>,
}

#[derive(Debug)]
pub struct AddPeerOutcome {
	pub peer: PeerRecord,
	/// `None` when the server public key cannot be determined.
	pub client_config: Option<SecretString>,
	pub apply: ApplyStatus,
}

#[derive(Debug)]
pub struct RemovePeerOutcome {
	pub peer: PeerRecord,
	pub apply: ApplyStatus,
}

/// One peer with whatever secret material is on file for it.
#[derive(Debug)]
pub struct PeerDetail {
	pub peer: PeerRecord,
	pub private_key: Option<PrivateKey>,
	pub client_config: Option<SecretString>,
}

fn normalize_name(name: Option<String>) -> Result<Option<String>> {
	let Some(name) = name else {
		return Ok(None);
	};
	let name = name.trim();
	if name.is_empty() {
		return Ok(None);
	}
	if name.chars().any(char::is_control) {
		return Err(PeerError::InvalidName(
			"name must not contain control characters".to_string(),
		));
	}
	Ok(Some(name.to_string()))
}

pub struct PeerService {
	registry: Arc<RegistryStore>,
	keys: Arc<KeyStore>,
	pool: AddressPool,
	daemon: Arc<dyn TunnelDaemon>,
	tunnel: TunnelConfig,
	server_key: OnceCell<PublicKey>,
	/// Bumped after every committed registry write.
	written_generation: AtomicU64,
	/// Highest write generation a successful reload is known to have seen.
	applied_generation: AtomicU64,
}

impl PeerService {
	pub fn new(
		registry: Arc<RegistryStore>,
		keys: Arc<KeyStore>,
		pool: AddressPool,
		daemon: Arc<dyn TunnelDaemon>,
		tunnel: TunnelConfig,
	) -> Self {
		Self {
			registry,
			keys,
			pool,
			daemon,
			tunnel,
			server_key: OnceCell::new(),
			written_generation: AtomicU64::new(0),
			applied_generation: AtomicU64::new(0),
		}
	}

	#[instrument(skip(self))]
	pub async fn list(&self) -> Result<Vec<PeerRecord>> {
		self.registry.records().await
	}

	#[instrument(skip(self))]
	pub async fn get(&self, ordinal: usize) -> Result<PeerDetail> {
		let peer = self
			.registry
			.records()
			.await?
			.into_iter()
			.find(|r| r.ordinal == ordinal)
			.ok_or(PeerError::PeerNotFound(ordinal))?;

		let private_key = self.keys.lookup(&peer.public_key).await?;
		let client_config = match &private_key {
			Some(private_key) => self.client_config(private_key, peer.address).await,
			None => None,
		};

		Ok(PeerDetail {
			peer,
			private_key,
			client_config,
		})
	}

	/// Create a peer: allocate or check its address, mint keys, persist, reload.
	#[instrument(skip(self, request), fields(requested_address = request.address.as_deref()))]
	pub async fn add(&self, request: NewPeer) -> Result<AddPeerOutcome> {
		let name = normalize_name(request.name)?;

		let (peer, private_key) = {
			let mut tx = self.registry.transaction().await?;
			let existing = tx.document().records();

			let address = match request.address.as_deref() {
				Some(requested) => self.pool.validate(requested, &existing)?,
				None => self.pool.next(&existing)?,
			};

			let (private_key, public_key) = self.daemon.generate_keypair().await?.into_parts();
			if existing.iter().any(|r| r.public_key == public_key) {
				return Err(PeerError::Internal(format!(
					"generated public key {public_key:?} is already registered"
				)));
			}

			self.keys.save(&public_key, &private_key).await?;

			let label = name.unwrap_or_else(|| default_peer_name(existing.len() + 1));
			tx.document_mut().append(&label, &public_key, address);
			let peer = tx
				.document()
				.records()
				.into_iter()
				.find(|r| r.public_key == public_key)
				.ok_or_else(|| PeerError::Internal("appended peer did not parse back".to_string()))?;
			tx.commit().await?;
			self.written_generation.fetch_add(1, Ordering::SeqCst);

			(peer, private_key)
		};

		info!(ordinal = peer.ordinal, address = %peer.address, public_key = ?peer.public_key, "peer added");

		let apply = self.apply().await;
		let client_config = self.client_config(&private_key, peer.address).await;

		Ok(AddPeerOutcome {
			peer,
			client_config,
			apply,
		})
	}

	/// Remove the peer at `ordinal`. Its stored private key is kept.
	#[instrument(skip(self))]
	pub async fn remove(&self, ordinal: usize) -> Result<RemovePeerOutcome> {
		let peer = {
			let mut tx = self.registry.transaction().await?;
			let peer = tx
				.document()
				.records()
				.into_iter()
				.find(|r| r.ordinal == ordinal)
				.ok_or(PeerError::PeerNotFound(ordinal))?;

			if !tx.document_mut().remove(&peer) {
				return Err(PeerError::Internal(format!(
					"peer {ordinal} vanished from the registry during removal"
				)));
			}
			tx.commit().await?;
			self.written_generation.fetch_add(1, Ordering::SeqCst);
			peer
		};

		info!(ordinal, address = %peer.address, public_key = ?peer.public_key, "peer removed");

		let apply = self.apply().await;
		Ok(RemovePeerOutcome { peer, apply })
	}

	/// Ask the daemon to reload again, typically after an earlier failure.
	#[instrument(skip(self))]
	pub async fn reapply(&self) -> Result<()> {
		self.reload().await?;
		info!("daemon configuration reapplied");
		Ok(())
	}

	/// True when a committed registry write has not been seen by a successful reload.
	pub fn reapply_pending(&self) -> bool {
		self.written_generation.load(Ordering::SeqCst)
			> self.applied_generation.load(Ordering::SeqCst)
	}

	/// The tunnel's public key: configured, or derived from the interface key.
	pub async fn server_public_key(&self) -> Result<PublicKey> {
		self.server_key
			.get_or_try_init(|| async {
				if let Some(configured) = &self.tunnel.server_public_key {
					return PublicKey::parse(configured.trim()).map_err(|e| {
						PeerError::Internal(format!("tunnel.server_public_key is invalid: {e}"))
					});
				}

				let document = self.registry.read().await?;
				let private_key = document.interface_private_key().ok_or_else(|| {
					PeerError::Internal(
						"registry has no [Interface] PrivateKey; set tunnel.server_public_key"
							.to_string(),
					)
				})?;
				Ok::<_, PeerError>(self.daemon.derive_public_key(&private_key).await?)
			})
			.await
			.cloned()
	}

	async fn client_config(&self, private_key: &PrivateKey, address: Ipv4Addr) -> Option<SecretString> {
		match self.server_public_key().await {
			Ok(server_key) => Some(render_client_config(
				private_key,
				address,
				&server_key,
				&self.tunnel,
			)),
			Err(e) => {
				warn!(error = %e, "server public key unavailable; omitting client config");
				None
			}
		}
	}

	/// Only writes committed before the reload started count as applied.
	async fn reload(&self) -> std::result::Result<(), DaemonError> {
		let seen = self.written_generation.load(Ordering::SeqCst);
		self.daemon.reload().await?;
		self.applied_generation.fetch_max(seen, Ordering::SeqCst);
		Ok(())
	}

	async fn apply(&self) -> ApplyStatus {
		match self.reload().await {
			Ok(()) => ApplyStatus::Applied,
			Err(e) => {
				warn!(error = %e, "daemon reload failed; change is saved but not yet applied");
				ApplyStatus::Pending {
					reason: e.to_string(),
				}
			}
		}
	}
}

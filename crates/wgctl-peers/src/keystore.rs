// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Private keys of issued peers, kept apart from the registry.
//!
//! On disk this is a flat JSON object of public key to private key. Entries are
//! only ever added; removing a peer leaves its key in place.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, error, instrument};
use wgctl_common::{PrivateKey, PublicKey};

use crate::error::{PeerError, Result};
use crate::fsio::{write_atomic, SECRET_FILE_MODE};

enum Contents {
	Missing,
	Parsed(BTreeMap<String, String>),
	Corrupt(serde_json::Error),
}

#[derive(Debug)]
pub struct KeyStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl KeyStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read_contents(&self) -> Result<Contents> {
		let text = match tokio::fs::read_to_string(&self.path).await {
			Ok(text) => text,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Contents::Missing),
			Err(e) => return Err(PeerError::key_store(&self.path, e)),
		};
		if text.trim().is_empty() {
			return Ok(Contents::Missing);
		}
		Ok(match serde_json::from_str(&text) {
			Ok(map) => Contents::Parsed(map),
			Err(e) => Contents::Corrupt(e),
		})
	}

	/// All stored keys. A missing or unreadable-as-JSON file yields an empty map.
	pub async fn load(&self) -> Result<BTreeMap<PublicKey, PrivateKey>> {
		match self.read_contents().await? {
			Contents::Missing => Ok(BTreeMap::new()),
			Contents::Parsed(map) => Ok(map
				.into_iter()
				.map(|(pk, sk)| (PublicKey::new(pk), PrivateKey::new(sk)))
				.collect()),
			Contents::Corrupt(e) => {
				error!(path = %self.path.display(), error = %e, "key store is not valid JSON; treating as empty");
				Ok(BTreeMap::new())
			}
		}
	}

	pub async fn lookup(&self, public_key: &PublicKey) -> Result<Option<PrivateKey>> {
		Ok(self.load().await?.remove(public_key))
	}

	/// Store a key, replacing any previous value for the same public key.
	///
	/// Refuses to write over a file that is present but not valid JSON.
	#[instrument(skip(self, private_key), fields(path = %self.path.display(), %public_key))]
	pub async fn save(&self, public_key: &PublicKey, private_key: &PrivateKey) -> Result<()> {
		let _guard = self.lock.lock().await;

		let mut map = match self.read_contents().await? {
			Contents::Missing => BTreeMap::new(),
			Contents::Parsed(map) => map,
			Contents::Corrupt(e) => {
				error!(error = %e, "refusing to overwrite corrupt key store");
				return Err(PeerError::key_store(
					&self.path,
					io::Error::new(io::ErrorKind::InvalidData, e),
				));
			}
		};
		map.insert(
			public_key.as_str().to_string(),
			private_key.expose().to_string(),
		);

		let json = serde_json::to_string_pretty(&map)
			.map_err(|e| PeerError::key_store(&self.path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
		drop(map);

		write_atomic(&self.path, json.as_bytes(), Some(SECRET_FILE_MODE))
			.await
			.map_err(|e| PeerError::key_store(&self.path, e))?;

		debug!("private key stored");
		Ok(())
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::secret::{Secret, SecretString};

const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum KeyError {
	#[error("invalid key length: expected 32 bytes, got {0}")]
	InvalidLength(usize),

	#[error("invalid base64 encoding: {0}")]
	InvalidBase64(#[from] base64::DecodeError),

	#[error("key is empty")]
	Empty,
}

pub type Result<T> = std::result::Result<T, KeyError>;

/// Checks that `s` is a padded base64 encoding of a 32-byte Curve25519 key,
/// the format `wg genkey` and `wg pubkey` print.
pub fn validate_key_encoding(s: &str) -> Result<()> {
	if s.is_empty() {
		return Err(KeyError::Empty);
	}
	let bytes = STANDARD.decode(s)?;
	if bytes.len() != KEY_LEN {
		return Err(KeyError::InvalidLength(bytes.len()));
	}
	Ok(())
}

/// Public identity of a peer.
///
/// Registry entries are treated as opaque strings and are not validated on
/// parse; a hand-edited registry with an odd key still round-trips.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(String);

impl PublicKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	pub fn parse(s: &str) -> Result<Self> {
		let trimmed = s.trim();
		validate_key_encoding(trimmed)?;
		Ok(Self(trimmed.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let prefix: String = self.0.chars().take(8).collect();
		f.debug_tuple("PublicKey")
			.field(&format!("{prefix}..."))
			.finish()
	}
}

impl fmt::Display for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Private key of a peer, kept behind [`Secret`].
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(SecretString);

impl PrivateKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(Secret::new(key.into()))
	}

	pub fn parse(s: &str) -> Result<Self> {
		let trimmed = s.trim();
		validate_key_encoding(trimmed)?;
		Ok(Self::new(trimmed))
	}

	pub fn expose(&self) -> &str {
		self.0.expose()
	}
}

impl fmt::Debug for PrivateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("PrivateKey").field(&self.0).finish()
	}
}

impl fmt::Display for PrivateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl Serialize for PrivateKey {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		self.0.serialize(serializer)
	}
}

#[derive(Clone)]
pub struct KeyPair {
	private: PrivateKey,
	public: PublicKey,
}

impl KeyPair {
	pub fn new(private: PrivateKey, public: PublicKey) -> Self {
		Self { private, public }
	}

	pub fn private_key(&self) -> &PrivateKey {
		&self.private
	}

	pub fn public_key(&self) -> &PublicKey {
		&self.public
	}

	pub fn into_parts(self) -> (PrivateKey, PublicKey) {
		(self.private, self.public)
	}
}

impl fmt::Debug for KeyPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyPair")
			.field("private", &self.private)
			.field("public", &self.public)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::secret::REDACTED;

	const SAMPLE_PUBLIC: &str = "INmRQAZI6vPcKW3FolLYSb0xOaPCb7TufQp6BdyuizY=";
	const SAMPLE_PRIVATE: &str = "yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=";

	#[test]
	fn parse_accepts_wg_encoded_keys() {
		assert!(PublicKey::parse(SAMPLE_PUBLIC).is_ok());
		assert!(PrivateKey::parse(&format!("{SAMPLE_PRIVATE}\n")).is_ok());
	}

	#[test]
	fn parse_rejects_wrong_length() {
		let err = PublicKey::parse("AAAA").unwrap_err();
		assert!(matches!(err, KeyError::InvalidLength(3)));
	}

	#[test]
	fn parse_rejects_non_base64() {
		assert!(matches!(
			PublicKey::parse("not a key!").unwrap_err(),
			KeyError::InvalidBase64(_)
		));
		assert!(matches!(PrivateKey::parse("  ").unwrap_err(), KeyError::Empty));
	}

	#[test]
	fn private_key_is_redacted_everywhere() {
		let key = PrivateKey::new(SAMPLE_PRIVATE);
		assert_eq!(format!("{key}"), REDACTED);
		assert!(!format!("{key:?}").contains(SAMPLE_PRIVATE));
		assert_eq!(serde_json::to_string(&key).unwrap(), "\"[REDACTED]\"");
		assert_eq!(key.expose(), SAMPLE_PRIVATE);
	}

	#[test]
	fn public_key_debug_shows_prefix() {
		let key = PublicKey::new(SAMPLE_PUBLIC);
		assert_eq!(format!("{key:?}"), "PublicKey(\"INmRQAZI...\")");
		assert_eq!(key.to_string(), SAMPLE_PUBLIC);
	}

	#[test]
	fn keypair_debug_hides_private_half() {
		let pair = KeyPair::new(PrivateKey::new(SAMPLE_PRIVATE), PublicKey::new(SAMPLE_PUBLIC));
		let debug = format!("{pair:?}");
		assert!(!debug.contains(SAMPLE_PRIVATE));
		assert!(debug.contains(REDACTED));
	}
}

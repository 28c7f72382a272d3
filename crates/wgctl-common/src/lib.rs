// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared types for the wgctl control plane.
//!
//! - [`Secret<T>`]: redacting, zeroizing wrapper for private key material
//! - [`PublicKey`], [`PrivateKey`], [`KeyPair`]: peer identities and credentials
//! - [`PeerRecord`]: one peer as parsed from the registry
//! - [`ConnectionSnapshot`]: live per-peer connection state

pub mod keys;
pub mod peer;
pub mod secret;
pub mod status;

pub use keys::{validate_key_encoding, KeyError, KeyPair, PrivateKey, PublicKey};
pub use peer::{default_peer_name, PeerRecord};
pub use secret::{Secret, SecretString, REDACTED};
pub use status::{ConnectionSnapshot, PeerStatus, SessionTelemetry};

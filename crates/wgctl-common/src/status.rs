// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::PublicKey;

/// One peer line of the daemon's live dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTelemetry {
	pub public_key: PublicKey,
	pub endpoint: Option<String>,
	pub allowed_ips: String,
	/// Unix seconds; zero means the peer never completed a handshake.
	pub latest_handshake: u64,
	pub rx_bytes: u64,
	pub tx_bytes: u64,
	pub persistent_keepalive: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
	pub connected: bool,
	/// `None` when the peer never handshaked.
	pub last_handshake_age_secs: Option<u64>,
	pub bytes_received: u64,
	pub bytes_sent: u64,
}

impl PeerStatus {
	pub fn classify(session: &SessionTelemetry, now: DateTime<Utc>, threshold_secs: u64) -> Self {
		let age = if session.latest_handshake == 0 {
			None
		} else {
			let now_secs = u64::try_from(now.timestamp()).unwrap_or(0);
			Some(now_secs.saturating_sub(session.latest_handshake))
		};

		Self {
			connected: matches!(age, Some(age) if age < threshold_secs),
			last_handshake_age_secs: age,
			bytes_received: session.rx_bytes,
			bytes_sent: session.tx_bytes,
		}
	}

	/// Status for a registered peer the daemon did not report.
	pub fn absent() -> Self {
		Self {
			connected: false,
			last_handshake_age_secs: None,
			bytes_received: 0,
			bytes_sent: 0,
		}
	}
}

/// Point-in-time connection state, replaced wholesale on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
	pub taken_at: DateTime<Utc>,
	pub peers: BTreeMap<PublicKey, PeerStatus>,
}

impl ConnectionSnapshot {
	pub fn empty(taken_at: DateTime<Utc>) -> Self {
		Self {
			taken_at,
			peers: BTreeMap::new(),
		}
	}

	/// Classifies every reported session, then marks registered peers missing
	/// from the dump as disconnected.
	pub fn from_sessions<'a>(
		sessions: &[SessionTelemetry],
		known: impl IntoIterator<Item = &'a PublicKey>,
		taken_at: DateTime<Utc>,
		threshold_secs: u64,
	) -> Self {
		let mut peers: BTreeMap<PublicKey, PeerStatus> = sessions
			.iter()
			.map(|s| {
				(
					s.public_key.clone(),
					PeerStatus::classify(s, taken_at, threshold_secs),
				)
			})
			.collect();

		for key in known {
			peers
				.entry(key.clone())
				.or_insert_with(PeerStatus::absent);
		}

		Self { taken_at, peers }
	}

	pub fn get(&self, key: &PublicKey) -> Option<&PeerStatus> {
		self.peers.get(key)
	}

	pub fn is_connected(&self, key: &PublicKey) -> bool {
		self.get(key).map(|s| s.connected).unwrap_or(false)
	}

	pub fn connected_count(&self) -> usize {
		self.peers.values().filter(|s| s.connected).count()
	}

	pub fn is_empty(&self) -> bool {
		self.peers.is_empty()
	}
}

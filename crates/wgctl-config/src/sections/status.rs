// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Live status polling configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
/// A peer counts as connected while its last handshake is younger than this.
const DEFAULT_CONNECTED_THRESHOLD_SECS: u64 = 180;
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusConfigLayer {
	pub poll_interval_ms: Option<u64>,
	pub connected_threshold_secs: Option<u64>,
	pub channel_capacity: Option<usize>,
}

impl StatusConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.poll_interval_ms.is_some() {
			self.poll_interval_ms = other.poll_interval_ms;
		}
		if other.connected_threshold_secs.is_some() {
			self.connected_threshold_secs = other.connected_threshold_secs;
		}
		if other.channel_capacity.is_some() {
			self.channel_capacity = other.channel_capacity;
		}
	}

	pub fn finalize(self) -> StatusConfig {
		StatusConfig {
			poll_interval_ms: self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
			connected_threshold_secs: self
				.connected_threshold_secs
				.unwrap_or(DEFAULT_CONNECTED_THRESHOLD_SECS),
			channel_capacity: self.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusConfig {
	pub poll_interval_ms: u64,
	pub connected_threshold_secs: u64,
	pub channel_capacity: usize,
}

impl StatusConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

impl Default for StatusConfig {
	fn default() -> Self {
		StatusConfigLayer::default().finalize()
	}
}

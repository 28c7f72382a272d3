// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Address assignment inside the tunnel's `/16` pool.
//!
//! Hosts are `prefix.c.d` with `c` in `0..=255` and `d` in `1..=254`. The first
//! host is the tunnel endpoint itself and is never handed out.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use thiserror::Error;
use wgctl_common::PeerRecord;
use wgctl_config::PoolConfig;

const MIN_HOST_OCTET: u8 = 1;
const MAX_HOST_OCTET: u8 = 254;

/// Why a requested address was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressRejection {
	#[error("'{0}' is not an IPv4 address")]
	Malformed(String),

	#[error("address {address} is outside the pool {pool}")]
	OutsidePool { address: Ipv4Addr, pool: Ipv4Net },

	#[error("address {0} has a host octet outside 1-254")]
	HostOutOfRange(Ipv4Addr),

	#[error("address is reserved for the tunnel endpoint")]
	Reserved,

	#[error("address {0} is already in use")]
	InUse(Ipv4Addr),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
	#[error("address pool exhausted")]
	PoolExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPool {
	network: Ipv4Net,
}

impl Default for AddressPool {
	fn default() -> Self {
		Self::new(&PoolConfig::default())
	}
}

impl AddressPool {
	pub fn new(config: &PoolConfig) -> Self {
		Self {
			network: config.network.trunc(),
		}
	}

	pub fn network(&self) -> Ipv4Net {
		self.network
	}

	/// The tunnel endpoint's own address.
	pub fn reserved(&self) -> Ipv4Addr {
		self.host(0, 1)
	}

	/// First address handed to a peer on an empty registry.
	pub fn first(&self) -> Ipv4Addr {
		self.host(0, 2)
	}

	fn host(&self, third: u8, fourth: u8) -> Ipv4Addr {
		let [a, b, _, _] = self.network.network().octets();
		Ipv4Addr::new(a, b, third, fourth)
	}

	/// Next address after the last record in registry order.
	///
	/// Gaps left by removed peers are not reclaimed. Addresses that are already
	/// held (for example a manual assignment ahead of the counter) are skipped.
	pub fn next(&self, existing: &[PeerRecord]) -> Result<Ipv4Addr, AllocationError> {
		let Some(last) = existing.last() else {
			return Ok(self.first());
		};

		let in_use: HashSet<Ipv4Addr> = existing.iter().map(|r| r.address).collect();
		let [_, _, mut third, mut fourth] = last.address.octets();

		loop {
			(third, fourth) = advance(third, fourth).ok_or(AllocationError::PoolExhausted)?;
			let candidate = self.host(third, fourth);
			if candidate != self.reserved() && !in_use.contains(&candidate) {
				return Ok(candidate);
			}
		}
	}

	/// Check an operator-requested address against the pool and the registry.
	pub fn validate(
		&self,
		candidate: &str,
		existing: &[PeerRecord],
	) -> Result<Ipv4Addr, AddressRejection> {
		let trimmed = candidate.trim();
		let address: Ipv4Addr = trimmed
			.parse()
			.map_err(|_| AddressRejection::Malformed(trimmed.to_string()))?;

		if !self.network.contains(&address) {
			return Err(AddressRejection::OutsidePool {
				address,
				pool: self.network,
			});
		}

		let fourth = address.octets()[3];
		if !(MIN_HOST_OCTET..=MAX_HOST_OCTET).contains(&fourth) {
			return Err(AddressRejection::HostOutOfRange(address));
		}

		if address == self.reserved() {
			return Err(AddressRejection::Reserved);
		}

		if existing.iter().any(|r| r.address == address) {
			return Err(AddressRejection::InUse(address));
		}

		Ok(address)
	}
}

/// Step the host octets forward; `None` once the pool is used up.
fn advance(third: u8, fourth: u8) -> Option<(u8, u8)> {
	if fourth >= MAX_HOST_OCTET {
		third.checked_add(1).map(|t| (t, MIN_HOST_OCTET))
	} else {
		Some((third, fourth + 1))
	}
}

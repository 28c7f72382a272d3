// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use thiserror::Error;

use crate::allocator::{AddressRejection, AllocationError};
use crate::daemon::DaemonError;

#[derive(Error, Debug)]
pub enum PeerError {
	#[error("invalid address: {0}")]
	InvalidAddress(#[from] AddressRejection),

	#[error("invalid peer name: {0}")]
	InvalidName(String),

	#[error("peer {0} not found")]
	PeerNotFound(usize),

	#[error("registry {path} unavailable: {source}")]
	Registry {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("key store {path} unavailable: {source}")]
	KeyStore {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("tunnel daemon error: {0}")]
	Daemon(#[from] DaemonError),

	#[error("address allocation failed: {0}")]
	Allocation(#[from] AllocationError),

	#[error("internal error: {0}")]
	Internal(String),
}

/// How a caller should surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Bad request; never retried automatically.
	ClientInput,
	/// Backing store unreadable or unwritable; the whole call may be retried.
	ServiceUnavailable,
	/// The tunnel daemon failed or timed out.
	ExternalTool,
	Internal,
}

impl PeerError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			PeerError::InvalidAddress(_) | PeerError::InvalidName(_) | PeerError::PeerNotFound(_) => {
				ErrorKind::ClientInput
			}
			PeerError::Registry { .. } | PeerError::KeyStore { .. } => ErrorKind::ServiceUnavailable,
			PeerError::Daemon(_) => ErrorKind::ExternalTool,
			PeerError::Allocation(_) | PeerError::Internal(_) => ErrorKind::Internal,
		}
	}

	pub(crate) fn registry(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		PeerError::Registry {
			path: path.into(),
			source,
		}
	}

	pub(crate) fn key_store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		PeerError::KeyStore {
			path: path.into(),
			source,
		}
	}
}

pub type Result<T> = std::result::Result<T, PeerError>;

#[cfg(test)]
mod tests {
	use super::*;
	use std::io;

	#[test]
	fn kinds_follow_taxonomy() {
		assert_eq!(
			PeerError::InvalidAddress(AddressRejection::Reserved).kind(),
			ErrorKind::ClientInput
		);
		assert_eq!(PeerError::PeerNotFound(4).kind(), ErrorKind::ClientInput);
		assert_eq!(
			PeerError::registry("/tmp/wg0.conf", io::Error::from(io::ErrorKind::NotFound)).kind(),
			ErrorKind::ServiceUnavailable
		);
		assert_eq!(
			PeerError::Daemon(DaemonError::Timeout {
				operation: "reload",
				after_secs: 10
			})
			.kind(),
			ErrorKind::ExternalTool
		);
		assert_eq!(
			PeerError::Allocation(AllocationError::PoolExhausted).kind(),
			ErrorKind::Internal
		);
	}

	#[test]
	fn rejection_reason_is_in_message() {
		let err = PeerError::from(AddressRejection::InUse("10.10.0.2".parse().unwrap()));
		assert_eq!(
			err.to_string(),
			"invalid address: address 10.10.0.2 is already in use"
		);
	}
}

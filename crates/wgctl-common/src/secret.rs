// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper for private key material and rendered client configurations.
//!
//! A [`Secret<T>`] never shows its contents through `Debug`, `Display` or
//! `Serialize`, and zeroes its memory on drop. The inner value is only
//! reachable through [`Secret::expose`], which keeps every read of a private
//! key visible at the call site.
//!
//! ```
//! use wgctl_common::Secret;
//!
//! let key = Secret::new("oK56DE9Ue9zK76rAc8pBl6opph+1v36lm7cXXsQKrQM=".to_string());
//! assert_eq!(format!("{key}"), "[REDACTED]");
//! assert!(key.expose().ends_with('='));
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// The redaction placeholder used in all output.
pub const REDACTED: &str = "[REDACTED]";

#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Explicitly access the inner value.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

impl<T> Serialize for Secret<T>
where
	T: Zeroize,
{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl<'de, T> Deserialize<'de> for Secret<T>
where
	T: Deserialize<'de> + Zeroize,
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		T::deserialize(deserializer).map(Secret::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn debug_and_display_are_redacted() {
		let secret = Secret::new("yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=".to_string());

		assert_eq!(format!("{secret}"), REDACTED);
		assert_eq!(format!("{secret:?}"), "Secret(\"[REDACTED]\")");
	}

	#[test]
	fn option_secret_debug_is_redacted() {
		let secret: Option<SecretString> = Some(Secret::new("hunter2".to_string()));
		let debug = format!("{secret:?}");
		assert!(debug.contains(REDACTED));
		assert!(!debug.contains("hunter2"));
	}

	#[test]
	fn serialize_is_redacted() {
		let secret = Secret::new("hunter2".to_string());
		let json = serde_json::to_string(&secret).unwrap();
		assert_eq!(json, "\"[REDACTED]\"");
	}

	#[test]
	fn deserialize_populates_secret() {
		let secret: SecretString = serde_json::from_str("\"hunter2\"").unwrap();
		assert_eq!(secret.expose(), "hunter2");
	}

	proptest! {
			#[test]
			fn debug_never_contains_secret(inner in "[a-zA-Z0-9+/=]{8,64}") {
					prop_assume!(!inner.contains("REDACTED"));
					prop_assume!(!inner.contains("Secret"));

					let secret = Secret::new(inner.clone());
					let debug_out = format!("{:?}", secret);
					let display_out = format!("{}", secret);
					prop_assert!(!debug_out.contains(&inner));
					prop_assert!(!display_out.contains(&inner));
			}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::trace;

/// Permission bits for files that hold private keys.
pub(crate) const SECRET_FILE_MODE: u32 = 0o600;

fn temp_path(path: &Path) -> PathBuf {
	let mut name = OsString::from(".");
	name.push(path.file_name().unwrap_or_default());
	name.push(".tmp");
	path.with_file_name(name)
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
///
/// With `mode` unset the existing file's permissions are carried over.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8], mode: Option<u32>) -> io::Result<()> {
	let tmp = temp_path(path);

	#[cfg(unix)]
	let mode = match mode {
		Some(mode) => Some(mode),
		None => {
			use std::os::unix::fs::PermissionsExt;
			match tokio::fs::metadata(path).await {
				Ok(meta) => Some(meta.permissions().mode() & 0o777),
				Err(e) if e.kind() == io::ErrorKind::NotFound => None,
				Err(e) => return Err(e),
			}
		}
	};

	let result = async {
		let mut options = tokio::fs::OpenOptions::new();
		options.write(true).create(true).truncate(true);
		#[cfg(unix)]
		{
			if let Some(mode) = mode {
				options.mode(mode);
			}
		}
		#[cfg(not(unix))]
		let _ = mode;

		let mut file = options.open(&tmp).await?;
		file.write_all(contents).await?;
		file.sync_all().await?;
		drop(file);

		// `mode` on open only applies to newly created files.
		#[cfg(unix)]
		{
			if let Some(mode) = mode {
				use std::os::unix::fs::PermissionsExt;
				tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(mode)).await?;
			}
		}

		tokio::fs::rename(&tmp, path).await
	}
	.await;

	if result.is_err() {
		let _ = tokio::fs::remove_file(&tmp).await;
	}

	trace!(path = %path.display(), ok = result.is_ok(), "atomic write finished");
	result
}

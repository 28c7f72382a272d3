// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod peers;
pub mod status;

use wgctl_peers::{ApplyStatus, WgPeerServices};

pub struct CliContext {
	pub services: WgPeerServices,
	pub json: bool,
}

pub(crate) fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

pub(crate) fn describe_apply(apply: &ApplyStatus) -> String {
	match apply {
		ApplyStatus::Applied => "applied".to_string(),
		ApplyStatus::Pending { reason } => {
			format!("saved, not yet applied ({reason}); run `wgctl reapply`")
		}
	}
}

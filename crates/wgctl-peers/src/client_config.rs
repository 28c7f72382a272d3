// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt::Write;
use std::net::Ipv4Addr;

use wgctl_common::{PrivateKey, PublicKey, SecretString};
use wgctl_config::TunnelConfig;

/// Render the config file a client imports to join the tunnel.
///
/// The result embeds the client's private key, so it comes back wrapped and is
/// never written anywhere by this crate.
pub fn render_client_config(
	private_key: &PrivateKey,
	address: Ipv4Addr,
	server_public_key: &PublicKey,
	tunnel: &TunnelConfig,
) -> SecretString {
	let mut out = String::new();
	// Writing to a String cannot fail.
	let _ = writeln!(out, "[Interface]");
	let _ = writeln!(out, "PrivateKey = {}", private_key.expose());
	let _ = writeln!(out, "Address = {address}/32");
	let _ = writeln!(out, "DNS = {}", tunnel.dns);
	let _ = writeln!(out);
	let _ = writeln!(out, "[Peer]");
	let _ = writeln!(out, "PublicKey = {server_public_key}");
	let _ = writeln!(out, "Endpoint = {}", tunnel.endpoint);
	let _ = writeln!(out, "AllowedIPs = {}", tunnel.client_allowed_ips);
	if tunnel.persistent_keepalive > 0 {
		let _ = writeln!(out, "PersistentKeepalive = {}", tunnel.persistent_keepalive);
	}
	SecretString::new(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	const CLIENT_PRIV: &str = "yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=";
	const SERVER_PUB: &str = "INmRQAZI6vPcKW3FolLYSb0xOaPCb7TufQp6BdyuizY=";

	#[test]
	fn renders_default_tunnel_settings() {
		let config = render_client_config(
			&PrivateKey::new(CLIENT_PRIV),
			Ipv4Addr::new(10, 10, 0, 2),
			&PublicKey::new(SERVER_PUB),
			&TunnelConfig::default(),
		);

		let expected = format!(
			"[Interface]\nPrivateKey = {CLIENT_PRIV}\nAddress = 10.10.0.2/32\nDNS = 1.1.1.1\n\n\
			 [Peer]\nPublicKey = {SERVER_PUB}\nEndpoint = YOUR_SERVER_IP:51820\nAllowedIPs = 0.0.0.0/0\n\
			 PersistentKeepalive = 25\n"
		);
		assert_eq!(config.expose(), &expected);
	}

	#[test]
	fn zero_keepalive_is_omitted() {
		let tunnel = TunnelConfig {
			persistent_keepalive: 0,
			endpoint: "vpn.example.com:51820".to_string(),
			..TunnelConfig::default()
		};
		let config = render_client_config(
			&PrivateKey::new(CLIENT_PRIV),
			Ipv4Addr::new(10, 10, 3, 7),
			&PublicKey::new(SERVER_PUB),
			&tunnel,
		);
		assert!(!config.expose().contains("PersistentKeepalive"));
		assert!(config.expose().contains("Endpoint = vpn.example.com:51820\n"));
		assert!(config.expose().contains("Address = 10.10.3.7/32\n"));
	}

	#[test]
	fn debug_output_hides_private_key() {
		let config = render_client_config(
			&PrivateKey::new(CLIENT_PRIV),
			Ipv4Addr::new(10, 10, 0, 2),
			&PublicKey::new(SERVER_PUB),
			&TunnelConfig::default(),
		);
		assert!(!format!("{config:?}").contains(CLIENT_PRIV));
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tunnel interface config file as the durable peer registry.
//!
//! The file is held as a preamble (everything before the first peer block)
//! followed by blocks. A block is the raw text of one section, from its `# label`
//! line (when one sits directly above the header) up to the next block. Blank
//! and comment lines further up belong to whatever precedes them. Rendering
//! concatenates the raw text, so untouched blocks are written back byte for byte.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};
use wgctl_common::{PeerRecord, PrivateKey, PublicKey};

use crate::error::{PeerError, Result};
use crate::fsio::write_atomic;

const PEER_HEADER: &str = "[Peer]";
const INTERFACE_HEADER: &str = "[Interface]";

#[derive(Debug, Clone, PartialEq, Eq)]
struct PeerEntry {
	name: Option<String>,
	public_key: PublicKey,
	allowed_ips: String,
	address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
	raw: String,
	/// `None` for sections that are not a usable peer.
	entry: Option<PeerEntry>,
}

/// Parsed registry that remembers the exact text it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDocument {
	preamble: String,
	blocks: Vec<Block>,
}

fn is_section_header(line: &str) -> bool {
	let line = line.trim();
	line.starts_with('[') && line.ends_with(']')
}

fn is_peer_header(line: &str) -> bool {
	line.trim().eq_ignore_ascii_case(PEER_HEADER)
}

fn is_comment(line: &str) -> bool {
	let line = line.trim_start();
	line.starts_with('#') || line.starts_with(';')
}

fn is_label_line(line: &str) -> bool {
	line.trim_start().starts_with('#')
}

/// `Key = Value` with a case-insensitive key. Values keep their `=` padding.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
	if is_comment(line) {
		return None;
	}
	let (k, v) = line.split_once('=')?;
	k.trim().eq_ignore_ascii_case(key).then(|| v.trim())
}

/// Host part of the first entry of an AllowedIPs list.
fn first_address(allowed_ips: &str) -> Option<Ipv4Addr> {
	let first = allowed_ips.split(',').next()?.trim();
	let host = first.split('/').next()?.trim();
	host.parse().ok()
}

/// The `# label` line directly above the header, if any.
fn label(lead: &[&str]) -> Option<String> {
	lead
		.last()
		.filter(|l| is_label_line(l))
		.map(|l| l.trim_start().trim_start_matches('#').trim().to_string())
		.filter(|l| !l.is_empty())
}

fn parse_peer_block(lines: &[&str], header: usize) -> Option<PeerEntry> {
	let mut public_keys = Vec::new();
	let mut allowed = Vec::new();
	for line in &lines[header + 1..] {
		if let Some(v) = field(line, "PublicKey") {
			public_keys.push(v);
		} else if let Some(v) = field(line, "AllowedIPs") {
			allowed.push(v);
		}
	}

	let (public_key, allowed_ips) = match (public_keys.as_slice(), allowed.as_slice()) {
		([pk], [ips]) if !pk.is_empty() && !ips.is_empty() => (*pk, *ips),
		_ => {
			warn!(
				public_keys = public_keys.len(),
				allowed_ips = allowed.len(),
				"skipping peer block without exactly one PublicKey and one AllowedIPs"
			);
			return None;
		}
	};

	let Some(address) = first_address(allowed_ips) else {
		warn!(%allowed_ips, "skipping peer block without an IPv4 address");
		return None;
	};

	Some(PeerEntry {
		name: label(&lines[..header]),
		public_key: PublicKey::new(public_key),
		allowed_ips: allowed_ips.to_string(),
		address,
	})
}

impl RegistryDocument {
	pub fn parse(text: &str) -> Self {
		let lines: Vec<&str> = text.split_inclusive('\n').collect();

		// Where each block starts: its header, or the label line directly above it.
		let mut starts = Vec::new();
		let mut seen_peer = false;
		for (i, line) in lines.iter().enumerate() {
			if !is_section_header(line) {
				continue;
			}
			if !seen_peer && !is_peer_header(line) {
				continue;
			}
			seen_peer = true;

			let floor = starts.last().map(|(_, h)| h + 1).unwrap_or(0);
			let start = if i > floor && is_label_line(lines[i - 1]) {
				i - 1
			} else {
				i
			};
			starts.push((start, i));
		}

		let preamble_end = starts.first().map(|(s, _)| *s).unwrap_or(lines.len());
		let preamble = lines[..preamble_end].concat();

		let mut blocks = Vec::with_capacity(starts.len());
		for (n, (start, header)) in starts.iter().enumerate() {
			let end = starts.get(n + 1).map(|(s, _)| *s).unwrap_or(lines.len());
			let slice = &lines[*start..end];
			let header_at = header - start;
			let entry = if is_peer_header(slice[header_at]) {
				parse_peer_block(slice, header_at)
			} else {
				None
			};
			blocks.push(Block {
				raw: slice.concat(),
				entry,
			});
		}

		Self { preamble, blocks }
	}

	/// Valid peers in file order with dense 1-based ordinals.
	pub fn records(&self) -> Vec<PeerRecord> {
		self
			.blocks
			.iter()
			.filter_map(|b| b.entry.as_ref())
			.enumerate()
			.map(|(i, e)| PeerRecord {
				ordinal: i + 1,
				name: e.name.clone(),
				public_key: e.public_key.clone(),
				allowed_ips: e.allowed_ips.clone(),
				address: e.address,
			})
			.collect()
	}

	pub fn render(&self) -> String {
		let mut out = self.preamble.clone();
		for block in &self.blocks {
			out.push_str(&block.raw);
		}
		out
	}

	/// Append a peer block in the registry's canonical layout.
	pub fn append(&mut self, label: &str, public_key: &PublicKey, address: Ipv4Addr) {
		let fragment = format!(
			"\n# {label}\n{PEER_HEADER}\nPublicKey = {public_key}\nAllowedIPs = {address}/32\n"
		);
		let mut text = self.render();
		text.push_str(&fragment);
		*self = Self::parse(&text);
	}

	/// Drop the block matching the record's public key and allowed range.
	///
	/// Returns `false` when no block matches. When several blocks carry the same
	/// key and range, the one at the record's ordinal is preferred.
	pub fn remove(&mut self, record: &PeerRecord) -> bool {
		let mut ordinal = 0;
		let mut target = None;
		for (i, block) in self.blocks.iter().enumerate() {
			let Some(entry) = &block.entry else {
				continue;
			};
			ordinal += 1;
			if entry.public_key == record.public_key && entry.allowed_ips == record.allowed_ips {
				if ordinal == record.ordinal {
					target = Some(i);
					break;
				}
				target.get_or_insert(i);
			}
		}

		match target {
			Some(i) => {
				self.blocks.remove(i);
				true
			}
			None => false,
		}
	}

	/// Number of sections after the preamble that did not parse as a peer.
	pub fn skipped_blocks(&self) -> usize {
		self.blocks.iter().filter(|b| b.entry.is_none()).count()
	}

	/// The interface's own `PrivateKey`, used to derive the server public key.
	pub fn interface_private_key(&self) -> Option<PrivateKey> {
		let mut in_interface = false;
		for line in self.preamble.lines() {
			if is_section_header(line) {
				in_interface = line.trim().eq_ignore_ascii_case(INTERFACE_HEADER);
				continue;
			}
			if in_interface {
				if let Some(v) = field(line, "PrivateKey") {
					if !v.is_empty() {
						return Some(PrivateKey::new(v));
					}
				}
			}
		}
		None
	}
}

/// Parse just the peer records out of registry text.
pub fn parse_peers(text: &str) -> Vec<PeerRecord> {
	RegistryDocument::parse(text).records()
}

/// File-backed registry with a single mutation lock.
///
/// Readers that only need a consistent snapshot use [`RegistryStore::read`].
/// Anything that writes goes through [`RegistryStore::transaction`].
#[derive(Debug)]
pub struct RegistryStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl RegistryStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Read without taking the mutation lock.
	pub async fn read(&self) -> Result<RegistryDocument> {
		let text = tokio::fs::read_to_string(&self.path)
			.await
			.map_err(|e| PeerError::registry(&self.path, e))?;
		let document = RegistryDocument::parse(&text);
		debug!(
			path = %self.path.display(),
			peers = document.records().len(),
			skipped = document.skipped_blocks(),
			"registry read"
		);
		Ok(document)
	}

	pub async fn records(&self) -> Result<Vec<PeerRecord>> {
		Ok(self.read().await?.records())
	}

	/// Lock, then load. The lock is held until the transaction is dropped or
	/// committed.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn transaction(&self) -> Result<RegistryTransaction<'_>> {
		let guard = self.lock.lock().await;
		let document = self.read().await?;
		Ok(RegistryTransaction {
			store: self,
			_guard: guard,
			document,
		})
	}
}

pub struct RegistryTransaction<'a> {
	store: &'a RegistryStore,
	_guard: MutexGuard<'a, ()>,
	document: RegistryDocument,
}

impl RegistryTransaction<'_> {
	pub fn document(&self) -> &RegistryDocument {
		&self.document
	}

	pub fn document_mut(&mut self) -> &mut RegistryDocument {
		&mut self.document
	}

	/// Write the document back and release the lock.
	pub async fn commit(self) -> Result<()> {
		let path = &self.store.path;
		write_atomic(path, self.document.render().as_bytes(), None)
			.await
			.map_err(|e| PeerError::registry(path, e))?;
		debug!(path = %path.display(), "registry committed");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use tempfile::TempDir;

	const KEY_A: &str = "INmRQAZI6vPcKW3FolLYSb0xOaPCb7TufQp6BdyuizY=";
	const KEY_B: &str = "oK56DE9Ue9zK76rAc8pBl6opph+1v36lm7cXXsQKrQM=";
	const KEY_C: &str = "yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=";

	fn sample() -> String {
		format!(
			"[Interface]\n\
			 Address = 10.10.0.1/16\n\
			 ListenPort = 51820\n\
			 PrivateKey = {KEY_C}\n\
			 \n\
			 # laptop\n\
			 [Peer]\n\
			 PublicKey = {KEY_A}\n\
			 AllowedIPs = 10.10.0.2/32\n\
			 \n\
			 # phone\n\
			 [Peer]\n\
			 PublicKey = {KEY_B}\n\
			 AllowedIPs = 10.10.0.3/32\n"
		)
	}

	#[test]
	fn parses_records_with_labels() {
		let records = parse_peers(&sample());
		assert_eq!(records.len(), 2);
		assert_eq!(records[0].ordinal, 1);
		assert_eq!(records[0].name.as_deref(), Some("laptop"));
		assert_eq!(records[0].public_key.as_str(), KEY_A);
		assert_eq!(records[0].address, Ipv4Addr::new(10, 10, 0, 2));
		assert_eq!(records[1].ordinal, 2);
		assert_eq!(records[1].allowed_ips, "10.10.0.3/32");
	}

	#[test]
	fn render_reproduces_input_exactly() {
		let text = sample();
		assert_eq!(RegistryDocument::parse(&text).render(), text);

		let odd = "no trailing newline\n[Peer]\r\nPublicKey = x\r\nAllowedIPs = 10.10.0.9/32";
		assert_eq!(RegistryDocument::parse(odd).render(), odd);
	}

	#[test]
	fn empty_registry_has_no_records() {
		assert!(parse_peers("").is_empty());
		assert!(parse_peers("[Interface]\nListenPort = 51820\n").is_empty());
	}

	#[test]
	fn invalid_blocks_are_skipped_but_kept() {
		let text = format!(
			"# broken\n[Peer]\nPublicKey = {KEY_A}\n\n[Peer]\nPublicKey = {KEY_B}\nAllowedIPs = 10.10.0.5/32\n\n\
			 [Peer]\nPublicKey = {KEY_C}\nPublicKey = {KEY_C}\nAllowedIPs = 10.10.0.6/32\n"
		);
		let doc = RegistryDocument::parse(&text);
		let records = doc.records();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].ordinal, 1);
		assert_eq!(records[0].address, Ipv4Addr::new(10, 10, 0, 5));
		assert_eq!(doc.skipped_blocks(), 2);
		assert_eq!(doc.render(), text);
	}

	#[test]
	fn ipv6_only_block_is_skipped() {
		let text = format!("[Peer]\nPublicKey = {KEY_A}\nAllowedIPs = fd00::2/128\n");
		assert!(parse_peers(&text).is_empty());
	}

	#[test]
	fn address_comes_from_first_range() {
		let text = format!("[Peer]\nPublicKey = {KEY_A}\nAllowedIPs = 10.10.3.4/32, fd00::4/128\n");
		let records = parse_peers(&text);
		assert_eq!(records[0].address, Ipv4Addr::new(10, 10, 3, 4));
		assert_eq!(records[0].allowed_ips, "10.10.3.4/32, fd00::4/128");
	}

	#[test]
	fn fields_are_case_insensitive() {
		let text = format!("[peer]\npublickey={KEY_A}\nallowedips=10.10.0.7/32\n");
		let records = parse_peers(&text);
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].public_key.as_str(), KEY_A);
	}

	#[test]
	fn append_uses_canonical_layout() {
		let text = sample();
		let mut doc = RegistryDocument::parse(&text);
		doc.append(
			"Client 3",
			&PublicKey::new(KEY_C),
			Ipv4Addr::new(10, 10, 0, 4),
		);

		let expected = format!(
			"{text}\n# Client 3\n[Peer]\nPublicKey = {KEY_C}\nAllowedIPs = 10.10.0.4/32\n"
		);
		assert_eq!(doc.render(), expected);

		let records = doc.records();
		assert_eq!(records.len(), 3);
		assert_eq!(records[2].ordinal, 3);
		assert_eq!(records[2].name.as_deref(), Some("Client 3"));
	}

	#[test]
	fn remove_keeps_other_blocks_byte_identical() {
		let text = sample();
		let mut doc = RegistryDocument::parse(&text);
		let first = doc.records().remove(0);
		assert!(doc.remove(&first));

		let expected = format!(
			"[Interface]\nAddress = 10.10.0.1/16\nListenPort = 51820\nPrivateKey = {KEY_C}\n\
			 \n# phone\n[Peer]\nPublicKey = {KEY_B}\nAllowedIPs = 10.10.0.3/32\n"
		);
		assert_eq!(doc.render(), expected);
		assert_eq!(doc.records()[0].ordinal, 1);
	}

	#[test]
	fn append_then_remove_leaves_only_the_separator() {
		let text = sample();
		let mut doc = RegistryDocument::parse(&text);
		doc.append("tmp", &PublicKey::new(KEY_C), Ipv4Addr::new(10, 10, 0, 9));
		let added = doc.records().pop().unwrap();
		assert!(doc.remove(&added));
		assert_eq!(doc.render(), format!("{text}\n"));
	}

	fn commented() -> String {
		format!(
			"[Interface]\n\
			 PrivateKey = {KEY_C}\n\
			 # PostDown = iptables -D FORWARD\n\
			 # laptop\n\
			 [Peer]\n\
			 PublicKey = {KEY_A}\n\
			 AllowedIPs = 10.10.0.2/32\n\
			 # note for laptop\n\
			 \n\
			 # phone\n\
			 [Peer]\n\
			 PublicKey = {KEY_B}\n\
			 AllowedIPs = 10.10.0.3/32\n"
		)
	}

	#[test]
	fn removing_first_peer_keeps_interface_comments() {
		let mut doc = RegistryDocument::parse(&commented());
		let laptop = doc.records().remove(0);
		assert_eq!(laptop.name.as_deref(), Some("laptop"));
		assert!(doc.remove(&laptop));

		let expected = format!(
			"[Interface]\nPrivateKey = {KEY_C}\n# PostDown = iptables -D FORWARD\n\
			 # phone\n[Peer]\nPublicKey = {KEY_B}\nAllowedIPs = 10.10.0.3/32\n"
		);
		assert_eq!(doc.render(), expected);
		assert_eq!(doc.interface_private_key().unwrap().expose(), KEY_C);
	}

	#[test]
	fn removing_last_peer_keeps_previous_body_comments() {
		let mut doc = RegistryDocument::parse(&commented());
		let phone = doc.records().remove(1);
		assert_eq!(phone.name.as_deref(), Some("phone"));
		assert!(doc.remove(&phone));

		let expected = format!(
			"[Interface]\nPrivateKey = {KEY_C}\n# PostDown = iptables -D FORWARD\n\
			 # laptop\n[Peer]\nPublicKey = {KEY_A}\nAllowedIPs = 10.10.0.2/32\n\
			 # note for laptop\n\n"
		);
		assert_eq!(doc.render(), expected);
	}

	#[test]
	fn label_must_sit_directly_above_header() {
		let text = format!("# stray\n\n[Peer]\nPublicKey = {KEY_A}\nAllowedIPs = 10.10.0.2/32\n");
		let doc = RegistryDocument::parse(&text);
		assert_eq!(doc.records()[0].name, None);
		assert_eq!(doc.render(), text);
	}

	#[test]
	fn remove_requires_exact_match() {
		let mut doc = RegistryDocument::parse(&sample());
		let mut stale = doc.records().remove(0);
		stale.allowed_ips = "10.10.0.2/24".to_string();
		assert!(!doc.remove(&stale));
		assert_eq!(doc.records().len(), 2);
	}

	#[test]
	fn interface_private_key_is_exposed() {
		let doc = RegistryDocument::parse(&sample());
		assert_eq!(doc.interface_private_key().unwrap().expose(), KEY_C);
		assert!(RegistryDocument::parse("[Peer]\n").interface_private_key().is_none());
	}

	#[tokio::test]
	async fn missing_file_is_service_unavailable() {
		let dir = TempDir::new().unwrap();
		let store = RegistryStore::new(dir.path().join("wg0.conf"));
		let err = store.read().await.unwrap_err();
		assert_eq!(err.kind(), crate::error::ErrorKind::ServiceUnavailable);
	}

	#[tokio::test]
	async fn transaction_commits_to_disk() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("wg0.conf");
		std::fs::write(&path, sample()).unwrap();
		let store = RegistryStore::new(&path);

		let mut tx = store.transaction().await.unwrap();
		let first = tx.document().records().remove(0);
		assert!(tx.document_mut().remove(&first));
		tx.commit().await.unwrap();

		let records = store.records().await.unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].public_key.as_str(), KEY_B);
	}

	#[tokio::test]
	async fn dropped_transaction_writes_nothing() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("wg0.conf");
		std::fs::write(&path, sample()).unwrap();
		let store = RegistryStore::new(&path);

		{
			let mut tx = store.transaction().await.unwrap();
			tx.document_mut()
				.append("ghost", &PublicKey::new(KEY_C), Ipv4Addr::new(10, 10, 0, 8));
		}

		assert_eq!(std::fs::read_to_string(&path).unwrap(), sample());
		assert!(store.transaction().await.is_ok());
	}

	proptest! {
		#[test]
		fn appended_records_parse_back(
			hosts in prop::collection::btree_set((0u8..=255, 1u8..=254), 0..20)
		) {
			let mut doc = RegistryDocument::parse("[Interface]\nListenPort = 51820\n");
			let mut expected = Vec::new();
			for (i, (c, d)) in hosts.iter().enumerate() {
				let key = PublicKey::new(format!("key{i:03}"));
				let address = Ipv4Addr::new(10, 10, *c, *d);
				doc.append(&format!("Client {}", i + 1), &key, address);
				expected.push((key, address));
			}

			let reparsed = parse_peers(&doc.render());
			let got: Vec<_> = reparsed.iter().map(|r| (r.public_key.clone(), r.address)).collect();
			prop_assert_eq!(got, expected);
			prop_assert_eq!(RegistryDocument::parse(&doc.render()).render(), doc.render());
		}
	}
}

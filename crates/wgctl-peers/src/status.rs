// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Live connection state, polled from the daemon and fanned out to subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use wgctl_common::{ConnectionSnapshot, PeerRecord};
use wgctl_config::StatusConfig;

use crate::daemon::TunnelDaemon;
use crate::registry::RegistryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
	Idle,
	Polling,
}

pub struct StatusReconciler {
	daemon: Arc<dyn TunnelDaemon>,
	registry: Arc<RegistryStore>,
	config: StatusConfig,
	sender: broadcast::Sender<Arc<ConnectionSnapshot>>,
	latest: RwLock<Option<Arc<ConnectionSnapshot>>>,
	poll_lock: Mutex<()>,
	polling: AtomicBool,
}

impl StatusReconciler {
	pub fn new(
		daemon: Arc<dyn TunnelDaemon>,
		registry: Arc<RegistryStore>,
		config: StatusConfig,
	) -> Self {
		let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
		Self {
			daemon,
			registry,
			config,
			sender,
			latest: RwLock::new(None),
			poll_lock: Mutex::new(()),
			polling: AtomicBool::new(false),
		}
	}

	pub fn state(&self) -> ReconcilerState {
		if self.polling.load(Ordering::SeqCst) {
			ReconcilerState::Polling
		} else {
			ReconcilerState::Idle
		}
	}

	/// Most recent snapshot, if any poll has run.
	pub async fn latest(&self) -> Option<Arc<ConnectionSnapshot>> {
		self.latest.read().await.clone()
	}

	/// Run one poll. Failures produce an empty snapshot instead of an error.
	#[instrument(skip(self))]
	pub async fn poll_now(&self) -> Arc<ConnectionSnapshot> {
		let _guard = self.poll_lock.lock().await;
		self.polling.store(true, Ordering::SeqCst);

		let snapshot = match self.daemon.dump_sessions().await {
			Ok(sessions) => {
				let known: Vec<PeerRecord> = match self.registry.records().await {
					Ok(records) => records,
					Err(e) => {
						warn!(error = %e, "registry unreadable; reporting daemon sessions only");
						Vec::new()
					}
				};
				ConnectionSnapshot::from_sessions(
					&sessions,
					known.iter().map(|r| &r.public_key),
					Utc::now(),
					self.config.connected_threshold_secs,
				)
			}
			Err(e) => {
				warn!(error = %e, "status poll failed");
				ConnectionSnapshot::empty(Utc::now())
			}
		};

		let snapshot = Arc::new(snapshot);
		*self.latest.write().await = Some(snapshot.clone());
		self.polling.store(false, Ordering::SeqCst);

		debug!(
			peers = snapshot.peers.len(),
			connected = snapshot.connected_count(),
			"status polled"
		);
		snapshot
	}

	/// Request/response status: always a fresh poll.
	pub async fn status(&self) -> Arc<ConnectionSnapshot> {
		self.poll_now().await
	}

	async fn fresh_or_poll(&self) -> Arc<ConnectionSnapshot> {
		if let Some(cached) = self.latest().await {
			let fresh = (Utc::now() - cached.taken_at)
				.to_std()
				.map(|age| age < self.config.poll_interval())
				.unwrap_or(false);
			if fresh {
				return cached;
			}
		}
		self.poll_now().await
	}

	/// Subscribe to the feed. The first item is delivered straight away.
	pub async fn subscribe(&self) -> StatusSubscription {
		let receiver = self.sender.subscribe();
		let initial = self.fresh_or_poll().await;
		StatusSubscription {
			initial: Some(initial),
			receiver,
		}
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}

	/// Poll on the configured interval and broadcast each snapshot until
	/// `shutdown` flips to `true` or its sender goes away.
	pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
		let period = self.config.poll_interval().max(std::time::Duration::from_millis(1));
		let mut ticker = tokio::time::interval(period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		info!(
			interval_ms = self.config.poll_interval_ms,
			threshold_secs = self.config.connected_threshold_secs,
			"status reconciler started"
		);

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					let snapshot = self.poll_now().await;
					debug!(subscribers = self.subscriber_count(), "broadcasting status snapshot");
					// No receivers is fine.
					let _ = self.sender.send(snapshot);
				}
				changed = shutdown.changed() => {
					if changed.is_err() || *shutdown.borrow() {
						break;
					}
				}
			}
		}

		info!("status reconciler stopped");
	}
}

/// One subscriber's view of the feed. Dropping it unsubscribes.
pub struct StatusSubscription {
	initial: Option<Arc<ConnectionSnapshot>>,
	receiver: broadcast::Receiver<Arc<ConnectionSnapshot>>,
}

impl StatusSubscription {
	/// Next snapshot; `None` once the reconciler is gone.
	///
	/// A subscriber that fell behind jumps to the newest snapshot.
	pub async fn next(&mut self) -> Option<Arc<ConnectionSnapshot>> {
		if let Some(initial) = self.initial.take() {
			return Some(initial);
		}

		loop {
			match self.receiver.recv().await {
				Ok(snapshot) => return Some(snapshot),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					debug!(skipped, "status subscriber lagged");
					let mut newest = None;
					while let Ok(snapshot) = self.receiver.try_recv() {
						newest = Some(snapshot);
					}
					if newest.is_some() {
						return newest;
					}
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}
}

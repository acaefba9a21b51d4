// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Background expiration sweeper.
//!
//! A single long-lived task, independent of request traffic, that periodically evicts
//! every session past its expiry. Eviction removes the registry entry and the derived
//! bundle archive; the session's converted-file directory is left untouched
//! (retention-without-cleanup, recoverable by the external recovery tool). A failing
//! eviction for one session never stops the pass or the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::epoch_seconds_now;
use crate::registry::SessionRegistry;
use crate::store::{ArtifactStore, SessionIndex};

#[derive(Debug, Clone)]
pub struct Sweeper {
    registry: Arc<SessionRegistry>,
    store: ArtifactStore,
    index: SessionIndex,
}

impl Sweeper {
    pub fn new(registry: Arc<SessionRegistry>, store: ArtifactStore, index: SessionIndex) -> Self {
        Self {
            registry,
            store,
            index,
        }
    }

    /// One pass over the registry. Returns the number of evicted sessions.
    ///
    /// A snapshot flush is triggered only when at least one session was evicted.
    pub fn sweep_once(&self) -> usize {
        let now = epoch_seconds_now();
        let evicted = self.registry.evict_expired(now);
        if evicted.is_empty() {
            return 0;
        }

        for session_id in &evicted {
            if let Err(err) = self.store.remove_bundle(session_id) {
                warn!(session_id = %session_id, %err, "failed to remove bundle for evicted session");
            }
            info!(session_id = %session_id, "evicted expired session");
        }

        self.index.flush_registry(&self.registry);
        evicted.len()
    }

    /// Runs the sweep loop until the token is cancelled.
    ///
    /// Cancellation is cooperative: a pass that already started (including its snapshot
    /// flush) completes before the task exits.
    pub async fn run(self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; consume it so the loop waits a full
        // interval before its first pass, matching the configured cadence.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("expiration sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = self.sweep_once();
                    if evicted > 0 {
                        debug!(evicted, "expiration sweep finished");
                    }
                }
            }
        }
    }
}

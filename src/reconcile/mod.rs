// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Registry/disk reconciliation.
//!
//! A durable artifact must never become unreachable just because the process restarted
//! or the snapshot on disk is stale. Every registry miss for an accessed session id is
//! resolved against the artifact store: when a matching directory exists, a fresh
//! registry entry is synthesized (auto-registration) instead of failing the request.
//! Only when the store has nothing either does the caller see "not found".

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::model::{epoch_seconds_now, ConversionRecord, SessionId, SessionRecord};
use crate::registry::SessionRegistry;
use crate::store::{ArtifactStore, SessionIndex};

/// Outcome of an access-path lookup, after reconciliation has been attempted.
///
/// `NotFound` and `Expired` stay distinct here; the presentation layer folds both into
/// the same user-facing "expired or invalid" message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    NotFound { session_id: SessionId },
    Expired { session_id: SessionId },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { session_id } => write!(f, "session {session_id} not found"),
            Self::Expired { session_id } => write!(f, "session {session_id} has expired"),
        }
    }
}

impl std::error::Error for AccessError {}

#[derive(Debug, Clone)]
pub struct Reconciler {
    registry: Arc<SessionRegistry>,
    store: ArtifactStore,
    index: SessionIndex,
    ttl_seconds: f64,
}

impl Reconciler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: ArtifactStore,
        index: SessionIndex,
        ttl_seconds: f64,
    ) -> Self {
        Self {
            registry,
            store,
            index,
            ttl_seconds,
        }
    }

    /// Resolves a single-file access (share, view, download).
    ///
    /// On a registry miss with the file present on disk, a record is synthesized with a
    /// fresh TTL window and a single conversion entry naming the accessed file.
    pub fn resolve_file(
        &self,
        session_id: &SessionId,
        file_name: &str,
    ) -> Result<SessionRecord, AccessError> {
        let now = epoch_seconds_now();
        let record = match self.registry.get(session_id) {
            Some(record) => record,
            None => {
                if !self.store.artifact_exists(session_id, file_name) {
                    return Err(AccessError::NotFound {
                        session_id: session_id.clone(),
                    });
                }
                let mut record = SessionRecord::new(session_id.clone(), now + self.ttl_seconds);
                record.push_file(ConversionRecord::new(file_name, file_name, now));
                self.auto_register(record)
            }
        };
        self.check_expiry(record, now)
    }

    /// Resolves a whole-session access (session view, bundle download, extension).
    ///
    /// On a registry miss with the directory present, the synthesized record's file
    /// list is populated from the directory contents (bundle archives excluded).
    pub fn resolve_session(&self, session_id: &SessionId) -> Result<SessionRecord, AccessError> {
        let now = epoch_seconds_now();
        let record = match self.registry.get(session_id) {
            Some(record) => record,
            None => {
                if !self.store.session_dir_exists(session_id) {
                    return Err(AccessError::NotFound {
                        session_id: session_id.clone(),
                    });
                }
                let mut record = SessionRecord::new(session_id.clone(), now + self.ttl_seconds);
                match self.store.list_artifacts(session_id) {
                    Ok(names) => {
                        for name in names {
                            record.push_file(ConversionRecord::new(name.clone(), name, now));
                        }
                    }
                    Err(err) => {
                        warn!(session_id = %session_id, %err, "auto-registration could not list artifacts");
                    }
                }
                self.auto_register(record)
            }
        };
        self.check_expiry(record, now)
    }

    fn auto_register(&self, record: SessionRecord) -> SessionRecord {
        let session_id = record.session_id().clone();
        let registered = self.registry.register(record);
        info!(session_id = %session_id, files = registered.files().len(), "auto-registered session from disk");
        self.index.flush_registry(&self.registry);
        registered
    }

    fn check_expiry(&self, record: SessionRecord, now: f64) -> Result<SessionRecord, AccessError> {
        if record.is_expired_at(now) {
            return Err(AccessError::Expired {
                session_id: record.session_id().clone(),
            });
        }
        Ok(record)
    }

    /// One-time startup scan, run only when no persisted snapshot exists at all.
    ///
    /// Every directory under the store root whose name passes the length heuristic is
    /// granted a generous starter expiry so first access after a lost snapshot does not
    /// pay the reconciliation path once per session. Returns the number of sessions
    /// registered.
    pub fn bootstrap(&self, min_name_len: usize, starter_ttl_seconds: f64) -> usize {
        let session_ids = match self.store.scan_session_dirs(min_name_len) {
            Ok(session_ids) => session_ids,
            Err(err) => {
                warn!(%err, "startup scan of the artifact store failed");
                return 0;
            }
        };

        if session_ids.is_empty() {
            return 0;
        }

        let now = epoch_seconds_now();
        let count = session_ids.len();
        for session_id in session_ids {
            info!(session_id = %session_id, "discovered session directory");
            self.registry
                .register(SessionRecord::new(session_id, now + starter_ttl_seconds));
        }
        self.index.flush_registry(&self.registry);
        count
    }
}

#[cfg(test)]
mod tests;

// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! In-memory session index.
//!
//! The registry is the single shared mutable structure in the process. Request handlers
//! and the expiration sweeper all serialize through its internal lock; no operation
//! awaits while holding it. Lookups never auto-create — resolving a miss against the
//! artifact store is the reconciler's job, layered above this component.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;

use crate::model::{ConversionRecord, SessionId, SessionRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    NotFound { session_id: SessionId },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { session_id } => write!(f, "session {session_id} not found"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<HashMap<SessionId, SessionRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionRecord>> {
        self.inner.lock().expect("session registry lock poisoned")
    }

    /// Creates a fresh record with expiry `now + ttl`, replacing any previous entry
    /// under the same id (ids are generated per upload, so this does not happen in
    /// practice).
    pub fn create(&self, session_id: SessionId, ttl_seconds: f64, now: f64) -> SessionRecord {
        let record = SessionRecord::new(session_id.clone(), now + ttl_seconds);
        self.lock().insert(session_id, record.clone());
        record
    }

    /// Inserts a reconciled record, keeping any entry that won a concurrent race.
    ///
    /// Returns the record that ends up in the registry, which makes auto-registration
    /// idempotent: a second resolution of the same id observes the first one's files.
    pub fn register(&self, record: SessionRecord) -> SessionRecord {
        let mut inner = self.lock();
        inner
            .entry(record.session_id().clone())
            .or_insert(record)
            .clone()
    }

    pub fn get(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.lock().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.lock().contains_key(session_id)
    }

    /// Appends a conversion record, preserving upload-batch order.
    pub fn append(
        &self,
        session_id: &SessionId,
        record: ConversionRecord,
    ) -> Result<(), RegistryError> {
        let mut inner = self.lock();
        match inner.get_mut(session_id) {
            Some(session) => {
                session.push_file(record);
                Ok(())
            }
            None => Err(RegistryError::NotFound {
                session_id: session_id.clone(),
            }),
        }
    }

    /// Replaces the expiry with `now + ttl` wholesale.
    ///
    /// Never additive on top of the previous expiry, and never inserts a missing entry:
    /// extending a session the sweeper just evicted reports `NotFound` instead of
    /// resurrecting it.
    pub fn extend(
        &self,
        session_id: &SessionId,
        ttl_seconds: f64,
        now: f64,
    ) -> Result<f64, RegistryError> {
        let mut inner = self.lock();
        match inner.get_mut(session_id) {
            Some(session) => {
                let expires_at = now + ttl_seconds;
                session.set_expires_at(expires_at);
                Ok(expires_at)
            }
            None => Err(RegistryError::NotFound {
                session_id: session_id.clone(),
            }),
        }
    }

    pub fn remove(&self, session_id: &SessionId) -> Result<(), RegistryError> {
        match self.lock().remove(session_id) {
            Some(_) => Ok(()),
            None => Err(RegistryError::NotFound {
                session_id: session_id.clone(),
            }),
        }
    }

    /// Removes every record past its expiry in one lock acquisition and returns the
    /// evicted ids, sorted for stable logging.
    pub fn evict_expired(&self, now: f64) -> Vec<SessionId> {
        let mut inner = self.lock();
        let expired: Vec<SessionId> = inner
            .iter()
            .filter(|(_, record)| record.is_expired_at(now))
            .map(|(session_id, _)| session_id.clone())
            .collect();
        for session_id in &expired {
            inner.remove(session_id);
        }
        drop(inner);

        let mut expired = expired;
        expired.sort();
        expired
    }

    /// Point-in-time copy for persistence, taken under the lock so a flush never sees
    /// partially-updated entries.
    pub fn snapshot(&self) -> BTreeMap<SessionId, SessionRecord> {
        self.lock()
            .iter()
            .map(|(session_id, record)| (session_id.clone(), record.clone()))
            .collect()
    }

    /// Bulk-loads records, replacing the current contents. Used at startup.
    pub fn hydrate(&self, records: impl IntoIterator<Item = SessionRecord>) {
        let mut inner = self.lock();
        inner.clear();
        for record in records {
            inner.insert(record.session_id().clone(), record);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Persisted session-index snapshot.
//!
//! One JSON document mapping session id to `{created_at, files}`. `created_at` is the
//! expiry instant in epoch seconds; the field name is historical. Three generations of
//! readers and writers share this file, so loading accepts the legacy shapes (a bare
//! number, a bare numeric string, or `created_at` as a numeric string) and upgrades
//! them in place; saving always emits the rich numeric shape. Entries that fail every
//! parse attempt are dropped with a warning, never fatal to the load.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{epoch_seconds_now, ConversionRecord, SessionId, SessionRecord};
use crate::registry::SessionRegistry;
use crate::store::{write_atomic, WriteDurability};

#[derive(Debug)]
pub enum IndexError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Json { path, source } => write!(f, "json error at {path:?}: {source}"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

/// Result of loading the snapshot file.
///
/// A missing file is not an error and not the same as an empty document: it means no
/// snapshot was ever written, which is the only condition under which the startup
/// bulk-scan of the store root runs.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedIndex {
    Missing,
    Loaded(Vec<SessionRecord>),
}

#[derive(Debug, Clone, Serialize)]
struct SessionEntryJson {
    created_at: f64,
    files: Vec<ConversionRecordJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversionRecordJson {
    original_filename: String,
    converted_filename: String,
    #[serde(default)]
    conversion_time: f64,
}

#[derive(Debug, Deserialize)]
struct RichEntryJson {
    #[serde(default)]
    created_at: Option<serde_json::Value>,
    #[serde(default)]
    files: Vec<ConversionRecordJson>,
}

fn parse_expiry(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Upgrades one persisted entry to the rich in-memory shape, or `None` when no parse
/// attempt succeeds.
fn upgrade_entry(session_id: SessionId, value: serde_json::Value) -> Option<SessionRecord> {
    match value {
        serde_json::Value::Object(_) => {
            let entry: RichEntryJson = serde_json::from_value(value).ok()?;
            let expires_at = match entry.created_at {
                Some(raw) => parse_expiry(&raw).unwrap_or_else(|| {
                    warn!(session_id = %session_id, "unparseable created_at, defaulting to now");
                    epoch_seconds_now()
                }),
                None => 0.0,
            };
            let files = entry
                .files
                .into_iter()
                .map(|file| ConversionRecord {
                    original_filename: file.original_filename,
                    converted_filename: file.converted_filename,
                    conversion_time: file.conversion_time,
                })
                .collect();
            Some(SessionRecord::with_files(session_id, expires_at, files))
        }
        // Legacy shapes: a bare expiry timestamp, or a string encoding one. Either way
        // the upgraded record has an empty file list.
        other => {
            let expires_at = parse_expiry(&other)?;
            Some(SessionRecord::new(session_id, expires_at))
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionIndex {
    path: PathBuf,
    durability: WriteDurability,
}

impl SessionIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            durability: WriteDurability::default(),
        }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<LoadedIndex, IndexError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(LoadedIndex::Missing);
            }
            Err(source) => {
                return Err(IndexError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let document: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&raw).map_err(|source| IndexError::Json {
                path: self.path.clone(),
                source,
            })?;

        let mut records = Vec::with_capacity(document.len());
        for (raw_id, value) in document {
            let session_id = match SessionId::new(raw_id.clone()) {
                Ok(session_id) => session_id,
                Err(err) => {
                    warn!(session_id = %raw_id, %err, "dropping session with unusable id");
                    continue;
                }
            };
            match upgrade_entry(session_id, value) {
                Some(record) => records.push(record),
                None => {
                    warn!(session_id = %raw_id, "dropping session entry with unparseable shape");
                }
            }
        }

        Ok(LoadedIndex::Loaded(records))
    }

    /// Writes the whole registry view as one document, rich shape only.
    ///
    /// Concurrent writers must be serialized by the caller; this component only
    /// guarantees the write itself is whole-file atomic.
    pub fn save(
        &self,
        snapshot: &BTreeMap<SessionId, SessionRecord>,
    ) -> Result<(), IndexError> {
        let document: BTreeMap<&str, SessionEntryJson> = snapshot
            .iter()
            .map(|(session_id, record)| {
                let entry = SessionEntryJson {
                    created_at: record.expires_at(),
                    files: record
                        .files()
                        .iter()
                        .map(|file| ConversionRecordJson {
                            original_filename: file.original_filename.clone(),
                            converted_filename: file.converted_filename.clone(),
                            conversion_time: file.conversion_time,
                        })
                        .collect(),
                };
                (session_id.as_str(), entry)
            })
            .collect();

        let body = serde_json::to_string_pretty(&document).map_err(|source| IndexError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| IndexError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        write_atomic(&self.path, format!("{body}\n").as_bytes(), self.durability).map_err(
            |source| IndexError::Io {
                path: self.path.clone(),
                source,
            },
        )
    }

    /// Takes a consistent snapshot of the registry and saves it, logging instead of
    /// failing: the in-memory registry stays authoritative for this process even when
    /// the flush cannot be written.
    pub fn flush_registry(&self, registry: &SessionRegistry) {
        let snapshot = registry.snapshot();
        if let Err(err) = self.save(&snapshot) {
            warn!(%err, "failed to flush session index snapshot");
        }
    }
}

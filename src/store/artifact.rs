// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Filesystem-backed artifact store.
//!
//! Layout under the configured output root: one directory per session id, converted
//! files flat inside it, and the derived bundle archive `{session_id}_converted.zip`
//! at the root (not inside the session directory). A directory may exist with no
//! matching registry entry; that is expected drift, resolved by the reconciler.

use std::fmt;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::model::{validate_path_segment, IdError, SessionId};
use crate::store::{write_atomic, WriteDurability};

const BUNDLE_SUFFIX: &str = "_converted.zip";

#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Zip {
        path: PathBuf,
        source: zip::result::ZipError,
    },
    InvalidFileName {
        value: String,
        source: IdError,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
            Self::Zip { path, source } => write!(f, "zip error at {path:?}: {source}"),
            Self::InvalidFileName { value, source } => {
                write!(f, "invalid artifact file name {value:?}: {source}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Zip { source, .. } => Some(source),
            Self::InvalidFileName { source, .. } => Some(source),
        }
    }
}

fn checked_file_name(value: &str) -> Result<(), StoreError> {
    validate_path_segment(value).map_err(|source| StoreError::InvalidFileName {
        value: value.to_owned(),
        source,
    })
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    durability: WriteDurability,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            durability: WriteDurability::default(),
        }
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    pub fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.as_str())
    }

    pub fn session_dir_exists(&self, session_id: &SessionId) -> bool {
        self.session_dir(session_id).is_dir()
    }

    /// Creates the session directory, tolerating a directory that already exists (two
    /// requests racing on a fresh id must not fail the batch).
    pub fn ensure_session_dir(&self, session_id: &SessionId) -> Result<PathBuf, StoreError> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    pub fn artifact_path(&self, session_id: &SessionId, file_name: &str) -> PathBuf {
        self.session_dir(session_id).join(file_name)
    }

    pub fn artifact_exists(&self, session_id: &SessionId, file_name: &str) -> bool {
        if checked_file_name(file_name).is_err() {
            return false;
        }
        self.artifact_path(session_id, file_name).is_file()
    }

    pub fn write_artifact(
        &self,
        session_id: &SessionId,
        file_name: &str,
        contents: &[u8],
    ) -> Result<PathBuf, StoreError> {
        checked_file_name(file_name)?;
        self.ensure_session_dir(session_id)?;
        let path = self.artifact_path(session_id, file_name);
        write_atomic(&path, contents, self.durability).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn read_artifact(
        &self,
        session_id: &SessionId,
        file_name: &str,
    ) -> Result<Vec<u8>, StoreError> {
        checked_file_name(file_name)?;
        let path = self.artifact_path(session_id, file_name);
        fs::read(&path).map_err(|source| StoreError::Io { path, source })
    }

    /// Lists converted files in a session directory: regular files only, archives
    /// excluded, sorted by name.
    pub fn list_artifacts(&self, session_id: &SessionId) -> Result<Vec<String>, StoreError> {
        let dir = self.session_dir(session_id);
        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if name.ends_with(".zip") || name.starts_with(".proteus.tmp.") {
                continue;
            }
            names.push(name.to_owned());
        }
        names.sort();
        Ok(names)
    }

    pub fn bundle_path(&self, session_id: &SessionId) -> PathBuf {
        self.root
            .join(format!("{}{BUNDLE_SUFFIX}", session_id.as_str()))
    }

    pub fn bundle_exists(&self, session_id: &SessionId) -> bool {
        self.bundle_path(session_id).is_file()
    }

    /// Builds (or rebuilds) the session's bundle archive at the store root and returns
    /// its path. The bundle is derived state: regenerable on demand, deleted on
    /// cleanup, and never part of the session's file list.
    pub fn build_bundle(&self, session_id: &SessionId) -> Result<PathBuf, StoreError> {
        let names = self.list_artifacts(session_id)?;
        let bundle_path = self.bundle_path(session_id);
        let tmp_path = self.root.join(format!(
            ".proteus.tmp.{}{BUNDLE_SUFFIX}",
            session_id.as_str()
        ));

        let file = fs::File::create(&tmp_path).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let result = (|| -> Result<(), StoreError> {
            for name in &names {
                let contents = self.read_artifact(session_id, name)?;
                writer
                    .start_file(name.as_str(), options)
                    .map_err(|source| StoreError::Zip {
                        path: tmp_path.clone(),
                        source,
                    })?;
                writer
                    .write_all(&contents)
                    .map_err(|source| StoreError::Io {
                        path: tmp_path.clone(),
                        source,
                    })?;
            }
            writer.finish().map_err(|source| StoreError::Zip {
                path: tmp_path.clone(),
                source,
            })?;
            Ok(())
        })();

        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        if let Err(source) = super::rename_overwrite(&tmp_path, &bundle_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Io {
                path: bundle_path,
                source,
            });
        }
        Ok(bundle_path)
    }

    /// Removes the derived bundle archive if present. Idempotent.
    pub fn remove_bundle(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let path = self.bundle_path(session_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Removes a session directory and everything in it.
    ///
    /// Only the all-conversions-failed batch discard calls this; session cleanup and
    /// the sweeper retain converted files on purpose so the recovery tooling can copy
    /// them out later.
    pub fn remove_session_dir(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let dir = self.session_dir(session_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path: dir, source }),
        }
    }

    /// Scans the store root for directories whose name looks like a session id.
    ///
    /// The check is a minimum-length heuristic, not an identifier-format check; the
    /// threshold is configurable by the caller.
    pub fn scan_session_dirs(&self, min_name_len: usize) -> Result<Vec<SessionId>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut session_ids = Vec::new();
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if name.len() < min_name_len {
                continue;
            }
            if let Ok(session_id) = SessionId::new(name) {
                session_ids.push(session_id);
            }
        }
        session_ids.sort();
        Ok(session_ids)
    }
}

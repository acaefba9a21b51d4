// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::SessionId;

/// One converted file inside a session. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRecord {
    pub original_filename: String,
    pub converted_filename: String,
    /// Epoch seconds at which the conversion finished.
    pub conversion_time: f64,
}

impl ConversionRecord {
    pub fn new(
        original_filename: impl Into<String>,
        converted_filename: impl Into<String>,
        conversion_time: f64,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            converted_filename: converted_filename.into(),
            conversion_time,
        }
    }
}

/// A time-boxed group of converted files sharing one expiry and one shareable root link.
///
/// Whatever shape a session was persisted in, this is the only in-memory representation;
/// legacy snapshot entries are upgraded at the deserialization boundary and no call site
/// ever branches on shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    session_id: SessionId,
    expires_at: f64,
    files: Vec<ConversionRecord>,
}

impl SessionRecord {
    pub fn new(session_id: SessionId, expires_at: f64) -> Self {
        Self {
            session_id,
            expires_at,
            files: Vec::new(),
        }
    }

    pub fn with_files(session_id: SessionId, expires_at: f64, files: Vec<ConversionRecord>) -> Self {
        Self {
            session_id,
            expires_at,
            files,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Absolute expiry instant in epoch seconds.
    pub fn expires_at(&self) -> f64 {
        self.expires_at
    }

    pub fn set_expires_at(&mut self, expires_at: f64) {
        self.expires_at = expires_at;
    }

    pub fn files(&self) -> &[ConversionRecord] {
        &self.files
    }

    pub fn push_file(&mut self, record: ConversionRecord) {
        self.files.push(record);
    }

    /// A session is valid up to and including its expiry instant.
    pub fn is_valid_at(&self, now: f64) -> bool {
        now <= self.expires_at
    }

    pub fn is_expired_at(&self, now: f64) -> bool {
        !self.is_valid_at(now)
    }

    pub fn seconds_left_at(&self, now: f64) -> i64 {
        (self.expires_at - now) as i64
    }
}

/// Current wall-clock time as epoch seconds.
pub fn epoch_seconds_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

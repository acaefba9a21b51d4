// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// A stable identifier that also doubles as a filesystem name.
///
/// This is intentionally std-only and does not enforce a UUID format; it only
/// enforces that the id is a safe *path segment*, because session ids name
/// directories under the artifact store root and converted file names are
/// joined onto them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_path_segment(&value)?;
        Ok(Self {
            value,
            _marker: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> AsRef<str> for Id<T> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<T> Borrow<str> for Id<T> {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl<T> FromStr for Id<T> {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl<T> TryFrom<String> for Id<T> {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    Empty,
    ContainsSeparator,
    Reserved,
    ContainsNul,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("id must not be empty"),
            Self::ContainsSeparator => f.write_str("id must not contain '/' or '\\'"),
            Self::Reserved => f.write_str("id must not be '.' or '..'"),
            Self::ContainsNul => f.write_str("id must not contain NUL"),
        }
    }
}

impl std::error::Error for IdError {}

/// Validates that `value` is usable as a single path component.
pub fn validate_path_segment(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value == "." || value == ".." {
        return Err(IdError::Reserved);
    }
    if value.contains('/') || value.contains('\\') {
        return Err(IdError::ContainsSeparator);
    }
    if value.contains('\0') {
        return Err(IdError::ContainsNul);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionIdTag {}
pub type SessionId = Id<SessionIdTag>;

impl SessionId {
    /// Generates a fresh session id.
    ///
    /// The hyphenated UUID form is 36 characters long, which keeps generated ids above
    /// the bulk-scan length heuristic used when rediscovering session directories.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string()).expect("generated uuid is a valid path segment")
    }
}

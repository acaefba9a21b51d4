// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Response documents for the HTTP surface.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Error,
}

/// Per-file outcome inside an upload batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub original: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub results: Vec<FileResult>,
    pub download_all_url: String,
    pub session_url: String,
    pub expires_at: String,
    pub expiration_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckSessionResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_left: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareResponse {
    pub session_id: String,
    pub filename: String,
    pub file_url: String,
    pub download_url: String,
    pub expires_at: String,
    pub seconds_left: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionFileEntry {
    pub filename: String,
    pub file_url: String,
    pub download_url: String,
    pub share_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub files: Vec<SessionFileEntry>,
    pub download_all_url: String,
    pub expires_at: String,
    pub seconds_left: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtendResponse {
    pub status: &'static str,
    pub expires_at: String,
    pub seconds_left: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckToolResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub message: String,
}

/// Error body shared by every failing route.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FileResult>>,
}

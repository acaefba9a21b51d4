// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Runtime configuration.
//!
//! Values come from the environment (variable names kept from earlier deployments of
//! this service) and can be overridden per-run by CLI flags parsed in `main`. Invalid
//! numeric environment values fall back to their defaults with a warning rather than
//! refusing to start.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_INDEX_PATH: &str = "sessions.json";
pub const DEFAULT_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 300;
pub const DEFAULT_MIN_SESSION_ID_LEN: usize = 32;
pub const DEFAULT_STARTER_TTL_SECONDS: u64 = 24 * 3600;
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the artifact store.
    pub output_dir: PathBuf,
    /// Path of the persisted session-index snapshot.
    pub index_path: PathBuf,
    /// TTL granted to new and reconciled sessions.
    pub session_ttl_seconds: u64,
    /// Cadence of the expiration sweeper.
    pub sweep_interval: Duration,
    /// Listen port for the HTTP server.
    pub port: u16,
    /// Minimum directory-name length for the startup bulk-scan heuristic. A loose
    /// plausibility bound, deliberately not a strict identifier-format check.
    pub min_session_id_len: usize,
    /// Generous expiry granted to bulk-scanned directories at startup.
    pub starter_ttl_seconds: u64,
    /// Base URL used when rendering absolute share links.
    pub public_base_url: Option<String>,
    /// Opt into slower fsync-backed writes for artifacts and the snapshot.
    pub durable_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            session_ttl_seconds: DEFAULT_TTL_SECONDS,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS),
            port: DEFAULT_PORT,
            min_session_id_len: DEFAULT_MIN_SESSION_ID_LEN,
            starter_ttl_seconds: DEFAULT_STARTER_TTL_SECONDS,
            public_base_url: None,
            durable_writes: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env_string("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(path) = env_string("SESSION_FILE") {
            config.index_path = PathBuf::from(path);
        }
        if let Some(ttl) = env_u64("EXPIRATION_TIME", DEFAULT_TTL_SECONDS) {
            config.session_ttl_seconds = ttl;
        }
        if let Some(interval) = env_u64("SWEEP_INTERVAL", DEFAULT_SWEEP_INTERVAL_SECONDS) {
            config.sweep_interval = Duration::from_secs(interval);
        }
        config.public_base_url = env_string("PUBLIC_BASE_URL");
        config
    }

    pub fn session_ttl(&self) -> f64 {
        self.session_ttl_seconds as f64
    }

    pub fn starter_ttl(&self) -> f64 {
        self.starter_ttl_seconds as f64
    }

    /// Base for absolute links; falls back to the loopback listen address.
    pub fn base_url(&self) -> String {
        match &self.public_base_url {
            Some(base) => base.trim_end_matches('/').to_owned(),
            None => format!("http://127.0.0.1:{}", self.port),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_u64(key: &str, default: u64) -> Option<u64> {
    let raw = env::var(key).ok().filter(|value| !value.is_empty())?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, default, "ignoring unparseable environment value");
            Some(default)
        }
    }
}

// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! HTTP surface and request orchestration.
//!
//! [`App`] wires the registry, store, index, reconciler and pipeline together and owns
//! the batch policy: files in one upload convert independently, a single failure never
//! aborts the batch, and only an all-files-failed batch discards the session. The axum
//! handlers below it stay thin; everything they do is callable (and tested) without a
//! socket.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::TimeZone;
use tracing::{info, warn};

use crate::config::{Config, MAX_UPLOAD_BYTES};
use crate::convert::{supported_formats, OutputFormat, Pipeline, Rasterizer, SupportedFormats};
use crate::model::{epoch_seconds_now, validate_path_segment, ConversionRecord, SessionId};
use crate::reconcile::Reconciler;
use crate::registry::SessionRegistry;
use crate::store::{ArtifactStore, LoadedIndex, SessionIndex, WriteDurability};
use crate::sweep::Sweeper;

pub mod types;

use types::{
    CheckSessionResponse, CheckToolResponse, CleanupResponse, ErrorBody, ExtendResponse,
    FileResult, FileStatus, SessionFileEntry, SessionResponse, ShareResponse, UploadResponse,
};

const DEFAULT_OUTPUT_KIND: &str = "JPEG";

/// Bound on receiving one upload body, so a stalled client cannot pin a worker.
const UPLOAD_READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// One uploaded file: declared name plus received bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub enum ApiError {
    /// Input validation failed; no session was created.
    BadRequest { message: String },
    /// Expired or unknown link. `NotFound` and `Expired` both fold into this.
    Gone { message: String },
    /// Every file in the batch failed; the session was discarded.
    AllFailed {
        message: String,
        details: Vec<FileResult>,
    },
    Internal { message: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest { message } | Self::Gone { message } | Self::Internal { message } => {
                f.write_str(message)
            }
            Self::AllFailed { message, .. } => write!(f, "All conversions failed: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest { message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: message,
                    message: None,
                    details: None,
                },
            ),
            Self::Gone { message } => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: message,
                    message: None,
                    details: None,
                },
            ),
            Self::AllFailed { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "All conversions failed".to_owned(),
                    message: Some(message),
                    details: Some(details),
                },
            ),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Server error".to_owned(),
                    message: Some(message),
                    details: None,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

fn internal(err: impl fmt::Display) -> ApiError {
    ApiError::Internal {
        message: err.to_string(),
    }
}

fn link_invalid(noun: &str) -> ApiError {
    ApiError::Gone {
        message: format!("{noun} link has expired or is invalid"),
    }
}

#[derive(Clone)]
pub struct App {
    config: Arc<Config>,
    registry: Arc<SessionRegistry>,
    store: ArtifactStore,
    index: SessionIndex,
    reconciler: Reconciler,
    pipeline: Pipeline,
    rasterizer: Arc<dyn Rasterizer>,
}

impl App {
    pub fn new(config: Config, rasterizer: Arc<dyn Rasterizer>) -> Self {
        let durability = if config.durable_writes {
            WriteDurability::Durable
        } else {
            WriteDurability::BestEffort
        };
        let registry = Arc::new(SessionRegistry::new());
        let store = ArtifactStore::new(&config.output_dir).with_durability(durability);
        let index = SessionIndex::new(&config.index_path).with_durability(durability);
        let reconciler = Reconciler::new(
            registry.clone(),
            store.clone(),
            index.clone(),
            config.session_ttl(),
        );
        let pipeline = Pipeline::new(rasterizer.clone());
        Self {
            config: Arc::new(config),
            registry,
            store,
            index,
            reconciler,
            pipeline,
            rasterizer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn index(&self) -> &SessionIndex {
        &self.index
    }

    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(self.registry.clone(), self.store.clone(), self.index.clone())
    }

    /// Hydrates the registry from disk before the first request.
    ///
    /// A present snapshot (even an empty one) is loaded as-is; only a missing snapshot
    /// triggers the one-time bulk scan of the store root. A snapshot that cannot be
    /// parsed at all degrades to an empty registry rather than refusing to start.
    pub fn init_from_disk(&self) -> io::Result<()> {
        fs::create_dir_all(&self.config.output_dir)?;

        match self.index.load() {
            Ok(LoadedIndex::Loaded(records)) => {
                info!(sessions = records.len(), "loaded session index snapshot");
                self.registry.hydrate(records);
            }
            Ok(LoadedIndex::Missing) => {
                let discovered = self
                    .reconciler
                    .bootstrap(self.config.min_session_id_len, self.config.starter_ttl());
                info!(discovered, "no session index snapshot, scanned store root");
            }
            Err(err) => {
                warn!(%err, "failed to load session index snapshot, starting empty");
            }
        }
        Ok(())
    }

    pub fn final_flush(&self) {
        self.index.flush_registry(&self.registry);
    }

    /// Converts one upload batch. Each file is attempted independently and in
    /// submission order; per-file failures surface as warnings unless every file
    /// failed, in which case the session (directory and registry entry) is discarded
    /// and the whole operation fails with the aggregated messages.
    pub async fn upload_batch(
        &self,
        files: Vec<UploadedFile>,
        requested_format: &str,
    ) -> Result<UploadResponse, ApiError> {
        if files.is_empty() {
            return Err(ApiError::BadRequest {
                message: "No files provided".to_owned(),
            });
        }
        if requested_format.trim().is_empty() {
            return Err(ApiError::BadRequest {
                message: "No output format specified".to_owned(),
            });
        }
        let output = OutputFormat::parse(requested_format).map_err(|err| ApiError::BadRequest {
            message: err.to_string(),
        })?;

        let session_id = SessionId::generate();
        self.store
            .ensure_session_dir(&session_id)
            .map_err(internal)?;
        let now = epoch_seconds_now();
        let record = self
            .registry
            .create(session_id.clone(), self.config.session_ttl(), now);
        let expires_at = record.expires_at();

        let pipeline = self.pipeline.clone();
        let store = self.store.clone();
        let batch_session_id = session_id.clone();
        let batch_output = output.clone();
        let outcomes = tokio::task::spawn_blocking(move || {
            convert_batch(&pipeline, &store, &batch_session_id, &batch_output, files)
        })
        .await
        .map_err(internal)?;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut warnings = Vec::new();
        let mut successes = 0usize;
        for outcome in outcomes {
            match outcome {
                BatchOutcome::Success {
                    original,
                    converted,
                    conversion_time,
                } => {
                    successes += 1;
                    if let Err(err) = self.registry.append(
                        &session_id,
                        ConversionRecord::new(original.clone(), converted.clone(), conversion_time),
                    ) {
                        warn!(%err, "could not record conversion in the registry");
                    }
                    results.push(FileResult {
                        original,
                        status: FileStatus::Success,
                        download_url: Some(self.download_url(&session_id, &converted)),
                        share_url: Some(self.share_url(&session_id, &converted)),
                        converted: Some(converted),
                        error: None,
                    });
                }
                BatchOutcome::Failure { original, message } => {
                    warnings.push(message.clone());
                    results.push(FileResult {
                        original,
                        status: FileStatus::Error,
                        converted: None,
                        download_url: None,
                        share_url: None,
                        error: Some(message),
                    });
                }
            }
        }

        if successes == 0 {
            if let Err(err) = self.store.remove_session_dir(&session_id) {
                warn!(%err, "could not remove session directory after failed batch");
            }
            let _ = self.registry.remove(&session_id);
            self.index.flush_registry(&self.registry);
            let message = if warnings.is_empty() {
                "Unknown error".to_owned()
            } else {
                warnings.join("; ")
            };
            return Err(ApiError::AllFailed {
                message,
                details: results,
            });
        }

        self.index.flush_registry(&self.registry);
        info!(session_id = %session_id, successes, failures = warnings.len(), "upload batch finished");

        Ok(UploadResponse {
            download_all_url: self.download_all_url(&session_id),
            session_url: format!("{}/session/{}", self.config.base_url(), session_id),
            session_id: session_id.into_string(),
            results,
            expires_at: format_epoch(expires_at),
            expiration_seconds: self.config.session_ttl_seconds,
            warnings: if warnings.is_empty() {
                None
            } else {
                Some(warnings)
            },
        })
    }

    /// Reports validity without reconciling: `valid` iff the record exists and
    /// `now <= expiry` (the boundary instant itself is still valid).
    pub fn check_session(&self, raw_id: &str) -> CheckSessionResponse {
        let invalid = CheckSessionResponse {
            valid: false,
            expires_at: None,
            seconds_left: None,
        };
        let Ok(session_id) = SessionId::new(raw_id) else {
            return invalid;
        };
        let now = epoch_seconds_now();
        match self.registry.get(&session_id) {
            Some(record) if record.is_valid_at(now) => CheckSessionResponse {
                valid: true,
                expires_at: Some(format_epoch(record.expires_at())),
                seconds_left: Some(record.seconds_left_at(now)),
            },
            _ => invalid,
        }
    }

    pub fn share(&self, raw_id: &str, file_name: &str) -> Result<ShareResponse, ApiError> {
        let session_id = parse_session_id(raw_id, "File")?;
        if validate_path_segment(file_name).is_err() {
            return Err(link_invalid("File"));
        }
        let record = self
            .reconciler
            .resolve_file(&session_id, file_name)
            .map_err(|_| link_invalid("File"))?;
        if !self.store.artifact_exists(&session_id, file_name) {
            return Err(ApiError::Gone {
                message: "File not found or has expired".to_owned(),
            });
        }

        let now = epoch_seconds_now();
        Ok(ShareResponse {
            session_id: session_id.to_string(),
            file_url: self.file_url(&session_id, file_name),
            download_url: self.download_url(&session_id, file_name),
            filename: file_name.to_owned(),
            expires_at: format_epoch(record.expires_at()),
            seconds_left: record.seconds_left_at(now),
        })
    }

    /// Serves one artifact's bytes, reconciling a registry miss against the store
    /// first. Used by both the inline and the attachment routes.
    pub fn fetch_artifact(
        &self,
        raw_id: &str,
        file_name: &str,
    ) -> Result<(Vec<u8>, &'static str), ApiError> {
        let session_id = parse_session_id(raw_id, "File")?;
        if validate_path_segment(file_name).is_err() {
            return Err(link_invalid("File"));
        }
        self.reconciler
            .resolve_file(&session_id, file_name)
            .map_err(|_| link_invalid("File"))?;

        let bytes = self
            .store
            .read_artifact(&session_id, file_name)
            .map_err(|_| ApiError::Gone {
                message: "File not found or has expired".to_owned(),
            })?;
        Ok((bytes, mime_for(file_name)))
    }

    pub fn view_session(&self, raw_id: &str) -> Result<SessionResponse, ApiError> {
        let session_id = parse_session_id(raw_id, "Session")?;
        let record = self
            .reconciler
            .resolve_session(&session_id)
            .map_err(|_| link_invalid("Session"))?;

        let names = match self.store.list_artifacts(&session_id) {
            Ok(names) => names,
            Err(err) => {
                warn!(session_id = %session_id, %err, "could not list session directory");
                return Err(ApiError::Gone {
                    message: "Session not found or has expired".to_owned(),
                });
            }
        };

        let files = names
            .into_iter()
            .map(|name| SessionFileEntry {
                file_url: self.file_url(&session_id, &name),
                download_url: self.download_url(&session_id, &name),
                share_url: self.share_url(&session_id, &name),
                filename: name,
            })
            .collect();

        let now = epoch_seconds_now();
        Ok(SessionResponse {
            session_id: session_id.to_string(),
            files,
            download_all_url: self.download_all_url(&session_id),
            expires_at: format_epoch(record.expires_at()),
            seconds_left: record.seconds_left_at(now),
        })
    }

    /// (Re)builds the session's bundle archive and returns its bytes and file name.
    pub fn download_all(&self, raw_id: &str) -> Result<(Vec<u8>, String), ApiError> {
        let session_id = parse_session_id(raw_id, "Session")?;
        self.reconciler
            .resolve_session(&session_id)
            .map_err(|_| link_invalid("Session"))?;

        let bundle_path = self.store.build_bundle(&session_id).map_err(internal)?;
        let bytes = fs::read(&bundle_path).map_err(internal)?;
        let name = bundle_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{session_id}_converted.zip"));
        Ok((bytes, name))
    }

    /// Removes the registry entry and the derived bundle. Idempotent, and the
    /// converted-file directory is retained by policy.
    pub fn cleanup(&self, raw_id: &str) -> CleanupResponse {
        if let Ok(session_id) = SessionId::new(raw_id) {
            if self.registry.remove(&session_id).is_ok() {
                self.index.flush_registry(&self.registry);
                info!(session_id = %session_id, "cleaned up session");
            }
            if let Err(err) = self.store.remove_bundle(&session_id) {
                warn!(session_id = %session_id, %err, "could not remove bundle during cleanup");
            }
        }
        CleanupResponse { status: "success" }
    }

    /// Pushes the expiry forward to `now + TTL`.
    ///
    /// A missing registry entry is first reconciled against the store, so a session
    /// directory that survived a restart can still be extended; an id with no
    /// directory reports not-found. The registry itself never resurrects an entry on
    /// extend.
    pub fn extend(&self, raw_id: &str) -> Result<ExtendResponse, ApiError> {
        let session_id = SessionId::new(raw_id).map_err(|_| ApiError::Gone {
            message: "Session not found".to_owned(),
        })?;

        if !self.registry.contains(&session_id) && self.store.session_dir_exists(&session_id) {
            let _ = self.reconciler.resolve_session(&session_id);
        }

        let now = epoch_seconds_now();
        match self
            .registry
            .extend(&session_id, self.config.session_ttl(), now)
        {
            Ok(expires_at) => {
                self.index.flush_registry(&self.registry);
                info!(session_id = %session_id, expires_at, "extended session");
                Ok(ExtendResponse {
                    status: "success",
                    expires_at: format_epoch(expires_at),
                    seconds_left: self.config.session_ttl_seconds,
                })
            }
            Err(_) => Err(ApiError::Gone {
                message: "Session not found".to_owned(),
            }),
        }
    }

    pub fn formats(&self) -> SupportedFormats {
        supported_formats()
    }

    /// Availability probe for the external rasterizer.
    pub fn check_tool(&self) -> (bool, CheckToolResponse) {
        match self.rasterizer.probe() {
            Ok(version) => (
                true,
                CheckToolResponse {
                    status: "success",
                    version: Some(version),
                    message: "Ghostscript is available".to_owned(),
                },
            ),
            Err(err) => (
                false,
                CheckToolResponse {
                    status: "error",
                    version: None,
                    message: format!("Failed to check Ghostscript: {err}"),
                },
            ),
        }
    }

    fn file_url(&self, session_id: &SessionId, file_name: &str) -> String {
        format!("/static-file/{session_id}/{file_name}")
    }

    fn download_url(&self, session_id: &SessionId, file_name: &str) -> String {
        format!("/download/{session_id}/{file_name}")
    }

    fn share_url(&self, session_id: &SessionId, file_name: &str) -> String {
        format!("{}/share/{session_id}/{file_name}", self.config.base_url())
    }

    fn download_all_url(&self, session_id: &SessionId) -> String {
        format!("/download-all/{session_id}")
    }
}

enum BatchOutcome {
    Success {
        original: String,
        converted: String,
        conversion_time: f64,
    },
    Failure {
        original: String,
        message: String,
    },
}

/// Runs one batch on the blocking pool, in submission order. One file's failure never
/// aborts the rest.
fn convert_batch(
    pipeline: &Pipeline,
    store: &ArtifactStore,
    session_id: &SessionId,
    output: &OutputFormat,
    files: Vec<UploadedFile>,
) -> Vec<BatchOutcome> {
    files
        .into_iter()
        .map(|file| {
            let converted = match artifact_file_name(&file.name, output) {
                Ok(converted) => converted,
                Err(message) => {
                    return BatchOutcome::Failure {
                        original: file.name,
                        message,
                    };
                }
            };
            match pipeline.convert(&file.bytes, &file.name, output) {
                Ok(bytes) => match store.write_artifact(session_id, &converted, &bytes) {
                    Ok(_) => BatchOutcome::Success {
                        original: file.name,
                        converted,
                        conversion_time: epoch_seconds_now(),
                    },
                    Err(err) => {
                        warn!(file = %file.name, %err, "could not store converted artifact");
                        BatchOutcome::Failure {
                            original: file.name,
                            message: err.to_string(),
                        }
                    }
                },
                Err(err) => {
                    warn!(file = %file.name, stage = err.stage(), %err, "conversion failed");
                    BatchOutcome::Failure {
                        original: file.name,
                        message: err.to_string(),
                    }
                }
            }
        })
        .collect()
}

/// Derives the stored file name: the original's stem plus the requested extension.
fn artifact_file_name(original: &str, output: &OutputFormat) -> Result<String, String> {
    let base = Path::new(original)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("");
    let stem = Path::new(base)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("");
    if stem.is_empty() {
        return Err(format!("Invalid file name: {original}"));
    }
    let converted = format!("{stem}.{}", output.extension());
    validate_path_segment(&converted)
        .map_err(|err| format!("Invalid file name {original}: {err}"))?;
    Ok(converted)
}

fn parse_session_id(raw_id: &str, noun: &str) -> Result<SessionId, ApiError> {
    SessionId::new(raw_id).map_err(|_| link_invalid(noun))
}

fn mime_for(file_name: &str) -> &'static str {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(image::ImageFormat::from_extension)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

fn format_epoch(epoch_seconds: f64) -> String {
    chrono::Local
        .timestamp_opt(epoch_seconds as i64, 0)
        .single()
        .map(|stamp| stamp.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Builds the HTTP router. Handlers stay thin: decode the request, call the matching
/// [`App`] method, encode the response.
pub fn router(app: App) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/check-session/{session_id}", get(check_session))
        .route("/share/{session_id}/{filename}", get(share))
        .route("/static-file/{session_id}/{filename}", get(static_file))
        .route("/session/{session_id}", get(view_session))
        .route("/download/{session_id}/{filename}", get(download))
        .route("/download-all/{session_id}", get(download_all))
        .route("/cleanup/{session_id}", post(cleanup))
        .route("/extend/{session_id}", post(extend))
        .route("/api/formats", get(formats))
        .route("/api/check-gs", get(check_tool))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(app)
}

async fn upload(
    State(app): State<App>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (files, requested_format) =
        tokio::time::timeout(UPLOAD_READ_TIMEOUT, read_upload_body(multipart))
            .await
            .map_err(|_| ApiError::BadRequest {
                message: "Upload timed out".to_owned(),
            })??;

    let requested_format =
        requested_format.unwrap_or_else(|| DEFAULT_OUTPUT_KIND.to_owned());
    let response = app.upload_batch(files, &requested_format).await?;
    Ok(Json(response))
}

async fn read_upload_body(
    mut multipart: Multipart,
) -> Result<(Vec<UploadedFile>, Option<String>), ApiError> {
    let mut files = Vec::new();
    let mut requested_format = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        ApiError::BadRequest {
            message: format!("Malformed upload body: {err}"),
        }
    })? {
        let field_name = field.name().map(ToOwned::to_owned);
        match field_name.as_deref() {
            Some("files[]") | Some("files") => {
                let name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await.map_err(|err| ApiError::BadRequest {
                    message: format!("Could not read uploaded file: {err}"),
                })?;
                if name.is_empty() {
                    continue;
                }
                files.push(UploadedFile {
                    name,
                    bytes: bytes.to_vec(),
                });
            }
            Some("format") => {
                let value = field.text().await.map_err(|err| ApiError::BadRequest {
                    message: format!("Could not read format field: {err}"),
                })?;
                requested_format = Some(value);
            }
            _ => {}
        }
    }

    Ok((files, requested_format))
}

async fn check_session(
    State(app): State<App>,
    UrlPath(session_id): UrlPath<String>,
) -> Json<CheckSessionResponse> {
    Json(app.check_session(&session_id))
}

async fn share(
    State(app): State<App>,
    UrlPath((session_id, filename)): UrlPath<(String, String)>,
) -> Result<Json<ShareResponse>, ApiError> {
    Ok(Json(app.share(&session_id, &filename)?))
}

async fn static_file(
    State(app): State<App>,
    UrlPath((session_id, filename)): UrlPath<(String, String)>,
) -> Result<Response, ApiError> {
    let worker = app.clone();
    let (bytes, mime) =
        tokio::task::spawn_blocking(move || worker.fetch_artifact(&session_id, &filename))
            .await
            .map_err(internal)??;
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

async fn download(
    State(app): State<App>,
    UrlPath((session_id, filename)): UrlPath<(String, String)>,
) -> Result<Response, ApiError> {
    let worker = app.clone();
    let name = filename.clone();
    let (bytes, mime) =
        tokio::task::spawn_blocking(move || worker.fetch_artifact(&session_id, &filename))
            .await
            .map_err(internal)??;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(mime)),
            (header::CONTENT_DISPOSITION, attachment_header(&name)),
        ],
        bytes,
    )
        .into_response())
}

async fn view_session(
    State(app): State<App>,
    UrlPath(session_id): UrlPath<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    Ok(Json(app.view_session(&session_id)?))
}

async fn download_all(
    State(app): State<App>,
    UrlPath(session_id): UrlPath<String>,
) -> Result<Response, ApiError> {
    let worker = app.clone();
    let (bytes, name) = tokio::task::spawn_blocking(move || worker.download_all(&session_id))
        .await
        .map_err(internal)??;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/zip"),
            ),
            (header::CONTENT_DISPOSITION, attachment_header(&name)),
        ],
        bytes,
    )
        .into_response())
}

async fn cleanup(
    State(app): State<App>,
    UrlPath(session_id): UrlPath<String>,
) -> Json<CleanupResponse> {
    Json(app.cleanup(&session_id))
}

async fn extend(
    State(app): State<App>,
    UrlPath(session_id): UrlPath<String>,
) -> Result<Json<ExtendResponse>, ApiError> {
    Ok(Json(app.extend(&session_id)?))
}

async fn formats(State(app): State<App>) -> Json<SupportedFormats> {
    Json(app.formats())
}

async fn check_tool(State(app): State<App>) -> Response {
    let worker = app.clone();
    match tokio::task::spawn_blocking(move || worker.check_tool()).await {
        Ok((true, body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok((false, body)) => (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response(),
        Err(err) => internal(err).into_response(),
    }
}

fn attachment_header(file_name: &str) -> HeaderValue {
    let sanitized: String = file_name
        .chars()
        .filter(|ch| !ch.is_control() && *ch != '"')
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{sanitized}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests;

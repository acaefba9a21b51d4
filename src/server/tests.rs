// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::{artifact_file_name, App, ApiError, UploadedFile};
use crate::config::Config;
use crate::convert::{ExternalToolError, OutputFormat, RasterTarget, Rasterizer};
use crate::model::{epoch_seconds_now, SessionId, SessionRecord};
use crate::server::types::FileStatus;
use crate::store::LoadedIndex;

static TEMP_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

struct TempDir {
    path: std::path::PathBuf,
}

impl TempDir {
    fn new(prefix: &str) -> Self {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let counter = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!("proteus-{prefix}-{}-{nanos}-{counter}", std::process::id()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

struct FailingRasterizer;

impl Rasterizer for FailingRasterizer {
    fn probe(&self) -> Result<String, ExternalToolError> {
        Err(ExternalToolError::Failed {
            binary: "gs".to_owned(),
            status: Some(127),
            stderr: "not installed".to_owned(),
        })
    }

    fn rasterize(
        &self,
        _input: &[u8],
        _target: RasterTarget,
        _dpi: u32,
    ) -> Result<Vec<u8>, ExternalToolError> {
        Err(ExternalToolError::Failed {
            binary: "gs".to_owned(),
            status: Some(1),
            stderr: "scripted failure".to_owned(),
        })
    }
}

fn test_app(tmp: &TempDir) -> App {
    let config = Config {
        output_dir: tmp.path().join("outputs"),
        index_path: tmp.path().join("sessions.json"),
        ..Config::default()
    };
    let app = App::new(config, Arc::new(FailingRasterizer));
    app.init_from_disk().unwrap();
    app
}

fn png_upload(name: &str) -> UploadedFile {
    let image = image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 128, 255, 255]));
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .unwrap();
    UploadedFile {
        name: name.to_owned(),
        bytes: cursor.into_inner(),
    }
}

fn corrupt_upload(name: &str) -> UploadedFile {
    UploadedFile {
        name: name.to_owned(),
        bytes: b"this is not an image at all".to_vec(),
    }
}

fn sid(value: &str) -> SessionId {
    SessionId::new(value).unwrap()
}

#[tokio::test]
async fn partial_failure_keeps_the_session_and_reports_warnings() {
    let tmp = TempDir::new("upload-partial");
    let app = test_app(&tmp);

    let files = vec![png_upload("one.png"), corrupt_upload("two.png"), png_upload("three.png")];
    let response = app.upload_batch(files, "jpeg").await.unwrap();

    let statuses: Vec<FileStatus> = response.results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, [FileStatus::Success, FileStatus::Error, FileStatus::Success]);

    let success_urls: Vec<_> = response
        .results
        .iter()
        .filter(|r| r.status == FileStatus::Success)
        .map(|r| r.download_url.as_deref().unwrap())
        .collect();
    assert_eq!(success_urls.len(), 2);
    assert!(success_urls.iter().all(|url| url.starts_with("/download/")));

    let failed = &response.results[1];
    assert!(failed.error.as_deref().unwrap().contains("two.png"));
    assert_eq!(response.warnings.as_ref().unwrap().len(), 1);

    // The session survives with exactly the successful records, in batch order.
    let session_id = sid(&response.session_id);
    let record = app.registry().get(&session_id).unwrap();
    let originals: Vec<_> =
        record.files().iter().map(|f| f.original_filename.as_str()).collect();
    assert_eq!(originals, ["one.png", "three.png"]);
    assert!(app.store().session_dir_exists(&session_id));
    assert!(app.store().artifact_exists(&session_id, "one.jpeg"));
}

#[tokio::test]
async fn all_failures_discard_the_session() {
    let tmp = TempDir::new("upload-all-failed");
    let app = test_app(&tmp);

    let files =
        vec![corrupt_upload("a.png"), corrupt_upload("b.png"), corrupt_upload("c.png")];
    let err = app.upload_batch(files, "png").await.unwrap_err();

    let details = match err {
        ApiError::AllFailed { message, details } => {
            assert!(message.contains(';'), "aggregated message: {message}");
            details
        }
        other => panic!("expected AllFailed, got: {other:?}"),
    };
    assert_eq!(details.len(), 3);
    assert!(details.iter().all(|r| r.status == FileStatus::Error));

    // No session directory and no registry entry remain.
    assert!(app.registry().is_empty());
    let root_entries: Vec<_> = std::fs::read_dir(app.store().root())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .collect();
    assert!(root_entries.is_empty(), "store root should be empty");
}

#[tokio::test]
async fn eps_output_kind_is_rejected_up_front() {
    let tmp = TempDir::new("upload-eps-output");
    let app = test_app(&tmp);

    let err = app.upload_batch(vec![png_upload("a.eps")], "eps").await.unwrap_err();
    match err {
        ApiError::BadRequest { message } => {
            assert_eq!(message, "EPS output format is not supported");
        }
        other => panic!("expected BadRequest, got: {other:?}"),
    }
    // Rejected before any conversion: nothing was created.
    assert!(app.registry().is_empty());
}

#[tokio::test]
async fn empty_batches_are_rejected() {
    let tmp = TempDir::new("upload-empty");
    let app = test_app(&tmp);

    let err = app.upload_batch(Vec::new(), "png").await.unwrap_err();
    match err {
        ApiError::BadRequest { message } => assert_eq!(message, "No files provided"),
        other => panic!("expected BadRequest, got: {other:?}"),
    }
}

#[test]
fn share_reconciles_a_lost_registry_entry_from_disk() {
    let tmp = TempDir::new("share-reconcile");
    let app = test_app(&tmp);

    // Simulate a restart: the directory exists, the registry knows nothing.
    let session_id = sid("0123456789abcdef0123456789abcdef");
    app.store().write_artifact(&session_id, "photo.png", b"png-bytes").unwrap();
    assert!(!app.registry().contains(&session_id));

    let before = epoch_seconds_now();
    let response = app.share(session_id.as_str(), "photo.png").unwrap();
    assert_eq!(response.filename, "photo.png");
    assert!(response.seconds_left > 0);

    // A fresh TTL window was granted and the file is servable.
    let record = app.registry().get(&session_id).unwrap();
    assert!(record.expires_at() >= before + app.config().session_ttl());
    let (bytes, mime) = app.fetch_artifact(session_id.as_str(), "photo.png").unwrap();
    assert_eq!(bytes, b"png-bytes");
    assert_eq!(mime, "image/png");
}

#[test]
fn unknown_links_and_expired_links_fold_to_the_same_message() {
    let tmp = TempDir::new("share-gone");
    let app = test_app(&tmp);

    let unknown = app.share("does-not-exist", "photo.png").unwrap_err();
    let unknown_message = match unknown {
        ApiError::Gone { message } => message,
        other => panic!("expected Gone, got: {other:?}"),
    };

    let session_id = sid("expired-session-0123456789abcdef");
    app.store().write_artifact(&session_id, "photo.png", b"png").unwrap();
    app.registry().register(SessionRecord::new(session_id.clone(), 1.0));

    let expired = app.share(session_id.as_str(), "photo.png").unwrap_err();
    let expired_message = match expired {
        ApiError::Gone { message } => message,
        other => panic!("expected Gone, got: {other:?}"),
    };

    assert_eq!(unknown_message, expired_message);
}

#[test]
fn check_session_reports_validity_and_time_left() {
    let tmp = TempDir::new("check-session");
    let app = test_app(&tmp);

    let now = epoch_seconds_now();
    let session_id = sid("check-session-0123456789abcdef00");
    app.registry().register(SessionRecord::new(session_id.clone(), now + 60.0));

    let response = app.check_session(session_id.as_str());
    assert!(response.valid);
    assert!(response.seconds_left.unwrap() <= 60);

    app.registry().register(SessionRecord::new(sid("gone-session-0123456789abcdef000"), now - 1.0));
    let response = app.check_session("gone-session-0123456789abcdef000");
    assert!(!response.valid);
    assert_eq!(response.expires_at, None);

    // Unknown ids are just invalid, no error.
    assert!(!app.check_session("never-existed").valid);
}

#[test]
fn extend_replaces_the_window_and_reconciles_from_disk() {
    let tmp = TempDir::new("extend");
    let app = test_app(&tmp);

    // Directory on disk, no registry entry: extension revives it through the
    // reconciler and grants now + TTL.
    let session_id = sid("extend-session-0123456789abcdef00");
    app.store().write_artifact(&session_id, "a.png", b"a").unwrap();

    let response = app.extend(session_id.as_str()).unwrap();
    assert_eq!(response.status, "success");
    assert_eq!(response.seconds_left, app.config().session_ttl_seconds);

    // No directory and no entry: not found, nothing resurrected.
    let err = app.extend("missing-session-0123456789abcdef0").unwrap_err();
    match err {
        ApiError::Gone { message } => assert_eq!(message, "Session not found"),
        other => panic!("expected Gone, got: {other:?}"),
    }
    assert!(!app.registry().contains(&sid("missing-session-0123456789abcdef0")));
}

#[tokio::test]
async fn cleanup_removes_entry_and_bundle_but_keeps_files() {
    let tmp = TempDir::new("cleanup");
    let app = test_app(&tmp);

    let response = app.upload_batch(vec![png_upload("keep.png")], "png").await.unwrap();
    let session_id = sid(&response.session_id);
    app.store().build_bundle(&session_id).unwrap();

    let cleanup = app.cleanup(session_id.as_str());
    assert_eq!(cleanup.status, "success");
    assert!(!app.registry().contains(&session_id));
    assert!(!app.store().bundle_exists(&session_id));
    assert!(app.store().artifact_exists(&session_id, "keep.png"));

    // Idempotent, and the flushed snapshot no longer lists the session.
    assert_eq!(app.cleanup(session_id.as_str()).status, "success");
    match app.index().load().unwrap() {
        LoadedIndex::Loaded(records) => assert!(records.is_empty()),
        LoadedIndex::Missing => panic!("expected a flushed snapshot"),
    }
}

#[tokio::test]
async fn view_session_lists_files_with_links() {
    let tmp = TempDir::new("view-session");
    let app = test_app(&tmp);

    let response = app
        .upload_batch(vec![png_upload("b.png"), png_upload("a.png")], "png")
        .await
        .unwrap();
    let view = app.view_session(&response.session_id).unwrap();

    let names: Vec<_> = view.files.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, ["a.png", "b.png"]);
    for file in &view.files {
        assert!(file.download_url.starts_with("/download/"));
        assert!(file.share_url.contains("/share/"));
    }
    assert_eq!(view.download_all_url, format!("/download-all/{}", response.session_id));
}

#[tokio::test]
async fn download_all_serves_a_zip_named_after_the_session() {
    let tmp = TempDir::new("download-all");
    let app = test_app(&tmp);

    let response = app.upload_batch(vec![png_upload("a.png")], "png").await.unwrap();
    let (bytes, name) = app.download_all(&response.session_id).unwrap();
    assert_eq!(name, format!("{}_converted.zip", response.session_id));

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.by_index(0).unwrap().name(), "a.png");
}

#[test]
fn check_tool_reports_the_probe_failure() {
    let tmp = TempDir::new("check-tool");
    let app = test_app(&tmp);

    let (available, body) = app.check_tool();
    assert!(!available);
    assert_eq!(body.status, "error");
    assert!(body.message.contains("Failed to check Ghostscript"));
}

#[test]
fn converted_names_keep_the_stem_and_take_the_requested_extension() {
    let output = OutputFormat::parse("JPEG").unwrap();
    assert_eq!(artifact_file_name("photo.heic", &output).unwrap(), "photo.jpeg");
    assert_eq!(artifact_file_name("archive.tar.gz", &output).unwrap(), "archive.tar.jpeg");
    assert_eq!(artifact_file_name("dir/nested.png", &output).unwrap(), "nested.jpeg");
    assert!(artifact_file_name("", &output).is_err());
}

#[test]
fn startup_prefers_the_snapshot_over_the_bulk_scan() {
    let tmp = TempDir::new("startup-snapshot");

    // An empty-but-present snapshot means "no sessions", even when plausible
    // directories sit in the store root.
    std::fs::write(tmp.path().join("sessions.json"), "{}").unwrap();
    let app = test_app(&tmp);
    app.store().ensure_session_dir(&sid("0123456789abcdef0123456789abcdef")).unwrap();

    app.init_from_disk().unwrap();
    assert!(app.registry().is_empty());
}

#[test]
fn startup_without_a_snapshot_scans_the_store_root() {
    let tmp = TempDir::new("startup-scan");
    let config = Config {
        output_dir: tmp.path().join("outputs"),
        index_path: tmp.path().join("sessions.json"),
        ..Config::default()
    };
    let session_id = sid("0123456789abcdef0123456789abcdef");
    std::fs::create_dir_all(config.output_dir.join(session_id.as_str())).unwrap();
    std::fs::create_dir_all(config.output_dir.join("short")).unwrap();

    let app = App::new(config, Arc::new(FailingRasterizer));
    let before = epoch_seconds_now();
    app.init_from_disk().unwrap();

    let record = app.registry().get(&session_id).expect("scanned session");
    // Discovered directories get the generous starter window, not the session TTL.
    assert!(record.expires_at() >= before + app.config().starter_ttl());
    assert!(!app.registry().contains(&sid("short")));
}

// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rstest::{fixture, rstest};

use super::{AccessError, Reconciler};
use crate::model::{epoch_seconds_now, SessionId, SessionRecord};
use crate::registry::SessionRegistry;
use crate::store::{ArtifactStore, LoadedIndex, SessionIndex};

static TEMP_DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

struct TempDir {
    path: std::path::PathBuf,
}

impl TempDir {
    fn new(prefix: &str) -> Self {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let counter = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = env::temp_dir();
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

struct ReconcilerTestCtx {
    _tmp: TempDir,
    registry: Arc<SessionRegistry>,
    store: ArtifactStore,
    index: SessionIndex,
    reconciler: Reconciler,
}

impl ReconcilerTestCtx {
    fn new(prefix: &str) -> Self {
        let tmp = TempDir::new(prefix);
        let registry = Arc::new(SessionRegistry::new());
        let store = ArtifactStore::new(tmp.path().join("outputs"));
        std::fs::create_dir_all(store.root()).unwrap();
        let index = SessionIndex::new(tmp.path().join("sessions.json"));
        let reconciler =
            Reconciler::new(registry.clone(), store.clone(), index.clone(), 3600.0);
        Self { _tmp: tmp, registry, store, index, reconciler }
    }
}

#[fixture]
fn ctx() -> ReconcilerTestCtx {
    ReconcilerTestCtx::new("reconcile")
}

fn sid(value: &str) -> SessionId {
    SessionId::new(value).unwrap()
}

#[rstest]
fn registry_miss_with_file_on_disk_synthesizes_a_fresh_record(ctx: ReconcilerTestCtx) {
    let session_id = sid("lost-after-restart");
    ctx.store.write_artifact(&session_id, "photo.png", b"png").unwrap();

    let before = epoch_seconds_now();
    let record = ctx.reconciler.resolve_file(&session_id, "photo.png").unwrap();

    // Fresh TTL grant, not inherited from anything.
    assert!(record.expires_at() >= before + 3600.0);
    assert_eq!(record.files().len(), 1);
    assert_eq!(record.files()[0].converted_filename, "photo.png");

    // The entry is now in the registry and in the flushed snapshot.
    assert!(ctx.registry.contains(&session_id));
    match ctx.index.load().unwrap() {
        LoadedIndex::Loaded(records) => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].session_id(), &session_id);
        }
        LoadedIndex::Missing => panic!("expected a flushed snapshot"),
    }
}

#[rstest]
fn registry_miss_with_no_directory_is_not_found(ctx: ReconcilerTestCtx) {
    let err = ctx.reconciler.resolve_file(&sid("ghost"), "photo.png").unwrap_err();
    assert_eq!(err, AccessError::NotFound { session_id: sid("ghost") });
    assert!(!ctx.registry.contains(&sid("ghost")));
}

#[rstest]
fn whole_session_resolution_lists_directory_files(ctx: ReconcilerTestCtx) {
    let session_id = sid("s-whole");
    ctx.store.write_artifact(&session_id, "b.png", b"b").unwrap();
    ctx.store.write_artifact(&session_id, "a.png", b"a").unwrap();
    std::fs::write(ctx.store.session_dir(&session_id).join("old.zip"), b"zip").unwrap();

    let record = ctx.reconciler.resolve_session(&session_id).unwrap();
    let names: Vec<_> =
        record.files().iter().map(|f| f.converted_filename.as_str()).collect();
    assert_eq!(names, ["a.png", "b.png"]);
}

#[rstest]
fn auto_registration_is_idempotent(ctx: ReconcilerTestCtx) {
    let session_id = sid("s-idem");
    ctx.store.write_artifact(&session_id, "a.png", b"a").unwrap();

    let first = ctx.reconciler.resolve_session(&session_id).unwrap();
    let second = ctx.reconciler.resolve_session(&session_id).unwrap();
    assert_eq!(first, second);

    // A single-file resolution after the fact does not rewrite the files list either.
    let third = ctx.reconciler.resolve_file(&session_id, "a.png").unwrap();
    assert_eq!(third.files(), first.files());
}

#[rstest]
fn expired_registry_entry_reports_expired_not_not_found(ctx: ReconcilerTestCtx) {
    let session_id = sid("s-expired");
    ctx.registry.register(SessionRecord::new(session_id.clone(), 1.0));

    let err = ctx.reconciler.resolve_session(&session_id).unwrap_err();
    assert_eq!(err, AccessError::Expired { session_id });
}

#[rstest]
fn bootstrap_registers_only_plausible_directories(ctx: ReconcilerTestCtx) {
    let long_id = sid("0123456789abcdef0123456789abcdef");
    ctx.store.ensure_session_dir(&long_id).unwrap();
    ctx.store.ensure_session_dir(&sid("not-a-session")).unwrap();

    let before = epoch_seconds_now();
    let count = ctx.reconciler.bootstrap(32, 24.0 * 3600.0);
    assert_eq!(count, 1);

    let record = ctx.registry.get(&long_id).expect("bootstrapped session");
    assert!(record.expires_at() >= before + 24.0 * 3600.0);
    assert!(record.files().is_empty());
    assert!(!ctx.registry.contains(&sid("not-a-session")));

    // The discovered sessions were flushed.
    assert_ne!(ctx.index.load().unwrap(), LoadedIndex::Missing);
}

#[rstest]
fn bootstrap_on_an_empty_root_registers_nothing(ctx: ReconcilerTestCtx) {
    assert_eq!(ctx.reconciler.bootstrap(32, 24.0 * 3600.0), 0);
    assert!(ctx.registry.is_empty());
    // No sessions were discovered, so no snapshot is written either.
    assert_eq!(ctx.index.load().unwrap(), LoadedIndex::Missing);
}

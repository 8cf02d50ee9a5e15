//! The attachment pass run after each entity sync.
//!
//! Walks every live file attachment of the merged snapshot, uploads files
//! the remote lacks, downloads files this device lacks and keeps
//! `localStatus` honest. Transfers run one at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::backoff::{BackoffConfig, BackoffReason, BackoffTable};
use super::policy::{resolve_mime, AttachmentConfig, AttachmentPolicy};
use super::retry::{with_retry, RetryPolicy};
use super::throttle::{ThrottleConfig, WebDavThrottle};
use crate::backend::{BackendKind, RemoteBackend};
use crate::clock::Clock;
use crate::models::{AppData, Attachment, LocalStatus};
use crate::storage::write_atomic;
use crate::{Error, Result};

/// Remote folder holding attachment blobs.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Outcome of one attachment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentReport {
    pub uploaded: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Stale cloud keys dropped after the remote reported them missing.
    pub cleared_keys: usize,
    /// The pass stopped early because the backend is rate limiting.
    pub rate_limited: bool,
    /// Whether the snapshot was modified and needs persisting.
    pub mutated: bool,
}

/// Settings for [`AttachmentSyncer`].
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    pub retry: RetryPolicy,
    pub throttle: ThrottleConfig,
    pub backoff: BackoffConfig,
    pub attachments: AttachmentConfig,
    /// Where every download lands.
    pub download_dir: PathBuf,
}

/// Cloud key for an attachment: `attachments/<id>.<ext>`.
pub fn cloud_key_for(attachment: &Attachment) -> String {
    attachment.extension().map_or_else(
        || format!("{ATTACHMENTS_DIR}/{}", attachment.id),
        |ext| format!("{ATTACHMENTS_DIR}/{}.{ext}", attachment.id),
    )
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

enum Step {
    Uploaded,
    Downloaded,
    Refreshed { changed: bool },
    Skipped,
    /// The remote no longer has the blob behind the cloud key.
    RemoteMissing,
}

/// Budget for one pass. Only WebDAV is capped.
struct PassBudget {
    uploads_left: usize,
    downloads_left: usize,
    directory_ready: bool,
}

/// Runs the attachment pass. Keeps throttle and backoff state across cycles.
pub struct AttachmentSyncer {
    options: TransferOptions,
    throttle: WebDavThrottle,
    backoff: Mutex<BackoffTable>,
    clock: Arc<dyn Clock>,
}

impl AttachmentSyncer {
    pub fn new(options: TransferOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            throttle: WebDavThrottle::new(options.throttle),
            backoff: Mutex::new(BackoffTable::new(options.backoff)),
            options,
            clock,
        }
    }

    /// Reconcile every live file attachment in `data` with `backend`.
    ///
    /// Never fails as a whole: per-attachment errors are logged and
    /// counted, and a rate limit ends the pass early.
    pub async fn run<R>(&self, backend: &R, data: &mut AppData) -> AttachmentReport
    where
        R: RemoteBackend + ?Sized,
    {
        let kind = backend.kind();
        let mut report = AttachmentReport::default();

        if kind == BackendKind::WebDav {
            if let Some(remaining) = self.throttle.cooldown_remaining().await {
                info!(
                    remaining_secs = remaining.as_secs(),
                    "WebDAV cooldown active, skipping attachment pass"
                );
                report.rate_limited = true;
                return report;
            }
        }

        let policy = AttachmentPolicy::for_backend(kind, &self.options.attachments);
        let mut budget = match kind {
            BackendKind::WebDav => PassBudget {
                uploads_left: self.options.throttle.max_uploads_per_cycle,
                downloads_left: self.options.throttle.max_downloads_per_cycle,
                directory_ready: false,
            },
            BackendKind::File | BackendKind::Cloud => PassBudget {
                uploads_left: usize::MAX,
                downloads_left: usize::MAX,
                directory_ready: false,
            },
        };
        self.backoff.lock().await.prune(self.clock.now());

        let owners = data
            .tasks
            .iter_mut()
            .chain(data.projects.iter_mut())
            .filter(|entity| !entity.meta.is_deleted());
        'pass: for owner in owners {
            for attachment in owner
                .attachments
                .iter_mut()
                .filter(|attachment| attachment.is_transferable())
            {
                match self
                    .process(backend, &policy, &mut budget, attachment)
                    .await
                {
                    Ok(Step::Uploaded) => {
                        report.uploaded += 1;
                        report.mutated = true;
                    }
                    Ok(Step::Downloaded) => {
                        report.downloaded += 1;
                        report.mutated = true;
                    }
                    Ok(Step::Refreshed { changed }) => report.mutated |= changed,
                    Ok(Step::Skipped) => report.skipped += 1,
                    Err(Error::RateLimited { retry_after, .. }) => {
                        if kind == BackendKind::WebDav {
                            self.throttle.enter_cooldown(retry_after).await;
                        }
                        warn!(
                            attachment_id = %attachment.id,
                            "backend is rate limiting, ending attachment pass"
                        );
                        report.rate_limited = true;
                        break 'pass;
                    }
                    Ok(Step::RemoteMissing) => {
                        warn!(
                            attachment_id = %attachment.id,
                            cloud_key = attachment.cloud_key.as_deref().unwrap_or(""),
                            "remote copy is gone, clearing cloud key"
                        );
                        attachment.cloud_key = None;
                        attachment.local_status = Some(LocalStatus::Missing);
                        self.note_failure(&attachment.id, BackoffReason::MissingOnRemote)
                            .await;
                        report.cleared_keys += 1;
                        report.mutated = true;
                    }
                    Err(error) => {
                        warn!(attachment_id = %attachment.id, %error, "attachment transfer failed");
                        if matches!(error, Error::Integrity { .. })
                            && attachment.local_status != Some(LocalStatus::Missing)
                        {
                            attachment.local_status = Some(LocalStatus::Missing);
                            report.mutated = true;
                        }
                        self.note_failure(&attachment.id, BackoffReason::Transient)
                            .await;
                        report.failed += 1;
                    }
                }
            }
        }

        if report.uploaded + report.downloaded + report.failed > 0 || report.rate_limited {
            info!(
                uploaded = report.uploaded,
                downloaded = report.downloaded,
                failed = report.failed,
                skipped = report.skipped,
                rate_limited = report.rate_limited,
                "attachment pass finished"
            );
        }
        report
    }

    async fn process<R>(
        &self,
        backend: &R,
        policy: &AttachmentPolicy,
        budget: &mut PassBudget,
        attachment: &mut Attachment,
    ) -> Result<Step>
    where
        R: RemoteBackend + ?Sized,
    {
        if let Some(reason) = self
            .backoff
            .lock()
            .await
            .blocked(&attachment.id, self.clock.now())
        {
            debug!(attachment_id = %attachment.id, ?reason, "attachment backing off");
            return Ok(Step::Skipped);
        }

        let local_path = local_path(attachment);
        let exists = match &local_path {
            Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        };

        match (attachment.cloud_key.is_some(), local_path) {
            (false, Some(path)) if exists => {
                if budget.uploads_left == 0 {
                    return Ok(Step::Skipped);
                }
                budget.uploads_left -= 1;
                self.upload(backend, policy, budget, attachment, &path).await?;
                Ok(Step::Uploaded)
            }
            (true, _) if !exists => {
                if budget.downloads_left == 0 {
                    return Ok(Step::Skipped);
                }
                budget.downloads_left -= 1;
                self.download(backend, attachment).await
            }
            _ => {
                let status = if exists {
                    LocalStatus::Available
                } else {
                    LocalStatus::Missing
                };
                let changed = attachment.local_status != Some(status);
                attachment.local_status = Some(status);
                Ok(Step::Refreshed { changed })
            }
        }
    }

    async fn upload<R>(
        &self,
        backend: &R,
        policy: &AttachmentPolicy,
        budget: &mut PassBudget,
        attachment: &mut Attachment,
        path: &Path,
    ) -> Result<()>
    where
        R: RemoteBackend + ?Sized,
    {
        let bytes = tokio::fs::read(path).await?;
        let mime = resolve_mime(attachment, path);
        policy.check(&attachment.id, bytes.len() as u64, &mime)?;

        if !budget.directory_ready {
            self.remote_call(backend.kind(), "make_directory", || {
                backend.make_directory(ATTACHMENTS_DIR)
            })
            .await?;
            budget.directory_ready = true;
        }

        let key = cloud_key_for(attachment);
        self.remote_call(backend.kind(), "put_file", || {
            backend.put_file(&key, &bytes, Some(&mime))
        })
        .await?;

        debug!(attachment_id = %attachment.id, %key, size = bytes.len(), "uploaded attachment");
        attachment.cloud_key = Some(key);
        if attachment.file_hash.is_none() {
            attachment.file_hash = Some(sha256_hex(&bytes));
        }
        attachment.size.get_or_insert(bytes.len() as u64);
        attachment.mime_type.get_or_insert(mime);
        attachment.local_status = Some(LocalStatus::Available);
        self.backoff.lock().await.clear(&attachment.id);
        Ok(())
    }

    /// Fetch the blob into the download directory. The merged `uri` may
    /// name a path on another device and is never written to.
    async fn download<R>(&self, backend: &R, attachment: &mut Attachment) -> Result<Step>
    where
        R: RemoteBackend + ?Sized,
    {
        let Some(key) = attachment.cloud_key.clone() else {
            return Ok(Step::Skipped);
        };
        let bytes = match self
            .remote_call(backend.kind(), "get_file", || backend.get_file(&key))
            .await
        {
            Ok(bytes) => bytes,
            Err(Error::NotFound(_)) => return Ok(Step::RemoteMissing),
            Err(error) => return Err(error),
        };

        if let Some(expected) = attachment.file_hash.as_deref() {
            let actual = sha256_hex(&bytes);
            if !expected.trim().eq_ignore_ascii_case(&actual) {
                return Err(Error::Integrity {
                    attachment_id: attachment.id.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let target = self.download_target(&key);
        write_atomic(&target, &bytes).await?;

        debug!(attachment_id = %attachment.id, path = %target.display(), "downloaded attachment");
        attachment.uri = target.to_string_lossy().into_owned();
        attachment.local_status = Some(LocalStatus::Available);
        self.backoff.lock().await.clear(&attachment.id);
        Ok(Step::Downloaded)
    }

    /// One remote request with retry, paced on WebDAV.
    async fn remote_call<T, F, Fut>(&self, kind: BackendKind, label: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        with_retry(&self.options.retry, label, || {
            let request = call();
            async move {
                if kind == BackendKind::WebDav {
                    self.throttle.wait_turn().await?;
                }
                request.await
            }
        })
        .await
    }

    fn download_target(&self, key: &str) -> PathBuf {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        self.options.download_dir.join(file_name)
    }

    async fn note_failure(&self, attachment_id: &str, reason: BackoffReason) {
        self.backoff
            .lock()
            .await
            .record(attachment_id, reason, self.clock.now());
    }
}

/// Local path of a file attachment, if it has one.
fn local_path(attachment: &Attachment) -> Option<PathBuf> {
    let uri = attachment.uri.trim();
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FileBackend;
    use crate::clock::SystemClock;
    use crate::models::Entity;
    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn syncer(download_dir: &Path) -> AttachmentSyncer {
        AttachmentSyncer::new(
            TransferOptions {
                retry: RetryPolicy::no_retry(),
                download_dir: download_dir.to_path_buf(),
                ..TransferOptions::default()
            },
            Arc::new(SystemClock),
        )
    }

    fn task_with(attachments: Value) -> AppData {
        let mut task = Entity::new("t1", Utc::now());
        task.attachments = serde_json::from_value(attachments).unwrap();
        AppData {
            tasks: vec![task],
            ..AppData::default()
        }
    }

    #[test]
    fn cloud_key_uses_id_and_extension() {
        let attachment: Attachment = serde_json::from_value(json!({
            "id": "a1", "kind": "file", "uri": "/home/me/Scan.PDF"
        }))
        .unwrap();
        assert_eq!(cloud_key_for(&attachment), "attachments/a1.pdf");

        let bare: Attachment =
            serde_json::from_value(json!({"id": "a2", "kind": "file", "uri": "/tmp/blob"})).unwrap();
        assert_eq!(cloud_key_for(&bare), "attachments/a2");
    }

    #[tokio::test]
    async fn uploads_local_file_and_records_key() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let file = local.path().join("note.txt");
        tokio::fs::write(&file, b"hello").await.unwrap();
        let mut data = task_with(json!([{
            "id": "a1", "kind": "file", "uri": file.to_string_lossy(), "updatedAt": "2024-01-01"
        }]));

        let report = syncer(local.path())
            .run(&FileBackend::new(remote.path()), &mut data)
            .await;

        assert_eq!(report.uploaded, 1);
        assert!(report.mutated);
        let attachment = &data.tasks[0].attachments[0];
        assert_eq!(attachment.cloud_key.as_deref(), Some("attachments/a1.txt"));
        assert_eq!(attachment.file_hash.as_deref(), Some(sha256_hex(b"hello").as_str()));
        assert_eq!(attachment.local_status, Some(LocalStatus::Available));
        assert!(remote.path().join("attachments").join("a1.txt").exists());
    }

    #[tokio::test]
    async fn downloads_missing_file_after_verifying_hash() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(remote.path());
        backend
            .put_file("attachments/a1.png", b"pixels", None)
            .await
            .unwrap();
        let mut data = task_with(json!([{
            "id": "a1", "kind": "file", "cloudKey": "attachments/a1.png",
            "fileHash": sha256_hex(b"pixels"), "updatedAt": "2024-01-01"
        }]));

        let report = syncer(local.path()).run(&backend, &mut data).await;

        assert_eq!(report.downloaded, 1);
        let attachment = &data.tasks[0].attachments[0];
        assert_eq!(attachment.local_status, Some(LocalStatus::Available));
        let written = tokio::fs::read(&attachment.uri).await.unwrap();
        assert_eq!(written, b"pixels");
        assert_eq!(Path::new(&attachment.uri), local.path().join("a1.png"));
    }

    #[tokio::test]
    async fn hash_mismatch_leaves_attachment_missing() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(remote.path());
        backend
            .put_file("attachments/a1.png", b"tampered", None)
            .await
            .unwrap();
        let mut data = task_with(json!([{
            "id": "a1", "kind": "file", "cloudKey": "attachments/a1.png",
            "fileHash": sha256_hex(b"original"), "updatedAt": "2024-01-01"
        }]));

        let report = syncer(local.path()).run(&backend, &mut data).await;

        assert_eq!(report.failed, 1);
        let attachment = &data.tasks[0].attachments[0];
        assert_eq!(attachment.local_status, Some(LocalStatus::Missing));
        assert!(attachment.uri.is_empty());
        assert!(!local.path().join("a1.png").exists());
    }

    #[tokio::test]
    async fn missing_remote_copy_clears_stale_key() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let mut data = task_with(json!([{
            "id": "a1", "kind": "file", "cloudKey": "attachments/a1.png", "updatedAt": "2024-01-01"
        }]));
        let syncer = syncer(local.path());

        let report = syncer.run(&FileBackend::new(remote.path()), &mut data).await;

        assert_eq!(report.cleared_keys, 1);
        assert!(report.mutated);
        assert_eq!(data.tasks[0].attachments[0].cloud_key, None);
        assert_eq!(
            data.tasks[0].attachments[0].local_status,
            Some(LocalStatus::Missing)
        );
        assert_eq!(syncer.backoff.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn foreign_uri_is_never_written() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let foreign = elsewhere.path().join("Users/bob/Documents/scan.png");
        let backend = FileBackend::new(remote.path());
        backend
            .put_file("attachments/a1.png", b"pixels", None)
            .await
            .unwrap();
        let mut data = task_with(json!([{
            "id": "a1", "kind": "file", "uri": foreign.to_string_lossy(),
            "localStatus": "available", "cloudKey": "attachments/a1.png", "updatedAt": "2024-01-01"
        }]));

        let report = syncer(local.path()).run(&backend, &mut data).await;

        assert_eq!(report.downloaded, 1);
        assert!(!foreign.exists());
        assert!(!elsewhere.path().join("Users").exists());
        let attachment = &data.tasks[0].attachments[0];
        assert_eq!(Path::new(&attachment.uri), local.path().join("a1.png"));
        assert_eq!(tokio::fs::read(&attachment.uri).await.unwrap(), b"pixels");
    }

    /// Backend with no blobs that counts every blob request.
    struct EmptyRemote {
        kind: BackendKind,
        gets: AtomicUsize,
        puts: AtomicUsize,
        reject_uploads: bool,
    }

    impl EmptyRemote {
        fn new(kind: BackendKind) -> Self {
            Self {
                kind,
                gets: AtomicUsize::new(0),
                puts: AtomicUsize::new(0),
                reject_uploads: false,
            }
        }
    }

    #[async_trait]
    impl RemoteBackend for EmptyRemote {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn get_json(&self) -> Result<Option<Value>> {
            Ok(None)
        }

        async fn put_json(&self, _data: &AppData) -> Result<()> {
            Ok(())
        }

        async fn file_exists(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }

        async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Err(Error::NotFound(key.to_string()))
        }

        async fn put_file(&self, key: &str, _bytes: &[u8], _content_type: Option<&str>) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.reject_uploads {
                return Err(Error::NotFound(key.to_string()));
            }
            Ok(())
        }

        async fn delete_file(&self, _key: &str) -> Result<()> {
            Ok(())
        }

        async fn make_directory(&self, _path: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn upload_not_found_keeps_local_copy_available() {
        let local = tempfile::tempdir().unwrap();
        let file = local.path().join("scan.png");
        tokio::fs::write(&file, b"pixels").await.unwrap();
        let backend = EmptyRemote {
            reject_uploads: true,
            ..EmptyRemote::new(BackendKind::File)
        };
        let mut data = task_with(json!([{
            "id": "a1", "kind": "file", "uri": file.to_string_lossy(),
            "localStatus": "available", "updatedAt": "2024-01-01"
        }]));

        let report = syncer(local.path()).run(&backend, &mut data).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.cleared_keys, 0);
        assert!(!report.mutated);
        let attachment = &data.tasks[0].attachments[0];
        assert_eq!(attachment.local_status, Some(LocalStatus::Available));
        assert_eq!(attachment.cloud_key, None);
    }

    #[tokio::test]
    async fn backed_off_attachment_is_skipped_next_pass() {
        let local = tempfile::tempdir().unwrap();
        let backend = EmptyRemote::new(BackendKind::File);
        let mut data = task_with(json!([{
            "id": "a1", "kind": "file", "cloudKey": "attachments/a1.png", "updatedAt": "2024-01-01"
        }]));
        let syncer = syncer(local.path());

        let first = syncer.run(&backend, &mut data).await;
        assert_eq!(first.cleared_keys, 1);
        assert_eq!(backend.gets.load(Ordering::SeqCst), 1);

        let second = syncer.run(&backend, &mut data).await;

        assert_eq!(second.skipped, 1);
        assert!(!second.mutated);
        assert_eq!(backend.gets.load(Ordering::SeqCst), 1);
        assert_eq!(backend.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn webdav_uploads_are_capped_per_cycle() {
        let local = tempfile::tempdir().unwrap();
        let file = local.path().join("note.txt");
        tokio::fs::write(&file, b"hello").await.unwrap();
        let backend = EmptyRemote::new(BackendKind::WebDav);
        let mut data = task_with(json!([{
            "id": "a1", "kind": "file", "uri": file.to_string_lossy(), "updatedAt": "2024-01-01"
        }]));
        let syncer = AttachmentSyncer::new(
            TransferOptions {
                throttle: ThrottleConfig {
                    max_uploads_per_cycle: 0,
                    ..ThrottleConfig::default()
                },
                download_dir: local.path().to_path_buf(),
                ..TransferOptions::default()
            },
            Arc::new(SystemClock),
        );

        let report = syncer.run(&backend, &mut data).await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.uploaded, 0);
        assert_eq!(backend.puts.load(Ordering::SeqCst), 0);
        assert_eq!(data.tasks[0].attachments[0].cloud_key, None);
    }

    #[tokio::test]
    async fn links_and_deleted_attachments_are_ignored() {
        let remote = tempfile::tempdir().unwrap();
        let mut data = task_with(json!([
            {"id": "l1", "kind": "link", "uri": "https://example.com", "updatedAt": "2024-01-01"},
            {"id": "a1", "kind": "file", "uri": "https://cdn.example.com/a.png", "updatedAt": "2024-01-01"},
            {"id": "a2", "kind": "file", "uri": "/nowhere/a2.png", "cloudKey": "attachments/a2.png",
             "updatedAt": "2024-01-01", "deletedAt": "2024-01-01"}
        ]));

        let report = syncer(remote.path())
            .run(&FileBackend::new(remote.path()), &mut data)
            .await;

        assert_eq!(report, AttachmentReport::default());
    }

    #[tokio::test]
    async fn availability_flips_without_transfers() {
        let remote = tempfile::tempdir().unwrap();
        let mut data = task_with(json!([{
            "id": "a1", "kind": "file", "uri": "/definitely/not/here.png",
            "localStatus": "available", "updatedAt": "2024-01-01"
        }]));

        let report = syncer(remote.path())
            .run(&FileBackend::new(remote.path()), &mut data)
            .await;

        assert!(report.mutated);
        assert_eq!(
            data.tasks[0].attachments[0].local_status,
            Some(LocalStatus::Missing)
        );
    }

    /// WebDAV stand-in that rate limits every blob request.
    struct ThrottledDav {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteBackend for ThrottledDav {
        fn kind(&self) -> BackendKind {
            BackendKind::WebDav
        }

        async fn get_json(&self) -> Result<Option<Value>> {
            Ok(None)
        }

        async fn put_json(&self, _data: &AppData) -> Result<()> {
            Ok(())
        }

        async fn file_exists(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }

        async fn get_file(&self, _key: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::RateLimited {
                backend: "webdav",
                retry_after: Some(Duration::from_secs(30)),
            })
        }

        async fn put_file(&self, _key: &str, _bytes: &[u8], _content_type: Option<&str>) -> Result<()> {
            Ok(())
        }

        async fn delete_file(&self, _key: &str) -> Result<()> {
            Ok(())
        }

        async fn make_directory(&self, _path: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn rate_limit_aborts_pass_and_starts_cooldown() {
        let local = tempfile::tempdir().unwrap();
        let backend = ThrottledDav {
            calls: AtomicUsize::new(0),
        };
        let mut data = task_with(json!([
            {"id": "a1", "kind": "file", "cloudKey": "attachments/a1.png", "updatedAt": "2024-01-01"},
            {"id": "a2", "kind": "file", "cloudKey": "attachments/a2.png", "updatedAt": "2024-01-01"}
        ]));
        let syncer = AttachmentSyncer::new(
            TransferOptions {
                retry: RetryPolicy::no_retry(),
                throttle: ThrottleConfig {
                    min_interval_ms: 0,
                    ..ThrottleConfig::default()
                },
                download_dir: local.path().to_path_buf(),
                ..TransferOptions::default()
            },
            Arc::new(SystemClock),
        );

        let report = syncer.run(&backend, &mut data).await;
        assert!(report.rate_limited);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let next = syncer.run(&backend, &mut data).await;
        assert!(next.rate_limited);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn webdav_downloads_are_capped_per_cycle() {
        let local = tempfile::tempdir().unwrap();
        let backend = ThrottledDav {
            calls: AtomicUsize::new(0),
        };
        let mut data = task_with(json!([
            {"id": "a1", "kind": "file", "cloudKey": "attachments/a1.png", "updatedAt": "2024-01-01"}
        ]));
        let syncer = AttachmentSyncer::new(
            TransferOptions {
                throttle: ThrottleConfig {
                    max_downloads_per_cycle: 0,
                    ..ThrottleConfig::default()
                },
                download_dir: local.path().to_path_buf(),
                ..TransferOptions::default()
            },
            Arc::new(SystemClock),
        );

        let report = syncer.run(&backend, &mut data).await;

        assert_eq!(report.skipped, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}

//! Photo upload orchestration and best-effort deletion.
//!
//! Uploads are strictly sequential so a failure always names one specific
//! file and nothing after it has been sent. Deletion is a reconciliation:
//! the object behind a URL may live under the current path convention, an
//! older one, or may be gone already, and none of those cases is an error.

use crate::config::StorageConfig;
use crate::storage::client::{ObjectStore, StoreError};
use crate::storage::path::{build_public_url, build_upload_path, resolve_public_url};
use thiserror::Error;
use tracing::debug;

/// One file staged for upload, already read into memory.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Batch upload failure: names the file that broke the batch.
#[derive(Debug, Error)]
#[error("failed to upload \"{file_name}\": {reason}")]
pub struct UploadError {
    pub file_name: String,
    pub reason: String,
}

/// Upload `files` to the product's storage prefix, in order, returning the
/// public URL of each object.
///
/// The batch is atomic-or-failed from the caller's view: the first failure
/// aborts and no URL list is returned. Objects uploaded before the failure
/// stay in storage; re-running the save overwrites them in place.
pub async fn upload_photos<S: ObjectStore + ?Sized>(
    store: &S,
    config: &StorageConfig,
    product_id: i64,
    files: &[PhotoUpload],
) -> Result<Vec<String>, UploadError> {
    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        let path = build_upload_path(product_id, &file.file_name);
        let content_type = file
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        store
            .upload_object(&path, content_type, file.bytes.clone())
            .await
            .map_err(|err| UploadError {
                file_name: file.file_name.clone(),
                reason: err.to_string(),
            })?;
        urls.push(build_public_url(config, &path));
    }
    Ok(urls)
}

/// What happened to the object behind a deleted photo URL. Exactly one
/// classification per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// An object was removed from storage.
    Deleted,
    /// Every candidate path was already absent.
    Missing,
    /// The storage credentials cannot delete from this bucket.
    PermissionDenied,
    /// The URL is external; storage was not contacted.
    Skipped,
}

impl DeletionOutcome {
    pub fn describe(&self) -> &'static str {
        match self {
            DeletionOutcome::Deleted => "photo removed from storage",
            DeletionOutcome::Missing => "storage object was already gone",
            DeletionOutcome::PermissionDenied => {
                "not removed from storage: this key lacks delete rights"
            }
            DeletionOutcome::Skipped => "external URL, storage untouched",
        }
    }
}

/// Remove the storage object behind `photo_url`, if it is ours to remove.
///
/// Candidate paths cover layout drift: the path the URL actually names,
/// plus the current per-product convention for the same file name. Single
/// deletes run first; if every one reports the object absent, one batch
/// removal naming all candidates settles whether anything was left. Expected
/// conditions (absent object, denied access, foreign URL) come back as a
/// [`DeletionOutcome`]; only transport faults and unexpected statuses are
/// errors.
pub async fn delete_photo<S: ObjectStore + ?Sized>(
    store: &S,
    config: &StorageConfig,
    photo_url: &str,
    product_id: i64,
) -> Result<DeletionOutcome, StoreError> {
    let Some(info) = resolve_public_url(config, photo_url) else {
        debug!(target = "cafe.storage", url = photo_url, "external photo url, skipping");
        return Ok(DeletionOutcome::Skipped);
    };

    let candidates = candidate_paths(product_id, &info.decoded_path);
    let mut denied = false;

    for path in &candidates {
        match store.delete_object(path).await {
            Ok(()) => return Ok(DeletionOutcome::Deleted),
            Err(StoreError::NotFound) => continue,
            Err(StoreError::PermissionDenied) => {
                // Treated as host-wide; trying the other candidates would
                // fail the same way.
                denied = true;
                break;
            }
            Err(err) => return Err(err),
        }
    }

    if denied {
        return Ok(DeletionOutcome::PermissionDenied);
    }

    match store.delete_objects(&candidates).await {
        Ok(removed) if removed > 0 => Ok(DeletionOutcome::Deleted),
        Ok(_) => Ok(DeletionOutcome::Missing),
        Err(StoreError::NotFound) => Ok(DeletionOutcome::Missing),
        Err(StoreError::PermissionDenied) => Ok(DeletionOutcome::PermissionDenied),
        Err(err) => Err(err),
    }
}

/// Deduplicated paths worth trying for a photo: the resolved path itself,
/// then the conventional per-product location of the same file name (photos
/// uploaded before the convention settled live at other prefixes).
fn candidate_paths(product_id: i64, decoded_path: &str) -> Vec<String> {
    let mut paths = vec![decoded_path.to_string()];
    let file_name = decoded_path.rsplit('/').next().unwrap_or(decoded_path);
    if !file_name.is_empty() {
        let conventional = build_upload_path(product_id, file_name);
        if !paths.contains(&conventional) {
            paths.push(conventional);
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_storage_config;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scripted {
        Ok,
        NotFound,
        Denied,
        Fault,
    }

    impl Scripted {
        fn apply(self) -> Result<(), StoreError> {
            match self {
                Scripted::Ok => Ok(()),
                Scripted::NotFound => Err(StoreError::NotFound),
                Scripted::Denied => Err(StoreError::PermissionDenied),
                Scripted::Fault => Err(StoreError::Request("HTTP 500: boom".into())),
            }
        }
    }

    /// In-memory stand-in for the storage transport; every call is recorded.
    #[derive(Default)]
    struct FakeStore {
        single: HashMap<String, Scripted>,
        batch: Option<(Scripted, usize)>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn upload_object(
            &self,
            path: &str,
            _content_type: &str,
            _bytes: Vec<u8>,
        ) -> Result<(), StoreError> {
            self.record(format!("upload {path}"));
            self.single.get(path).copied().unwrap_or(Scripted::Ok).apply()
        }

        async fn delete_object(&self, path: &str) -> Result<(), StoreError> {
            self.record(format!("delete {path}"));
            self.single
                .get(path)
                .copied()
                .unwrap_or(Scripted::NotFound)
                .apply()
        }

        async fn delete_objects(&self, paths: &[String]) -> Result<usize, StoreError> {
            self.record(format!("batch {}", paths.join(",")));
            let (scripted, removed) = self.batch.unwrap_or((Scripted::Ok, 0));
            scripted.apply().map(|_| removed)
        }
    }

    fn upload(file_name: &str) -> PhotoUpload {
        PhotoUpload {
            file_name: file_name.to_string(),
            content_type: Some("image/jpeg".into()),
            bytes: vec![1, 2, 3],
        }
    }

    fn owned_url(path: &str) -> String {
        build_public_url(&test_storage_config(), path)
    }

    #[tokio::test]
    async fn uploads_run_in_order_and_return_public_urls() {
        let store = FakeStore::default();
        let config = test_storage_config();
        let urls = upload_photos(&store, &config, 9, &[upload("a.jpg"), upload("b.jpg")])
            .await
            .expect("batch should succeed");

        assert_eq!(
            urls,
            vec![
                "https://unit.supabase.co/storage/v1/object/public/cafe/product9/a.jpg",
                "https://unit.supabase.co/storage/v1/object/public/cafe/product9/b.jpg",
            ]
        );
        assert_eq!(
            store.calls(),
            vec!["upload product9/a.jpg", "upload product9/b.jpg"]
        );
    }

    #[tokio::test]
    async fn upload_failure_names_the_file_and_aborts_the_batch() {
        let mut store = FakeStore::default();
        store
            .single
            .insert("product9/b.jpg".to_string(), Scripted::Fault);
        let config = test_storage_config();

        let err = upload_photos(
            &store,
            &config,
            9,
            &[upload("a.jpg"), upload("b.jpg"), upload("c.jpg")],
        )
        .await
        .expect_err("second file should fail the batch");

        assert_eq!(err.file_name, "b.jpg");
        assert!(err.to_string().contains("b.jpg"));
        // The first object went up before the failure; the third was never sent.
        assert_eq!(
            store.calls(),
            vec!["upload product9/a.jpg", "upload product9/b.jpg"]
        );
    }

    #[tokio::test]
    async fn deleting_resolved_photo_removes_it_on_first_candidate() {
        let mut store = FakeStore::default();
        store
            .single
            .insert("product9/a.jpg".to_string(), Scripted::Ok);
        let config = test_storage_config();

        let outcome = delete_photo(&store, &config, &owned_url("product9/a.jpg"), 9)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::Deleted);
        assert_eq!(store.calls(), vec!["delete product9/a.jpg"]);
    }

    #[tokio::test]
    async fn legacy_layout_is_covered_by_the_conventional_candidate() {
        let mut store = FakeStore::default();
        store
            .single
            .insert("product9/a.jpg".to_string(), Scripted::Ok);
        let config = test_storage_config();

        // URL still points at the old flat layout; the per-product candidate
        // is tried after it and wins.
        let outcome = delete_photo(&store, &config, &owned_url("a.jpg"), 9)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::Deleted);
        assert_eq!(
            store.calls(),
            vec!["delete a.jpg", "delete product9/a.jpg"]
        );
    }

    #[tokio::test]
    async fn absent_everywhere_is_missing_not_an_error() {
        let mut store = FakeStore::default();
        store.batch = Some((Scripted::Ok, 0));
        let config = test_storage_config();

        let outcome = delete_photo(&store, &config, &owned_url("product9/a.jpg"), 9)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::Missing);
        assert_eq!(
            store.calls(),
            vec!["delete product9/a.jpg", "batch product9/a.jpg"]
        );
    }

    #[tokio::test]
    async fn batch_not_found_is_missing() {
        let mut store = FakeStore::default();
        store.batch = Some((Scripted::NotFound, 0));
        let config = test_storage_config();

        let outcome = delete_photo(&store, &config, &owned_url("legacy/a.jpg"), 9)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::Missing);
    }

    #[tokio::test]
    async fn batch_success_with_removals_is_deleted() {
        let mut store = FakeStore::default();
        store.batch = Some((Scripted::Ok, 1));
        let config = test_storage_config();

        let outcome = delete_photo(&store, &config, &owned_url("legacy/a.jpg"), 9)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::Deleted);
        // Both candidates were named in the batch call even though single
        // deletes already reported them absent.
        assert_eq!(
            store.calls(),
            vec![
                "delete legacy/a.jpg",
                "delete product9/a.jpg",
                "batch legacy/a.jpg,product9/a.jpg"
            ]
        );
    }

    #[tokio::test]
    async fn permission_denial_short_circuits_without_batch_fallback() {
        let mut store = FakeStore::default();
        store
            .single
            .insert("product9/a.jpg".to_string(), Scripted::Denied);
        store.batch = Some((Scripted::Ok, 1));
        let config = test_storage_config();

        let outcome = delete_photo(&store, &config, &owned_url("product9/a.jpg"), 9)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::PermissionDenied);
        assert_eq!(store.calls(), vec!["delete product9/a.jpg"]);
    }

    #[tokio::test]
    async fn batch_permission_denial_is_reported() {
        let mut store = FakeStore::default();
        store.batch = Some((Scripted::Denied, 0));
        let config = test_storage_config();

        let outcome = delete_photo(&store, &config, &owned_url("legacy/a.jpg"), 9)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::PermissionDenied);
    }

    #[tokio::test]
    async fn transport_fault_propagates_as_an_error() {
        let mut store = FakeStore::default();
        store
            .single
            .insert("product9/a.jpg".to_string(), Scripted::Fault);
        let config = test_storage_config();

        let err = delete_photo(&store, &config, &owned_url("product9/a.jpg"), 9)
            .await
            .expect_err("faults must not be folded into an outcome");
        assert!(matches!(err, StoreError::Request(_)));
    }

    #[tokio::test]
    async fn external_url_is_skipped_with_zero_storage_calls() {
        let store = FakeStore::default();
        let config = test_storage_config();

        let outcome = delete_photo(&store, &config, "https://other-host/x.jpg", 9)
            .await
            .unwrap();

        assert_eq!(outcome, DeletionOutcome::Skipped);
        assert!(store.calls().is_empty());
    }
}

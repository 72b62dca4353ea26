//! Filesystem-backed lister.
//!
//! Treats `{root}/{bucket}` as the bucket and every regular file below it as
//! an object, so a watch can be pointed at a local mirror or a test fixture.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use walkdir::WalkDir;

use bucketwatch_core::{ListedObject, url::object_url};
use bucketwatch_reconcile::{ListError, ListResult, ObjectLister};

pub struct LocalDirLister {
    root: PathBuf,
}

impl LocalDirLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Bucket names map to a single directory below the root.
fn is_plain_name(bucket: &str) -> bool {
    let mut components = Path::new(bucket).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn walk_bucket(dir: &Path, bucket: &str) -> ListResult<Vec<ListedObject>> {
    let mut objects = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| ListError::Io(io::Error::other(e)))?;
        let Some(parts) = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
        else {
            warn!(path = %entry.path().display(), "skipping non-utf8 object name");
            continue;
        };

        let modified = entry.metadata().map_err(io::Error::from)?.modified()?;
        objects.push(ListedObject {
            url: object_url(bucket, &parts.join("/")),
            updated: DateTime::<Utc>::from(modified),
        });
    }

    Ok(objects)
}

#[async_trait]
impl ObjectLister for LocalDirLister {
    async fn list(&self, bucket: &str) -> ListResult<Vec<ListedObject>> {
        let dir = self.root.join(bucket);
        if !is_plain_name(bucket) || !dir.is_dir() {
            return Err(ListError::BucketNotFound(bucket.to_string()));
        }

        let owned = bucket.to_string();
        let objects = tokio::task::spawn_blocking(move || walk_bucket(&dir, &owned))
            .await
            .map_err(|e| ListError::Io(io::Error::other(e)))??;

        info!(%bucket, objects = objects.len(), "local bucket listed");
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn lists_nested_files_as_object_urls() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = dir.path().join("bucket1");
        fs::create_dir_all(bucket.join("path/to")).unwrap();
        fs::write(bucket.join("path/to/foo.txt"), b"foo").unwrap();
        fs::write(bucket.join("top.csv"), b"a,b").unwrap();

        let lister = LocalDirLister::new(dir.path());
        let mut urls: Vec<_> = lister
            .list("bucket1")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.url)
            .collect();
        urls.sort();
        assert_eq!(
            urls,
            vec!["gs://bucket1/path/to/foo.txt", "gs://bucket1/top.csv"]
        );
    }

    #[tokio::test]
    async fn reports_file_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = dir.path().join("bucket1");
        fs::create_dir_all(&bucket).unwrap();
        let file = bucket.join("a.txt");
        fs::write(&file, b"a").unwrap();
        let mtime = DateTime::<Utc>::from(fs::metadata(&file).unwrap().modified().unwrap());

        let listed = LocalDirLister::new(dir.path()).list("bucket1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].updated, mtime);
    }

    #[tokio::test]
    async fn missing_or_escaping_bucket_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bucket1")).unwrap();
        let lister = LocalDirLister::new(dir.path());

        for bucket in ["nope", "..", "bucket1/..", "/etc", ""] {
            let err = lister.list(bucket).await.unwrap_err();
            assert!(matches!(err, ListError::BucketNotFound(_)), "{bucket}: {err}");
        }
    }

    #[tokio::test]
    async fn empty_bucket_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bucket1")).unwrap();
        let listed = LocalDirLister::new(dir.path()).list("bucket1").await.unwrap();
        assert!(listed.is_empty());
    }
}

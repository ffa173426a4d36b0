//! Filesystem object store with bucket/key addressing.
//!
//! Objects live at `<root>/<bucket>/<key>`. Content type and user metadata
//! are kept in a JSON sidecar at `<root>/.meta/<bucket>/<key>.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use intake_shared::{IntakeError, ObjectFacts, Result};
use serde::{Deserialize, Serialize};

/// Directory (under the root) holding metadata sidecars.
const META_DIR: &str = ".meta";

/// Content type of objects stored without one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Object facts plus user metadata, without the body.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectHead {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

impl ObjectHead {
    /// Plain facts recorded with processed documents.
    pub fn facts(&self) -> ObjectFacts {
        ObjectFacts {
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            size: self.size,
            content_type: self.content_type.clone(),
            last_modified: self.last_modified.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    /// `s3://bucket/key` location string.
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// A full object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub head: ObjectHead,
    pub body: Vec<u8>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an object and its metadata, replacing any existing one.
    pub async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<ObjectHead> {
        let path = self.object_path(bucket, key)?;
        let meta_path = self.sidecar_path(bucket, key)?;

        for p in [&path, &meta_path] {
            if let Some(parent) = p.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| IntakeError::io(parent, e))?;
            }
        }

        let sidecar = Sidecar {
            content_type: content_type.to_string(),
            metadata,
        };
        let json = serde_json::to_vec_pretty(&sidecar).map_err(|e| IntakeError::Blob(e.to_string()))?;

        tokio::fs::write(&meta_path, json)
            .await
            .map_err(|e| IntakeError::io(&meta_path, e))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| IntakeError::io(&path, e))?;

        tracing::debug!(bucket, key, size = body.len(), "stored object");
        self.head(bucket, key).await
    }

    /// Object facts and metadata. [`IntakeError::NotFound`] if absent.
    pub async fn head(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let path = self.object_path(bucket, key)?;
        let stat = match tokio::fs::metadata(&path).await {
            Ok(stat) if stat.is_file() => stat,
            Ok(_) => return Err(not_found(bucket, key)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(bucket, key));
            }
            Err(e) => return Err(IntakeError::io(&path, e)),
        };

        let sidecar = self.read_sidecar(bucket, key).await?;
        let last_modified = stat
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|e| IntakeError::io(&path, e))?;

        Ok(ObjectHead {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: stat.len(),
            content_type: sidecar.content_type,
            last_modified,
            metadata: sidecar.metadata,
        })
    }

    /// Read an object with its metadata.
    pub async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let head = self.head(bucket, key).await?;
        let path = self.object_path(bucket, key)?;
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| IntakeError::io(&path, e))?;
        Ok(StoredObject { head, body })
    }

    /// All objects in a bucket whose key starts with `prefix`, sorted by key.
    /// An absent bucket lists as empty.
    pub async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectHead>> {
        let bucket_dir = self.bucket_dir(bucket)?;
        if !bucket_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![bucket_dir.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| IntakeError::io(&dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| IntakeError::io(&dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| IntakeError::io(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(key) = relative_key(&bucket_dir, &path) {
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }

        keys.sort();
        let mut heads = Vec::with_capacity(keys.len());
        for key in keys {
            heads.push(self.head(bucket, &key).await?);
        }
        Ok(heads)
    }

    /// Remove an object and its metadata. Returns whether the object existed.
    pub async fn delete(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = self.object_path(bucket, key)?;
        let meta_path = self.sidecar_path(bucket, key)?;

        let existed = match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(IntakeError::io(&path, e)),
        };
        match tokio::fs::remove_file(&meta_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(IntakeError::io(&meta_path, e)),
        }

        if existed {
            tracing::debug!(bucket, key, "deleted object");
        }
        Ok(existed)
    }

    async fn read_sidecar(&self, bucket: &str, key: &str) -> Result<Sidecar> {
        let meta_path = self.sidecar_path(bucket, key)?;
        match tokio::fs::read(&meta_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                IntakeError::Blob(format!("unreadable metadata for s3://{bucket}/{key}: {e}"))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Sidecar {
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                metadata: BTreeMap::new(),
            }),
            Err(e) => Err(IntakeError::io(&meta_path, e)),
        }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        validate_bucket(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }

    fn sidecar_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        Ok(self
            .root
            .join(META_DIR)
            .join(bucket)
            .join(format!("{key}.json")))
    }
}

fn not_found(bucket: &str, key: &str) -> IntakeError {
    IntakeError::NotFound(format!("object s3://{bucket}/{key}"))
}

fn validate_bucket(bucket: &str) -> Result<()> {
    if bucket.is_empty() || bucket.starts_with('.') || bucket.contains(['/', '\\']) {
        return Err(IntakeError::Blob(format!("invalid bucket name '{bucket}'")));
    }
    Ok(())
}

fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(IntakeError::Blob(format!("invalid object key '{key}'")));
    }
    Ok(())
}

/// Object key of `path` relative to its bucket directory, `/`-separated.
fn relative_key(bucket_dir: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(bucket_dir).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_str().map(str::to_owned))
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

//! Sample providers
//!
//! A provider is bound to one data source at construction and returns every
//! raw sample it holds, in a deterministic order.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use simet_core::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Files read concurrently by [`LocalBinaryProvider`]
const READ_CONCURRENCY: usize = 16;

/// One raw sample
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Position within its population
    pub index: usize,

    /// Raw payload
    pub bytes: Bytes,

    /// Class label, if the source carries one
    pub label: Option<String>,

    /// Where the sample came from
    pub origin: Option<PathBuf>,
}

impl Sample {
    pub fn new(index: usize, bytes: impl Into<Bytes>) -> Self {
        Self {
            index,
            bytes: bytes.into(),
            label: None,
            origin: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// Source of raw samples
#[async_trait]
pub trait Provider: Send + Sync {
    /// Return every sample in the bound source
    async fn fetch(&self) -> Result<Vec<Sample>>;

    /// Human-readable description of the source, for logging
    fn describe(&self) -> String;
}

/// Reads every regular file below a directory
///
/// Files are ordered by relative path. A file under a top-level
/// sub-directory of the root is labelled with that sub-directory's name;
/// files directly in the root are unlabelled. Entries whose name starts with
/// `.` are skipped.
#[derive(Debug, Clone)]
pub struct LocalBinaryProvider {
    root: PathBuf,
}

impl LocalBinaryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Provider for LocalBinaryProvider {
    async fn fetch(&self) -> Result<Vec<Sample>> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || list_files(&root))
            .await
            .map_err(|e| Error::internal(format!("directory walk failed: {e}")))??;

        if files.is_empty() {
            return Err(Error::not_found(format!(
                "no samples under {}",
                self.root.display()
            )));
        }

        let samples: Vec<Sample> = stream::iter(files.into_iter().enumerate())
            .map(|(index, (path, label))| async move {
                let bytes = tokio::fs::read(&path).await?;
                let mut sample = Sample::new(index, bytes).with_origin(path);
                sample.label = label;
                Ok::<_, Error>(sample)
            })
            .buffered(READ_CONCURRENCY)
            .try_collect()
            .await?;

        info!(root = %self.root.display(), samples = samples.len(), "Read local samples");
        Ok(samples)
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}

/// Collect `(path, label)` for every visible regular file, sorted by relative path
fn list_files(root: &Path) -> Result<Vec<(PathBuf, Option<String>)>> {
    if !root.exists() {
        return Err(Error::not_found(format!(
            "sample directory {} does not exist",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(Error::not_found(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut relative = Vec::new();
    let mut visited = HashSet::new();
    walk(root, Path::new(""), &mut visited, &mut relative)?;
    relative.sort();
    debug!(root = %root.display(), files = relative.len(), "Listed sample files");

    Ok(relative
        .into_iter()
        .map(|rel| {
            let label = if rel.components().count() > 1 {
                rel.components()
                    .next()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
            } else {
                None
            };
            (root.join(rel), label)
        })
        .collect())
}

/// Symlinks are followed; each directory is entered at most once
fn walk(
    root: &Path,
    rel: &Path,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let dir = root.join(rel);
    if !visited.insert(std::fs::canonicalize(&dir)?) {
        debug!(path = %dir.display(), "Skipping already visited directory");
        return Ok(());
    }

    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let child = rel.join(&name);
        let metadata = match std::fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if metadata.is_dir() {
            walk(root, &child, visited, out)?;
        } else if metadata.is_file() {
            out.push(child);
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular file");
        }
    }
    Ok(())
}

/// Serves samples held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    samples: Vec<Sample>,
}

impl InMemoryProvider {
    /// Samples are re-indexed by position
    pub fn new(samples: Vec<Sample>) -> Self {
        let samples = samples
            .into_iter()
            .enumerate()
            .map(|(index, sample)| Sample { index, ..sample })
            .collect();
        Self { samples }
    }

    /// Unlabelled samples holding little-endian `f32` vectors
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Self {
        Self::new(
            vectors
                .into_iter()
                .enumerate()
                .map(|(i, v)| Sample::new(i, encode_f32_le(&v)))
                .collect(),
        )
    }

    /// Labelled samples holding little-endian `f32` vectors
    pub fn from_labeled_vectors(vectors: Vec<(Vec<f32>, String)>) -> Self {
        Self::new(
            vectors
                .into_iter()
                .enumerate()
                .map(|(i, (v, label))| Sample::new(i, encode_f32_le(&v)).with_label(label))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[async_trait]
impl Provider for InMemoryProvider {
    async fn fetch(&self) -> Result<Vec<Sample>> {
        Ok(self.samples.clone())
    }

    fn describe(&self) -> String {
        format!("memory:{} samples", self.samples.len())
    }
}

/// Encode a vector as little-endian `f32` words
pub fn encode_f32_le(values: &[f32]) -> Bytes {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_missing_directory_is_not_found() {
        let provider = LocalBinaryProvider::new("/definitely/not/here");
        let err = provider.fetch().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalBinaryProvider::new(dir.path()).fetch().await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_class_folders_become_labels() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dog/nested")).unwrap();
        fs::create_dir(dir.path().join("cat")).unwrap();
        fs::write(dir.path().join("cat/a.bin"), b"c").unwrap();
        fs::write(dir.path().join("dog/b.bin"), b"d").unwrap();
        fs::write(dir.path().join("dog/nested/c.bin"), b"e").unwrap();
        fs::write(dir.path().join("root.bin"), b"r").unwrap();
        fs::write(dir.path().join(".hidden"), b"h").unwrap();

        let samples = LocalBinaryProvider::new(dir.path()).fetch().await.unwrap();
        let summary: Vec<(usize, Option<&str>, &[u8])> = samples
            .iter()
            .map(|s| (s.index, s.label.as_deref(), s.bytes.as_ref()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (0, Some("cat"), &b"c"[..]),
                (1, Some("dog"), &b"d"[..]),
                (2, Some("dog"), &b"e"[..]),
                (3, None, &b"r"[..]),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks_are_followed() {
        use std::os::unix::fs::symlink;

        let store = tempfile::tempdir().unwrap();
        fs::create_dir(store.path().join("bird")).unwrap();
        fs::write(store.path().join("bird/x.bin"), b"b").unwrap();
        fs::write(store.path().join("shared.bin"), b"s").unwrap();

        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cat")).unwrap();
        fs::write(dir.path().join("cat/a.bin"), b"c").unwrap();
        symlink(store.path().join("shared.bin"), dir.path().join("cat/linked.bin")).unwrap();
        symlink(store.path().join("bird"), dir.path().join("bird")).unwrap();
        symlink(store.path().join("missing.bin"), dir.path().join("cat/dangling.bin")).unwrap();
        // Cycle back to the root
        symlink(dir.path(), dir.path().join("cat/loop")).unwrap();

        let samples = LocalBinaryProvider::new(dir.path()).fetch().await.unwrap();
        let summary: Vec<(Option<&str>, &[u8])> = samples
            .iter()
            .map(|s| (s.label.as_deref(), s.bytes.as_ref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Some("bird"), b"b".as_slice()),
                (Some("cat"), b"c".as_slice()),
                (Some("cat"), b"s".as_slice()),
            ]
        );
    }

    #[tokio::test]
    async fn test_in_memory_reindexes() {
        let provider = InMemoryProvider::new(vec![Sample::new(7, vec![1u8]), Sample::new(3, vec![2u8])]);
        let samples = provider.fetch().await.unwrap();
        assert_eq!(samples[0].index, 0);
        assert_eq!(samples[1].index, 1);
    }

    #[test]
    fn test_encode_f32_le() {
        let bytes = encode_f32_le(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
    }
}

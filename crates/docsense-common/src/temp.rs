//! Scratch-file store for intermediate conversion artifacts.
//!
//! Converted markdown, extracted images, and uploaded documents all land
//! here. Cleanup runs on two axes: files past their TTL are removed first,
//! then the oldest files go until total size is back under the cap.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use crate::error::Result;

pub struct TempStore {
    root: PathBuf,
    max_bytes: u64,
    ttl: Duration,
    seq: AtomicU64,
}

impl TempStore {
    pub fn new(root: impl Into<PathBuf>, max_mb: u64, ttl: Duration) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            max_bytes: max_mb * 1024 * 1024,
            ttl,
            seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh path under the store root. The file is not created.
    pub fn allocate(&self, suffix: &str) -> PathBuf {
        let ts = chrono::Utc::now().timestamp_millis();
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!("{ts}-{n}{suffix}"))
    }

    /// Remove expired entries, then evict oldest-first until under the cap.
    pub fn cleanup(&self) -> Result<()> {
        let now = SystemTime::now();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                let _ = fs::remove_dir_all(&path);
                continue;
            }
            if let Some(age) = file_age(&path, now) {
                if age > self.ttl {
                    let _ = fs::remove_file(&path);
                }
            }
        }

        let mut files = collect_files(&self.root)?;
        let mut total: u64 = files.iter().map(|f| f.size).sum();
        if total <= self.max_bytes {
            return Ok(());
        }

        files.sort_by_key(|f| f.modified);
        for f in files {
            if total <= self.max_bytes {
                break;
            }
            if fs::remove_file(&f.path).is_ok() {
                tracing::debug!(path = %f.path.display(), size = f.size, "evicted temp file");
                total = total.saturating_sub(f.size);
            }
        }
        Ok(())
    }

    /// Wipe the store and recreate the root. Used at startup and shutdown.
    pub fn clear_all(&self) -> Result<()> {
        let _ = fs::remove_dir_all(&self.root);
        fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

struct FileEntry {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

fn file_age(path: &Path, now: SystemTime) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    now.duration_since(modified).ok()
}

fn collect_files(dir: &Path) -> Result<Vec<FileEntry>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            out.extend(collect_files(&path)?);
        } else if let Ok(meta) = entry.metadata() {
            out.push(FileEntry {
                path,
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
    }
    Ok(out)
}

//! Job lifecycle: temp artifact addressing, cleanup, and publishing.
//!
//! A job owns every temporary artifact it creates. Artifact paths are a
//! deterministic function of the job id and the item identity, rooted in the
//! platform temp directory, so cleanup can locate them even after a crash
//! mid-task when the job id is known.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};

use crate::error::Result;
use crate::media::MediaDescriptor;

/// One end-to-end request to merge a set of media items into one audiobook.
#[derive(Debug)]
pub struct Job {
    /// Monotonic, time-based identifier (epoch milliseconds)
    pub id: i64,

    /// Media items in audiobook order
    pub media: Vec<MediaDescriptor>,

    /// Requested output destination
    pub destination: PathBuf,

    /// Optional cover art to embed after merging
    pub artwork: Option<PathBuf>,

    temp_root: PathBuf,
}

impl Job {
    pub fn new(media: Vec<MediaDescriptor>, destination: PathBuf, artwork: Option<PathBuf>) -> Self {
        Self {
            id: Utc::now().timestamp_millis(),
            media,
            destination,
            artwork,
            temp_root: std::env::temp_dir(),
        }
    }

    /// Overrides the temp directory artifacts are rooted in.
    pub fn temp_root(mut self, root: PathBuf) -> Self {
        self.temp_root = root;
        self
    }

    /// Temporary chunk path for one item.
    pub fn chunk_path(&self, media: &MediaDescriptor) -> PathBuf {
        self.temp_root
            .join(format!("bookbind.{}.{:016x}.m4b", self.id, media.identity()))
    }

    /// Concat demuxer file list written before scheduling.
    pub fn filelist_path(&self) -> PathBuf {
        self.temp_root.join(format!("bookbind.{}.filelist.txt", self.id))
    }

    /// Chapter metadata descriptor consumed by the merge.
    pub fn metadata_path(&self) -> PathBuf {
        self.temp_root.join(format!("bookbind.{}.ffmetadata", self.id))
    }

    /// Merged-but-unpublished output of the merge stage.
    pub fn merged_path(&self) -> PathBuf {
        self.temp_root.join(format!("bookbind.{}.merged.m4b", self.id))
    }

    /// Deletes every temporary artifact belonging to this job. Missing files
    /// are a no-op. Runs on success, failure, and cancellation alike.
    pub fn cleanup(&self) {
        debug!("cleaning up temp artifacts for job {}", self.id);
        for media in &self.media {
            remove_quietly(&self.chunk_path(media));
        }
        remove_quietly(&self.filelist_path());
        remove_quietly(&self.metadata_path());
        remove_quietly(&self.merged_path());
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove {}: {e}", path.display());
        }
    }
}

/// Picks a destination that does not collide with an existing file by
/// suffixing " (n)" before the extension. A fresh path is returned as-is.
pub fn unique_destination(requested: &Path) -> PathBuf {
    if !requested.exists() {
        return requested.to_path_buf();
    }

    let parent = requested.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = requested
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = requested
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for n in 1u32.. {
        let candidate = parent.join(format!("{stem} ({n}){extension}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("suffix space exhausted");
}

/// Moves the finished file to (a uniquified variant of) the requested
/// destination. Falls back to copy-and-remove for cross-device moves.
pub fn publish(source: &Path, requested: &Path) -> Result<PathBuf> {
    if let Some(parent) = requested.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let destination = unique_destination(requested);
    if fs::rename(source, &destination).is_err() {
        fs::copy(source, &destination)?;
        fs::remove_file(source)?;
    }
    debug!("published {}", destination.display());
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn descriptor(path: &str) -> MediaDescriptor {
        MediaDescriptor::new(PathBuf::from(path), 1000, 44100, 2, 128_000)
    }

    fn job_in(dir: &Path) -> Job {
        Job::new(
            vec![descriptor("/audio/a.mp3"), descriptor("/audio/b.mp3")],
            dir.join("book.m4b"),
            None,
        )
        .temp_root(dir.to_path_buf())
    }

    #[test]
    fn test_chunk_paths_are_deterministic() {
        let dir = tempdir().unwrap();
        let mut job = job_in(dir.path());
        job.id = 42;

        let first = job.chunk_path(&job.media[0]);
        assert_eq!(first, job.chunk_path(&job.media[0]));
        assert_ne!(first, job.chunk_path(&job.media[1]));
        assert!(first.to_string_lossy().contains("bookbind.42."));
    }

    #[test]
    fn test_cleanup_removes_artifacts_and_tolerates_missing() {
        let dir = tempdir().unwrap();
        let job = job_in(dir.path());

        // only some artifacts exist; the rest were never created
        File::create(job.chunk_path(&job.media[0])).unwrap();
        File::create(job.filelist_path()).unwrap();

        job.cleanup();
        job.cleanup();

        assert!(!job.chunk_path(&job.media[0]).exists());
        assert!(!job.filelist_path().exists());
    }

    #[test]
    fn test_unique_destination_keeps_fresh_path() {
        let dir = tempdir().unwrap();
        let requested = dir.path().join("book.m4b");
        assert_eq!(unique_destination(&requested), requested);
    }

    #[test]
    fn test_unique_destination_suffixes_existing_path() {
        let dir = tempdir().unwrap();
        let requested = dir.path().join("book.m4b");
        File::create(&requested).unwrap();
        File::create(dir.path().join("book (1).m4b")).unwrap();

        assert_eq!(
            unique_destination(&requested),
            dir.path().join("book (2).m4b")
        );
    }

    #[test]
    fn test_publish_never_overwrites() {
        let dir = tempdir().unwrap();
        let requested = dir.path().join("book.m4b");
        fs::write(&requested, b"previous run").unwrap();

        let source = dir.path().join("merged.m4b");
        fs::write(&source, b"new run").unwrap();

        let published = publish(&source, &requested).unwrap();
        assert_eq!(published, dir.path().join("book (1).m4b"));
        assert_eq!(fs::read(&requested).unwrap(), b"previous run");
        assert_eq!(fs::read(&published).unwrap(), b"new run");
        assert!(!source.exists());
    }

    #[test]
    fn test_publish_uses_exact_name_for_fresh_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("merged.m4b");
        fs::write(&source, b"content").unwrap();

        let requested = dir.path().join("out").join("book.m4b");
        let published = publish(&source, &requested).unwrap();
        assert_eq!(published, requested);
        assert!(requested.exists());
    }
}

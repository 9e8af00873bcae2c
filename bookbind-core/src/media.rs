//! Media item descriptors.
//!
//! A [`MediaDescriptor`] carries the audio properties of one input file as
//! probed before conversion. The duration is fixed at probe time; sample
//! rate, channel count and bitrate are rewritten once by the parameter
//! unifier before any task is scheduled and are read-only afterwards.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::PathBuf;

use serde::Serialize;

/// Audio properties of one input media file.
#[derive(Debug, Clone, Serialize)]
pub struct MediaDescriptor {
    /// Path of the source file
    pub source: PathBuf,

    /// Duration in milliseconds, set once at probe time
    pub duration_ms: u64,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count
    pub channels: u32,

    /// Audio bitrate in bits per second
    pub bitrate: u32,
}

impl MediaDescriptor {
    pub fn new(
        source: PathBuf,
        duration_ms: u64,
        sample_rate: u32,
        channels: u32,
        bitrate: u32,
    ) -> Self {
        Self {
            source,
            duration_ms,
            sample_rate,
            channels,
            bitrate,
        }
    }

    /// Stable identity of this item, derived from the source path with a
    /// fixed-key hasher. Temp chunk names are addressed by it, so cleanup can
    /// locate them across a crash.
    pub fn identity(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.source.hash(&mut hasher);
        hasher.finish()
    }

    /// Key under which per-file progress callbacks are registered.
    pub fn progress_key(&self) -> String {
        self.source.to_string_lossy().into_owned()
    }

    /// Chapter title derived from the source file name.
    pub fn title(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Chapter".to_string())
    }
}

/// Output of one successful transcode task: the descriptor paired with the
/// temporary chunk it produced. Cancelled tasks yield no result.
#[derive(Debug, Clone)]
pub struct TranscodeResult {
    pub media: MediaDescriptor,
    pub chunk: PathBuf,
}

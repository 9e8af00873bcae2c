//! Core library for audiobook conversion and merging using ffmpeg.
//!
//! This crate converts a set of input audio files into one concatenated
//! `.m4b` audiobook: it unifies output parameters across the set, runs one
//! external transcode process per file on a bounded worker pool (tracking
//! each over a local TCP progress endpoint), merges the chunks in original
//! order with chapter metadata, embeds cover art, and atomically publishes
//! the result. Temporary artifacts are cleaned up on every exit path.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bookbind_core::{CancelToken, Job, PipelineOptions, ProgressReporter, run_job};
//! use std::path::{Path, PathBuf};
//!
//! let media = vec![
//!     bookbind_core::probe_media(Path::new("ch1.mp3")).unwrap(),
//!     bookbind_core::probe_media(Path::new("ch2.mp3")).unwrap(),
//! ];
//!
//! let job = Job::new(media, PathBuf::from("book.m4b"), None);
//! let outcome = run_job(
//!     job,
//!     &PipelineOptions::default(),
//!     &ProgressReporter::new(),
//!     &CancelToken::new(),
//! )
//! .unwrap();
//! ```

pub mod art;
pub mod cancel;
pub mod command;
pub mod error;
pub mod job;
pub mod media;
pub mod merge;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod scheduler;
pub mod transcode;
pub mod unify;
pub mod utils;

// Re-exports for public API
pub use cancel::CancelToken;
pub use error::{CoreError, Result};
pub use job::{Job, publish, unique_destination};
pub use media::{MediaDescriptor, TranscodeResult};
pub use pipeline::{Outcome, PipelineOptions, run_job, spawn_job};
pub use probe::probe_media;
pub use progress::{OUTPUT_KEY, ProgressEvent, ProgressReporter};
pub use scheduler::TranscodeScheduler;
pub use unify::unify_parameters;
pub use utils::{format_bytes, format_duration};

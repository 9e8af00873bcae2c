//! Merge stage: concatenation of transcoded chunks.
//!
//! All chunks share identical audio parameters after unification, so the
//! merge runs ffmpeg's concat demuxer in stream-copy mode over a generated
//! file list, applying a chapter metadata descriptor derived from each
//! item's duration. Chunks are listed in original media order, never in
//! scheduling or completion order.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::command::{self, WaitOutcome};
use crate::error::{CoreError, Result};
use crate::job::Job;
use crate::progress::{OUTPUT_KEY, ProgressCallback, ProgressListener, ProgressReporter};
use crate::transcode::DEFAULT_POLL_INTERVAL;

/// Writes the concat demuxer file list: one line per chunk, in original
/// media order.
pub fn write_filelist(job: &Job) -> Result<PathBuf> {
    let path = job.filelist_path();
    let mut contents = String::new();
    for media in &job.media {
        contents.push_str(&format!("file '{}'\n", job.chunk_path(media).display()));
    }
    fs::write(&path, contents)?;
    debug!("wrote file list {}", path.display());
    Ok(path)
}

/// Writes the FFMETADATA chapter descriptor. Chapter boundaries accumulate
/// each item's probed duration; titles come from the source file stems.
pub fn write_metadata(job: &Job) -> Result<PathBuf> {
    let path = job.metadata_path();
    let mut contents = String::from(";FFMETADATA1\n");
    let mut start_ms = 0u64;
    for media in &job.media {
        let end_ms = start_ms + media.duration_ms;
        contents.push_str("[CHAPTER]\nTIMEBASE=1/1000\n");
        contents.push_str(&format!(
            "START={start_ms}\nEND={end_ms}\ntitle={}\n",
            media.title()
        ));
        start_ms = end_ms;
    }
    fs::write(&path, contents)?;
    debug!("wrote chapter metadata {}", path.display());
    Ok(path)
}

/// Builds the ffmpeg concat command applying the metadata descriptor.
pub fn build_concat_command(
    filelist: &Path,
    metadata: &Path,
    output: &Path,
    progress_url: &str,
) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "warning", "-nostdin"])
        .args(["-f", "concat", "-safe", "0"])
        .arg("-i")
        .arg(filelist)
        .arg("-i")
        .arg(metadata)
        .args(["-map_metadata", "1"])
        .args(["-c", "copy"])
        .args(["-f", "ipod"])
        .arg("-progress")
        .arg(progress_url)
        .arg("-y")
        .arg(output);
    cmd
}

/// Concatenates the job's chunks into one temporary file, reporting progress
/// through the reserved `"output"` callback. Returns `Ok(None)` when
/// cancellation was observed mid-merge.
pub fn merge_chunks(
    job: &Job,
    filelist: &Path,
    metadata: &Path,
    reporter: &ProgressReporter,
    token: &CancelToken,
) -> Result<Option<PathBuf>> {
    let output = job.merged_path();
    info!(
        "merging {} chunks into {}",
        job.media.len(),
        output.display()
    );

    let on_progress: ProgressCallback = reporter
        .callback(OUTPUT_KEY)
        .unwrap_or_else(|| Arc::new(|_| {}));
    let on_complete = reporter
        .completion(OUTPUT_KEY)
        .unwrap_or_else(|| Arc::new(|| {}));

    let mut listener = ProgressListener::start(on_progress, on_complete)?;
    let mut cmd = build_concat_command(filelist, metadata, &output, &listener.url());

    let mut drained = command::spawn_drained(&mut cmd)
        .map_err(|e| CoreError::Merge(e.to_string()))?;
    let outcome = command::wait_with_cancel(&mut drained.child, token, DEFAULT_POLL_INTERVAL);
    listener.shutdown();

    match outcome {
        Err(e) => Err(CoreError::Merge(format!("failed waiting on merge: {e}"))),
        Ok(WaitOutcome::Cancelled) => {
            info!("merge cancelled mid-run");
            Ok(None)
        }
        Ok(WaitOutcome::Finished(status)) if status.success() => Ok(Some(output)),
        Ok(WaitOutcome::Finished(status)) => Err(CoreError::Merge(format!(
            "concat exited with {}: {}",
            status.code().unwrap_or(-1),
            drained.stderr_tail(8)
        ))),
    }
}

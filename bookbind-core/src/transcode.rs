//! One transcode task per media item.
//!
//! A task wraps a single external ffmpeg invocation producing one `.m4b`
//! chunk with the job's unified audio parameters. The task owns its progress
//! listener and polls the child with a short timeout so a cancellation
//! request is observed within that interval rather than after the whole
//! transcode finishes.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::command::{self, WaitOutcome};
use crate::error::{CoreError, Result};
use crate::media::{MediaDescriptor, TranscodeResult};
use crate::progress::{CompletionCallback, ProgressCallback, ProgressListener};

/// Default interval between cancellation checks while a transcode runs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Builds the ffmpeg command for one chunk with unified parameters, wired to
/// the given progress endpoint.
pub fn build_transcode_command(
    media: &MediaDescriptor,
    output: &Path,
    progress_url: &str,
) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "warning", "-nostdin"])
        .arg("-i")
        .arg(&media.source)
        .arg("-vn")
        .args(["-codec:a", "aac"])
        .args(["-f", "ipod"])
        .arg("-b:a")
        .arg(media.bitrate.to_string())
        .arg("-ar")
        .arg(media.sample_rate.to_string())
        .arg("-ac")
        .arg(media.channels.to_string())
        .arg("-progress")
        .arg(progress_url)
        .arg("-y")
        .arg(output);
    cmd
}

/// A single transcode of one media item to a temporary chunk.
pub struct TranscodeTask {
    media: MediaDescriptor,
    output: PathBuf,
    token: CancelToken,
    poll_interval: Duration,
}

impl TranscodeTask {
    pub fn new(media: MediaDescriptor, output: PathBuf, token: CancelToken) -> Self {
        Self {
            media,
            output,
            token,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs the task to completion. Returns `Ok(None)` when cancellation was
    /// observed, before or during the transcode; a failed external process
    /// is an error naming the source item.
    pub fn run(
        self,
        on_progress: Option<ProgressCallback>,
        on_complete: Option<CompletionCallback>,
    ) -> Result<Option<TranscodeResult>> {
        if self.token.is_cancelled() {
            debug!(
                "skipping transcode of {}: cancelled before start",
                self.media.source.display()
            );
            return Ok(None);
        }

        let on_progress: ProgressCallback = match on_progress {
            Some(cb) => cb,
            None => Arc::new(|_| {}),
        };
        let on_complete: CompletionCallback = match on_complete {
            Some(cb) => cb,
            None => Arc::new(|| {}),
        };

        let listener = ProgressListener::start(on_progress, on_complete)?;
        let cmd = build_transcode_command(&self.media, &self.output, &listener.url());
        self.execute(cmd, listener)
    }

    fn execute(
        self,
        mut cmd: Command,
        mut listener: ProgressListener,
    ) -> Result<Option<TranscodeResult>> {
        let source = self.media.source.clone();

        let mut drained = command::spawn_drained(&mut cmd).map_err(|e| CoreError::Transcode {
            file: source.clone(),
            reason: e.to_string(),
        })?;

        let outcome = command::wait_with_cancel(&mut drained.child, &self.token, self.poll_interval);
        listener.shutdown();

        match outcome {
            Err(e) => Err(CoreError::Transcode {
                file: source,
                reason: format!("failed waiting on transcoder: {e}"),
            }),
            Ok(WaitOutcome::Cancelled) => {
                info!("transcode of {} cancelled mid-run", source.display());
                Ok(None)
            }
            Ok(WaitOutcome::Finished(status)) if status.success() => {
                debug!("transcoded {} -> {}", source.display(), self.output.display());
                Ok(Some(TranscodeResult {
                    media: self.media,
                    chunk: self.output,
                }))
            }
            Ok(WaitOutcome::Finished(status)) => Err(CoreError::Transcode {
                file: source,
                reason: format!(
                    "transcoder exited with {}: {}",
                    status.code().unwrap_or(-1),
                    drained.stderr_tail(8)
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::time::Instant;

    fn descriptor() -> MediaDescriptor {
        MediaDescriptor::new(PathBuf::from("/audio/ch1.mp3"), 60_000, 44100, 2, 128_000)
    }

    fn noop_listener() -> ProgressListener {
        ProgressListener::start(Arc::new(|_| {}), Arc::new(|| {})).unwrap()
    }

    #[test]
    fn test_build_transcode_command_carries_unified_parameters() {
        let media = descriptor();
        let cmd = build_transcode_command(&media, Path::new("/tmp/out.m4b"), "tcp://127.0.0.1:9");
        let args: Vec<&OsStr> = cmd.get_args().collect();

        assert_eq!(cmd.get_program(), "ffmpeg");
        assert!(args.contains(&OsStr::new("-vn")));
        assert!(args.contains(&OsStr::new("aac")));
        assert!(args.contains(&OsStr::new("ipod")));
        assert!(args.contains(&OsStr::new("128000")));
        assert!(args.contains(&OsStr::new("44100")));
        assert!(args.contains(&OsStr::new("2")));
        assert!(args.contains(&OsStr::new("tcp://127.0.0.1:9")));
        assert!(args.contains(&OsStr::new("/tmp/out.m4b")));
    }

    #[test]
    fn test_cancelled_before_start_spawns_nothing() {
        let token = CancelToken::new();
        token.cancel();
        let task = TranscodeTask::new(descriptor(), PathBuf::from("/tmp/out.m4b"), token);
        assert!(task.run(None, None).unwrap().is_none());
    }

    #[test]
    fn test_cancellation_observed_within_poll_interval() {
        let token = CancelToken::new();
        let task = TranscodeTask::new(descriptor(), PathBuf::from("/tmp/out.m4b"), token.clone())
            .poll_interval(Duration::from_millis(50));

        let mut cmd = Command::new("sleep");
        cmd.arg("30");

        let cancel_thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            token.cancel();
        });

        let start = Instant::now();
        let result = task.execute(cmd, noop_listener());
        cancel_thread.join().unwrap();

        assert!(result.unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_failed_process_reports_source_and_stderr() {
        let task = TranscodeTask::new(
            descriptor(),
            PathBuf::from("/tmp/out.m4b"),
            CancelToken::new(),
        )
        .poll_interval(Duration::from_millis(20));

        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo broken input >&2; exit 1"]);

        match task.execute(cmd, noop_listener()) {
            Err(CoreError::Transcode { file, reason }) => {
                assert_eq!(file, PathBuf::from("/audio/ch1.mp3"));
                assert!(reason.contains("broken input"), "unexpected reason: {reason}");
            }
            other => panic!("expected a transcode error, got {other:?}"),
        }
    }

    #[test]
    fn test_successful_process_yields_result() {
        let task = TranscodeTask::new(
            descriptor(),
            PathBuf::from("/tmp/out.m4b"),
            CancelToken::new(),
        )
        .poll_interval(Duration::from_millis(20));

        let cmd = Command::new("true");
        let result = task.execute(cmd, noop_listener()).unwrap();
        let result = result.expect("expected a transcode result");
        assert_eq!(result.chunk, PathBuf::from("/tmp/out.m4b"));
        assert_eq!(result.media.source, PathBuf::from("/audio/ch1.mp3"));
    }
}

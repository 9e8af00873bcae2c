//! Job coordinator.
//!
//! Drives one conversion end to end: unification, descriptor generation,
//! parallel transcoding, merge, cover art, publish. The cancellation token
//! is checked between stages; a cancelled job is a silent no-op, not an
//! error. Temp artifact cleanup runs unconditionally on every exit path.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::art;
use crate::cancel::CancelToken;
use crate::error::{CoreError, Result};
use crate::job::{self, Job};
use crate::merge;
use crate::progress::ProgressReporter;
use crate::scheduler::TranscodeScheduler;
use crate::transcode::DEFAULT_POLL_INTERVAL;
use crate::unify::unify_parameters;

/// Terminal state of a job. Cancellation is an outcome, never an error.
#[derive(Debug)]
pub enum Outcome {
    /// The audiobook was published to this path
    Completed(PathBuf),
    /// Cancellation was observed; nothing was published
    Cancelled,
}

/// Options for the conversion pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum number of concurrent transcode tasks
    pub max_concurrent_jobs: usize,

    /// Interval between cancellation checks while external processes run
    pub poll_interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: num_cpus::get(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Runs one job to completion, cancellation, or failure. Consumes the job;
/// its temp artifacts are deleted before this returns, whatever the outcome.
pub fn run_job(
    mut job: Job,
    options: &PipelineOptions,
    reporter: &ProgressReporter,
    token: &CancelToken,
) -> Result<Outcome> {
    if job.media.is_empty() {
        return Err(CoreError::InvalidInput("no media to convert".to_string()));
    }

    unify_parameters(&mut job.media);

    let started = Instant::now();
    info!(
        "starting conversion job {} with {} items",
        job.id,
        job.media.len()
    );

    let outcome = run_stages(&job, options, reporter, token);
    job.cleanup();

    match &outcome {
        Ok(Outcome::Completed(path)) => info!(
            "job {} completed in {:.1}s: {}",
            job.id,
            started.elapsed().as_secs_f64(),
            path.display()
        ),
        Ok(Outcome::Cancelled) => warn!("job {} cancelled", job.id),
        Err(e) => error!("job {} failed: {e}", job.id),
    }
    outcome
}

fn run_stages(
    job: &Job,
    options: &PipelineOptions,
    reporter: &ProgressReporter,
    token: &CancelToken,
) -> Result<Outcome> {
    if token.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }

    // descriptors are written up front from deterministic chunk names,
    // before any task has produced them
    let filelist = merge::write_filelist(job)?;
    let metadata = merge::write_metadata(job)?;

    let scheduler = TranscodeScheduler::new()
        .max_concurrent_jobs(options.max_concurrent_jobs)
        .poll_interval(options.poll_interval);
    let Some(results) = scheduler.transcode_all(job, reporter, token)? else {
        return Ok(Outcome::Cancelled);
    };

    // the merge must never run with fewer chunks than media items
    if results.len() != job.media.len() {
        return Err(CoreError::Other(format!(
            "job {}: {} of {} chunks produced",
            job.id,
            results.len(),
            job.media.len()
        )));
    }

    if token.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }
    let Some(merged) = merge::merge_chunks(job, &filelist, &metadata, reporter, token)? else {
        return Ok(Outcome::Cancelled);
    };

    if token.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }
    art::embed_cover(&merged, job.artwork.as_deref())?;

    if token.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }
    let published = job::publish(&merged, &job.destination)?;
    Ok(Outcome::Completed(published))
}

/// Runs a job on a background thread and dispatches the terminal state to
/// the given sinks, the shape a GUI caller consumes.
pub fn spawn_job<C, E>(
    job: Job,
    options: PipelineOptions,
    reporter: ProgressReporter,
    token: CancelToken,
    on_complete: C,
    on_error: E,
) -> thread::JoinHandle<()>
where
    C: FnOnce(Outcome) + Send + 'static,
    E: FnOnce(CoreError) + Send + 'static,
{
    thread::spawn(move || match run_job(job, &options, &reporter, &token) {
        Ok(outcome) => on_complete(outcome),
        Err(e) => on_error(e),
    })
}

//! Task scheduling and prioritization.
//!
//! Tasks are submitted longest-first to a bounded worker pool: with a fixed
//! number of workers, a longest-processing-time-first order minimizes the
//! makespan and keeps a long item from dominating pool-idle time at the end
//! of the job. Completion handles are awaited in submission order; the first
//! failure cancels the shared token so in-flight siblings wind down within
//! one polling interval.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{CoreError, Result};
use crate::job::Job;
use crate::media::{MediaDescriptor, TranscodeResult};
use crate::progress::ProgressReporter;
use crate::transcode::{DEFAULT_POLL_INTERVAL, TranscodeTask};

/// Returns indices into `media` in descending duration order.
pub fn prioritize(media: &[MediaDescriptor]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..media.len()).collect();
    order.sort_by(|&a, &b| media[b].duration_ms.cmp(&media[a].duration_ms));
    order
}

/// Runs one job's transcode tasks on a bounded worker pool.
pub struct TranscodeScheduler {
    max_concurrent_jobs: usize,
    poll_interval: Duration,
}

impl Default for TranscodeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodeScheduler {
    pub fn new() -> Self {
        Self {
            max_concurrent_jobs: num_cpus::get(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set maximum number of concurrent transcode tasks
    pub fn max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.max_concurrent_jobs = jobs.max(1);
        self
    }

    /// Set the cancellation polling interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Transcodes every item of the job in parallel. Returns `Ok(None)` when
    /// cancellation was observed; on all-success the results come back in
    /// original media order regardless of scheduling or completion order.
    pub fn transcode_all(
        &self,
        job: &Job,
        reporter: &ProgressReporter,
        token: &CancelToken,
    ) -> Result<Option<Vec<TranscodeResult>>> {
        if token.is_cancelled() {
            return Ok(None);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_concurrent_jobs)
            .build()
            .map_err(|e| CoreError::Other(format!("failed to build worker pool: {e}")))?;

        info!(
            "scheduling {} transcode tasks on {} workers",
            job.media.len(),
            self.max_concurrent_jobs
        );

        let order = prioritize(&job.media);
        let mut handles = Vec::with_capacity(order.len());
        for &index in &order {
            let media = job.media[index].clone();
            let chunk = job.chunk_path(&media);
            let task_token = token.clone();
            let on_progress = reporter.callback(&media.progress_key());
            let on_complete = reporter.completion(&media.progress_key());
            let poll_interval = self.poll_interval;

            debug!(
                "submitting {} ({} ms)",
                media.source.display(),
                media.duration_ms
            );

            let (tx, rx) = mpsc::channel();
            pool.spawn(move || {
                let task = TranscodeTask::new(media, chunk, task_token)
                    .poll_interval(poll_interval);
                // receiver may be gone if the scheduler already gave up
                let _ = tx.send((index, task.run(on_progress, on_complete)));
            });
            handles.push(rx);
        }

        // await in submission order, first failure aborts the wait
        let mut results: Vec<Option<TranscodeResult>> = vec![None; job.media.len()];
        for rx in &handles {
            loop {
                if token.is_cancelled() {
                    return Ok(None);
                }
                match rx.recv_timeout(self.poll_interval) {
                    Ok((index, Ok(Some(result)))) => {
                        results[index] = Some(result);
                        break;
                    }
                    Ok((_, Ok(None))) => return Ok(None),
                    Ok((_, Err(e))) => {
                        token.cancel();
                        return Err(e);
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(CoreError::Other(
                            "worker dropped its completion channel".to_string(),
                        ));
                    }
                }
            }
        }

        let collected: Vec<TranscodeResult> = results.into_iter().flatten().collect();
        if collected.len() != job.media.len() {
            return Err(CoreError::Other(format!(
                "expected {} transcode results, got {}",
                job.media.len(),
                collected.len()
            )));
        }
        Ok(Some(collected))
    }
}

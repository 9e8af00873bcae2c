use bookbind_core::{
    CancelToken, CoreError, Job, MediaDescriptor, Outcome, PipelineOptions, ProgressReporter,
    run_job,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::tempdir;

fn descriptor(name: &str, duration_ms: u64) -> MediaDescriptor {
    MediaDescriptor::new(
        PathBuf::from(format!("/audio/{name}.mp3")),
        duration_ms,
        44100,
        2,
        128_000,
    )
}

fn options() -> PipelineOptions {
    PipelineOptions {
        max_concurrent_jobs: 2,
        poll_interval: Duration::from_millis(20),
    }
}

fn temp_file_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("bookbind."))
        .count()
}

#[test]
fn test_empty_media_set_is_rejected() {
    let dir = tempdir().unwrap();
    let job = Job::new(Vec::new(), dir.path().join("book.m4b"), None)
        .temp_root(dir.path().to_path_buf());

    let result = run_job(
        job,
        &options(),
        &ProgressReporter::new(),
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    assert_eq!(temp_file_count(dir.path()), 0);
}

#[test]
fn test_cancellation_before_start_is_a_silent_noop() {
    let dir = tempdir().unwrap();
    let destination = dir.path().join("book.m4b");
    let job = Job::new(
        vec![descriptor("a", 5000), descriptor("b", 9000)],
        destination.clone(),
        None,
    )
    .temp_root(dir.path().to_path_buf());

    let token = CancelToken::new();
    token.cancel();

    let outcome = run_job(job, &options(), &ProgressReporter::new(), &token).unwrap();
    assert!(matches!(outcome, Outcome::Cancelled));
    assert!(!destination.exists());
    assert_eq!(temp_file_count(dir.path()), 0);
}

#[test]
fn test_failed_job_cleans_up_all_temp_artifacts() {
    let dir = tempdir().unwrap();
    let destination = dir.path().join("book.m4b");

    // sources do not exist, so every transcode task fails; the job must
    // still remove the descriptors it wrote up front
    let job = Job::new(
        vec![descriptor("missing-a", 5000), descriptor("missing-b", 9000)],
        destination.clone(),
        None,
    )
    .temp_root(dir.path().to_path_buf());

    let result = run_job(
        job,
        &options(),
        &ProgressReporter::new(),
        &CancelToken::new(),
    );

    match result {
        Err(CoreError::Transcode { file, .. }) => {
            assert!(
                file.to_string_lossy().contains("missing-"),
                "error should name the failed item, got {}",
                file.display()
            );
        }
        // a host without ffmpeg reports a spawn failure instead
        Err(CoreError::CommandExecution(_)) => {}
        other => panic!("expected a task failure, got {other:?}"),
    }
    assert!(!destination.exists());
    assert_eq!(temp_file_count(dir.path()), 0);
}

#[test]
fn test_repeated_runs_leave_no_orphaned_temp_files() {
    let dir = tempdir().unwrap();
    for _ in 0..3 {
        let job = Job::new(
            vec![descriptor("missing", 1000)],
            dir.path().join("book.m4b"),
            None,
        )
        .temp_root(dir.path().to_path_buf());
        let _ = run_job(
            job,
            &options(),
            &ProgressReporter::new(),
            &CancelToken::new(),
        );
    }
    assert_eq!(temp_file_count(dir.path()), 0);
}

#[test]
fn test_mid_flight_cancellation_produces_no_output() {
    let dir = tempdir().unwrap();
    let destination = dir.path().join("book.m4b");
    let job = Job::new(
        vec![descriptor("a", 5000), descriptor("b", 9000)],
        destination.clone(),
        None,
    )
    .temp_root(dir.path().to_path_buf());

    let token = CancelToken::new();
    let canceller = {
        let token = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            token.cancel();
        })
    };

    // whichever comes first on this host, a spawn failure or the
    // cancellation, no output may appear and no temp files may survive
    let _ = run_job(job, &options(), &ProgressReporter::new(), &token);
    canceller.join().unwrap();

    assert!(!destination.exists());
    assert_eq!(temp_file_count(dir.path()), 0);
}

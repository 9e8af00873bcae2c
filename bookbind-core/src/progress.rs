//! Progress channel for external transcoder processes.
//!
//! Each transcode task opens a local TCP endpoint before its ffmpeg process
//! starts and passes the address via `-progress tcp://...`. The process
//! writes key/value progress blocks (`out_time_us=`, `total_size=`,
//! terminated by a `progress=continue|end` line) which a reader thread
//! parses into [`ProgressEvent`]s and dispatches to the registered callback
//! synchronously. The endpoint is released on every exit path.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, ErrorKind};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace, warn};

use crate::error::Result;

/// Reserved callback key for the merge stage's own progress.
pub const OUTPUT_KEY: &str = "output";

/// One progress update from an external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Encoded elapsed time in milliseconds
    pub elapsed_ms: u64,
    /// Cumulative output size in bytes
    pub bytes: u64,
}

/// Per-file progress callback, invoked synchronously from the reader thread.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Invoked once when the process reports its terminal progress marker.
pub type CompletionCallback = Arc<dyn Fn() + Send + Sync>;

/// Registry of progress callbacks keyed by source identity, plus the
/// reserved [`OUTPUT_KEY`] used by the merge stage.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    progress: Arc<Mutex<HashMap<String, ProgressCallback>>>,
    completion: Arc<Mutex<HashMap<String, CompletionCallback>>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, key: &str, callback: F)
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.progress
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(callback));
    }

    pub fn register_completion<F>(&self, key: &str, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.completion
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(callback));
    }

    pub fn callback(&self, key: &str) -> Option<ProgressCallback> {
        self.progress.lock().unwrap().get(key).cloned()
    }

    pub fn completion(&self, key: &str) -> Option<CompletionCallback> {
        self.completion.lock().unwrap().get(key).cloned()
    }
}

/// Parsed outcome of one `progress=` block terminator.
enum Update {
    Event(ProgressEvent),
    End(ProgressEvent),
}

/// Accumulates ffmpeg progress fields until a block terminator arrives.
#[derive(Default)]
struct ProgressParser {
    elapsed_ms: u64,
    bytes: u64,
}

impl ProgressParser {
    fn feed(&mut self, line: &str) -> Option<Update> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // ffmpeg reports a sentinel negative value before the first frame
            "out_time_us" => {
                self.elapsed_ms = (value.parse::<i64>().ok()?.max(0) / 1000) as u64;
                None
            }
            "total_size" => {
                self.bytes = value.parse::<i64>().ok()?.max(0) as u64;
                None
            }
            "progress" => {
                let event = ProgressEvent {
                    elapsed_ms: self.elapsed_ms,
                    bytes: self.bytes,
                };
                if value == "end" {
                    Some(Update::End(event))
                } else {
                    Some(Update::Event(event))
                }
            }
            _ => None,
        }
    }
}

/// Local TCP endpoint receiving progress updates from one external process.
///
/// Bound before the process is spawned; [`ProgressListener::url`] is handed
/// to ffmpeg. The reader thread accepts a single connection and polls with
/// short timeouts so [`ProgressListener::shutdown`] always terminates, even
/// if the process never connects.
pub struct ProgressListener {
    port: u16,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressListener {
    pub fn start(
        on_progress: ProgressCallback,
        on_complete: CompletionCallback,
    ) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = thread::spawn(move || {
            serve(&listener, &stop_flag, on_progress, on_complete);
        });

        debug!("progress listener bound on 127.0.0.1:{port}");
        Ok(Self {
            port,
            stop,
            handle: Some(handle),
        })
    }

    /// Address passed to the external process via `-progress`.
    pub fn url(&self) -> String {
        format!("tcp://127.0.0.1:{}", self.port)
    }

    /// Releases the endpoint and joins the reader thread. Idempotent; also
    /// invoked on drop.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("progress reader thread panicked");
            }
        }
    }
}

impl Drop for ProgressListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(
    listener: &TcpListener,
    stop: &AtomicBool,
    on_progress: ProgressCallback,
    on_complete: CompletionCallback,
) {
    let stream = match accept_with_stop(listener, stop) {
        Some(stream) => stream,
        None => return,
    };

    if stream
        .set_read_timeout(Some(Duration::from_millis(200)))
        .is_err()
    {
        return;
    }

    let mut reader = BufReader::new(stream);
    let mut parser = ProgressParser::default();
    let mut line = String::new();

    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                trace!("progress: {}", line.trim_end());
                match parser.feed(&line) {
                    Some(Update::Event(event)) => on_progress(event),
                    Some(Update::End(event)) => {
                        on_progress(event);
                        on_complete();
                        return;
                    }
                    None => {}
                }
                line.clear();
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(_) => return,
        }
    }
}

fn accept_with_stop(listener: &TcpListener, stop: &AtomicBool) -> Option<TcpStream> {
    loop {
        if stop.load(Ordering::SeqCst) {
            return None;
        }
        match listener.accept() {
            Ok((stream, _)) => return Some(stream),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(_) => return None,
        }
    }
}

//! Append-only output writers: the aggregated result sink, the debug sink,
//! and the per-job temp log.
//!
//! Only the orchestrator thread appends to the aggregated sinks; workers
//! write to their private temp files. The sinks therefore need locking only
//! against their own flush timers.

use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::warn;

use crate::errors::{ScanError, ScanResult};

/// Default interval between timer-driven flushes.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Granularity of the flusher's stop check, so close never blocks long.
const FLUSH_TICK: Duration = Duration::from_millis(100);

/// Thread-safe, line-oriented text writer with a background flush timer.
///
/// Writes are whole records or blank lines. The timer flushes every
/// [`FLUSH_INTERVAL`] to bound loss on abnormal termination; flush failures
/// are swallowed. Close stops the timer, flushes once more, and is
/// idempotent; drop closes implicitly.
pub struct OutputSink {
    inner: Arc<Mutex<BufWriter<File>>>,
    stop: Arc<AtomicBool>,
    flusher: Option<JoinHandle<()>>,
    closed: bool,
}

impl OutputSink {
    pub fn create(path: &Path) -> ScanResult<Self> {
        Self::with_flush_interval(path, FLUSH_INTERVAL)
    }

    pub fn with_flush_interval(path: &Path, interval: Duration) -> ScanResult<Self> {
        let file = File::create(path)?;
        let inner = Arc::new(Mutex::new(BufWriter::new(file)));
        let stop = Arc::new(AtomicBool::new(false));

        let flusher = {
            let inner = Arc::clone(&inner);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut since_flush = Duration::ZERO;
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(FLUSH_TICK);
                    since_flush += FLUSH_TICK;
                    if since_flush >= interval {
                        since_flush = Duration::ZERO;
                        if let Ok(mut writer) = inner.lock() {
                            let _ = writer.flush();
                        }
                    }
                }
            })
        };

        Ok(OutputSink {
            inner,
            stop,
            flusher: Some(flusher),
            closed: false,
        })
    }

    /// Appends one complete record followed by a line terminator.
    pub fn write_line(&self, line: &str) -> ScanResult<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| ScanError::sink_error("result writer poisoned"))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn write_blank(&self) -> ScanResult<()> {
        self.write_line("")
    }

    /// Appends pre-formatted text verbatim, used when merging temp files.
    pub fn append_raw(&self, text: &str) -> ScanResult<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| ScanError::sink_error("result writer poisoned"))?;
        writer.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn close(&mut self) -> ScanResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.flusher.take() {
            let _ = handle.join();
        }
        if let Ok(mut writer) = self.inner.lock() {
            if let Err(e) = writer.flush() {
                warn!("final flush failed: {e}");
            }
        }
        Ok(())
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Stamps a debug line: local timestamp, process id, worker identifier.
fn stamp(worker: Option<usize>, message: &str) -> String {
    let worker = match worker {
        Some(i) => format!("worker {i}"),
        None => "main".to_string(),
    };
    format!(
        "{} [pid {}] [{}] {}",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        std::process::id(),
        worker,
        message
    )
}

/// Debug counterpart of [`OutputSink`], active only when debug is enabled.
/// Lines written through [`DebugSink::log`] are stamped; lines merged from
/// worker temp logs arrive pre-stamped and pass through verbatim.
pub struct DebugSink {
    sink: OutputSink,
}

impl DebugSink {
    pub fn create(path: &Path) -> ScanResult<Self> {
        Ok(DebugSink {
            sink: OutputSink::create(path)?,
        })
    }

    pub fn log(&self, message: &str) -> ScanResult<()> {
        self.sink.write_line(&stamp(None, message))
    }

    pub fn append_raw(&self, text: &str) -> ScanResult<()> {
        self.sink.append_raw(text)
    }

    pub fn close(&mut self) -> ScanResult<()> {
        self.sink.close()
    }
}

/// Private per-job debug log, written only by the owning worker and merged
/// into the [`DebugSink`] at drain time. Entry failures are swallowed: a
/// lost diagnostic line must not fail the scan.
pub struct JobLog {
    writer: BufWriter<File>,
    worker: Option<usize>,
}

impl JobLog {
    pub fn create(path: &Path, worker: Option<usize>) -> ScanResult<Self> {
        Ok(JobLog {
            writer: BufWriter::new(File::create(path)?),
            worker,
        })
    }

    pub fn entry(&mut self, message: &str) {
        let line = stamp(self.worker, message);
        let _ = self.writer.write_all(line.as_bytes());
        let _ = self.writer.write_all(b"\n");
    }

    pub fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::tempdir;

    #[test]
    fn test_write_lines_and_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut sink = OutputSink::create(&path).unwrap();
        sink.write_line("first").unwrap();
        sink.write_blank().unwrap();
        sink.write_line("second").unwrap();
        sink.close().unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "first\n\nsecond\n"
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut sink = OutputSink::create(&path).unwrap();
        sink.write_line("x").unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
    }

    #[test]
    fn test_timer_flushes_without_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let sink =
            OutputSink::with_flush_interval(&path, Duration::from_millis(100)).unwrap();
        sink.write_line("visible before close").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if std::fs::read_to_string(&path).unwrap().contains("visible") {
                break;
            }
            assert!(Instant::now() < deadline, "timer flush never happened");
            std::thread::sleep(Duration::from_millis(50));
        }
        drop(sink);
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let missing = Path::new("/nonexistent-dir-for-sink/out.txt");
        assert!(OutputSink::create(missing).is_err());
    }

    #[test]
    fn test_job_log_stamps_worker() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.log");
        let mut log = JobLog::create(&path, Some(3)).unwrap();
        log.entry("something happened");
        log.flush();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[worker 3]"));
        assert!(content.contains(&format!("[pid {}]", std::process::id())));
        assert!(content.contains("something happened"));
    }

    #[test]
    fn test_debug_sink_stamps_main() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let mut sink = DebugSink::create(&path).unwrap();
        sink.log("orchestrator note").unwrap();
        sink.close().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[main]"));
        assert!(content.contains("orchestrator note"));
    }
}

//! Batched scan orchestration.
//!
//! Files are dispatched in contiguous batches of `2 × parallelism` onto a
//! fixed-size worker pool. A batch is fully dispatched, then fully drained
//! before the next begins; within a batch, jobs are drained in submission
//! order, so the aggregated output order always equals the input file
//! order. Workers own their private temp files and share nothing else.

use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::errors::{ScanError, ScanResult};
use crate::results::{ReportHeader, ScanSummary};
use crate::scanner::FileScanner;
use crate::sink::{DebugSink, JobLog, OutputSink};

/// Progress callback: `(completed, total, elapsed)` after each drained job.
pub type ProgressFn = dyn Fn(usize, usize, Duration) + Sync;

/// Per-process working directory holding the per-job temp files, removed
/// recursively on drop; removal errors are ignored.
pub struct WorkDir {
    root: PathBuf,
}

/// Distinguishes concurrent runs inside one process (tests, embedding).
static RUN_SEQ: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

impl WorkDir {
    pub fn create() -> ScanResult<Self> {
        let seq = RUN_SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let root = std::env::temp_dir()
            .join("mojigrep")
            .join(format!("{}-{seq}", std::process::id()));
        fs::create_dir_all(&root)?;
        debug!(dir = %root.display(), "created working directory");
        Ok(WorkDir { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn job_paths(&self, id: usize) -> (PathBuf, PathBuf) {
        (
            self.root.join(format!("{id:016x}.txt")),
            self.root.join(format!("{id:016x}.log")),
        )
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

struct Job {
    input: PathBuf,
    out_path: PathBuf,
    log_path: PathBuf,
}

/// Runs the whole scan: header, batched dispatch and ordered drain,
/// trailer. Returns the run totals.
pub fn run_scan(
    files: &[PathBuf],
    config: &ScanConfig,
    header: &ReportHeader,
    sink: &OutputSink,
    debug_sink: Option<&DebugSink>,
    progress: Option<&ProgressFn>,
) -> ScanResult<ScanSummary> {
    info!(
        files = files.len(),
        parallelism = config.parallelism.get(),
        "starting scan"
    );

    sink.write_blank()?;
    for line in header.render_lines() {
        sink.write_line(&line)?;
    }

    let workdir = WorkDir::create()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallelism.get())
        .build()
        .map_err(|e| ScanError::config_error(format!("failed to build worker pool: {e}")))?;

    let batch_size = 2 * config.parallelism.get();
    let total = files.len();
    let mut completed = 0;
    let mut total_matches = 0;

    for (batch_index, batch) in files.chunks(batch_size).enumerate() {
        let jobs: Vec<Job> = batch
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let (out_path, log_path) = workdir.job_paths(batch_index * batch_size + i);
                Job {
                    input: input.clone(),
                    out_path,
                    log_path,
                }
            })
            .collect();

        // Dispatch the whole batch, then drain it in submission order.
        pool.install(|| {
            jobs.par_iter().for_each(|job| run_job(job, config));
        });

        for job in &jobs {
            total_matches += drain_job(job, sink, debug_sink)?;
            completed += 1;
            if !config.quiet {
                if let Some(progress) = progress {
                    progress(completed, total, config.start_time.elapsed());
                }
            }
        }
    }

    let summary = ScanSummary {
        total_matches,
        files_scanned: total,
        elapsed: config.start_time.elapsed(),
    };
    sink.write_blank()?;
    sink.write_line(&summary.trailer())?;

    info!(
        matches = summary.total_matches,
        elapsed = ?summary.elapsed,
        "scan complete"
    );
    Ok(summary)
}

/// Worker body: creates the job's temp files and scans one file. Panics
/// are caught at this boundary, reported to the job log, and leave the job
/// completed with zero matches.
fn run_job(job: &Job, config: &ScanConfig) {
    let worker = rayon::current_thread_index();
    let mut log = match JobLog::create(&job.log_path, worker) {
        Ok(log) => log,
        Err(e) => {
            warn!(path = %job.log_path.display(), "cannot create job log: {e}");
            return;
        }
    };
    let out = match File::create(&job.out_path) {
        Ok(file) => file,
        Err(e) => {
            log.entry(&format!("cannot create job output: {e}"));
            log.flush();
            return;
        }
    };
    let mut out = BufWriter::new(out);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        FileScanner::new(config).scan(&job.input, &mut out, &mut log)
    }));
    if let Err(payload) = result {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log.entry(&format!(
            "{}: worker panicked: {message}",
            job.input.display()
        ));
    }

    if let Err(e) = out.flush() {
        log.entry(&format!("flushing job output failed: {e}"));
    }
    log.flush();
}

/// Copies a drained job's output into the aggregated sink, counting lines,
/// merges its debug log when enabled, and deletes both temp files.
fn drain_job(job: &Job, sink: &OutputSink, debug_sink: Option<&DebugSink>) -> ScanResult<usize> {
    let mut matches = 0;
    match File::open(&job.out_path) {
        Ok(file) => {
            for line in BufReader::new(file).lines() {
                match line {
                    Ok(line) => {
                        sink.write_line(&line)?;
                        matches += 1;
                    }
                    Err(e) => {
                        warn!(path = %job.out_path.display(), "job output unreadable: {e}");
                        break;
                    }
                }
            }
        }
        Err(e) => {
            // The worker failed before creating its output; already logged.
            debug!(path = %job.out_path.display(), "no job output: {e}");
        }
    }

    if let Some(debug_sink) = debug_sink {
        match fs::read(&job.log_path) {
            Ok(bytes) if !bytes.is_empty() => {
                debug_sink.append_raw(&String::from_utf8_lossy(&bytes))?;
            }
            Ok(_) => {}
            Err(e) => warn!(path = %job.log_path.display(), "job log unreadable: {e}"),
        }
    }

    let _ = fs::remove_file(&job.out_path);
    let _ = fs::remove_file(&job.log_path);
    Ok(matches)
}

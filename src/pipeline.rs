use crate::{
    classify::{Category, LogClassifier},
    codec::{self, RowSet},
    config::Config,
    error::PipelineError,
    events::{EventSink, PipelineEvent},
    invoker::{EngineRequest, Invoke},
    job::{Job, JobPaths, Outcome, Stage},
    report::RunSummary,
    util::{ensure_dir, file_size, now_rfc3339},
};
use anyhow::anyhow;
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Drives the end-to-end sequence for one input file: decode, stage,
/// invoke the engine, classify its log, convert the result back, clean up.
/// At most one job is active per coordinator; overlapping `spawn` calls
/// are rejected with `AlreadyRunning`.
pub struct Coordinator<I: Invoke> {
    cfg: Config,
    invoker: Arc<I>,
    slot: Arc<AtomicBool>,
}

/// Handle to a running job: the event stream plus a join that resolves to
/// the run summary. Dropping the handle does not cancel the job.
pub struct JobHandle {
    pub id: String,
    pub paths: JobPaths,
    events: Receiver<PipelineEvent>,
    worker: JoinHandle<RunSummary>,
}

impl JobHandle {
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    pub fn join(self) -> RunSummary {
        match self.worker.join() {
            Ok(summary) => summary,
            Err(_) => {
                let now = now_rfc3339();
                RunSummary {
                    job_id: self.id,
                    input: self.paths.input.display().to_string(),
                    output: self.paths.final_output.display().to_string(),
                    started: now.clone(),
                    finished: now,
                    rows_in: 0,
                    rows_out: 0,
                    output_bytes: None,
                    events: Default::default(),
                    ok: false,
                    message: "worker thread panicked".into(),
                    error_kind: Some("panic".into()),
                }
            }
        }
    }
}

/// Releases the coordinator's single active-job slot, also on panic.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<I: Invoke + Send + Sync + 'static> Coordinator<I> {
    pub fn new(cfg: Config, invoker: I) -> Self {
        Self {
            cfg,
            invoker: Arc::new(invoker),
            slot: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a job on a dedicated worker thread. Returns immediately with
    /// a handle; progress and log events stream on the handle's receiver
    /// and a `Finished` event closes the run.
    pub fn spawn(&self, input: &Path) -> Result<JobHandle, PipelineError> {
        if self
            .slot
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::AlreadyRunning);
        }
        let slot = SlotGuard(Arc::clone(&self.slot));

        let job = Job::new(input, &self.cfg)?;
        let classifier = LogClassifier::from_config(&self.cfg)?;
        let (sink, rx) = EventSink::channel();
        let id = job.id.clone();
        let paths = job.paths.clone();
        let cfg = self.cfg.clone();
        let invoker = Arc::clone(&self.invoker);

        let worker = std::thread::Builder::new()
            .name(format!("sheet-mend-{}", &id[..8]))
            .spawn(move || {
                let _slot = slot;
                run_job(&cfg, invoker.as_ref(), &classifier, job, &sink)
            })?;

        Ok(JobHandle {
            id,
            paths,
            events: rx,
            worker,
        })
    }
}

#[derive(Default)]
struct JobStats {
    rows_in: usize,
    rows_out: usize,
}

fn run_job<I: Invoke>(
    cfg: &Config,
    invoker: &I,
    classifier: &LogClassifier,
    mut job: Job,
    sink: &EventSink,
) -> RunSummary {
    let started = now_rfc3339();
    info!(job_id = %job.id, input = %job.paths.input.display(), "starting job");

    let result = execute(cfg, invoker, classifier, &mut job, sink);

    let (outcome, stats, error_kind) = match result {
        Ok(stats) => {
            job.advance(Stage::Done);
            sink.progress(Stage::Done, "Processing completed!");
            let name = job
                .paths
                .input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| job.paths.input.display().to_string());
            (
                Outcome::success(format!("Successfully processed {name}")),
                stats,
                None,
            )
        }
        Err(err) => {
            // The outcome names the failing stage; the same failure is also
            // pushed onto the log stream so the two channels stay consistent.
            let message = if job.stage == Stage::Idle {
                format!("{err}")
            } else {
                format!("{} failed: {err}", job.stage)
            };
            let kind = err.kind().to_string();
            job.advance(Stage::Failed);
            sink.log_line(Category::Error, format!("ERROR: {message}"));
            (Outcome::failure(message), JobStats::default(), Some(kind))
        }
    };

    sink.finished(outcome.clone());
    if outcome.ok {
        info!(job_id = %job.id, "job finished: {}", outcome.message);
    } else {
        warn!(job_id = %job.id, "job failed: {}", outcome.message);
    }

    RunSummary {
        job_id: job.id.clone(),
        input: job.paths.input.display().to_string(),
        output: job.paths.final_output.display().to_string(),
        started,
        finished: now_rfc3339(),
        rows_in: stats.rows_in,
        rows_out: stats.rows_out,
        output_bytes: if outcome.ok {
            file_size(&job.paths.final_output)
        } else {
            None
        },
        events: sink.counts(),
        ok: outcome.ok,
        message: outcome.message,
        error_kind,
    }
}

fn execute<I: Invoke>(
    cfg: &Config,
    invoker: &I,
    classifier: &LogClassifier,
    job: &mut Job,
    sink: &EventSink,
) -> Result<JobStats, PipelineError> {
    // Deployment precondition, checked before any stage transition or
    // side effect.
    let engine_path = PathBuf::from(&cfg.engine.path);
    if !engine_path.is_file() {
        return Err(PipelineError::EngineMissing(engine_path));
    }

    job.advance(Stage::Converting);
    sink.progress(Stage::Converting, "Converting spreadsheet to CSV...");
    let input_rows =
        codec::decode(&job.paths.input).map_err(|source| PipelineError::InputDecode {
            path: job.paths.input.clone(),
            source,
        })?;
    if input_rows.is_empty_schema() {
        return Err(PipelineError::InputDecode {
            path: job.paths.input.clone(),
            source: anyhow!("input has no header row"),
        });
    }
    job.headers = input_rows.headers.clone();
    debug!(
        rows = input_rows.rows.len(),
        columns = job.headers.len(),
        "decoded input"
    );

    job.advance(Stage::Staging);
    sink.progress(Stage::Staging, "Preparing data for validation...");
    let mut cleanup = CleanupGuard::new(sink.clone(), cfg.global.keep_intermediates);
    if let Some(dir) = job.paths.temp_csv.parent() {
        ensure_dir(dir).map_err(|source| PipelineError::OutputEncode {
            path: job.paths.temp_csv.clone(),
            source,
        })?;
    }
    cleanup.register(&job.paths.temp_csv);
    cleanup.register(&job.paths.engine_log);
    cleanup.register(&job.paths.valid_output);
    codec::encode(&input_rows, &job.paths.temp_csv).map_err(|source| {
        PipelineError::OutputEncode {
            path: job.paths.temp_csv.clone(),
            source,
        }
    })?;

    job.advance(Stage::Invoking);
    sink.progress(Stage::Invoking, "Running validation and auto-corrections...");
    let request = EngineRequest {
        executable: engine_path,
        input_csv: job.paths.temp_csv.clone(),
        valid_output_csv: job.paths.valid_output.clone(),
        log_path: job.paths.engine_log.clone(),
        timeout: Duration::from_secs(cfg.engine.timeout_seconds),
    };
    sink.log_line(
        Category::Info,
        format!("Executing: {}", request.command_line()),
    );
    let output = invoker.invoke(&request)?;
    if cfg.debug.echo_engine_output {
        if !output.stdout.is_empty() {
            debug!("engine stdout: {}", output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            debug!("engine stderr: {}", output.stderr.trim_end());
        }
    }
    if !output.success() {
        return Err(PipelineError::EngineExecution {
            stderr: output.stderr.trim().to_string(),
            timed_out: output.timed_out,
        });
    }

    job.advance(Stage::ClassifyingLog);
    sink.progress(Stage::ClassifyingLog, "Loading validation log...");
    match std::fs::read_to_string(&job.paths.engine_log) {
        Ok(text) => {
            for event in classifier.classify(text.lines()) {
                sink.log(event);
            }
        }
        // Absence of the log is not an error.
        Err(_) => sink.log_line(Category::Info, "No detailed process log available"),
    }

    job.advance(Stage::ConvertingBack);
    sink.progress(
        Stage::ConvertingBack,
        "Converting results back to spreadsheet...",
    );
    let valid_rows = if job.paths.valid_output.is_file() {
        let mut decoded = codec::decode(&job.paths.valid_output).map_err(|source| {
            PipelineError::InputDecode {
                path: job.paths.valid_output.clone(),
                source,
            }
        })?;
        if decoded.is_empty_schema() {
            decoded.headers = job.headers.clone();
        }
        decoded
    } else {
        // An engine that exits 0 without writing valid output is treated as
        // zero valid records, matching the engine's observed behavior.
        sink.log_line(
            Category::Info,
            "No valid output produced; treating as zero valid records",
        );
        RowSet::new(job.headers.clone(), Vec::new())
    };
    codec::encode(&valid_rows, &job.paths.final_output).map_err(|source| {
        PipelineError::OutputEncode {
            path: job.paths.final_output.clone(),
            source,
        }
    })?;
    sink.log_line(
        Category::Info,
        format!("Total valid records: {}", valid_rows.rows.len()),
    );

    // Success is only reported with a real artifact behind it.
    if valid_rows.is_empty_schema() || !job.paths.final_output.is_file() {
        return Err(PipelineError::OutputEncode {
            path: job.paths.final_output.clone(),
            source: anyhow!("output artifact missing or has an empty schema"),
        });
    }

    Ok(JobStats {
        rows_in: input_rows.rows.len(),
        rows_out: valid_rows.rows.len(),
    })
}

/// Removes the job's temporary artifacts when it goes out of scope, on
/// success and on every failure path alike. Removal problems are reported
/// as warnings and never change the job's outcome.
struct CleanupGuard {
    paths: Vec<PathBuf>,
    sink: EventSink,
    keep: bool,
}

impl CleanupGuard {
    fn new(sink: EventSink, keep: bool) -> Self {
        Self {
            paths: Vec::new(),
            sink,
            keep,
        }
    }

    fn register(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.keep {
            debug!("keep_intermediates set; leaving temporary files in place");
            return;
        }
        for path in &self.paths {
            if !path.exists() {
                continue;
            }
            if let Err(err) = std::fs::remove_file(path) {
                warn!("failed to remove {}: {err}", path.display());
                self.sink.log_line(
                    Category::Warning,
                    format!("Warning: could not remove {}: {err}", path.display()),
                );
            } else {
                debug!("removed {}", path.display());
            }
        }
    }
}

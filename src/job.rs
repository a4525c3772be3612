use crate::{config::Config, error::PipelineError, util::sha256_hex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

// Distinguishes jobs spawned within one process; the process id covers
// the rest.
static JOB_SEQ: AtomicU64 = AtomicU64::new(0);

/// Coarse lifecycle step of a job, used for progress reporting.
///
/// Stages only move forward; `Done` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    Converting,
    Staging,
    Invoking,
    ClassifyingLog,
    ConvertingBack,
    Done,
    Failed,
}

impl Stage {
    fn order(self) -> u8 {
        match self {
            Stage::Idle => 0,
            Stage::Converting => 1,
            Stage::Staging => 2,
            Stage::Invoking => 3,
            Stage::ClassifyingLog => 4,
            Stage::ConvertingBack => 5,
            Stage::Done | Stage::Failed => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Progress value reported when this stage is entered.
    pub fn percent(self) -> u8 {
        match self {
            Stage::Idle => 0,
            Stage::Converting => 10,
            Stage::Staging => 30,
            Stage::Invoking => 50,
            Stage::ClassifyingLog => 60,
            Stage::ConvertingBack => 70,
            Stage::Done | Stage::Failed => 100,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Converting => "input conversion",
            Stage::Staging => "staging",
            Stage::Invoking => "engine invocation",
            Stage::ClassifyingLog => "log classification",
            Stage::ConvertingBack => "result conversion",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Terminal result of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Every filesystem path a job touches. The final output is the only one
/// that survives a successful run.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub input: PathBuf,
    pub temp_csv: PathBuf,
    pub engine_log: PathBuf,
    pub valid_output: PathBuf,
    pub final_output: PathBuf,
}

/// One pipeline run, owned by the coordinator for its duration.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub paths: JobPaths,
    pub stage: Stage,
    pub headers: Vec<String>,
}

impl Job {
    pub fn new(input: &Path, cfg: &Config) -> Result<Self, PipelineError> {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PipelineError::InvalidInput(input.to_path_buf()))?;
        let dir = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let out_ext = match input.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => "csv",
            _ => "xlsx",
        };

        let id = sha256_hex(
            format!(
                "{}:{}:{}:{}",
                cfg.normalized_for_hash(),
                input.display(),
                std::process::id(),
                JOB_SEQ.fetch_add(1, Ordering::Relaxed)
            )
            .as_bytes(),
        );

        let work_dir = if cfg.paths.work_dir.is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&cfg.paths.work_dir)
        };

        let paths = JobPaths {
            input: input.to_path_buf(),
            // Per-job name so two runs cannot clobber each other's staging file.
            temp_csv: work_dir.join(format!("{stem}-{}.csv", &id[..12])),
            engine_log: dir.join(format!("process_log_{stem}.txt")),
            valid_output: dir.join(&cfg.engine.valid_output_filename),
            final_output: dir.join(format!("{}{stem}.{out_ext}", cfg.output.prefix)),
        };

        Ok(Self {
            id,
            paths,
            stage: Stage::Idle,
            headers: Vec::new(),
        })
    }

    /// Advance to `next`. Terminal stages absorb all further transitions;
    /// moving backwards is a bug in the coordinator.
    pub fn advance(&mut self, next: Stage) {
        if self.stage.is_terminal() {
            return;
        }
        debug_assert!(
            next.order() >= self.stage.order(),
            "stage must not move backwards: {} -> {}",
            self.stage,
            next
        );
        if next.order() >= self.stage.order() {
            self.stage = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_for(input: &str) -> Job {
        Job::new(Path::new(input), &Config::default()).unwrap()
    }

    #[test]
    fn derives_paths_beside_input() {
        let job = job_for("/data/archive.xlsx");
        assert_eq!(
            job.paths.engine_log,
            PathBuf::from("/data/process_log_archive.txt")
        );
        assert_eq!(job.paths.valid_output, PathBuf::from("/data/output.csv"));
        assert_eq!(
            job.paths.final_output,
            PathBuf::from("/data/processed_archive.xlsx")
        );
    }

    #[test]
    fn csv_input_yields_csv_output() {
        let job = job_for("/data/rows.csv");
        assert_eq!(
            job.paths.final_output,
            PathBuf::from("/data/processed_rows.csv")
        );
    }

    #[test]
    fn temp_csv_name_is_job_scoped() {
        let job = job_for("/data/archive.xlsx");
        let name = job.paths.temp_csv.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("archive-"));
        assert!(name.ends_with(".csv"));
        assert!(name.contains(&job.id[..12]));
    }

    #[test]
    fn stages_advance_forward() {
        let mut job = job_for("/data/a.csv");
        assert_eq!(job.stage, Stage::Idle);
        job.advance(Stage::Converting);
        job.advance(Stage::Staging);
        assert_eq!(job.stage, Stage::Staging);
    }

    #[test]
    fn terminal_stage_absorbs() {
        let mut job = job_for("/data/a.csv");
        job.advance(Stage::Done);
        job.advance(Stage::Converting);
        assert_eq!(job.stage, Stage::Done);

        let mut job = job_for("/data/a.csv");
        job.advance(Stage::Failed);
        job.advance(Stage::Done);
        assert_eq!(job.stage, Stage::Failed);
    }

    #[test]
    fn percent_schedule() {
        assert_eq!(Stage::Converting.percent(), 10);
        assert_eq!(Stage::Staging.percent(), 30);
        assert_eq!(Stage::Invoking.percent(), 50);
        assert_eq!(Stage::ConvertingBack.percent(), 70);
        assert_eq!(Stage::Done.percent(), 100);
    }
}

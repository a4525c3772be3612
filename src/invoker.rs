use crate::error::PipelineError;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::warn;

/// One engine invocation. The engine's contract is positional: exactly
/// three arguments, in this order, no flags.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub executable: PathBuf,
    pub input_csv: PathBuf,
    pub valid_output_csv: PathBuf,
    pub log_path: PathBuf,
    pub timeout: Duration,
}

impl EngineRequest {
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(&self.input_csv)
            .arg(&self.valid_output_csv)
            .arg(&self.log_path);
        cmd
    }

    pub fn command_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.executable.display(),
            self.input_csv.display(),
            self.valid_output_csv.display(),
            self.log_path.display()
        )
    }
}

/// Captured result of an engine run. A nonzero exit is a normal, reportable
/// value here, not an error; after a timeout the exit code is indeterminate.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Seam between the coordinator and the engine process, so tests can
/// substitute a scripted engine without spawning one.
pub trait Invoke {
    fn invoke(&self, req: &EngineRequest) -> Result<EngineOutput, PipelineError>;
}

/// Runs the engine as a child process with a hard timeout. `Err` is
/// reserved for failure to start the process at all.
pub struct ProcessInvoker;

impl Invoke for ProcessInvoker {
    fn invoke(&self, req: &EngineRequest) -> Result<EngineOutput, PipelineError> {
        let mut cmd = req.command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| PipelineError::EngineStart {
            path: req.executable.clone(),
            source,
        })?;

        let waited = wait_with_timeout(&mut child, req.timeout)?;
        Ok(EngineOutput {
            exit_code: if waited.timed_out {
                None
            } else {
                waited.status.code()
            },
            stdout: String::from_utf8_lossy(&waited.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&waited.stderr).into_owned(),
            timed_out: waited.timed_out,
        })
    }
}

struct Waited {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    timed_out: bool,
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Waited, PipelineError> {
    // Drain pipes on reader threads while waiting so a chatty engine can't
    // deadlock on a full stdout/stderr buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let join = |handle: std::thread::JoinHandle<std::io::Result<Vec<u8>>>| -> Result<Vec<u8>, PipelineError> {
        handle
            .join()
            .map_err(|_| PipelineError::Io(std::io::Error::other("pipe reader thread panicked")))?
            .map_err(PipelineError::Io)
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Waited {
                status,
                stdout: join(stdout_thread)?,
                stderr: join(stderr_thread)?,
                timed_out: false,
            });
        }

        if start.elapsed() > timeout {
            warn!("engine process timed out after {:?}, killing", timeout);
            let _ = child.kill();
            // Reap so no zombie survives the timeout path.
            let status = child.wait()?;
            return Ok(Waited {
                status,
                stdout: join(stdout_thread)?,
                stderr: join(stderr_thread)?,
                timed_out: true,
            });
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

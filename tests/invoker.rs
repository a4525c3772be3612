use sheet_mend::error::PipelineError;
use sheet_mend::invoker::{EngineRequest, Invoke, ProcessInvoker};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn request(exe: &Path, dir: &Path, timeout_secs: u64) -> EngineRequest {
    EngineRequest {
        executable: exe.to_path_buf(),
        input_csv: dir.join("in.csv"),
        valid_output_csv: dir.join("output.csv"),
        log_path: dir.join("run.log"),
        timeout: Duration::from_secs(timeout_secs),
    }
}

#[test]
fn builds_exact_positional_argv() {
    let req = EngineRequest {
        executable: PathBuf::from("X"),
        input_csv: PathBuf::from("a.csv"),
        valid_output_csv: PathBuf::from("b.csv"),
        log_path: PathBuf::from("c.log"),
        timeout: Duration::from_secs(120),
    };

    let cmd = req.command();
    assert_eq!(cmd.get_program(), "X");
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(args, vec!["a.csv", "b.csv", "c.log"]);
}

#[test]
fn missing_executable_is_a_start_error() {
    let tmp = tempfile::tempdir().unwrap();
    let req = request(&tmp.path().join("no-such-engine"), tmp.path(), 5);
    let err = ProcessInvoker.invoke(&req).unwrap_err();
    assert!(matches!(err, PipelineError::EngineStart { .. }));
}

#[cfg(unix)]
mod scripted {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_engine(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("engine.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[test]
    fn captures_both_streams() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = write_engine(tmp.path(), "echo to-stdout\necho to-stderr >&2\nexit 0");
        let out = ProcessInvoker
            .invoke(&request(&engine, tmp.path(), 10))
            .unwrap();

        assert!(out.success());
        assert_eq!(out.exit_code, Some(0));
        assert!(!out.timed_out);
        assert!(out.stdout.contains("to-stdout"));
        assert!(out.stderr.contains("to-stderr"));
    }

    #[test]
    fn nonzero_exit_is_a_normal_result() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = write_engine(tmp.path(), "echo boom >&2\nexit 7");
        let out = ProcessInvoker
            .invoke(&request(&engine, tmp.path(), 10))
            .unwrap();

        assert!(!out.success());
        assert_eq!(out.exit_code, Some(7));
        assert!(out.stderr.contains("boom"));
    }

    #[test]
    fn timeout_kills_the_child() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = write_engine(tmp.path(), "sleep 30");
        let started = std::time::Instant::now();
        let out = ProcessInvoker
            .invoke(&request(&engine, tmp.path(), 1))
            .unwrap();

        assert!(out.timed_out);
        assert_eq!(out.exit_code, None);
        assert!(!out.success());
        // The child was killed and reaped, not waited to completion.
        assert!(started.elapsed() < Duration::from_secs(15));
    }
}

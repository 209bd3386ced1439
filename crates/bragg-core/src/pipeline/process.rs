//! Solver backed by an external executable.
//!
//! Each run gets a scratch directory holding `data.vol`, an optional warm
//! start under `init/` and the solver's results under `out/`, all in the
//! checkpoint layout of [`crate::io::DirectorySink`]. The program learns
//! its inputs from `BRAGG_*` environment variables and is expected to stop
//! early once the stop file appears. A process still running when the
//! controller gives up is killed.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::solver::{SolveContext, SolveRequest, Solver};
use crate::consts::DISPATCH_POLL_MILLIS;
use crate::error::{BraggError, SolveError};
use crate::io::results::{read_candidate, save_candidate};
use crate::io::write_real_volume;
use crate::volume::Candidate;

pub const ENV_DEVICE: &str = "BRAGG_DEVICE";
pub const ENV_DATA: &str = "BRAGG_DATA";
pub const ENV_INIT_DIR: &str = "BRAGG_INIT_DIR";
pub const ENV_OUTPUT_DIR: &str = "BRAGG_OUTPUT_DIR";
pub const ENV_STOP_FILE: &str = "BRAGG_STOP_FILE";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSolverConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Root of the per-run scratch directories.
    pub work_dir: PathBuf,
    /// Leave scratch directories in place after successful runs.
    pub keep_scratch: bool,
}

impl Default for ProcessSolverConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("bragg-solve"),
            args: Vec::new(),
            work_dir: PathBuf::from("scratch"),
            keep_scratch: false,
        }
    }
}

pub struct ProcessSolver {
    config: ProcessSolverConfig,
}

fn failed(e: BraggError) -> SolveError {
    SolveError::Failed(e.to_string())
}

impl ProcessSolver {
    pub fn new(config: ProcessSolverConfig) -> Self {
        Self { config }
    }

    fn scratch_dir(&self, request: &SolveRequest) -> PathBuf {
        self.config
            .work_dir
            .join(format!("g_{}", request.generation))
            .join(format!("d{}_run_{}", request.dataset, request.index))
    }

    fn build_command(
        &self,
        request: &SolveRequest,
        scratch: &Path,
        stop_file: &Path,
    ) -> Result<Command, SolveError> {
        let log = File::create(scratch.join("solver.log"))?;
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .env(ENV_DATA, scratch.join("data.vol"))
            .env(ENV_OUTPUT_DIR, scratch.join("out"))
            .env(ENV_STOP_FILE, stop_file)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));
        if let Some(device) = request.device {
            cmd.env(ENV_DEVICE, device.to_string());
        }
        if request.initial.is_some() {
            cmd.env(ENV_INIT_DIR, scratch.join("init"));
        }
        Ok(cmd)
    }
}

impl Solver for ProcessSolver {
    fn solve(&self, request: SolveRequest, ctx: &SolveContext) -> Result<Candidate, SolveError> {
        let scratch = self.scratch_dir(&request);
        if scratch.exists() {
            fs::remove_dir_all(&scratch)?;
        }
        fs::create_dir_all(scratch.join("out"))?;
        write_real_volume(&scratch.join("data.vol"), request.data.as_ref()).map_err(failed)?;
        if let Some(initial) = &request.initial {
            let init = scratch.join("init");
            fs::create_dir_all(&init)?;
            save_candidate(&init, initial).map_err(failed)?;
        }

        let stop_file = ctx
            .stop_file
            .clone()
            .unwrap_or_else(|| scratch.join("stop"));
        let mut child = self
            .build_command(&request, &scratch, &stop_file)?
            .spawn()?;
        debug!(
            generation = request.generation,
            candidate = request.index,
            pid = child.id(),
            "Solver process started"
        );

        let poll = Duration::from_millis(DISPATCH_POLL_MILLIS);
        let mut stop_written = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if ctx.terminate.is_cancelled() {
                warn!(
                    generation = request.generation,
                    candidate = request.index,
                    pid = child.id(),
                    "Killing solver process"
                );
                child.kill()?;
                child.wait()?;
                return Err(SolveError::Cancelled);
            }
            if !stop_written && ctx.cancel.is_cancelled() {
                fs::write(&stop_file, b"stop")?;
                stop_written = true;
                debug!(candidate = request.index, "Stop file written");
            }
            thread::sleep(poll);
        };

        if ctx.cancel.is_cancelled() {
            return Err(SolveError::Cancelled);
        }
        if !status.success() {
            return Err(SolveError::Failed(format!(
                "{} exited with {status}; see {}",
                self.config.program.display(),
                scratch.join("solver.log").display()
            )));
        }

        let candidate = read_candidate(&scratch.join("out")).map_err(failed)?;
        if candidate.is_diverged() {
            return Err(SolveError::Diverged);
        }

        if !self.config.keep_scratch {
            if let Err(e) = fs::remove_dir_all(&scratch) {
                warn!(dir = %scratch.display(), error = %e, "Could not remove scratch directory");
            }
        }
        Ok(candidate)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use ndarray::Array3;
    use num_complex::Complex64;

    use super::*;
    use crate::pipeline::solver::CancelToken;

    fn shell(script: &str, work_dir: &Path) -> ProcessSolver {
        ProcessSolver::new(ProcessSolverConfig {
            program: PathBuf::from("sh"),
            args: vec!["-c".into(), script.into()],
            work_dir: work_dir.to_path_buf(),
            keep_scratch: false,
        })
    }

    fn request(initial: Option<Candidate>) -> SolveRequest {
        SolveRequest {
            generation: 0,
            dataset: 0,
            index: 3,
            device: Some(1),
            data: Arc::new(Array3::from_elem((2, 3, 4), 1.0)),
            initial,
        }
    }

    fn seed() -> Candidate {
        let image = Array3::from_elem((2, 3, 4), Complex64::new(0.5, 0.5));
        let support = Array3::from_elem((2, 3, 4), 1.0);
        Candidate::new(image, support)
            .unwrap()
            .with_error_trace(vec![0.3, 0.2])
    }

    #[test]
    fn echoes_warm_start_back() {
        let tmp = tempfile::tempdir().unwrap();
        let solver = shell(
            r#"test "$BRAGG_DEVICE" = 1 && cp "$BRAGG_INIT_DIR"/* "$BRAGG_OUTPUT_DIR"/"#,
            tmp.path(),
        );
        let out = solver
            .solve(request(Some(seed())), &SolveContext::default())
            .unwrap();
        assert_eq!(out.image, seed().image);
        assert_eq!(out.error_trace, vec![0.3, 0.2]);
        assert!(!tmp.path().join("g_0").join("d0_run_3").exists());
    }

    #[test]
    fn non_zero_exit_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = shell("exit 3", tmp.path())
            .solve(request(None), &SolveContext::default())
            .unwrap_err();
        assert!(matches!(err, SolveError::Failed(_)));
    }

    #[test]
    fn cancelled_run_writes_stop_file() {
        let tmp = tempfile::tempdir().unwrap();
        let solver = shell(
            r#"while [ ! -f "$BRAGG_STOP_FILE" ]; do sleep 0.02; done"#,
            tmp.path(),
        );
        let ctx = SolveContext::default();
        ctx.cancel.cancel();
        let err = solver.solve(request(None), &ctx).unwrap_err();
        assert!(matches!(err, SolveError::Cancelled));
    }

    #[test]
    fn terminated_run_kills_process() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("finished");
        let script = format!("sleep 30; touch '{}'", marker.display());
        let solver = shell(&script, tmp.path());
        let ctx = SolveContext::default();
        ctx.cancel.cancel();
        ctx.terminate.cancel();

        let started = Instant::now();
        let err = solver.solve(request(None), &ctx).unwrap_err();
        assert!(matches!(err, SolveError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!marker.exists());
    }

    #[test]
    fn shared_stop_file_is_only_written_on_cancel() {
        let tmp = tempfile::tempdir().unwrap();
        let stop = tmp.path().join("stopfile");
        let solver = shell(
            r#"test ! -e "$BRAGG_STOP_FILE" && cp "$BRAGG_INIT_DIR"/* "$BRAGG_OUTPUT_DIR"/"#,
            tmp.path(),
        );
        let ctx = SolveContext {
            stop_file: Some(stop.clone()),
            ..Default::default()
        };
        let out = solver.solve(request(Some(seed())), &ctx).unwrap();
        assert_eq!(out.error_trace, vec![0.3, 0.2]);
        assert!(!stop.exists());
    }
}

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::SlurmError;
use crate::script::SlurmScript;
use crate::session::RemoteSession;

static SUBMITTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Submitted batch job (\d+)").unwrap());

/// How the script is triggered on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Queue asynchronously with `sbatch`; returns a job identifier.
    Batch,
    /// Run synchronously with `srun`; blocks and streams output.
    Interactive,
}

impl ExecutionMode {
    /// The scheduler command invoked for this mode.
    pub fn command(&self) -> &'static str {
        match self {
            ExecutionMode::Batch => "sbatch",
            ExecutionMode::Interactive => "srun",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Batch => write!(f, "batch"),
            ExecutionMode::Interactive => write!(f, "interactive"),
        }
    }
}

/// The states an execution passes through.
///
/// Every request flows `Idle → Rendered → Uploaded → Invoked → Succeeded`,
/// short-circuiting to `Failed` at the first stage that errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Idle,
    Rendered,
    Uploaded,
    Invoked,
    Succeeded,
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Idle => write!(f, "IDLE"),
            State::Rendered => write!(f, "RENDERED"),
            State::Uploaded => write!(f, "UPLOADED"),
            State::Invoked => write!(f, "INVOKED"),
            State::Succeeded => write!(f, "SUCCEEDED"),
            State::Failed => write!(f, "FAILED"),
        }
    }
}

/// The stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Render,
    Upload,
    Invoke,
    Collect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Render => write!(f, "render"),
            Stage::Upload => write!(f, "upload"),
            Stage::Invoke => write!(f, "invoke"),
            Stage::Collect => write!(f, "collect"),
        }
    }
}

/// Per-call parameters: the mode and an optional explicit remote path.
///
/// Short-lived; a fresh request starts at `Idle` every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub mode: ExecutionMode,
    pub remote_path: Option<String>,
}

impl ExecutionRequest {
    pub fn batch() -> Self {
        Self {
            mode: ExecutionMode::Batch,
            remote_path: None,
        }
    }

    pub fn interactive() -> Self {
        Self {
            mode: ExecutionMode::Interactive,
            remote_path: None,
        }
    }

    /// Pin the remote script path instead of deriving one.
    pub fn at(mut self, remote_path: impl Into<String>) -> Self {
        self.remote_path = Some(remote_path.into());
        self
    }

    /// Where the rendered script lands on the remote host: the explicit
    /// path if given, else a path derived from the job name, else a
    /// generated temporary name.
    pub fn resolve_remote_path(&self, script: &SlurmScript) -> String {
        if let Some(path) = &self.remote_path {
            return path.clone();
        }
        if let Some(name) = script.options().get("job-name") {
            return format!("/tmp/{name}.sh");
        }
        format!("/tmp/slurm_script_{}.sh", Uuid::new_v4().simple())
    }
}

/// What a successful execution produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    /// Batch submission accepted; the scheduler assigned this job id.
    Submitted { job_id: String },
    /// Interactive run finished; combined stdout/stderr.
    Completed { output: String },
}

/// Record of one successful execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub outcome: ExecutionOutcome,
    pub remote_path: String,
    /// States visited, in order.
    pub states: Vec<State>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A failed execution: the primary error and the stage it occurred at.
///
/// `cleanup` records a failed best-effort removal of the uploaded script;
/// it is informational only and never replaces the primary error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {error}")]
pub struct ExecuteFailure {
    pub stage: Stage,
    pub error: SlurmError,
    pub cleanup: Option<SlurmError>,
}

impl ExecuteFailure {
    fn at(stage: Stage, error: SlurmError) -> Self {
        Self {
            stage,
            error,
            cleanup: None,
        }
    }
}

/// Drives the staged pipeline: render → upload → invoke → collect → cleanup.
///
/// Holds exactly one session and runs it sequentially; execution is
/// stateless across calls, so the executor can be reused for any number of
/// submissions while the session stays connected. No retries happen here —
/// a failed stage is terminal for its request.
pub struct SlurmExecutor<S: RemoteSession> {
    session: S,
}

impl<S: RemoteSession> SlurmExecutor<S> {
    /// Wrap an already-connected session.
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Give the session back, e.g. to close it.
    pub fn into_session(self) -> S {
        self.session
    }

    /// Run `script` remotely according to `request`.
    pub fn execute(
        &mut self,
        script: &SlurmScript,
        request: &ExecutionRequest,
    ) -> Result<ExecutionReport, ExecuteFailure> {
        let started_at = Utc::now();
        let mut states = vec![State::Idle];

        // Idle → Rendered. Purely local; a failure here has no remote side
        // effects.
        let text = script
            .text()
            .map_err(|e| ExecuteFailure::at(Stage::Render, e))?
            .to_string();
        states.push(State::Rendered);

        // Rendered → Uploaded. Nothing to clean up if the upload itself
        // fails.
        let remote_path = request.resolve_remote_path(script);
        self.session
            .upload(&text, &remote_path)
            .map_err(|e| ExecuteFailure::at(Stage::Upload, e))?;
        states.push(State::Uploaded);

        // Uploaded → Invoked.
        let command = format!("{} {remote_path}", request.mode.command());
        info!("invoking {command}");
        let output = match self.session.run_command(&command) {
            Ok(output) => output,
            Err(e) => return Err(self.fail_and_cleanup(Stage::Invoke, e, &remote_path)),
        };
        states.push(State::Invoked);

        if !output.success() {
            let error = SlurmError::Execution {
                exit_code: output.exit_code,
                stderr: output.stderr.clone(),
            };
            return Err(self.fail_and_cleanup(Stage::Invoke, error, &remote_path));
        }

        // Invoked → Succeeded.
        let outcome = match request.mode {
            ExecutionMode::Batch => match parse_job_id(&output.stdout) {
                Some(job_id) => {
                    info!("submitted batch job {job_id}");
                    ExecutionOutcome::Submitted { job_id }
                }
                None => {
                    let error = SlurmError::parse(
                        1,
                        format!(
                            "expected \"Submitted batch job <id>\" in sbatch output, got {:?}",
                            output.stdout.trim()
                        ),
                    );
                    return Err(self.fail_and_cleanup(Stage::Collect, error, &remote_path));
                }
            },
            ExecutionMode::Interactive => ExecutionOutcome::Completed {
                output: output.combined(),
            },
        };
        states.push(State::Succeeded);

        // The scheduler has its own copy by now; the uploaded script is
        // disposable either way.
        self.try_remove(&remote_path);

        Ok(ExecutionReport {
            outcome,
            remote_path,
            states,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn fail_and_cleanup(
        &mut self,
        stage: Stage,
        error: SlurmError,
        remote_path: &str,
    ) -> ExecuteFailure {
        ExecuteFailure {
            stage,
            error,
            cleanup: self.try_remove(remote_path),
        }
    }

    fn try_remove(&mut self, remote_path: &str) -> Option<SlurmError> {
        match self.session.remove(remote_path) {
            Ok(()) => None,
            Err(e) => {
                warn!("cleanup of {remote_path} failed: {e}");
                Some(SlurmError::Cleanup(e.to_string()))
            }
        }
    }
}

/// Pull the job identifier out of sbatch's acceptance line.
fn parse_job_id(stdout: &str) -> Option<String> {
    SUBMITTED_RE
        .captures(stdout)
        .map(|caps| caps[1].to_string())
}

//! Declarative SLURM job submission over SSH.
//!
//! Describe a job as a set of validated `#SBATCH` directives
//! ([`SlurmOptions`]), bind them to a shell script ([`SlurmScript`]), and
//! hand the result to a [`SlurmExecutor`] to upload and trigger on a remote
//! submit node — queued with `sbatch` or run interactively with `srun`.
//! Every fallible operation returns a `Result`; nothing panics across the
//! public boundary.
//!
//! The executor only depends on the [`RemoteSession`] trait, so any
//! transport can stand in for the bundled [`SshSession`] (the tests drive
//! it with a scripted mock).
//!
//! ```no_run
//! use remote_slurm::{
//!     ExecutionRequest, RemoteConfig, RemoteSession, SlurmExecutor, SlurmOptions,
//!     SlurmScript, SshSession,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = SlurmOptions::from_pairs([
//!         ("partition", "gpu"),
//!         ("time", "01:00:00"),
//!         ("job-name", "train"),
//!     ])?;
//!     let script = SlurmScript::from_file("train.sh", options)?;
//!
//!     let mut session = SshSession::new(RemoteConfig::load()?);
//!     session.connect()?;
//!
//!     let mut executor = SlurmExecutor::new(session);
//!     let report = executor.execute(&script, &ExecutionRequest::batch())?;
//!     println!("submitted: {:?}", report.outcome);
//!
//!     executor.into_session().close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod executor;
pub mod options;
pub mod script;
pub mod session;

pub use config::{ConfigError, RemoteConfig};
pub use convert::{ScriptBody, parse, render};
pub use error::SlurmError;
pub use executor::{
    ExecuteFailure, ExecutionMode, ExecutionOutcome, ExecutionReport, ExecutionRequest,
    SlurmExecutor, Stage, State,
};
pub use options::SlurmOptions;
pub use script::SlurmScript;
pub use session::{CommandOutput, RemoteSession, SshSession};

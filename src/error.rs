use thiserror::Error;

/// Errors produced anywhere in the submission pipeline.
///
/// Every fallible operation in this crate returns one of these kinds rather
/// than panicking or raising. The variants map one-to-one onto the stages
/// where they can occur:
/// - [`Validation`](SlurmError::Validation) — a recognized directive value
///   failed its format check at construction time
/// - [`Render`](SlurmError::Render) — structural failure producing script text
/// - [`Parse`](SlurmError::Parse) — a directive block or the sbatch job-id
///   output did not match the expected grammar
/// - [`Connection`](SlurmError::Connection) / [`Transfer`](SlurmError::Transfer)
///   / [`Command`](SlurmError::Command) — remote session failures
/// - [`Execution`](SlurmError::Execution) — the remote command ran but
///   exited non-zero
/// - [`Cleanup`](SlurmError::Cleanup) — best-effort removal of the uploaded
///   script failed; informational only, never a primary failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlurmError {
    /// A recognized directive carried a malformed value.
    #[error("invalid value {value:?} for directive --{directive}: {reason}")]
    Validation {
        directive: String,
        value: String,
        reason: String,
    },

    /// Structural failure while rendering script text.
    #[error("render failed: {0}")]
    Render(String),

    /// Input did not match the expected grammar.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The remote session could not be established or probed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Upload or removal of a remote file failed.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The transport failed to invoke the remote command at all.
    #[error("command failed: {0}")]
    Command(String),

    /// The remote command ran and exited non-zero.
    #[error("remote command exited with status {exit_code}: {stderr}")]
    Execution { exit_code: i32, stderr: String },

    /// Post-failure removal of the uploaded script did not succeed.
    #[error("cleanup failed: {0}")]
    Cleanup(String),
}

impl SlurmError {
    /// Shorthand for a validation failure on a named directive.
    pub(crate) fn validation(directive: &str, value: &str, reason: &str) -> Self {
        SlurmError::Validation {
            directive: directive.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a parse failure with a 1-based line number.
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        SlurmError::Parse {
            line,
            message: message.into(),
        }
    }
}

mod ssh;

pub use ssh::SshSession;

use crate::error::SlurmError;

/// Captured result of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, as a single stream.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        out.push_str(&self.stderr);
        out
    }
}

/// The capability set the executor needs from a remote host, independent of
/// transport.
///
/// A session is not safe for concurrent use; callers needing parallel
/// submissions open independent sessions. Deadlines and cancellation belong
/// to the transport behind an implementation, not to this contract.
pub trait RemoteSession {
    /// Establish (or probe) the connection.
    fn connect(&mut self) -> Result<(), SlurmError>;

    /// Write `content` to `remote_path` on the remote host, executable.
    fn upload(&mut self, content: &str, remote_path: &str) -> Result<(), SlurmError>;

    /// Run a single command line remotely, capturing output and exit code.
    ///
    /// A non-zero exit code is not an error at this level; the caller
    /// classifies it. Errors here mean the transport failed to invoke the
    /// command at all.
    fn run_command(&mut self, command: &str) -> Result<CommandOutput, SlurmError>;

    /// Remove a remote file. Best-effort from the executor's point of view.
    fn remove(&mut self, remote_path: &str) -> Result<(), SlurmError>;

    /// Release the session. Further operations require a new `connect`.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_concatenates_streams() {
        let out = CommandOutput {
            stdout: "line one\n".into(),
            stderr: "warning\n".into(),
            exit_code: 0,
        };
        assert_eq!(out.combined(), "line one\nwarning\n");
        assert!(out.success());
    }

    #[test]
    fn nonzero_exit_is_not_success() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: "boom".into(),
            exit_code: 2,
        };
        assert!(!out.success());
    }
}

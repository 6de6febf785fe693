use std::io::Write;
use std::path::Path;
use std::process::Command;

use log::{debug, info};
use tempfile::NamedTempFile;

use super::{CommandOutput, RemoteSession};
use crate::config::RemoteConfig;
use crate::error::SlurmError;

/// Exit code the OpenSSH client reserves for its own failures.
const SSH_CLIENT_FAILURE: i32 = 255;

/// [`RemoteSession`] over the local OpenSSH client binaries.
///
/// Commands run through `ssh`, uploads stage the content in a local
/// temporary file and push it with `scp` followed by a `chmod +x`. No
/// long-lived channel is held; `connect` probes the host with an echo and
/// gates the other operations.
pub struct SshSession {
    config: RemoteConfig,
    connected: bool,
}

impl SshSession {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            connected: false,
        }
    }

    /// Argument vector for running `command` through ssh.
    fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.config.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(identity) = &self.config.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(self.config.destination());
        args.push(command.to_string());
        args
    }

    /// Argument vector for copying `local` to `remote_path` with scp.
    fn scp_args(&self, local: &Path, remote_path: &str) -> Vec<String> {
        let mut args = vec![
            "-P".to_string(),
            self.config.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(identity) = &self.config.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(local.display().to_string());
        args.push(format!("{}:{remote_path}", self.config.destination()));
        args
    }

    fn require_connected(&self) -> Result<(), SlurmError> {
        if self.connected {
            Ok(())
        } else {
            Err(SlurmError::Connection(format!(
                "session to {} is not connected",
                self.config.host
            )))
        }
    }

    fn exec_ssh(&self, command: &str) -> Result<CommandOutput, SlurmError> {
        let output = Command::new("ssh")
            .args(self.ssh_args(command))
            .output()
            .map_err(|e| SlurmError::Command(format!("can't spawn ssh: {e}")))?;
        let out = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };
        debug!("ssh {}: {:?} (exit {})", self.config.host, command, out.exit_code);
        if out.exit_code == SSH_CLIENT_FAILURE {
            return Err(SlurmError::Command(format!(
                "ssh failed to reach {}: {}",
                self.config.host,
                out.stderr.trim()
            )));
        }
        Ok(out)
    }
}

impl RemoteSession for SshSession {
    fn connect(&mut self) -> Result<(), SlurmError> {
        let probe = self
            .exec_ssh("echo remote-slurm-probe")
            .map_err(|e| SlurmError::Connection(e.to_string()))?;
        if !probe.success() || !probe.stdout.contains("remote-slurm-probe") {
            return Err(SlurmError::Connection(format!(
                "probe of {} failed: {}",
                self.config.host,
                probe.stderr.trim()
            )));
        }
        self.connected = true;
        info!("connected to {}", self.config.destination());
        Ok(())
    }

    fn upload(&mut self, content: &str, remote_path: &str) -> Result<(), SlurmError> {
        self.require_connected()?;

        let mut staged = NamedTempFile::new()
            .map_err(|e| SlurmError::Transfer(format!("can't stage upload: {e}")))?;
        staged
            .write_all(content.as_bytes())
            .map_err(|e| SlurmError::Transfer(format!("can't stage upload: {e}")))?;
        staged
            .flush()
            .map_err(|e| SlurmError::Transfer(format!("can't stage upload: {e}")))?;

        let output = Command::new("scp")
            .args(self.scp_args(staged.path(), remote_path))
            .output()
            .map_err(|e| SlurmError::Transfer(format!("can't spawn scp: {e}")))?;
        if !output.status.success() {
            return Err(SlurmError::Transfer(format!(
                "scp to {}:{remote_path} failed: {}",
                self.config.host,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let chmod = self.exec_ssh(&format!("chmod +x {remote_path}"))?;
        if !chmod.success() {
            return Err(SlurmError::Transfer(format!(
                "chmod +x {remote_path} failed: {}",
                chmod.stderr.trim()
            )));
        }
        info!("uploaded {} bytes to {}:{remote_path}", content.len(), self.config.host);
        Ok(())
    }

    fn run_command(&mut self, command: &str) -> Result<CommandOutput, SlurmError> {
        self.require_connected()?;
        self.exec_ssh(command)
    }

    fn remove(&mut self, remote_path: &str) -> Result<(), SlurmError> {
        self.require_connected()?;
        let out = self.exec_ssh(&format!("rm -f {remote_path}"))?;
        if !out.success() {
            return Err(SlurmError::Transfer(format!(
                "rm -f {remote_path} failed: {}",
                out.stderr.trim()
            )));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
        info!("closed session to {}", self.config.host);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config() -> RemoteConfig {
        RemoteConfig {
            host: "login.cluster.example".into(),
            user: Some("alice".into()),
            port: 2222,
            identity_file: Some(PathBuf::from("/home/alice/.ssh/id_ed25519")),
        }
    }

    #[test]
    fn ssh_args_carry_port_identity_and_destination() {
        let session = SshSession::new(config());
        assert_eq!(
            session.ssh_args("sbatch /tmp/job.sh"),
            vec![
                "-p",
                "2222",
                "-o",
                "BatchMode=yes",
                "-i",
                "/home/alice/.ssh/id_ed25519",
                "alice@login.cluster.example",
                "sbatch /tmp/job.sh",
            ]
        );
    }

    #[test]
    fn scp_args_target_remote_destination() {
        let session = SshSession::new(config());
        let args = session.scp_args(Path::new("/tmp/staged"), "/tmp/job.sh");
        assert_eq!(args.first().map(String::as_str), Some("-P"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("alice@login.cluster.example:/tmp/job.sh")
        );
    }

    #[test]
    fn minimal_config_omits_identity() {
        let session = SshSession::new(RemoteConfig::new("node1"));
        let args = session.ssh_args("true");
        assert!(!args.contains(&"-i".to_string()));
        assert!(args.contains(&"node1".to_string()));
    }

    #[test]
    fn operations_require_connect() {
        let mut session = SshSession::new(config());
        let err = session.run_command("hostname").unwrap_err();
        assert!(matches!(err, SlurmError::Connection(_)));
        let err = session.upload("echo hi", "/tmp/x.sh").unwrap_err();
        assert!(matches!(err, SlurmError::Connection(_)));
        let err = session.remove("/tmp/x.sh").unwrap_err();
        assert!(matches!(err, SlurmError::Connection(_)));
    }

    #[test]
    fn close_drops_the_connection() {
        let mut session = SshSession::new(config());
        session.connected = true;
        session.close();
        let err = session.run_command("true").unwrap_err();
        assert!(matches!(err, SlurmError::Connection(_)));
    }
}

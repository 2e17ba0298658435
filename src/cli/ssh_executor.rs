// SPDX-License-Identifier: Apache-2.0

//! The only concrete `DeploymentExecutor`: runs each device's commands
//! over `ssh`, one line at a time, via a blocking `std::process::Command`
//! (spawned on a blocking thread so it doesn't stall the async runtime).
//! In dry-run mode (the default) it only logs what it would have run.

use bdfab::{DeploymentExecutor, ExecError, ExecResult, FailureClass};

pub(crate) struct SshExecutor {
    pub(crate) dry_run: bool,
}

impl DeploymentExecutor for SshExecutor {
    type Conn = String;

    async fn connect(&self, device: &str) -> Result<Self::Conn, ExecError> {
        Ok(device.to_string())
    }

    async fn commit_check(&self, conn: &Self::Conn, commands: &[String]) -> ExecResult {
        self.run(conn, commands, true).await
    }

    async fn apply(&self, conn: &Self::Conn, commands: &[String]) -> ExecResult {
        self.run(conn, commands, false).await
    }

    async fn disconnect(&self, _conn: Self::Conn) {}
}

impl SshExecutor {
    async fn run(&self, device: &str, commands: &[String], check_only: bool) -> ExecResult {
        if self.dry_run {
            for cmd in commands {
                log::info!("[dry-run {device}{}] {cmd}", if check_only { " commit-check" } else { "" });
            }
            return Ok(());
        }

        let device = device.to_string();
        let commands = commands.to_vec();
        let result = tokio::task::spawn_blocking(move || run_ssh(&device, &commands, check_only))
            .await
            .map_err(|e| ExecError { reason: format!("ssh task panicked: {e}"), classification: FailureClass::Permanent })?;
        result
    }
}

fn run_ssh(device: &str, commands: &[String], check_only: bool) -> ExecResult {
    let mut script = commands.join("\n");
    if check_only {
        script.push_str("\ncommit check\n");
    } else {
        script.push_str("\ncommit\n");
    }

    let output = std::process::Command::new("ssh")
        .arg(device)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            use std::io::Write;
            if let Some(stdin) = child.stdin.as_mut() {
                stdin.write_all(script.as_bytes())?;
            }
            child.wait_with_output()
        });

    match output {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(ExecError {
            reason: format!("{device}: ssh exited {}: {}", out.status, String::from_utf8_lossy(&out.stderr)),
            classification: FailureClass::Permanent,
        }),
        Err(e) => {
            // A connection refused/timed out is worth one retry; any
            // other spawn failure (missing `ssh` binary, bad args) is not.
            let classification = match e.kind() {
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::ConnectionRefused => FailureClass::Transient,
                _ => FailureClass::Permanent,
            };
            Err(ExecError { reason: format!("{device}: {e}"), classification })
        }
    }
}

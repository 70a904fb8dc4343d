//! Mail delivery through the system `mail` command.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::notify::{Notification, NotificationSink};

/// Sends the JSON payload as the body of a mail.
///
/// Subject and address are separate arguments and the body goes through
/// stdin, so record contents never reach a shell.
#[derive(Debug, Clone)]
pub struct MailSink {
    command: String,
    address: String,
    subject: String,
}

impl MailSink {
    pub fn new(command: &str, address: impl Into<String>, subject: &str) -> Self {
        Self {
            command: command.to_string(),
            address: address.into(),
            subject: subject.to_string(),
        }
    }

    fn build_command(&self) -> Command {
        let mut command = Command::new(&self.command);
        command
            .arg("-s")
            .arg(&self.subject)
            .arg(&self.address)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }
}

#[async_trait]
impl NotificationSink for MailSink {
    fn name(&self) -> &str {
        "mail"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let body = serde_json::to_vec_pretty(notification)?;

        let mut child = self
            .build_command()
            .spawn()
            .map_err(|e| AppError::notify(format!("cannot run '{}': {}", self.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&body).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(AppError::notify(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        log::info!("Mail sent to {} for {}", self.address, notification.id);
        Ok(())
    }
}

//! Outbound send capability.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::SendError;

/// Capability to deliver one message to one phone number.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, phone: &str, text: &str) -> Result<(), SendError>;
}

/// Sends through Messages.app by invoking an AppleScript via `osascript`.
pub struct OsaScriptSender {
    script: PathBuf,
}

impl OsaScriptSender {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl MessageSender for OsaScriptSender {
    async fn send(&self, phone: &str, text: &str) -> Result<(), SendError> {
        let output = Command::new("osascript")
            .arg(&self.script)
            .arg(phone)
            .arg(text)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SendError::Failed {
                reason: format!("osascript exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}

/// Dry-run sender: logs what would have been sent and always succeeds.
pub struct DryRunSender;

#[async_trait]
impl MessageSender for DryRunSender {
    async fn send(&self, phone: &str, text: &str) -> Result<(), SendError> {
        tracing::info!(%phone, %text, "[DRY RUN] would send");
        Ok(())
    }
}

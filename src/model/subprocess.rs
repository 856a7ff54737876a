//! Provider CLI spawning.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::ModelError;

use super::ModelClient;

/// Runs completions through a provider CLI found on PATH.
///
/// The model id doubles as the executable name (`claude` by default).
/// The CLI is invoked in print mode (`-p <prompt>`) and must write the
/// completion to stdout.
pub struct CliModel {
    timeout: Duration,
}

impl CliModel {
    pub fn new(timeout: Duration) -> Self {
        CliModel { timeout }
    }
}

#[async_trait]
impl ModelClient for CliModel {
    async fn complete(&self, prompt: &str, model_id: &str) -> Result<String, ModelError> {
        // `which` crate for cross-platform executable detection.
        if which::which(model_id).is_err() {
            return Err(ModelError::NotInstalled(model_id.to_string()));
        }

        debug!(
            model = model_id,
            prompt_len = prompt.len(),
            "spawning model CLI"
        );
        let output = timeout(
            self.timeout,
            Command::new(model_id)
                .arg("-p")
                .arg(prompt)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await
        .map_err(|_| ModelError::Timeout(self.timeout.as_secs()))?
        .map_err(ModelError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            return Err(ModelError::NonZeroExit { code, stderr });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(stdout)
    }
}

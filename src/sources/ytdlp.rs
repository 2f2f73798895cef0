use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::{Descriptor, MediaExtractor};
use crate::error::ResolutionError;

/// [`MediaExtractor`] backed by the `yt-dlp` executable (`-J` JSON dump).
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Checks that the backend executable is runnable.
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                info!("✅ yt-dlp version: {}", version);
                Ok(version)
            }
            _ => {
                error!("❌ yt-dlp not found at `{}`. Install with: pip install yt-dlp", self.binary);
                anyhow::bail!("yt-dlp not available")
            }
        }
    }

    fn args(process: bool) -> Vec<&'static str> {
        let mut args = vec![
            "-J",
            "--quiet",
            "--no-warnings",
            "--no-playlist",
            "--no-check-certificates",
            "--default-search",
            "ytsearch",
            "--format",
            "bestaudio/best",
            "--socket-timeout",
            "15",
        ];
        if !process {
            args.push("--flat-playlist");
        }
        args
    }
}

/// Parses a `-J` dump; `null` and empty output mean "nothing found".
pub fn parse_dump(stdout: &[u8]) -> Result<Option<Descriptor>, ResolutionError> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| ResolutionError::Backend(format!("invalid yt-dlp output: {}", e)))
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(
        &self,
        query: &str,
        process: bool,
    ) -> Result<Option<Descriptor>, ResolutionError> {
        debug!("yt-dlp extract (process={}): {}", process, query);

        let output = tokio::process::Command::new(&self.binary)
            .args(Self::args(process))
            .arg("--")
            .arg(query)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResolutionError::Backend(format!("yt-dlp process error: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp failed for `{}`: {}", query, stderr.trim());
            // An unmatched search or unsupported URL is "nothing found", not a backend fault.
            if stderr.contains("Unsupported URL") || stderr.contains("No video results") {
                return Ok(None);
            }
            return Err(ResolutionError::Backend(stderr.trim().to_string()));
        }

        parse_dump(&output.stdout)
    }
}

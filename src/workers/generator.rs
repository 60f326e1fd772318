use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::settings::GenerationSettings;
use crate::infrastructure::store::JobStore;
use crate::modules::jobs::model::{JobStatus, MAX_RUNNING_PERCENT, clamp_percent};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to start generator: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("generator exited with {0}")]
    Exited(ExitStatus),

    #[error("generator finished without writing {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("generator panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct GenerationRequest<'a> {
    pub job_id: &'a str,
    pub prompt: &'a str,
    pub output_path: &'a Path,
    pub settings: &'a GenerationSettings,
}

/// Publishes `running:<percent>` while a job runs.
///
/// Values are bounded to `[0, 99]` and only a strictly higher value is
/// written, so repeated or stale reports cost nothing.
pub struct ProgressReporter {
    store: Arc<dyn JobStore>,
    job_id: String,
    last: AtomicU8,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn JobStore>, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
            last: AtomicU8::new(0),
        }
    }

    pub async fn report(&self, percent: i64) {
        let bounded = clamp_percent(percent, MAX_RUNNING_PERCENT);
        let previous = self.last.fetch_max(bounded, Ordering::SeqCst);
        if bounded <= previous {
            return;
        }

        let status = JobStatus::running(i64::from(bounded));
        if let Err(e) = self.store.set_status(&self.job_id, &status).await {
            warn!("Failed to publish progress for job {}: {}", self.job_id, e);
        }
    }

    pub fn last_percent(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

/// The compute routine: turns a prompt into a video at `output_path`.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), GenerationError>;
}

/// Runs an external program per job and follows its progress on stdout.
///
/// The program receives the job parameters both as flags and as
/// `GENERATION_*` environment variables, and reports progress with lines such
/// as `progress: 42`. Any other output is logged at debug level.
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl VideoGenerator for CommandGenerator {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
        progress: &ProgressReporter,
    ) -> Result<(), GenerationError> {
        let settings = request.settings;
        info!(
            "Generating job {} ({} frames @ {}fps, {}x{}, {} steps)",
            request.job_id,
            settings.frames,
            settings.fps,
            settings.width,
            settings.height,
            settings.inference_steps
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--prompt")
            .arg(request.prompt)
            .arg("--output")
            .arg(request.output_path)
            .arg("--model")
            .arg(&settings.model_path)
            .arg("--device")
            .arg(&settings.device)
            .arg("--frames")
            .arg(settings.frames.to_string())
            .arg("--fps")
            .arg(settings.fps.to_string())
            .arg("--height")
            .arg(settings.height.to_string())
            .arg("--width")
            .arg(settings.width.to_string())
            .arg("--steps")
            .arg(settings.inference_steps.to_string())
            .env("GENERATION_JOB_ID", request.job_id)
            .env("GENERATION_PROMPT", request.prompt)
            .env("GENERATION_OUTPUT", request.output_path)
            .env("GENERATION_MODEL", &settings.model_path)
            .env("GENERATION_DEVICE", &settings.device)
            .env("GENERATION_FRAMES", settings.frames.to_string())
            .env("GENERATION_FPS", settings.fps.to_string())
            .env("GENERATION_HEIGHT", settings.height.to_string())
            .env("GENERATION_WIDTH", settings.width.to_string())
            .env("GENERATION_STEPS", settings.inference_steps.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(GenerationError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GenerationError::Failed("generator stdout was not captured".into()))?;

        // Raw bytes: progress bars and the like may not be valid UTF-8.
        let mut stdout = BufReader::new(stdout);
        let mut buf = Vec::new();
        while stdout.read_until(b'\n', &mut buf).await? > 0 {
            {
                let line = String::from_utf8_lossy(&buf);
                match parse_progress(&line) {
                    Some(percent) => progress.report(percent).await,
                    None => debug!("[{}] {}", request.job_id, line.trim_end()),
                }
            }
            buf.clear();
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(GenerationError::Exited(status));
        }

        if !tokio::fs::try_exists(request.output_path).await.unwrap_or(false) {
            return Err(GenerationError::MissingOutput(request.output_path.to_path_buf()));
        }

        progress.report(i64::from(MAX_RUNNING_PERCENT)).await;
        Ok(())
    }
}

/// Accepts `progress: 42` and `progress=42`, case-insensitively.
pub fn parse_progress(line: &str) -> Option<i64> {
    let line = line.trim();
    let prefix = line.get(..8)?;
    if !prefix.eq_ignore_ascii_case("progress") {
        return None;
    }
    let rest = line[8..].trim_start();
    let value = rest.strip_prefix(':').or_else(|| rest.strip_prefix('='))?;
    value.trim().parse().ok()
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

/// File name every job writes its video to.
pub const ARTIFACT_NAME: &str = "out.mp4";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid job id")]
    InvalidId,

    #[error("file not found")]
    NotFound,
}

/// Rejects anything that could change which directory a job id points at.
pub fn is_safe_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id != "."
        && job_id != ".."
        && !job_id.contains(['/', '\\', '\0'])
}

/// Maps job ids to `<root>/<job_id>/out.mp4` without ever leaving `root`.
#[derive(Debug, Clone)]
pub struct OutputResolver {
    root: PathBuf,
}

impl OutputResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the artifact for `job_id` is written. Callers must have checked
    /// the id with [`is_safe_job_id`].
    pub fn artifact_path(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id).join(ARTIFACT_NAME)
    }

    pub async fn resolve(&self, job_id: &str) -> Result<PathBuf, ResolveError> {
        if !is_safe_job_id(job_id) {
            return Err(ResolveError::InvalidId);
        }

        // Nothing has been generated yet if the root itself is missing.
        let root = canonicalize(&self.root).await?;
        let candidate = canonicalize(&self.artifact_path(job_id)).await?;

        if !candidate.starts_with(&root) {
            warn!(
                "Artifact for job {} resolves outside {}: {}",
                job_id,
                root.display(),
                candidate.display()
            );
            return Err(ResolveError::InvalidId);
        }

        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => Ok(candidate),
            _ => Err(ResolveError::NotFound),
        }
    }
}

async fn canonicalize(path: &Path) -> Result<PathBuf, ResolveError> {
    tokio::fs::canonicalize(path).await.map_err(|e| {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to canonicalize {}: {}", path.display(), e);
        }
        ResolveError::NotFound
    })
}

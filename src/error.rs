use thiserror::Error;

/// Errors that can occur while capturing a site.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("request to {url} timed out or failed: {source}")]
    Network { url: String, #[source] source: reqwest::Error },
    #[error("{url} responded with non-200 status {status}")]
    RemoteStatus { url: String, status: u16 },
    #[error("failed to render page: {0}")]
    Render(String),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl CaptureError {
    /// Whether the Work Queue should requeue this job rather than mark it terminally failed.
    /// Catalog errors (lost connection, transient constraint failure) are retried the same as
    /// network errors; only a bad render or a definitive non-200 response is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CaptureError::Network { .. } | CaptureError::Catalog(_))
    }
}

/// Errors from the content-addressable Artifact Store.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error writing artifact at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

/// Errors from the Catalog (relational persistence layer).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("could not check out a connection from the pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("could not run migrations: {0}")]
    Migration(String),
}

/// Errors raised while computing a textual or visual diff.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("neither snapshot has readable content to diff")]
    NoReadableContent,
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("failed to serialize diff document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while computing a visual delta between two screenshots. Always non-fatal to
/// the enclosing Diff: the caller logs and continues without a visual path.
#[derive(Debug, Error)]
pub enum VisualDiffError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("screenshot missing for one or both snapshots")]
    MissingScreenshot,
}

/// Errors raised while importing sites from a CSV file.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Capability boundary standing in for a real headless-browser driver. The Capture Worker is
/// fully exercised in tests against `NullRenderer`; a production deployment supplies a real
/// implementation (e.g. backed by a Chrome DevTools Protocol client) without touching worker
/// logic.
pub trait PageRenderer: Send + Sync {
    fn render_png(&self, url: &str) -> Result<Vec<u8>, RenderError>;
    fn render_pdf(&self, url: &str) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, thiserror::Error)]
#[error("page render failed for {url}: {message}")]
pub struct RenderError {
    pub url: String,
    pub message: String,
}

/// Disabled-by-default renderer used when screenshots/PDF are not configured or no real
/// renderer has been wired up.
pub struct NullRenderer;

impl PageRenderer for NullRenderer {
    fn render_png(&self, url: &str) -> Result<Vec<u8>, RenderError> {
        Err(RenderError { url: url.to_string(), message: "no PageRenderer configured".to_string() })
    }

    fn render_pdf(&self, url: &str) -> Result<Vec<u8>, RenderError> {
        Err(RenderError { url: url.to_string(), message: "no PageRenderer configured".to_string() })
    }
}

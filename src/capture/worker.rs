use crate::artifact_store::ArtifactStore;
use crate::capture::render::PageRenderer;
use crate::capture::warc;
use crate::catalog;
use crate::config::Config;
use crate::error::CaptureError;
use crate::model::metadata::MetadataMap;
use crate::model::{NewSnapshot, Site, Snapshot};
use crate::time::Timer;
use diesel::PgConnection;
use sha2::{Digest, Sha256};

/// Fetches a Site's root URL, persists the resulting artifacts, and writes one Snapshot row.
/// A non-200 response still produces a degraded Snapshot (no content hash) so the Site's
/// checked timestamp advances without hot-looping; network failures are surfaced as retryable
/// errors and produce no Snapshot at all.
pub async fn capture_site(
    conn: &mut PgConnection,
    store: &ArtifactStore,
    config: &Config,
    renderer: &dyn PageRenderer,
    site: &Site,
) -> Result<Snapshot, CaptureError> {
    let _timer = Timer::new("capture_site");
    let url = site.root_url();

    let client = reqwest::Client::builder()
        .user_agent(config.crawler_user_agent.clone())
        .timeout(std::time::Duration::from_secs(config.crawl_timeout_secs))
        .build()
        .map_err(|source| CaptureError::Network { url: url.clone(), source })?;

    let response = client.get(&url).send().await.map_err(|source| CaptureError::Network { url: url.clone(), source })?;
    let status = response.status();
    let header_lines: String = response
        .headers()
        .iter()
        .map(|(name, value)| format!("{name}: {}\r\n", value.to_str().unwrap_or_default()))
        .collect();
    let body = response.bytes().await.map_err(|source| CaptureError::Network { url: url.clone(), source })?;

    if !status.is_success() {
        let new_snapshot = NewSnapshot {
            site_id: site.id,
            html_path: None,
            text_path: None,
            screenshot_path: None,
            pdf_path: None,
            warc_path: None,
            content_hash: None,
            http_status: Some(status.as_u16() as i32),
            byte_size: None,
            error_message: Some(format!("non-200 response: {status}")),
            metadata: MetadataMap::new(),
        };
        let snapshot = catalog::insert_snapshot(conn, &new_snapshot)?;
        catalog::mark_checked(conn, site.id, false)?;
        return Ok(snapshot);
    }

    let html = String::from_utf8_lossy(&body).into_owned();
    let text = extract_text(&html);
    let content_hash = hex::encode(Sha256::digest(html.as_bytes()));

    // Artifact paths are keyed by this Snapshot's own id, so the row is inserted once up front
    // (status only) and finalized with paths once the files have been written.
    let pending = NewSnapshot {
        site_id: site.id,
        html_path: None,
        text_path: None,
        screenshot_path: None,
        pdf_path: None,
        warc_path: None,
        content_hash: None,
        http_status: Some(status.as_u16() as i32),
        byte_size: None,
        error_message: None,
        metadata: MetadataMap::new(),
    };
    let snapshot = catalog::insert_snapshot(conn, &pending)?;
    let snapshot_dir = store.snapshot_dir(site.id, snapshot.id);

    let html_path = store.write(&snapshot_dir, "content.html", html.as_bytes())?;
    let text_path = store.write(&snapshot_dir, "content.txt", text.as_bytes())?;

    let screenshot_path = if config.enable_screenshots {
        renderer.render_png(&url).ok().and_then(|png| store.write(&snapshot_dir, "screenshot.png", &png).ok())
    } else {
        None
    };

    let pdf_path = if config.enable_pdf {
        renderer.render_pdf(&url).ok().and_then(|pdf| store.write(&snapshot_dir, "content.pdf", &pdf).ok())
    } else {
        None
    };

    let warc_bytes = warc::response_record(&url, status.as_u16(), &header_lines, &body);
    let warc_path = store.write(&snapshot_dir, "original.warc", &warc_bytes)?;

    let artifacts = catalog::SnapshotArtifacts {
        html_path: Some(html_path.display().to_string()),
        text_path: Some(text_path.display().to_string()),
        screenshot_path: screenshot_path.map(|p| p.display().to_string()),
        pdf_path: pdf_path.map(|p| p.display().to_string()),
        warc_path: Some(warc_path.display().to_string()),
        content_hash: Some(content_hash),
        byte_size: Some(body.len() as i64),
    };

    Ok(catalog::finalize_snapshot(conn, snapshot.id, artifacts)?)
}

/// Strips HTML tags and collapses whitespace while preserving line breaks, for the plain-text
/// projection stored alongside the raw HTML.
fn extract_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            '\n' => text.push('\n'),
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split('\n').map(str::trim).filter(|line| !line.is_empty()).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extract_text_strips_tags_and_collapses_blank_lines() {
        let html = "<html>\n<body>\n  <p>Hello</p>\n\n  <p>World</p>\n</body>\n</html>";
        let text = extract_text(html);
        assert_eq!(text, "Hello\nWorld");
    }

    #[test]
    fn content_hash_is_stable_for_identical_html() {
        let html = "<html><body>same</body></html>";
        let first = hex::encode(Sha256::digest(html.as_bytes()));
        let second = hex::encode(Sha256::digest(html.as_bytes()));
        assert_eq!(first, second);
    }
}

pub mod engine;
pub mod visual;

pub use engine::{DiffDocument, DiffStats, Hunk, HunkChange, HunkChangeType};

use crate::artifact_store::ArtifactStore;
use crate::catalog;
use crate::config::Config;
use crate::error::DiffError;
use crate::model::diff::NewDiff;
use crate::model::{Diff, Snapshot};
use crate::notify::{ChangeNotifier, LoggingNotifier};
use diesel::PgConnection;

/// Generates (or returns the existing) Diff between two Snapshots of the same Site. Idempotent:
/// a second call for the same pair returns the previously persisted Diff unchanged.
pub fn process(
    conn: &mut PgConnection,
    store: &ArtifactStore,
    config: &Config,
    old: &Snapshot,
    new: &Snapshot,
) -> Result<Diff, DiffError> {
    if let Some(existing) = catalog::diff_exists(conn, old.id, new.id)? {
        return Ok(existing);
    }

    let old_path = old.diffable_path().ok_or(DiffError::NoReadableContent)?;
    let new_path = new.diffable_path().ok_or(DiffError::NoReadableContent)?;
    let old_content = store.read_to_string(std::path::Path::new(old_path))?;
    let new_content = store.read_to_string(std::path::Path::new(new_path))?;

    let (document, stats, significance) = engine::generate(&old_content, &new_content, config.diff_size_threshold);

    let diff_dir = store.diff_dir(new.site_id, old.id, new.id);
    let document_bytes = serde_json::to_vec_pretty(&document)?;
    let diff_path = store.write(&diff_dir, "diff.json", &document_bytes)?;

    let visual_diff_path = if config.enable_visual_diff {
        generate_visual_diff(store, &diff_dir, old, new)
    } else {
        None
    };

    let new_diff = NewDiff {
        site_id: new.site_id,
        old_snapshot_id: old.id,
        new_snapshot_id: new.id,
        diff_path: diff_path.display().to_string(),
        visual_diff_path,
        additions: stats.additions as i32,
        deletions: stats.deletions as i32,
        changes: stats.changes as i32,
        significance,
    };
    let diff = catalog::insert_diff(conn, &new_diff)?;

    if config.enable_webhooks {
        LoggingNotifier.notify(&diff);
    }
    Ok(diff)
}

/// Best-effort visual delta; any failure is logged and swallowed so the textual Diff still
/// commits without a visual path.
fn generate_visual_diff(store: &ArtifactStore, diff_dir: &std::path::Path, old: &Snapshot, new: &Snapshot) -> Option<String> {
    let (old_screenshot, new_screenshot) = (old.screenshot_path.as_ref()?, new.screenshot_path.as_ref()?);

    let attempt = (|| -> Result<std::path::PathBuf, crate::error::VisualDiffError> {
        let old_bytes = store.read(std::path::Path::new(old_screenshot)).map_err(|_| {
            crate::error::VisualDiffError::MissingScreenshot
        })?;
        let new_bytes = store.read(std::path::Path::new(new_screenshot)).map_err(|_| {
            crate::error::VisualDiffError::MissingScreenshot
        })?;
        let overlay = visual::generate(&old_bytes, &new_bytes)?;
        store.write(diff_dir, "visual-diff.png", &overlay).map_err(|_| crate::error::VisualDiffError::MissingScreenshot)
    })();

    match attempt {
        Ok(path) => Some(path.display().to_string()),
        Err(err) => {
            tracing::warn!(site_id = new.site_id, "visual diff failed: {err}");
            None
        }
    }
}

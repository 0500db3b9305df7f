use crate::artifact_store::ArtifactStore;
use crate::capture::{self, PageRenderer};
use crate::catalog;
use crate::change_detector::{self, Verdict};
use crate::config::Config;
use crate::db;
use crate::diff;
use crate::error::{CaptureError, CatalogError, DiffError};
use crate::model::queue_entry::{NewQueueEntry, Operation, QueueStatus};
use crate::queue::{self, Payload, WorkQueue};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

const SCHEDULER_LOCK_NAME: &str = "scheduler";
const SCHEDULER_LOCK_TTL: time::Duration = time::Duration::seconds(30);
const DIFF_BATCH_SIZE: i64 = 5;

/// The process-wide control loop: admits Sites into the Work Queue's capture lane under the
/// concurrency cap, and separately admits pending diff QueueEntry rows into its diff lane. Runs
/// until `shutdown` resolves, at which point no new jobs are admitted but in-flight workers are
/// allowed to finish.
pub async fn run(
    config: Arc<Config>,
    store: Arc<ArtifactStore>,
    renderer: Arc<dyn PageRenderer>,
    shutdown: impl std::future::Future<Output = ()>,
) {
    let capture_queue = Arc::new(WorkQueue::new());
    let diff_queue = Arc::new(WorkQueue::new());
    let active_captures: Arc<Mutex<HashSet<i32>>> = Arc::new(Mutex::new(HashSet::new()));

    let mut interval = tokio::time::interval(Duration::from_secs(config.queue_processing_interval_secs));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick(&config, &store, &renderer, &capture_queue, &diff_queue, &active_captures).await;
            }
            _ = &mut shutdown => {
                tracing::info!("scheduler shutting down, waiting for in-flight captures");
                break;
            }
        }
    }
}

async fn tick(
    config: &Arc<Config>,
    store: &Arc<ArtifactStore>,
    renderer: &Arc<dyn PageRenderer>,
    capture_queue: &Arc<WorkQueue>,
    diff_queue: &Arc<WorkQueue>,
    active_captures: &Arc<Mutex<HashSet<i32>>>,
) {
    let Ok(Some(lock_token)) = queue::acquire(SCHEDULER_LOCK_NAME, SCHEDULER_LOCK_TTL) else {
        tracing::debug!("scheduler lock held elsewhere, skipping tick");
        return;
    };

    let available = config.max_concurrent_crawls.saturating_sub(active_captures.lock().unwrap().len());
    if available > 0 {
        if let Err(err) = admit_captures(config, capture_queue, available) {
            tracing::error!("failed to admit pending sites: {err}");
        }
    }

    while let Some(job) = capture_queue.next() {
        let Payload::Capture { site_id } = job.payload else {
            capture_queue.complete(job.id);
            continue;
        };
        active_captures.lock().unwrap().insert(site_id);
        spawn_capture(
            config.clone(),
            store.clone(),
            renderer.clone(),
            capture_queue.clone(),
            active_captures.clone(),
            job.id,
            site_id,
        );
    }

    if let Err(err) = admit_diffs(diff_queue) {
        tracing::error!("failed to admit pending diffs: {err}");
    }

    while let Some(job) = diff_queue.next() {
        let Payload::Diff { queue_entry_id, site_id, old_snapshot_id, new_snapshot_id } = job.payload else {
            diff_queue.complete(job.id);
            continue;
        };
        spawn_diff(config.clone(), store.clone(), diff_queue.clone(), job.id, queue_entry_id, site_id, old_snapshot_id, new_snapshot_id);
    }

    let _ = queue::release(SCHEDULER_LOCK_NAME, &lock_token);
}

fn admit_captures(config: &Config, queue: &WorkQueue, available: usize) -> Result<(), CatalogError> {
    let mut conn = db::get_connection()?;
    let pending = catalog::get_pending_sites(&mut conn, config, available as i64)?;

    for site in pending {
        let priority = config.queue_priority_for(site.priority);
        catalog::insert_queue_entry(
            &mut conn,
            &NewQueueEntry {
                site_id: site.id,
                operation: Operation::Capture.as_str().to_string(),
                status: QueueStatus::Pending.as_str().to_string(),
                priority,
            },
        )?;
        queue.enqueue(Payload::Capture { site_id: site.id }, priority);
    }
    Ok(())
}

/// Moves pending diff QueueEntry rows into the Work Queue's diff lane, claiming each by flipping
/// it to `in_progress` so it isn't re-admitted on a later tick. A Site whose snapshot history has
/// since dropped below two rows can't be diffed; its entry is failed immediately rather than
/// retried forever.
fn admit_diffs(queue: &WorkQueue) -> Result<(), CatalogError> {
    let mut conn = db::get_connection()?;
    let entries = catalog::pending_diff_entries(&mut conn, DIFF_BATCH_SIZE)?;

    for entry in entries {
        let snapshots = catalog::latest_two_snapshots(&mut conn, entry.site_id)?;
        let [new_snapshot, old_snapshot] = snapshots.as_slice() else {
            catalog::transition_queue_entry(&mut conn, entry.id, QueueStatus::Failed, Some("fewer than two snapshots on record"))?;
            continue;
        };

        catalog::transition_queue_entry(&mut conn, entry.id, QueueStatus::InProgress, None)?;
        queue.enqueue(
            Payload::Diff {
                queue_entry_id: entry.id,
                site_id: entry.site_id,
                old_snapshot_id: old_snapshot.id,
                new_snapshot_id: new_snapshot.id,
            },
            entry.priority,
        );
    }
    Ok(())
}

fn spawn_capture(
    config: Arc<Config>,
    store: Arc<ArtifactStore>,
    renderer: Arc<dyn PageRenderer>,
    capture_queue: Arc<WorkQueue>,
    active_captures: Arc<Mutex<HashSet<i32>>>,
    job_id: u64,
    site_id: i32,
) {
    tokio::spawn(async move {
        let outcome = run_capture(&config, &store, renderer.as_ref(), site_id).await;
        active_captures.lock().unwrap().remove(&site_id);

        match outcome {
            Ok(()) => capture_queue.complete(job_id),
            Err(err) => {
                tracing::warn!(site_id, "capture failed: {err}");
                capture_queue.fail(job_id, err.is_retryable(), config.max_retries);
            }
        }
    });
}

/// Captures `site_id` and, on a content change, enqueues a diff QueueEntry. The diff itself is
/// picked up and processed by the Work Queue's diff lane on a later tick via `admit_diffs`, not
/// generated inline here.
async fn run_capture(config: &Config, store: &ArtifactStore, renderer: &dyn PageRenderer, site_id: i32) -> Result<(), CaptureError> {
    let mut conn = db::get_connection()?;
    let site = catalog::find_site(&mut conn, site_id)?;

    let snapshot = capture::capture_site(&mut conn, store, config, renderer, &site).await?;
    if snapshot.is_degraded() {
        return Ok(());
    }

    if let Verdict::Changed { .. } = change_detector::detect(&mut conn, &snapshot)? {
        let priority = config.queue_priority_for(site.priority);
        catalog::insert_queue_entry(
            &mut conn,
            &NewQueueEntry {
                site_id,
                operation: Operation::Diff.as_str().to_string(),
                status: QueueStatus::Pending.as_str().to_string(),
                priority,
            },
        )?;
    }
    Ok(())
}

fn spawn_diff(
    config: Arc<Config>,
    store: Arc<ArtifactStore>,
    diff_queue: Arc<WorkQueue>,
    job_id: u64,
    queue_entry_id: i32,
    site_id: i32,
    old_snapshot_id: i32,
    new_snapshot_id: i32,
) {
    tokio::spawn(async move {
        match run_diff(&config, &store, old_snapshot_id, new_snapshot_id) {
            Ok(()) => {
                diff_queue.complete(job_id);
                if let Err(err) = finalize_diff_entry(queue_entry_id, QueueStatus::Completed, None) {
                    tracing::error!("failed to mark diff entry {queue_entry_id} completed: {err}");
                }
            }
            Err(err) => {
                tracing::warn!(site_id, "diff failed: {err}");
                // Diff jobs aren't retried through the Work Queue: a diff that fails against a
                // fixed pair of Snapshots will fail identically on redelivery.
                diff_queue.fail(job_id, false, 0);
                if let Err(catalog_err) = finalize_diff_entry(queue_entry_id, QueueStatus::Failed, Some(&err.to_string())) {
                    tracing::error!("failed to mark diff entry {queue_entry_id} failed: {catalog_err}");
                }
            }
        }
    });
}

fn run_diff(config: &Config, store: &ArtifactStore, old_snapshot_id: i32, new_snapshot_id: i32) -> Result<(), DiffError> {
    let mut conn = db::get_connection()?;
    let old = catalog::find_snapshot(&mut conn, old_snapshot_id)?;
    let new = catalog::find_snapshot(&mut conn, new_snapshot_id)?;
    diff::process(&mut conn, store, config, &old, &new)?;
    Ok(())
}

fn finalize_diff_entry(entry_id: i32, status: QueueStatus, error: Option<&str>) -> Result<(), CatalogError> {
    let mut conn = db::get_connection()?;
    catalog::transition_queue_entry(&mut conn, entry_id, status, error)
}

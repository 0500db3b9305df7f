use crate::config::Config;
use crate::db;
use crate::error::CatalogError;
use crate::model::queue_entry::{NewQueueEntry, Operation, QueueStatus};
use crate::model::{Diff, NewDiff, NewSite, NewSnapshot, QueueEntry, Site, Snapshot};
use crate::time::DateTime;
use diesel::prelude::*;

/// Sites that are enabled, have no outstanding capture QueueEntry, and whose priority-derived
/// recheck interval has elapsed (or have never been checked), ordered most urgent first. The
/// interval depends on each row's own priority tier, so the cutoff is computed once per tier in
/// Rust and compared against `last_checked_at` with a three-way `OR` rather than a single shared
/// threshold.
pub fn get_pending_sites(conn: &mut PgConnection, config: &Config, limit: i64) -> Result<Vec<Site>, CatalogError> {
    use crate::schema::archive_queue;
    use crate::schema::sites::dsl::*;

    let outstanding = archive_queue::table
        .filter(archive_queue::operation.eq(Operation::Capture.as_str()))
        .filter(
            archive_queue::status
                .eq(QueueStatus::Pending.as_str())
                .or(archive_queue::status.eq(QueueStatus::InProgress.as_str())),
        )
        .select(archive_queue::site_id);

    let now = DateTime::now();
    let high_cutoff: DateTime = (*now - config.recheck_interval_for(config.high_priority_threshold)).into();
    let normal_cutoff: DateTime = (*now - config.recheck_interval_for(config.normal_priority_threshold)).into();
    let low_cutoff: DateTime = (*now - config.recheck_interval_for(config.normal_priority_threshold + 1)).into();

    let due = last_checked_at
        .is_null()
        .or(priority.le(config.high_priority_threshold).and(last_checked_at.lt(high_cutoff)))
        .or(priority
            .gt(config.high_priority_threshold)
            .and(priority.le(config.normal_priority_threshold))
            .and(last_checked_at.lt(normal_cutoff)))
        .or(priority.gt(config.normal_priority_threshold).and(last_checked_at.lt(low_cutoff)));

    sites
        .filter(enabled.eq(true))
        .filter(diesel::dsl::not(id.eq_any(outstanding)))
        .filter(due)
        .order((priority.asc(), last_checked_at.asc().nulls_first()))
        .limit(limit)
        .select(Site::as_select())
        .load(conn)
        .map_err(CatalogError::from)
}

pub fn insert_site(conn: &mut PgConnection, new_site: &NewSite) -> Result<Site, CatalogError> {
    use crate::schema::sites;

    diesel::insert_into(sites::table)
        .values(new_site)
        .on_conflict(sites::domain)
        .do_update()
        .set(sites::priority.eq(new_site.priority))
        .get_result(conn)
        .map_err(CatalogError::from)
}

pub fn find_site(conn: &mut PgConnection, site_id: i32) -> Result<Site, CatalogError> {
    use crate::schema::sites::dsl::*;

    sites.find(site_id).select(Site::as_select()).first(conn).map_err(CatalogError::from)
}

pub fn find_site_by_domain(conn: &mut PgConnection, target_domain: &str) -> Result<Option<Site>, CatalogError> {
    use crate::schema::sites::dsl::*;

    sites
        .filter(domain.eq(target_domain))
        .select(Site::as_select())
        .first(conn)
        .optional()
        .map_err(CatalogError::from)
}

pub fn mark_checked(conn: &mut PgConnection, site_id: i32, changed: bool) -> Result<(), CatalogError> {
    use crate::schema::sites::dsl::*;

    let now = DateTime::now();
    if changed {
        diesel::update(sites.find(site_id))
            .set((last_checked_at.eq(now), last_changed_at.eq(now)))
            .execute(conn)?;
    } else {
        diesel::update(sites.find(site_id)).set(last_checked_at.eq(now)).execute(conn)?;
    }
    Ok(())
}

pub fn insert_snapshot(conn: &mut PgConnection, new_snapshot: &NewSnapshot) -> Result<Snapshot, CatalogError> {
    use crate::schema::snapshots;

    diesel::insert_into(snapshots::table)
        .values(new_snapshot)
        .get_result(conn)
        .map_err(CatalogError::from)
}

/// Fields discovered only after a Snapshot's artifacts have been written to disk (the artifact
/// paths embed the Snapshot's own id, so they can't be known until after the initial insert).
pub struct SnapshotArtifacts {
    pub html_path: Option<String>,
    pub text_path: Option<String>,
    pub screenshot_path: Option<String>,
    pub pdf_path: Option<String>,
    pub warc_path: Option<String>,
    pub content_hash: Option<String>,
    pub byte_size: Option<i64>,
}

pub fn finalize_snapshot(conn: &mut PgConnection, snapshot_id: i32, artifacts: SnapshotArtifacts) -> Result<Snapshot, CatalogError> {
    use crate::schema::snapshots::dsl::*;

    diesel::update(snapshots.find(snapshot_id))
        .set((
            html_path.eq(artifacts.html_path),
            text_path.eq(artifacts.text_path),
            screenshot_path.eq(artifacts.screenshot_path),
            pdf_path.eq(artifacts.pdf_path),
            warc_path.eq(artifacts.warc_path),
            content_hash.eq(artifacts.content_hash),
            byte_size.eq(artifacts.byte_size),
        ))
        .get_result(conn)
        .map_err(CatalogError::from)
}

/// The most recent Snapshot for a Site, excluding `exclude_id` (typically the snapshot that was
/// just written, so the Change Detector compares against the truly previous one).
pub fn latest_snapshot(
    conn: &mut PgConnection,
    target_site_id: i32,
    exclude_id: i32,
) -> Result<Option<Snapshot>, CatalogError> {
    use crate::schema::snapshots::dsl::*;

    snapshots
        .filter(site_id.eq(target_site_id))
        .filter(id.ne(exclude_id))
        .order(capture_timestamp.desc())
        .select(Snapshot::as_select())
        .first(conn)
        .optional()
        .map_err(CatalogError::from)
}

/// The two most recent Snapshots for a Site, newest first. Used by the `diff` CLI subcommand to
/// pick a default pair when none is specified.
pub fn latest_two_snapshots(conn: &mut PgConnection, target_site_id: i32) -> Result<Vec<Snapshot>, CatalogError> {
    use crate::schema::snapshots::dsl::*;

    snapshots
        .filter(site_id.eq(target_site_id))
        .order(capture_timestamp.desc())
        .limit(2)
        .select(Snapshot::as_select())
        .load(conn)
        .map_err(CatalogError::from)
}

pub fn find_snapshot(conn: &mut PgConnection, snapshot_id: i32) -> Result<Snapshot, CatalogError> {
    use crate::schema::snapshots::dsl::*;

    snapshots.find(snapshot_id).select(Snapshot::as_select()).first(conn).map_err(CatalogError::from)
}

pub fn diff_exists(conn: &mut PgConnection, old_id: i32, new_id: i32) -> Result<Option<Diff>, CatalogError> {
    use crate::schema::diffs::dsl::*;

    diffs
        .filter(old_snapshot_id.eq(old_id))
        .filter(new_snapshot_id.eq(new_id))
        .select(Diff::as_select())
        .first(conn)
        .optional()
        .map_err(CatalogError::from)
}

pub fn insert_diff(conn: &mut PgConnection, new_diff: &NewDiff) -> Result<Diff, CatalogError> {
    use crate::schema::diffs;

    diesel::insert_into(diffs::table).values(new_diff).get_result(conn).map_err(CatalogError::from)
}

pub fn insert_queue_entry(conn: &mut PgConnection, entry: &NewQueueEntry) -> Result<QueueEntry, CatalogError> {
    use crate::schema::archive_queue;

    diesel::insert_into(archive_queue::table).values(entry).get_result(conn).map_err(CatalogError::from)
}

pub fn pending_diff_entries(conn: &mut PgConnection, limit: i64) -> Result<Vec<QueueEntry>, CatalogError> {
    use crate::schema::archive_queue::dsl::*;

    archive_queue
        .filter(operation.eq(Operation::Diff.as_str()))
        .filter(status.eq(QueueStatus::Pending.as_str()))
        .order((priority.asc(), scheduled_for.asc()))
        .limit(limit)
        .select(QueueEntry::as_select())
        .load(conn)
        .map_err(CatalogError::from)
}

pub fn transition_queue_entry(
    conn: &mut PgConnection,
    entry_id: i32,
    new_status: QueueStatus,
    error: Option<&str>,
) -> Result<(), CatalogError> {
    use crate::schema::archive_queue::dsl::*;

    let now = DateTime::now();
    let update = diesel::update(archive_queue.find(entry_id));
    match new_status {
        QueueStatus::InProgress => {
            update.set((status.eq(new_status.as_str()), started_at.eq(now))).execute(conn)?;
        }
        QueueStatus::Completed | QueueStatus::Failed => {
            update
                .set((status.eq(new_status.as_str()), completed_at.eq(now), error_message.eq(error)))
                .execute(conn)?;
        }
        QueueStatus::Pending => {
            update.set(status.eq(new_status.as_str())).execute(conn)?;
        }
    }
    Ok(())
}

/// Initializes the database by connecting once and running any pending migrations. Fatal on
/// failure: the process cannot serve without a schema it recognizes.
pub fn initialize() -> Result<(), CatalogError> {
    let mut conn = db::get_connection()?;
    db::run_migrations(&mut conn)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support;

    fn uniform_interval_config(interval_secs: i64) -> Config {
        Config {
            high_priority_threshold: 1,
            normal_priority_threshold: 3,
            high_priority_interval_secs: interval_secs,
            normal_priority_interval_secs: interval_secs,
            low_priority_interval_secs: interval_secs,
            ..Config::default()
        }
    }

    fn insert_test_site(conn: &mut PgConnection, label: &str) -> Site {
        insert_site(
            conn,
            &NewSite {
                domain: format!("{label}-{}.example.gov", uuid::Uuid::new_v4()),
                federal_agency: None,
                organization: None,
                city: None,
                state: None,
                security_contact: None,
                priority: 2,
            },
        )
        .unwrap()
    }

    fn backdate(conn: &mut PgConnection, target_site_id: i32, seconds_ago: i64) {
        use crate::schema::sites::dsl;

        let checked_at: DateTime = (*DateTime::now() - time::Duration::seconds(seconds_ago)).into();
        diesel::update(dsl::sites.find(target_site_id))
            .set(dsl::last_checked_at.eq(checked_at))
            .execute(conn)
            .unwrap();
    }

    #[test]
    fn site_checked_within_its_interval_is_not_due() {
        let mut conn = test_support::get_connection();
        let config = uniform_interval_config(3600);
        let site = insert_test_site(&mut conn, "recent");
        backdate(&mut conn, site.id, 1);

        let pending = get_pending_sites(&mut conn, &config, 100).unwrap();
        assert!(!pending.iter().any(|found| found.id == site.id));
    }

    #[test]
    fn site_past_its_interval_is_due() {
        let mut conn = test_support::get_connection();
        let config = uniform_interval_config(3600);
        let site = insert_test_site(&mut conn, "stale");
        backdate(&mut conn, site.id, 7200);

        let pending = get_pending_sites(&mut conn, &config, 100).unwrap();
        assert!(pending.iter().any(|found| found.id == site.id));
    }

    #[test]
    fn never_checked_site_is_due() {
        let mut conn = test_support::get_connection();
        let config = uniform_interval_config(3600);
        let site = insert_test_site(&mut conn, "new");

        let pending = get_pending_sites(&mut conn, &config, 100).unwrap();
        assert!(pending.iter().any(|found| found.id == site.id));
    }
}

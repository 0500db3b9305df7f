use crate::catalog;
use crate::error::CatalogError;
use crate::model::Snapshot;
use diesel::PgConnection;

/// Outcome of comparing a freshly captured Snapshot against the Site's prior history.
pub enum Verdict {
    /// No prior snapshot exists; this is the first capture for the Site.
    FirstCapture,
    /// The content fingerprint matches the previous snapshot; nothing changed.
    Unchanged,
    /// The content fingerprint differs; a diff should be generated against `previous`.
    Changed { previous: Snapshot },
}

/// Compares `new_snapshot`'s content hash against the Site's previous snapshot and updates the
/// Site's checked/changed timestamps accordingly. Does not itself enqueue a diff job; the
/// caller decides what to do with a `Verdict::Changed`.
pub fn detect(conn: &mut PgConnection, new_snapshot: &Snapshot) -> Result<Verdict, CatalogError> {
    let previous = catalog::latest_snapshot(conn, new_snapshot.site_id, new_snapshot.id)?;

    let verdict = match previous {
        None => Verdict::FirstCapture,
        Some(previous) if previous.content_hash == new_snapshot.content_hash => Verdict::Unchanged,
        Some(previous) => Verdict::Changed { previous },
    };

    let changed = matches!(verdict, Verdict::Changed { .. });
    catalog::mark_checked(conn, new_snapshot.site_id, changed)?;
    Ok(verdict)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::metadata::MetadataMap;
    use crate::model::{NewSite, NewSnapshot};
    use crate::test_support;

    fn insert_test_site(conn: &mut PgConnection) -> crate::model::Site {
        catalog::insert_site(
            conn,
            &NewSite {
                domain: format!("detect-{}.example.gov", uuid::Uuid::new_v4()),
                federal_agency: None,
                organization: None,
                city: None,
                state: None,
                security_contact: None,
                priority: 3,
            },
        )
        .unwrap()
    }

    fn insert_test_snapshot(conn: &mut PgConnection, site_id: i32, hash: &str) -> Snapshot {
        catalog::insert_snapshot(
            conn,
            &NewSnapshot {
                site_id,
                html_path: Some("content.html".to_string()),
                text_path: None,
                screenshot_path: None,
                pdf_path: None,
                warc_path: None,
                content_hash: Some(hash.to_string()),
                http_status: Some(200),
                byte_size: Some(128),
                error_message: None,
                metadata: MetadataMap::new(),
            },
        )
        .unwrap()
    }

    #[test]
    fn first_capture_has_no_prior_snapshot() {
        let mut conn = test_support::get_connection();
        let site = insert_test_site(&mut conn);
        let snapshot = insert_test_snapshot(&mut conn, site.id, "abc");

        let verdict = detect(&mut conn, &snapshot).unwrap();
        assert!(matches!(verdict, Verdict::FirstCapture));
    }

    #[test]
    fn unchanged_when_hashes_match() {
        let mut conn = test_support::get_connection();
        let site = insert_test_site(&mut conn);
        insert_test_snapshot(&mut conn, site.id, "abc");
        let new_snapshot = insert_test_snapshot(&mut conn, site.id, "abc");

        let verdict = detect(&mut conn, &new_snapshot).unwrap();
        assert!(matches!(verdict, Verdict::Unchanged));
    }

    #[test]
    fn changed_when_hashes_differ() {
        let mut conn = test_support::get_connection();
        let site = insert_test_site(&mut conn);
        let old_snapshot = insert_test_snapshot(&mut conn, site.id, "abc");
        let new_snapshot = insert_test_snapshot(&mut conn, site.id, "def");

        let verdict = detect(&mut conn, &new_snapshot).unwrap();
        assert!(matches!(verdict, Verdict::Changed { previous } if previous.id == old_snapshot.id));
    }
}

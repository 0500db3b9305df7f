use crate::catalog;
use crate::error::ImportError;
use crate::model::NewSite;
use diesel::PgConnection;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// One row of a CISA-format site inventory CSV.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteRow {
    domain: String,
    #[serde(default)]
    domain_type: Option<String>,
    #[serde(default)]
    federal_agency: Option<String>,
    #[serde(default)]
    organization_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    security_contact: Option<String>,
}

const PRIORITY_HIGH: i16 = 1;
const PRIORITY_NORMAL: i16 = 3;

/// Ingests `path` as the Site inventory, optionally overlaying `priority_path` to mark a subset
/// of domains as high priority. Domains are deduplicated case-insensitively; later rows for a
/// domain already seen within the same file are skipped rather than merged.
pub fn import(conn: &mut PgConnection, path: &Path, priority_path: Option<&Path>) -> Result<usize, ImportError> {
    let priority_domains = match priority_path {
        Some(path) => read_priority_domains(path)?,
        None => HashSet::new(),
    };

    let mut reader = csv::Reader::from_path(path)?;
    let mut seen = HashSet::new();
    let mut imported = 0;

    for result in reader.deserialize::<SiteRow>() {
        let row = result?;
        let domain = row.domain.trim().to_lowercase();
        if domain.is_empty() || !seen.insert(domain.clone()) {
            continue;
        }

        let priority = if priority_domains.contains(&domain) { PRIORITY_HIGH } else { PRIORITY_NORMAL };
        let new_site = NewSite {
            domain,
            federal_agency: row.federal_agency.or(row.domain_type),
            organization: row.organization_name,
            city: row.city,
            state: row.state,
            security_contact: row.security_contact,
            priority,
        };
        catalog::insert_site(conn, &new_site)?;
        imported += 1;
    }
    Ok(imported)
}

fn read_priority_domains(path: &Path) -> Result<HashSet<String>, ImportError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut domains = HashSet::new();
    for result in reader.deserialize::<SiteRow>() {
        let row = result?;
        domains.insert(row.domain.trim().to_lowercase());
    }
    Ok(domains)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn priority_domains_are_case_folded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "domain,domainType,federalAgency,organizationName,city,state,securityContact").unwrap();
        writeln!(file, "Example.GOV,Federal,Example Agency,Example Org,Example City,EX,security@example.gov").unwrap();
        file.flush().unwrap();

        let domains = read_priority_domains(file.path()).unwrap();
        assert!(domains.contains("example.gov"));
    }
}

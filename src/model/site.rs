use crate::schema::sites;
use crate::time::DateTime;
use diesel::pg::Pg;
use diesel::prelude::*;

#[derive(Insertable)]
#[diesel(table_name = sites)]
#[diesel(check_for_backend(Pg))]
pub struct NewSite {
    pub domain: String,
    pub federal_agency: Option<String>,
    pub organization: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub security_contact: Option<String>,
    pub priority: i16,
}

#[derive(Debug, Clone, AsChangeset, Identifiable, Queryable, Selectable)]
#[diesel(treat_none_as_null = true)]
#[diesel(table_name = sites)]
#[diesel(check_for_backend(Pg))]
pub struct Site {
    pub id: i32,
    pub domain: String,
    pub federal_agency: Option<String>,
    pub organization: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub security_contact: Option<String>,
    pub priority: i16,
    pub enabled: bool,
    pub created_at: DateTime,
    pub last_checked_at: Option<DateTime>,
    pub last_changed_at: Option<DateTime>,
}

impl Site {
    pub fn root_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

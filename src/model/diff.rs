use crate::schema::diffs;
use crate::time::DateTime;
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::SmallInt;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

/// A Diff's magnitude classification, derived from its total change count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Minor = 1,
    Moderate = 2,
    Major = 3,
}

impl Significance {
    /// Classifies a total change count using the configured size threshold, per the rule
    /// `total < threshold => Minor`, `total < threshold * 5 => Moderate`, else `Major`.
    pub fn classify(total: usize, threshold: usize) -> Self {
        if total < threshold {
            Significance::Minor
        } else if total < threshold * 5 {
            Significance::Moderate
        } else {
            Significance::Major
        }
    }
}

impl ToSql<SmallInt, Pg> for Significance {
    fn to_sql<'a>(&'a self, out: &mut Output<'a, '_, Pg>) -> serialize::Result {
        let v = self.to_i16().expect("Significance always has an i16 representation");
        ToSql::<SmallInt, Pg>::to_sql(&v, &mut out.reborrow())
    }
}

impl<DB: Backend> FromSql<SmallInt, DB> for Significance
where
    i16: FromSql<SmallInt, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> deserialize::Result<Self> {
        let database_value = i16::from_sql(bytes)?;
        Significance::from_i16(database_value).ok_or_else(|| format!("invalid significance value: {database_value}").into())
    }
}

#[derive(Insertable)]
#[diesel(table_name = diffs)]
#[diesel(check_for_backend(Pg))]
pub struct NewDiff {
    pub site_id: i32,
    pub old_snapshot_id: i32,
    pub new_snapshot_id: i32,
    pub diff_path: String,
    pub visual_diff_path: Option<String>,
    pub additions: i32,
    pub deletions: i32,
    pub changes: i32,
    pub significance: Significance,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(treat_none_as_null = true)]
#[diesel(table_name = diffs)]
#[diesel(check_for_backend(Pg))]
pub struct Diff {
    pub id: i32,
    pub site_id: i32,
    pub old_snapshot_id: i32,
    pub new_snapshot_id: i32,
    pub diff_path: String,
    pub visual_diff_path: Option<String>,
    pub additions: i32,
    pub deletions: i32,
    pub changes: i32,
    pub significance: Significance,
    pub created_at: DateTime,
}

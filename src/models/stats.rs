//! Per-owner upload counters shown on the dashboard.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Upload counts for one distinct (name, surname) owner pair.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub name: String,
    pub surname: String,

    /// All-time number of records owned by this pair.
    pub total_count: i64,

    /// Records uploaded during the current local calendar day.
    pub today_count: i64,
}

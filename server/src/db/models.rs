//! Database row types for all tables.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

use serde::{Deserialize, Serialize};

/// Cohort member. Members are numbered 0..=21.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub number: i64,
    pub user_name: String,
}

/// Lowest and highest valid member numbers.
pub const MIN_USER_NUMBER: i64 = 0;
pub const MAX_USER_NUMBER: i64 = 21;

/// Gallery entry for one week's project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub week: i64,
    pub project_name: String,
    /// Base64-encoded image
    pub thumbnail: String,
    pub url: Option<String>,
    pub teammates: Vec<i64>,
    pub introduction: String,
}

/// Status update posted by a member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Status {
    #[serde(rename = "_id")]
    pub id: String,
    pub start_date: String,
    pub end_date: String,
    pub content: String,
    pub user_num: i64,
    pub created_at: String,
}

//! Roster seeding: members and gallery projects from a JSON file.

use chrono::Utc;
use serde::Deserialize;
use std::path::Path;
use uuid::Uuid;

use super::models::{Project, User, MAX_USER_NUMBER, MIN_USER_NUMBER};
use super::DbPool;

/// On-disk roster format.
#[derive(Debug, Default, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Rows actually inserted by a seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub projects: usize,
}

/// Insert a member. Existing numbers or names are left untouched.
/// Returns whether a row was written.
pub fn insert_user(conn: &rusqlite::Connection, user: &User) -> Result<bool, rusqlite::Error> {
    if !(MIN_USER_NUMBER..=MAX_USER_NUMBER).contains(&user.number) {
        return Err(rusqlite::Error::ToSqlConversionFailure(
            format!(
                "user number {} outside {}..={}",
                user.number, MIN_USER_NUMBER, MAX_USER_NUMBER
            )
            .into(),
        ));
    }

    let changed = conn.execute(
        "INSERT OR IGNORE INTO users (number, user_name, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![user.number, user.user_name, Utc::now().to_rfc3339()],
    )?;
    Ok(changed > 0)
}

/// Insert a gallery project. A project with the same week and name is left untouched.
pub fn insert_project(
    conn: &rusqlite::Connection,
    project: &Project,
) -> Result<bool, rusqlite::Error> {
    let id = project
        .id
        .clone()
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    let teammates = serde_json::to_string(&project.teammates)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let changed = conn.execute(
        "INSERT OR IGNORE INTO projects (id, week, project_name, thumbnail, url, teammates, introduction)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id,
            project.week,
            project.project_name,
            project.thumbnail,
            project.url,
            teammates,
            project.introduction,
        ],
    )?;
    Ok(changed > 0)
}

/// Insert every roster entry inside one transaction (idempotent).
pub fn seed_roster(db: &DbPool, roster: &Roster) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let mut conn = db.lock().map_err(|e| format!("DB lock error: {}", e))?;
    let tx = conn.transaction()?;

    let mut summary = SeedSummary::default();
    for user in &roster.users {
        if insert_user(&tx, user)? {
            summary.users += 1;
        }
    }
    for project in &roster.projects {
        if insert_project(&tx, project)? {
            summary.projects += 1;
        }
    }

    tx.commit()?;
    Ok(summary)
}

/// Read a JSON roster file and seed it.
pub fn load_roster_file(
    db: &DbPool,
    path: impl AsRef<Path>,
) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let roster: Roster = serde_json::from_str(&raw)?;
    let summary = seed_roster(db, &roster)?;

    tracing::info!(
        path = %path.as_ref().display(),
        users = summary.users,
        projects = summary.projects,
        "Roster seeded"
    );
    Ok(summary)
}

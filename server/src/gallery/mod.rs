//! Read-only project gallery, grouped by week.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::db::models::Project;
use crate::db::{DbPool, StoreError};
use crate::state::AppState;

/// Projects for one week, in insertion order.
pub fn projects_for_week(db: &DbPool, week: i64) -> Result<Vec<Project>, StoreError> {
    let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
    let mut stmt = conn.prepare(
        "SELECT id, week, project_name, thumbnail, url, teammates, introduction
         FROM projects WHERE week = ?1 ORDER BY rowid ASC",
    )?;

    let rows = stmt
        .query_map([week], |row| {
            Ok((
                Project {
                    id: Some(row.get(0)?),
                    week: row.get(1)?,
                    project_name: row.get(2)?,
                    thumbnail: row.get(3)?,
                    url: row.get(4)?,
                    teammates: Vec::new(),
                    introduction: row.get(6)?,
                },
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(mut project, teammates)| -> Result<Project, StoreError> {
            project.teammates = serde_json::from_str(&teammates)?;
            Ok(project)
        })
        .collect()
}

/// GET /gallery/{week}: projects posted for the given week.
pub async fn get_week_projects(
    State(state): State<AppState>,
    Path(week): Path<i64>,
) -> Result<Json<Vec<Project>>, (StatusCode, String)> {
    let db = state.db.clone();

    let projects = tokio::task::spawn_blocking(move || projects_for_week(&db, week))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))?
        .map_err(|e| {
            tracing::error!(week, error = %e, "Gallery query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "gallery unavailable".to_string())
        })?;

    if projects.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("{}주차에 맞는 프로젝트를 찾지 못함", week),
        ));
    }

    Ok(Json(projects))
}

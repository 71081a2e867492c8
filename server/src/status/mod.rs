//! Member status updates ("how are you doing" entries).
//!
//! Reads are public; writes require a bearer token whose member number matches
//! the path. A member's status list is every status row carrying their number,
//! so deleting a row also removes it from the list.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rusqlite::OptionalExtension;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::db::models::Status;
use crate::db::DbPool;
use crate::state::AppState;

type ApiError = (StatusCode, String);

// --- Request types ---

#[derive(Debug, Deserialize)]
pub struct CreateStatusRequest {
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: String,
    pub content: String,
}

// --- Queries ---

pub fn user_exists(conn: &rusqlite::Connection, number: i64) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) FROM users WHERE number = ?1",
        [number],
        |row| row.get::<_, i64>(0).map(|c| c > 0),
    )
}

fn status_from_row(row: &rusqlite::Row<'_>) -> Result<Status, rusqlite::Error> {
    Ok(Status {
        id: row.get(0)?,
        start_date: row.get(1)?,
        end_date: row.get(2)?,
        content: row.get(3)?,
        user_num: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const STATUS_COLUMNS: &str = "id, start_date, end_date, content, user_num, created_at";

pub fn list_statuses(conn: &rusqlite::Connection, number: i64) -> Result<Vec<Status>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STATUS_COLUMNS} FROM statuses WHERE user_num = ?1 ORDER BY rowid ASC"
    ))?;
    let statuses = stmt
        .query_map([number], status_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(statuses)
}

pub fn find_status(
    conn: &rusqlite::Connection,
    number: i64,
    status_id: &str,
) -> Result<Option<Status>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {STATUS_COLUMNS} FROM statuses WHERE id = ?1 AND user_num = ?2"),
        rusqlite::params![status_id, number],
        status_from_row,
    )
    .optional()
}

pub fn insert_status(
    conn: &rusqlite::Connection,
    number: i64,
    req: &CreateStatusRequest,
    created_at: &str,
) -> Result<Status, rusqlite::Error> {
    let status = Status {
        id: Uuid::now_v7().to_string(),
        start_date: req.start_date.clone(),
        end_date: req.end_date.clone(),
        content: req.content.clone(),
        user_num: number,
        created_at: created_at.to_string(),
    };
    conn.execute(
        "INSERT INTO statuses (id, user_num, start_date, end_date, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            status.id,
            status.user_num,
            status.start_date,
            status.end_date,
            status.content,
            status.created_at,
        ],
    )?;
    Ok(status)
}

/// Apply an update; `start_date` is kept when not supplied.
/// Returns `None` when the member has no such status.
pub fn update_status(
    conn: &rusqlite::Connection,
    number: i64,
    status_id: &str,
    req: &UpdateStatusRequest,
) -> Result<Option<Status>, rusqlite::Error> {
    let changed = conn.execute(
        "UPDATE statuses
         SET start_date = COALESCE(?1, start_date), end_date = ?2, content = ?3
         WHERE id = ?4 AND user_num = ?5",
        rusqlite::params![req.start_date, req.end_date, req.content, status_id, number],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    find_status(conn, number, status_id)
}

pub fn delete_status(
    conn: &rusqlite::Connection,
    number: i64,
    status_id: &str,
) -> Result<bool, rusqlite::Error> {
    let changed = conn.execute(
        "DELETE FROM statuses WHERE id = ?1 AND user_num = ?2",
        rusqlite::params![status_id, number],
    )?;
    Ok(changed > 0)
}

/// Run `f` against the locked connection on the blocking pool.
async fn with_conn<T, F>(db: &DbPool, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error> + Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;
        f(&*conn).map_err(|e| {
            tracing::error!(error = %e, "Status query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "database error".to_string())
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))?
}

fn require_self(claims: &Claims, number: i64, action: &str) -> Result<(), ApiError> {
    if claims.number != number {
        return Err((
            StatusCode::FORBIDDEN,
            format!("근황 {}는 본인만 가능합니다!", action),
        ));
    }
    Ok(())
}

fn user_not_found(number: i64) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{}번 유저를 찾을 수 없습니다", number))
}

// --- Handlers ---

/// GET /how/{number}: a member's statuses, oldest first.
pub async fn get_statuses(
    State(state): State<AppState>,
    Path(number): Path<i64>,
) -> Result<Json<Vec<Status>>, ApiError> {
    let statuses = with_conn(&state.db, move |conn| {
        if !user_exists(conn, number)? {
            return Ok(None);
        }
        list_statuses(conn, number).map(Some)
    })
    .await?
    .ok_or_else(|| (StatusCode::NOT_FOUND, format!("{}번 유저 조회 불가", number)))?;

    Ok(Json(statuses))
}

/// POST /how/{number}/add/: post a status as yourself.
pub async fn add_status(
    State(state): State<AppState>,
    claims: Claims,
    Path(number): Path<i64>,
    Json(body): Json<CreateStatusRequest>,
) -> Result<Json<Status>, ApiError> {
    require_self(&claims, number, "추가")?;

    let created_at = state.clock.today();
    let status = with_conn(&state.db, move |conn| {
        if !user_exists(conn, number)? {
            return Ok(None);
        }
        insert_status(conn, number, &body, &created_at).map(Some)
    })
    .await?
    .ok_or_else(|| user_not_found(number))?;

    tracing::info!(number, status_id = %status.id, "Status added");
    Ok(Json(status))
}

/// PUT /how/{number}/update/{status_id}: edit one of your statuses.
pub async fn put_status(
    State(state): State<AppState>,
    claims: Claims,
    Path((number, status_id)): Path<(i64, String)>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Status>, ApiError> {
    require_self(&claims, number, "수정")?;

    let sid = status_id.clone();
    let outcome = with_conn(&state.db, move |conn| {
        if !user_exists(conn, number)? {
            return Ok(Err(user_not_found(number)));
        }
        Ok(update_status(conn, number, &sid, &body)?.ok_or((
            StatusCode::NOT_FOUND,
            format!("ID-{}인 근황을 찾을 수 없습니다", sid),
        )))
    })
    .await?;

    let status = outcome?;
    tracing::info!(number, status_id = %status_id, "Status updated");
    Ok(Json(status))
}

/// DELETE /how/{number}/delete/{status_id}: remove one of your statuses.
pub async fn remove_status(
    State(state): State<AppState>,
    claims: Claims,
    Path((number, status_id)): Path<(i64, String)>,
) -> Result<StatusCode, ApiError> {
    require_self(&claims, number, "삭제")?;

    let sid = status_id.clone();
    let outcome = with_conn(&state.db, move |conn| {
        if !user_exists(conn, number)? {
            return Ok(Err(user_not_found(number)));
        }
        if delete_status(conn, number, &sid)? {
            Ok(Ok(()))
        } else {
            Ok(Err((
                StatusCode::NOT_FOUND,
                format!("ID-{}인 근황을 찾을 수 없습니다", sid),
            )))
        }
    })
    .await?;

    outcome?;
    tracing::info!(number, status_id = %status_id, "Status deleted");
    Ok(StatusCode::NO_CONTENT)
}

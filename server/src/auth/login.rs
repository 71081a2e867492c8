//! Answer-gated login: a known member plus the four weekly answers.

use axum::{extract::State, http::StatusCode, Json};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_name: String,
    pub week1: String,
    pub week2: String,
    pub week3: String,
    pub week4: String,
}

impl LoginRequest {
    fn answers(&self) -> [&str; 4] {
        [&self.week1, &self.week2, &self.week3, &self.week4]
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Every supplied answer must equal the expected answer for that week.
pub fn answers_match(expected: &[String], supplied: &[&str]) -> bool {
    expected.len() == supplied.len()
        && expected
            .iter()
            .zip(supplied)
            .all(|(want, got)| want.as_str() == *got)
}

/// Member number for `user_name`, or `None` when nobody has that name.
pub fn find_member_number(
    conn: &rusqlite::Connection,
    user_name: &str,
) -> Result<Option<i64>, rusqlite::Error> {
    conn.query_row(
        "SELECT number FROM users WHERE user_name = ?1",
        [user_name],
        |row| row.get::<_, i64>(0),
    )
    .optional()
}

/// POST /login/
/// Verify the member exists and all four answers match, then issue a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let rejected = || (StatusCode::BAD_REQUEST, "유저 못찾음(!)".to_string());

    let db = state.db.clone();
    let user_name = body.user_name.clone();
    let number = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "DB lock".to_string()))?;
        find_member_number(&conn, &user_name).map_err(|e| {
            tracing::error!(error = %e, "Member lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "database error".to_string())
        })
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Task join: {}", e)))??;

    let Some(number) = number else {
        tracing::info!(user = %body.user_name, "Login rejected: unknown member");
        return Err(rejected());
    };

    if !answers_match(&state.auth.answers, &body.answers()) {
        tracing::info!(user = %body.user_name, "Login rejected: wrong answers");
        return Err(rejected());
    }

    let access_token = jwt::issue_access_token(
        &state.jwt_secret,
        &body.user_name,
        number,
        state.auth.token_ttl_hours,
    )
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to sign access token");
        (StatusCode::INTERNAL_SERVER_ERROR, "token signing failed".to_string())
    })?;

    tracing::info!(user = %body.user_name, number, "Login succeeded");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

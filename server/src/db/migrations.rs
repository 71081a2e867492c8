use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking, no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: Members, gallery and statuses

CREATE TABLE users (
    number INTEGER PRIMARY KEY CHECK (number BETWEEN 0 AND 21),
    user_name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE projects (
    id TEXT PRIMARY KEY,
    week INTEGER NOT NULL,
    project_name TEXT NOT NULL,
    thumbnail TEXT NOT NULL,
    url TEXT,
    teammates TEXT NOT NULL DEFAULT '[]',
    introduction TEXT NOT NULL
);

CREATE INDEX idx_projects_week ON projects(week);
CREATE UNIQUE INDEX idx_projects_week_name ON projects(week, project_name);

CREATE TABLE statuses (
    id TEXT PRIMARY KEY,
    user_num INTEGER NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (user_num) REFERENCES users(number) ON DELETE CASCADE
);

CREATE INDEX idx_statuses_user ON statuses(user_num);
",
        ),
        M::up(
            "-- Migration 2: Chat room history

CREATE TABLE chat_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_name TEXT NOT NULL,
    message TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
",
        ),
    ])
}

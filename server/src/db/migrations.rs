use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: Initial schema

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    firstname TEXT NOT NULL,
    lastname TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    registration_date TEXT NOT NULL
);

CREATE TABLE activities (
    id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    sport TEXT NOT NULL,
    address TEXT NOT NULL,
    npa INTEGER NOT NULL,
    locality TEXT NOT NULL,
    players INTEGER NOT NULL,
    datetime TEXT NOT NULL,
    kind TEXT NOT NULL,
    creator TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    FOREIGN KEY (creator) REFERENCES users(id)
);

CREATE INDEX idx_activities_sport ON activities(sport);

CREATE TABLE activity_users (
    id TEXT PRIMARY KEY,
    activity_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    inscription TEXT NOT NULL,
    UNIQUE (activity_id, user_id),
    FOREIGN KEY (activity_id) REFERENCES activities(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX idx_activity_users_user ON activity_users(user_id);

CREATE TABLE conversations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    activity_id TEXT NOT NULL UNIQUE,
    FOREIGN KEY (activity_id) REFERENCES activities(id) ON DELETE CASCADE
);

CREATE TABLE conversation_users (
    conversation_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    PRIMARY KEY (conversation_id, user_id),
    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE comments (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    creator TEXT NOT NULL,
    activity_id TEXT NOT NULL,
    date TEXT NOT NULL,
    FOREIGN KEY (creator) REFERENCES users(id),
    FOREIGN KEY (activity_id) REFERENCES activities(id) ON DELETE CASCADE
);

CREATE INDEX idx_comments_activity ON comments(activity_id);

CREATE TABLE pictures (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    creator TEXT NOT NULL,
    activity_id TEXT NOT NULL,
    mimetype TEXT NOT NULL,
    size INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (creator) REFERENCES users(id),
    FOREIGN KEY (activity_id) REFERENCES activities(id) ON DELETE CASCADE
);

CREATE INDEX idx_pictures_activity ON pictures(activity_id);
CREATE INDEX idx_pictures_creator ON pictures(creator);
",
    )])
}

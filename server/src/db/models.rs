//! Database row types for all tables, plus the shared lookup helpers the
//! realtime core reads through (user by id, conversation by activity,
//! participant sets). These correspond 1:1 to the schema in migrations.rs.

use rusqlite::Connection;

/// Role value that unlocks the admin-only conversation operations.
pub const ROLE_ADMIN: &str = "admin";

/// User record in the users table
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub password_hash: String,
    pub role: String,
    pub registration_date: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// Display name used as the sender username in notification payloads.
    pub fn username(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// Activity record. Coordinates are optional — they are client-supplied.
#[derive(Debug, Clone)]
pub struct Activity {
    pub id: String,
    pub description: String,
    pub sport: String,
    pub address: String,
    pub npa: i64,
    pub locality: String,
    pub players: i64,
    pub datetime: String,
    pub kind: String,
    pub creator: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Enrollment of one user in one activity
#[derive(Debug, Clone)]
pub struct ActivityUser {
    pub id: String,
    pub activity_id: String,
    pub user_id: String,
    pub inscription: String,
}

/// Per-activity conversation. At most one per activity.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub activity_id: String,
}

/// Comment in an activity's conversation
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub creator: String,
    pub activity_id: String,
    pub date: String,
}

/// Picture metadata attached to an activity. No file bytes are stored.
#[derive(Debug, Clone)]
pub struct Picture {
    pub id: String,
    pub name: String,
    pub creator: String,
    pub activity_id: String,
    pub mimetype: String,
    pub size: i64,
    pub created_at: String,
}

/// Look up a user row by id. Shared by the HTTP-middleware and the
/// WebSocket-handshake authentication paths.
pub fn find_user_by_id(conn: &Connection, id: &str) -> Option<User> {
    conn.query_row(
        "SELECT id, email, firstname, lastname, password_hash, role, registration_date
         FROM users WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                firstname: row.get(2)?,
                lastname: row.get(3)?,
                password_hash: row.get(4)?,
                role: row.get(5)?,
                registration_date: row.get(6)?,
            })
        },
    )
    .ok()
}

/// The conversation attached to an activity, if one has been created.
pub fn conversation_for_activity(conn: &Connection, activity_id: &str) -> Option<Conversation> {
    conn.query_row(
        "SELECT id, name, activity_id FROM conversations WHERE activity_id = ?1",
        rusqlite::params![activity_id],
        |row| {
            Ok(Conversation {
                id: row.get(0)?,
                name: row.get(1)?,
                activity_id: row.get(2)?,
            })
        },
    )
    .ok()
}

/// Participant user ids of a conversation. The dispatcher's audience
/// computation reads this set but never mutates it.
pub fn conversation_participants(conn: &Connection, conversation_id: &str) -> Vec<String> {
    let mut stmt = match conn
        .prepare("SELECT user_id FROM conversation_users WHERE conversation_id = ?1")
    {
        Ok(stmt) => stmt,
        Err(_) => return Vec::new(),
    };
    stmt.query_map(rusqlite::params![conversation_id], |row| {
        row.get::<_, String>(0)
    })
    .map(|rows| rows.filter_map(|r| r.ok()).collect())
    .unwrap_or_default()
}

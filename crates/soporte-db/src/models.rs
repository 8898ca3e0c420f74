//! Database row types — these map directly to SQLite rows.
//! Distinct from soporte-types API models to keep the DB layer independent.

use soporte_types::AttentionStatus;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_staff: bool,
    pub created_at: String,
}

/// An attention joined with the display names of both participants.
#[derive(Debug, Clone)]
pub struct AttentionRow {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub staff_id: i64,
    pub staff_name: String,
    pub status: AttentionStatus,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub attention_id: i64,
    pub author_id: i64,
    pub body: Option<String>,
    pub attachment: Option<String>,
    pub is_staff: bool,
    pub created_at: String,
}

pub struct NewMessage<'a> {
    pub attention_id: i64,
    pub author_id: i64,
    pub body: &'a str,
    pub is_staff: bool,
}

/// Result of the find-or-create path for open attentions.
#[derive(Debug)]
pub enum EnsureOutcome {
    Existing(AttentionRow),
    Created(AttentionRow),
    /// No staff account exists to assign the new attention to.
    NoStaff,
}

#[derive(Debug, Default, Clone)]
pub struct AttentionFilter {
    /// Case-insensitive substring of the requester's name.
    pub requester_name: Option<String>,
    pub status: Option<AttentionStatus>,
}

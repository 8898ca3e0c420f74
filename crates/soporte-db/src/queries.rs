use crate::models::{AttentionFilter, AttentionRow, EnsureOutcome, MessageRow, NewMessage, UserRow};
use crate::{Database, now_timestamp};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, ErrorCode, TransactionBehavior, types::Type};
use soporte_types::AttentionStatus;
use tracing::{debug, info};

const ATTENTION_SELECT: &str = "
    SELECT a.id, a.user_id, u.name, a.staff_id, s.name, a.status, a.created_at
    FROM attentions a
    JOIN users u ON u.id = a.user_id
    JOIN users s ON s.id = a.staff_id";

const MESSAGE_SELECT: &str = "
    SELECT id, attention_id, author_id, body, attachment, is_staff, created_at
    FROM messages";

/// Chooses the staff member a newly opened attention is assigned to.
pub trait StaffSelector {
    fn select_staff(&self, conn: &Connection) -> Result<Option<i64>>;
}

/// Assigns every attention to the oldest staff account.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstStaff;

impl StaffSelector for FirstStaff {
    fn select_staff(&self, conn: &Connection) -> Result<Option<i64>> {
        conn.query_row(
            "SELECT id FROM users WHERE is_staff = 1 ORDER BY id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
    }
}

impl Database {
    // -- Users --

    /// Inserts a user. Returns `None` when the email is already registered.
    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        is_staff: bool,
    ) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (name, email, password, is_staff, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![name, email, password_hash, is_staff, now_timestamp()],
            );

            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", rusqlite::params![email]))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", rusqlite::params![id]))
    }

    // -- Attentions --

    pub fn get_attention(&self, id: i64) -> Result<Option<AttentionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{ATTENTION_SELECT} WHERE a.id = ?1"),
                [id],
                map_attention,
            )
            .optional()
        })
    }

    pub fn get_open_attention_for(&self, user_id: i64) -> Result<Option<AttentionRow>> {
        self.with_conn(|conn| query_open_attention(conn, user_id))
    }

    /// Returns the requester's open attention, creating one assigned to the
    /// selector's staff member when none exists.
    ///
    /// The lookup and insert share one immediate transaction, and the insert
    /// goes through the partial unique index on open attentions, so two
    /// concurrent callers always end up with the same row.
    pub fn ensure_open_attention<S>(&self, user_id: i64, selector: &S) -> Result<EnsureOutcome>
    where
        S: StaffSelector + ?Sized,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if let Some(existing) = query_open_attention(&tx, user_id)? {
                tx.commit()?;
                return Ok(EnsureOutcome::Existing(existing));
            }

            let Some(staff_id) = selector.select_staff(&tx)? else {
                return Ok(EnsureOutcome::NoStaff);
            };

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO attentions (user_id, staff_id, status, created_at)
                 VALUES (?1, ?2, 'abierta', ?3)",
                rusqlite::params![user_id, staff_id, now_timestamp()],
            )?;

            let attention = query_open_attention(&tx, user_id)?
                .ok_or_else(|| anyhow!("Open attention missing after insert for user {}", user_id))?;
            tx.commit()?;

            if inserted == 1 {
                info!("Attention {} opened for user {} (staff {})", attention.id, user_id, staff_id);
                Ok(EnsureOutcome::Created(attention))
            } else {
                Ok(EnsureOutcome::Existing(attention))
            }
        })
    }

    /// Marks an attention closed. Returns `false` if the id is unknown.
    /// Closing an already closed attention succeeds.
    pub fn close_attention(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE attentions SET status = 'cerrada' WHERE id = ?1",
                [id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn list_open_attentions(&self) -> Result<Vec<AttentionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ATTENTION_SELECT} WHERE a.status = 'abierta' ORDER BY a.created_at ASC, a.id ASC"
            ))?;
            let rows = stmt
                .query_map([], map_attention)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// History listing, newest first.
    pub fn list_attentions(&self, filter: &AttentionFilter) -> Result<Vec<AttentionRow>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ATTENTION_SELECT}
                 WHERE (?1 IS NULL OR a.status = ?1)
                 ORDER BY a.created_at DESC, a.id DESC"
            ))?;
            let status = filter.status.map(AttentionStatus::as_str);
            let rows = stmt
                .query_map([status], map_attention)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        // SQLite's LIKE/lower() only fold ASCII, so the name match runs here.
        let Some(needle) = filter
            .requester_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_lowercase)
        else {
            return Ok(rows);
        };

        Ok(rows
            .into_iter()
            .filter(|a| a.user_name.to_lowercase().contains(&needle))
            .collect())
    }

    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let created_at = now_timestamp();
            conn.execute(
                "INSERT INTO messages (attention_id, author_id, body, is_staff, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![msg.attention_id, msg.author_id, msg.body, msg.is_staff, created_at],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Message {} stored in attention {}", id, msg.attention_id);

            Ok(MessageRow {
                id,
                attention_id: msg.attention_id,
                author_id: msg.author_id,
                body: Some(msg.body.to_string()),
                attachment: None,
                is_staff: msg.is_staff,
                created_at,
            })
        })
    }

    /// Polling query: messages newer than `last_id`, ascending by id.
    pub fn list_messages_since(&self, attention_id: i64, last_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT} WHERE attention_id = ?1 AND id > ?2 ORDER BY id ASC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![attention_id, last_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Full history of an attention in chronological order.
    pub fn list_messages(&self, attention_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT} WHERE attention_id = ?1 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt
                .query_map([attention_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, params: impl rusqlite::Params) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, email, password, is_staff, created_at FROM users WHERE {predicate}"
    ))?;

    stmt.query_row(params, |row| {
        Ok(UserRow {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            is_staff: row.get(4)?,
            created_at: row.get(5)?,
        })
    })
    .optional()
}

fn query_open_attention(conn: &Connection, user_id: i64) -> Result<Option<AttentionRow>> {
    conn.query_row(
        &format!("{ATTENTION_SELECT} WHERE a.user_id = ?1 AND a.status = 'abierta'"),
        [user_id],
        map_attention,
    )
    .optional()
}

fn map_attention(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttentionRow> {
    let status: String = row.get(5)?;
    let status = status
        .parse::<AttentionStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(AttentionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        staff_id: row.get(3)?,
        staff_name: row.get(4)?,
        status,
        created_at: row.get(6)?,
    })
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        attention_id: row.get(1)?,
        author_id: row.get(2)?,
        body: row.get(3)?,
        attachment: row.get(4)?,
        is_staff: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

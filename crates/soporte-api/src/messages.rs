use axum::{
    Json,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
};
use tracing::{debug, warn};

use soporte_db::{AttentionRow, Database, MessageRow, NewMessage, StaffSelector};
use soporte_types::AttentionStatus;
use soporte_types::api::{MessageResponse, PollQuery, SendMessageRequest};

use crate::attention;
use crate::auth::AppState;
use crate::blocking;
use crate::error::AppError;
use crate::middleware::{RequireSession, SessionUser};

/// Longest message body accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Trims and validates message text.
pub fn validate_text(text: &str) -> Result<&str, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::EmptyMessage);
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "El mensaje supera los {} caracteres",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(text)
}

fn ensure_visible_to(attention: &AttentionRow, viewer: &SessionUser) -> Result<(), AppError> {
    if viewer.is_staff || attention.user_id == viewer.id {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

/// Step one of sending: work out which attention the message belongs to.
///
/// Without an id (or with id 0), a requester gets their open attention,
/// created on demand; staff must always name one. Only staff may still post
/// to a closed attention.
pub fn resolve_attention(
    db: &Database,
    selector: &dyn StaffSelector,
    author: &SessionUser,
    attention_id: Option<i64>,
) -> Result<AttentionRow, AppError> {
    let Some(id) = attention_id.filter(|&id| id != 0) else {
        if author.is_staff {
            return Err(AppError::Validation(
                "El encargado debe indicar la atención".to_string(),
            ));
        }
        return attention::ensure_open_attention(db, selector, author.id);
    };

    let attention = attention::get(db, id)?;
    ensure_visible_to(&attention, author)?;
    if attention.status == AttentionStatus::Closed && !author.is_staff {
        return Err(AppError::AttentionClosed);
    }
    Ok(attention)
}

/// Step two of sending: store the message under a resolved attention.
pub fn append_message(
    db: &Database,
    attention_id: i64,
    author: &SessionUser,
    text: &str,
) -> Result<MessageRow, AppError> {
    let body = validate_text(text)?;
    let row = db.insert_message(&NewMessage {
        attention_id,
        author_id: author.id,
        body,
        is_staff: author.is_staff,
    })?;
    Ok(row)
}

/// Validates, resolves the attention, then appends. Blank text is rejected
/// before anything is read or written.
pub fn send(
    db: &Database,
    selector: &dyn StaffSelector,
    author: &SessionUser,
    attention_id: Option<i64>,
    text: &str,
) -> Result<MessageResponse, AppError> {
    let text = validate_text(text)?;
    let attention = resolve_attention(db, selector, author, attention_id)?;
    let row = append_message(db, attention.id, author, text)?;
    Ok(to_response(&row))
}

/// Polling query: messages with id greater than `last_seen_id`, ascending.
pub fn list_since(
    db: &Database,
    viewer: &SessionUser,
    attention_id: i64,
    last_seen_id: i64,
) -> Result<Vec<MessageResponse>, AppError> {
    let attention = attention::get(db, attention_id)?;
    ensure_visible_to(&attention, viewer)?;

    let rows = db.list_messages_since(attention_id, last_seen_id)?;
    Ok(rows.iter().map(to_response).collect())
}

/// Full history of an attention for page renders.
pub fn list_all_for(db: &Database, attention_id: i64) -> Result<Vec<MessageResponse>, AppError> {
    let rows = db.list_messages(attention_id)?;
    Ok(rows.iter().map(to_response).collect())
}

pub fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite's own datetime('now') format, without timezone.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}

pub fn format_time(raw: &str, fmt: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts.format(fmt).to_string(),
        None => {
            warn!("Corrupt timestamp '{}'", raw);
            "--:--".to_string()
        }
    }
}

pub fn to_response(row: &MessageRow) -> MessageResponse {
    MessageResponse {
        id: row.id,
        mensaje: row.body.clone().unwrap_or_default(),
        fecha: format_time(&row.created_at, "%H:%M"),
        es_encargado: row.is_staff,
        atencion_id: row.attention_id,
    }
}

// -- Handlers --

/// POST /api/enviar-mensaje
pub async fn send_message(
    State(state): State<AppState>,
    RequireSession(author): RequireSession,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let message = blocking(&state, move |s| {
        send(&s.db, s.assignee.as_ref(), &author, req.atencion_id, &req.mensaje)
    })
    .await?;

    debug!("Message {} sent to attention {}", message.id, message.atencion_id);
    Ok(Json(message))
}

/// GET /api/obtener-mensajes/{id}?ultimo_id=N
pub async fn get_messages(
    State(state): State<AppState>,
    RequireSession(viewer): RequireSession,
    Path(attention_id): Path<i64>,
    query: Result<Query<PollQuery>, QueryRejection>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let messages = blocking(&state, move |s| {
        list_since(&s.db, &viewer, attention_id, query.last_seen_id())
    })
    .await?;

    Ok(Json(messages))
}

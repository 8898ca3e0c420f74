use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

use soporte_db::{AttentionFilter, AttentionRow, Database, EnsureOutcome, StaffSelector};
use soporte_types::AttentionStatus;
use soporte_types::api::{HistoryQuery, StatusResponse};

use crate::auth::AppState;
use crate::blocking;
use crate::error::AppError;
use crate::middleware::RequireStaff;

/// The requester's open attention, if any. Never creates one.
pub fn open_attention_for(db: &Database, user_id: i64) -> Result<Option<AttentionRow>, AppError> {
    Ok(db.get_open_attention_for(user_id)?)
}

/// Find-or-create. The only path that opens attentions.
pub fn ensure_open_attention(
    db: &Database,
    selector: &dyn StaffSelector,
    user_id: i64,
) -> Result<AttentionRow, AppError> {
    match db.ensure_open_attention(user_id, selector)? {
        EnsureOutcome::Existing(attention) | EnsureOutcome::Created(attention) => Ok(attention),
        EnsureOutcome::NoStaff => Err(AppError::NoStaffAvailable),
    }
}

pub fn get(db: &Database, attention_id: i64) -> Result<AttentionRow, AppError> {
    db.get_attention(attention_id)?.ok_or(AppError::NotFound)
}

/// Open → closed, unconditionally. Closing twice is fine.
pub fn close(db: &Database, attention_id: i64) -> Result<(), AppError> {
    if !db.close_attention(attention_id)? {
        return Err(AppError::NotFound);
    }
    info!("Attention {} closed", attention_id);
    Ok(())
}

pub fn list_open(db: &Database) -> Result<Vec<AttentionRow>, AppError> {
    Ok(db.list_open_attentions()?)
}

/// History listing. Blank filters are ignored; a status value that is not a
/// known status matches nothing.
pub fn list_all(db: &Database, query: &HistoryQuery) -> Result<Vec<AttentionRow>, AppError> {
    let nombre = query.nombre.trim();
    let estado = query.estado.trim();

    let status = if estado.is_empty() {
        None
    } else {
        match estado.parse::<AttentionStatus>() {
            Ok(status) => Some(status),
            Err(_) => return Ok(Vec::new()),
        }
    };

    let filter = AttentionFilter {
        requester_name: (!nombre.is_empty()).then(|| nombre.to_string()),
        status,
    };
    Ok(db.list_attentions(&filter)?)
}

/// POST /api/cerrar-atencion/{id}
pub async fn close_attention(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(attention_id): Path<i64>,
) -> Result<Json<StatusResponse>, AppError> {
    blocking(&state, move |s| close(&s.db, attention_id)).await?;
    info!("Staff {} closed attention {}", staff.id, attention_id);
    Ok(Json(StatusResponse::ok()))
}

//! HTML views for requesters and staff.

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use soporte_db::AttentionRow;
use soporte_types::api::{HistoryQuery, MessageResponse};

use crate::attention;
use crate::auth::AppState;
use crate::blocking;
use crate::error::AppError;
use crate::messages::{self, format_time};
use crate::middleware::{RequireStaff, RequireUser};

const CHAT_SCRIPT: &str = include_str!("../static/chat.js");

pub fn render_page<T: Template>(template: &T) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub codigo: u16,
    pub mensaje: String,
}

/// Failure on an HTML route, rendered as a page rather than JSON.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let page = render_page(&ErrorTemplate {
            codigo: status.as_u16(),
            mensaje: self.0.public_message(),
        });
        (status, page).into_response()
    }
}

/// Attention as shown in queues and history tables.
#[derive(Debug, Clone)]
pub struct AttentionView {
    pub id: i64,
    pub usuario: String,
    pub encargado: String,
    pub fecha: String,
    pub estado: &'static str,
    pub estado_label: &'static str,
}

impl From<&AttentionRow> for AttentionView {
    fn from(row: &AttentionRow) -> Self {
        Self {
            id: row.id,
            usuario: row.user_name.clone(),
            encargado: row.staff_name.clone(),
            fecha: format_time(&row.created_at, "%d/%m/%Y %H:%M"),
            estado: row.status.as_str(),
            estado_label: row.status.label(),
        }
    }
}

/// State handed to the polling script.
fn script_args(attention: Option<&AttentionRow>, mensajes: &[MessageResponse]) -> (String, i64) {
    let attention_id = attention.map_or_else(|| "null".to_string(), |a| a.id.to_string());
    let last_id = mensajes.last().map_or(0, |m| m.id);
    (attention_id, last_id)
}

#[derive(Template)]
#[template(path = "chat_usuario.html")]
pub struct UserChatTemplate {
    pub nombre: String,
    pub atencion: Option<AttentionView>,
    pub mensajes: Vec<MessageResponse>,
    pub atencion_id_js: String,
    pub ultimo_id: i64,
}

#[derive(Template)]
#[template(path = "chat_encargado.html")]
pub struct StaffChatTemplate {
    pub nombre: String,
    pub atenciones: Vec<AttentionView>,
    pub atencion_actual: Option<AttentionView>,
    pub mensajes: Vec<MessageResponse>,
    pub atencion_id_js: String,
    pub ultimo_id: i64,
}

#[derive(Template)]
#[template(path = "historial.html")]
pub struct HistoryTemplate {
    pub nombre: String,
    pub atenciones: Vec<AttentionView>,
    pub filtro_nombre: String,
    pub filtro_estado: String,
}

/// GET /chat — the requester's open attention, without creating one.
pub async fn user_chat(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, PageError> {
    let user_id = user.id;
    let (open, mensajes) = blocking(&state, move |s| {
        let open = attention::open_attention_for(&s.db, user_id)?;
        let mensajes = match &open {
            Some(a) => messages::list_all_for(&s.db, a.id)?,
            None => Vec::new(),
        };
        Ok((open, mensajes))
    })
    .await?;

    let (atencion_id_js, ultimo_id) = script_args(open.as_ref(), &mensajes);
    Ok(render_page(&UserChatTemplate {
        nombre: user.name,
        atencion: open.as_ref().map(AttentionView::from),
        mensajes,
        atencion_id_js,
        ultimo_id,
    }))
}

/// GET /panel-encargado — queue of open attentions.
pub async fn staff_panel(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
) -> Result<Html<String>, PageError> {
    let open = blocking(&state, |s| attention::list_open(&s.db)).await?;

    Ok(render_page(&StaffChatTemplate {
        nombre: staff.name,
        atenciones: open.iter().map(AttentionView::from).collect(),
        atencion_actual: None,
        mensajes: Vec::new(),
        atencion_id_js: "null".to_string(),
        ultimo_id: 0,
    }))
}

/// GET /chat-atencion/{id} — one attention next to the queue.
pub async fn staff_attention(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(attention_id): Path<i64>,
) -> Result<Html<String>, PageError> {
    let (current, mensajes, open) = blocking(&state, move |s| {
        let current = attention::get(&s.db, attention_id)?;
        let mensajes = messages::list_all_for(&s.db, attention_id)?;
        let open = attention::list_open(&s.db)?;
        Ok((current, mensajes, open))
    })
    .await?;

    let (atencion_id_js, ultimo_id) = script_args(Some(&current), &mensajes);
    Ok(render_page(&StaffChatTemplate {
        nombre: staff.name,
        atenciones: open.iter().map(AttentionView::from).collect(),
        atencion_actual: Some(AttentionView::from(&current)),
        mensajes,
        atencion_id_js,
        ultimo_id,
    }))
}

/// GET /historial?nombre=&estado=
pub async fn history(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Query(query): Query<HistoryQuery>,
) -> Result<Html<String>, PageError> {
    let filtro_nombre = query.nombre.trim().to_string();
    let filtro_estado = query.estado.trim().to_string();
    let rows = blocking(&state, move |s| attention::list_all(&s.db, &query)).await?;

    Ok(render_page(&HistoryTemplate {
        nombre: staff.name,
        atenciones: rows.iter().map(AttentionView::from).collect(),
        filtro_nombre,
        filtro_estado,
    }))
}

/// GET /static/chat.js
pub async fn chat_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        CHAT_SCRIPT,
    )
}

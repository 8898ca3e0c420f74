use axum::{
    Json, Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use soporte_types::api::StatusResponse;

use crate::auth::{self, AppState};
use crate::{attention, messages, pages};

/// Assembles every page and API route over the shared state.
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/", get(auth::index))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/registro", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout));

    let page_routes = Router::new()
        .route("/chat", get(pages::user_chat))
        .route("/panel-encargado", get(pages::staff_panel))
        .route("/chat-atencion/{id}", get(pages::staff_attention))
        .route("/historial", get(pages::history));

    let api_routes = Router::new()
        .route("/api/enviar-mensaje", post(messages::send_message))
        .route("/api/obtener-mensajes/{id}", get(messages::get_messages))
        .route("/api/cerrar-atencion/{id}", post(attention::close_attention));

    Router::new()
        .merge(auth_routes)
        .merge(page_routes)
        .merge(api_routes)
        .route("/static/chat.js", get(pages::chat_script))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

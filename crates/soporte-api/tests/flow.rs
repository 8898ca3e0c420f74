//! End-to-end tests over the assembled router.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::json;
use tower::ServiceExt;

use soporte_api::auth::ensure_staff_account;
use soporte_api::{AppState, AppStateInner, router};
use soporte_db::Database;
use soporte_types::api::{ErrorResponse, MessageResponse, StatusResponse};

const STAFF_EMAIL: &str = "encargado@soporte.com";
const STAFF_PASSWORD: &str = "admin123";

fn app() -> (Router, AppState) {
    let db = Database::open_in_memory().unwrap();
    ensure_staff_account(&db, "Encargado de Soporte", STAFF_EMAIL, STAFF_PASSWORD).unwrap();
    let state: AppState = Arc::new(AppStateInner::new(db, "test-secret", chrono::Duration::hours(1)));
    (router(state.clone()), state)
}

async fn call(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// `name=value` of the session cookie set by a response, if any.
fn session_cookie(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("soporte_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn text(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json<T: DeserializeOwned>(resp: Response<Body>) -> T {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, email: &str, password: &str) -> (String, String) {
    let resp = call(app, post_form("/login", &format!("email={email}&contrasena={password}"))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&resp).expect("login sets a session cookie");
    (cookie, location(&resp).to_string())
}

async fn register_and_login(app: &Router, name: &str, email: &str) -> String {
    let resp = call(app, post_form("/registro", &format!("nombre={name}&email={email}&contrasena=secreto"))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
    assert!(session_cookie(&resp).is_none(), "registration does not log in");

    let (cookie, home) = login(app, email, "secreto").await;
    assert_eq!(home, "/chat");
    cookie
}

#[tokio::test]
async fn full_support_conversation() {
    let (app, _) = app();
    let ana = register_and_login(&app, "Ana", "ana@example.com").await;

    // Empty chat page creates nothing.
    let page = call(&app, get("/chat", Some(&ana))).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(text(page).await.contains("Nueva consulta"));

    let resp = call(&app, post_json("/api/enviar-mensaje", r#"{"mensaje":"hola"}"#, Some(&ana))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let sent: MessageResponse = json(resp).await;
    assert_eq!(sent.id, 1);
    assert_eq!(sent.mensaje, "hola");
    assert!(!sent.es_encargado);
    let attention_id = sent.atencion_id;

    let resp = call(&app, get(&format!("/api/obtener-mensajes/{attention_id}?ultimo_id=0"), Some(&ana))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let polled: Vec<MessageResponse> = json(resp).await;
    assert_eq!(polled, vec![sent.clone()]);

    let resp = call(&app, get(&format!("/api/obtener-mensajes/{attention_id}?ultimo_id=1"), Some(&ana))).await;
    let polled: Vec<MessageResponse> = json(resp).await;
    assert!(polled.is_empty());

    // Staff sees the attention, replies, and closes it.
    let (staff, home) = login(&app, STAFF_EMAIL, STAFF_PASSWORD).await;
    assert_eq!(home, "/panel-encargado");

    let panel = text(call(&app, get("/panel-encargado", Some(&staff))).await).await;
    assert!(panel.contains(&format!("/chat-atencion/{attention_id}")));

    let body = json!({ "atencion_id": attention_id, "mensaje": "¿En qué puedo ayudarte?" }).to_string();
    let reply: MessageResponse = json(call(&app, post_json("/api/enviar-mensaje", &body, Some(&staff))).await).await;
    assert!(reply.es_encargado);
    assert_eq!(reply.atencion_id, attention_id);

    let resp = call(&app, get(&format!("/api/obtener-mensajes/{attention_id}?ultimo_id={}", sent.id), Some(&ana))).await;
    let polled: Vec<MessageResponse> = json(resp).await;
    assert_eq!(polled, vec![reply]);

    let resp = call(&app, post_json(&format!("/api/cerrar-atencion/{attention_id}"), "", Some(&staff))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let status: StatusResponse = json(resp).await;
    assert_eq!(status.status, "ok");

    let link = format!("href=\"/chat-atencion/{attention_id}\"");
    let closed = text(call(&app, get("/historial?estado=cerrada", Some(&staff))).await).await;
    assert!(closed.contains(&link));
    let open = text(call(&app, get("/historial?estado=abierta", Some(&staff))).await).await;
    assert!(!open.contains(&link));
    let by_name = text(call(&app, get("/historial?nombre=AN&estado=", Some(&staff))).await).await;
    assert!(by_name.contains(&link));

    // Staff may still leave a closing remark.
    let body = json!({ "atencion_id": attention_id, "mensaje": "Caso cerrado" }).to_string();
    let resp = call(&app, post_json("/api/enviar-mensaje", &body, Some(&staff))).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // The requester can't; a new attention is opened instead.
    let body = json!({ "atencion_id": attention_id, "mensaje": "una cosa más" }).to_string();
    let resp = call(&app, post_json("/api/enviar-mensaje", &body, Some(&ana))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = call(&app, post_json("/api/enviar-mensaje", r#"{"mensaje":"una cosa más"}"#, Some(&ana))).await;
    let fresh: MessageResponse = json(resp).await;
    assert_ne!(fresh.atencion_id, attention_id);
}

#[tokio::test]
async fn blank_or_malformed_messages_are_rejected() {
    let (app, state) = app();
    let ana = register_and_login(&app, "Ana", "ana@example.com").await;

    let resp = call(&app, post_json("/api/enviar-mensaje", r#"{"mensaje":"   "}"#, Some(&ana))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: ErrorResponse = json(resp).await;
    assert_eq!(err.error, "Mensaje vacío");

    let resp = call(&app, post_json("/api/enviar-mensaje", "{not json", Some(&ana))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = call(&app, post_json("/api/enviar-mensaje", r#"{"texto":"hola"}"#, Some(&ana))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(state.db.list_open_attentions().unwrap().is_empty());
}

#[tokio::test]
async fn blank_or_garbled_last_seen_id_polls_everything() {
    let (app, _) = app();
    let ana = register_and_login(&app, "Ana", "ana@example.com").await;

    let resp = call(&app, post_json("/api/enviar-mensaje", r#"{"atencion_id":0,"mensaje":"hola"}"#, Some(&ana))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let sent: MessageResponse = json(resp).await;

    for query in ["", "?ultimo_id=", "?ultimo_id=abc", "?ultimo_id=0"] {
        let uri = format!("/api/obtener-mensajes/{}{query}", sent.atencion_id);
        let resp = call(&app, get(&uri, Some(&ana))).await;
        assert_eq!(resp.status(), StatusCode::OK, "{query}");
        let polled: Vec<MessageResponse> = json(resp).await;
        assert_eq!(polled, vec![sent.clone()], "{query}");
    }
}

#[tokio::test]
async fn anonymous_and_wrong_role_requests() {
    let (app, _) = app();

    let resp = call(&app, get("/chat", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = call(&app, get("/", None)).await;
    assert_eq!(location(&resp), "/login");

    let resp = call(&app, post_json("/api/enviar-mensaje", r#"{"mensaje":"hola"}"#, None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err: ErrorResponse = json(resp).await;
    assert_eq!(err.error, "No autorizado");

    let resp = call(&app, get("/api/obtener-mensajes/1?ultimo_id=0", Some("soporte_session=forged"))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let ana = register_and_login(&app, "Ana", "ana@example.com").await;
    let resp = call(&app, get("/", Some(&ana))).await;
    assert_eq!(location(&resp), "/chat");

    for page in ["/panel-encargado", "/historial", "/chat-atencion/1"] {
        let resp = call(&app, get(page, Some(&ana))).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{page}");
        assert_eq!(location(&resp), "/login");
    }

    let resp = call(&app, post_json("/api/cerrar-atencion/1", "", Some(&ana))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (staff, _) = login(&app, STAFF_EMAIL, STAFF_PASSWORD).await;
    let resp = call(&app, get("/chat", Some(&staff))).await;
    assert_eq!(location(&resp), "/login");
    let resp = call(&app, get("/", Some(&staff))).await;
    assert_eq!(location(&resp), "/panel-encargado");
}

#[tokio::test]
async fn closing_unknown_or_twice() {
    let (app, _) = app();
    let ana = register_and_login(&app, "Ana", "ana@example.com").await;
    let (staff, _) = login(&app, STAFF_EMAIL, STAFF_PASSWORD).await;

    let resp = call(&app, post_json("/api/cerrar-atencion/999", "", Some(&staff))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = call(&app, get("/chat-atencion/999", Some(&staff))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"), "{content_type}");
    assert!(text(resp).await.contains("Atención no encontrada"));

    let sent: MessageResponse =
        json(call(&app, post_json("/api/enviar-mensaje", r#"{"mensaje":"hola"}"#, Some(&ana))).await).await;
    let uri = format!("/api/cerrar-atencion/{}", sent.atencion_id);
    for _ in 0..2 {
        let resp = call(&app, post_json(&uri, "", Some(&staff))).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let page = text(call(&app, get(&format!("/chat-atencion/{}", sent.atencion_id), Some(&staff))).await).await;
    assert!(page.contains("Cerrada"));
}

#[tokio::test]
async fn login_and_registration_errors() {
    let (app, _) = app();
    register_and_login(&app, "Ana", "ana@example.com").await;

    let resp = call(&app, post_form("/login", "email=ana@example.com&contrasena=incorrecta")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(session_cookie(&resp).is_none());
    assert!(text(resp).await.contains("Credenciales incorrectas"));

    let resp = call(&app, post_form("/registro", "nombre=Otra&email=ANA@example.com&contrasena=x")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(text(resp).await.contains("El email ya existe"));
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let (app, _) = app();

    let resp = call(&app, get("/logout", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let ana = register_and_login(&app, "Ana", "ana@example.com").await;
    let resp = call(&app, get("/logout", Some(&ana))).await;
    assert_eq!(location(&resp), "/login");
    let cleared = session_cookie(&resp).expect("logout overwrites the cookie");
    assert_eq!(cleared, "soporte_session=");
}

#[tokio::test]
async fn static_script_and_health() {
    let (app, _) = app();

    let resp = call(&app, get("/static/chat.js", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(text(resp).await.contains("function initChat"));

    let resp = call(&app, get("/health", None)).await;
    let status: StatusResponse = json(resp).await;
    assert_eq!(status.status, "ok");
}

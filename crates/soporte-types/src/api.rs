use serde::{Deserialize, Serialize};

// -- Session claims --

/// Claims carried by the signed session cookie. The staff flag is cached here
/// and trusted until the next login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub name: String,
    pub is_staff: bool,
    pub exp: usize,
}

// -- Auth forms --

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub nombre: String,
    pub email: String,
    pub contrasena: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub contrasena: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub atencion_id: Option<i64>,
    #[serde(default)]
    pub mensaje: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub id: i64,
    pub mensaje: String,
    /// `HH:MM`, UTC.
    pub fecha: String,
    pub es_encargado: bool,
    pub atencion_id: i64,
}

/// `?ultimo_id=` is read leniently: missing, blank or non-numeric means 0.
#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub ultimo_id: Option<String>,
}

impl PollQuery {
    pub fn last_seen_id(&self) -> i64 {
        self.ultimo_id
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }
}

// -- History --

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub estado: String,
}

// -- Generic bodies --

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok".to_string() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use soporte_types::api::ErrorResponse;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing session, or a session with the wrong role.
    #[error("No autorizado")]
    Unauthorized,

    #[error("Atención no encontrada")]
    NotFound,

    #[error("Mensaje vacío")]
    EmptyMessage,

    #[error("El email ya existe")]
    DuplicateEmail,

    #[error("Credenciales incorrectas")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    /// Closed attentions accept no further messages.
    #[error("La atención está cerrada")]
    AttentionClosed,

    #[error("No hay encargados disponibles")]
    NoStaffAvailable,

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::EmptyMessage
            | Self::DuplicateEmail
            | Self::InvalidCredentials
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AttentionClosed => StatusCode::CONFLICT,
            Self::NoStaffAvailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show a client. Storage failures are logged here.
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage(e) => {
                error!("Storage failure: {:#}", e);
                // Don't expose storage details to clients
                "Error interno".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.public_message();
        (self.status(), Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::EmptyMessage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateEmail.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AttentionClosed.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Storage(anyhow::anyhow!("disk full")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_details_stay_private() {
        let response = AppError::Storage(anyhow::anyhow!("secret path /var/db")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::EmptyMessage.to_string(), "Mensaje vacío");
    }
}

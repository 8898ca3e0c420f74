//! Session extractors.
//!
//! Every protected handler names the role it needs through its extractor. A
//! rejected page request is sent to the login form; a rejected `/api/` request
//! gets a 401 JSON body.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use soporte_types::Role;
use soporte_types::api::Claims;

use crate::auth::{AppState, SESSION_COOKIE, decode_token};
use crate::error::AppError;

/// The authenticated caller, as recorded at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: i64,
    pub name: String,
    pub is_staff: bool,
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            is_staff: claims.is_staff,
        }
    }
}

/// Pure role gate over the cached session flag; storage is not consulted.
pub fn require_role(session: Option<SessionUser>, role: Role) -> Result<SessionUser, AppError> {
    match session {
        Some(user) if role.admits(user.is_staff) => Ok(user),
        _ => Err(AppError::Unauthorized),
    }
}

fn session_from_parts(parts: &Parts, state: &AppState) -> Option<SessionUser> {
    let jar = CookieJar::from_headers(&parts.headers);
    let cookie = jar.get(SESSION_COOKIE)?;
    decode_token(&state.session_secret, cookie.value()).map(SessionUser::from)
}

pub enum AuthRejection {
    RedirectToLogin,
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::Unauthorized => AppError::Unauthorized.into_response(),
        }
    }
}

fn extract_with_role(parts: &Parts, state: &AppState, role: Role) -> Result<SessionUser, AuthRejection> {
    require_role(session_from_parts(parts, state), role).map_err(|_| {
        if parts.uri.path().starts_with("/api/") {
            AuthRejection::Unauthorized
        } else {
            AuthRejection::RedirectToLogin
        }
    })
}

/// Requires a non-staff session.
pub struct RequireUser(pub SessionUser);

/// Requires a staff session.
pub struct RequireStaff(pub SessionUser);

/// Requires any authenticated session.
pub struct RequireSession(pub SessionUser);

/// The session if there is one; never rejects.
pub struct MaybeSession(pub Option<SessionUser>);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        extract_with_role(parts, state, Role::User).map(Self)
    }
}

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        extract_with_role(parts, state, Role::Staff).map(Self)
    }
}

impl FromRequestParts<AppState> for RequireSession {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        extract_with_role(parts, state, Role::Any).map(Self)
    }
}

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(session_from_parts(parts, state)))
    }
}

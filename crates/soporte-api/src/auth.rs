use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use askama::Template;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};

use soporte_db::{Database, FirstStaff, StaffSelector, UserRow};
use soporte_types::api::{Claims, LoginForm, RegisterForm};

use crate::blocking;
use crate::error::AppError;
use crate::middleware::MaybeSession;
use crate::pages::render_page;

pub const SESSION_COOKIE: &str = "soporte_session";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub session_secret: String,
    pub session_ttl: chrono::Duration,
    /// Picks the staff member new attentions are assigned to.
    pub assignee: Box<dyn StaffSelector + Send + Sync>,
}

impl AppStateInner {
    pub fn new(db: Database, session_secret: impl Into<String>, session_ttl: chrono::Duration) -> Self {
        Self {
            db,
            session_secret: session_secret.into(),
            session_ttl,
            assignee: Box::new(FirstStaff),
        }
    }
}

// -- Credentials --

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        warn!("Stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Creates a non-staff account. Does not log the user in.
pub fn register_user(db: &Database, name: &str, email: &str, password: &str) -> Result<i64, AppError> {
    let name = name.trim();
    let email = normalize_email(email);

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Nombre, email y contraseña son obligatorios".to_string(),
        ));
    }

    if db.get_user_by_email(&email)?.is_some() {
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password(password)?;
    let id = db
        .create_user(name, &email, &password_hash, false)?
        .ok_or(AppError::DuplicateEmail)?;

    info!("Registered user {} <{}>", id, email);
    Ok(id)
}

/// Checks credentials. Unknown email and wrong password are indistinguishable.
pub fn authenticate(db: &Database, email: &str, password: &str) -> Result<UserRow, AppError> {
    let email = normalize_email(email);
    let user = db
        .get_user_by_email(&email)?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(password, &user.password) {
        warn!("Rejected login for {}", email);
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

/// Creates the configured staff account on first boot. Returns whether it was created.
pub fn ensure_staff_account(db: &Database, name: &str, email: &str, password: &str) -> anyhow::Result<bool> {
    let email = normalize_email(email);
    if db.get_user_by_email(&email)?.is_some() {
        return Ok(false);
    }

    let password_hash = hash_password(password)?;
    let created = db.create_user(name, &email, &password_hash, true)?.is_some();
    if created {
        info!("Seeded staff account <{}>", email);
    }
    Ok(created)
}

// -- Session tokens --

pub fn create_token(secret: &str, user: &UserRow, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        name: user.name.clone(),
        is_staff: user.is_staff,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn home_for(is_staff: bool) -> &'static str {
    if is_staff { "/panel-encargado" } else { "/chat" }
}

// -- Handlers --

#[derive(Template, Default)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub email: String,
}

#[derive(Template, Default)]
#[template(path = "registro.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
    pub nombre: String,
    pub email: String,
}

/// GET / — send the visitor wherever their role belongs.
pub async fn index(MaybeSession(session): MaybeSession) -> Redirect {
    match session {
        Some(user) => Redirect::to(home_for(user.is_staff)),
        None => Redirect::to("/login"),
    }
}

pub async fn login_page() -> impl IntoResponse {
    render_page(&LoginTemplate::default())
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let email = form.email.clone();
    let password = form.contrasena;
    let result = blocking(&state, move |s| Ok(authenticate(&s.db, &email, &password))).await?;

    match result {
        Ok(user) => {
            let token = create_token(&state.session_secret, &user, state.session_ttl)?;
            info!("User {} logged in (staff: {})", user.id, user.is_staff);
            Ok((jar.add(session_cookie(token)), Redirect::to(home_for(user.is_staff))).into_response())
        }
        Err(AppError::InvalidCredentials) => {
            let page = LoginTemplate {
                error: Some(AppError::InvalidCredentials.to_string()),
                email: form.email,
            };
            Ok((StatusCode::BAD_REQUEST, render_page(&page)).into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn register_page() -> impl IntoResponse {
    render_page(&RegisterTemplate::default())
}

pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let (nombre, email, contrasena) = (form.nombre.clone(), form.email.clone(), form.contrasena);
    let result =
        blocking(&state, move |s| Ok(register_user(&s.db, &nombre, &email, &contrasena))).await?;

    match result {
        Ok(_) => Ok(Redirect::to("/login").into_response()),
        Err(e @ (AppError::DuplicateEmail | AppError::Validation(_))) => {
            let page = RegisterTemplate {
                error: Some(e.to_string()),
                nombre: form.nombre,
                email: form.email,
            };
            Ok((StatusCode::BAD_REQUEST, render_page(&page)).into_response())
        }
        Err(e) => Err(e),
    }
}

/// GET /logout — always succeeds, with or without a session.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/login"))
}

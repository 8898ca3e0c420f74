use anyhow::{Context, Result};

/// Session secrets that must never reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

const DEFAULT_STAFF_PASSWORD: &str = "admin123";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub staff: StaffSeed,
}

/// Staff account created on first boot if its email is not registered.
#[derive(Debug, Clone)]
pub struct StaffSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("SOPORTE_PORT", "5000")
            .parse()
            .context("SOPORTE_PORT must be a port number")?;
        let session_ttl_hours: i64 = var("SOPORTE_SESSION_TTL_HOURS", "12")
            .parse()
            .context("SOPORTE_SESSION_TTL_HOURS must be an integer")?;
        if session_ttl_hours <= 0 {
            anyhow::bail!("SOPORTE_SESSION_TTL_HOURS must be positive");
        }

        Ok(Self {
            host: var("SOPORTE_HOST", "0.0.0.0"),
            port,
            db_path: var("SOPORTE_DB_PATH", "soporte.db"),
            session_secret: var("SOPORTE_SESSION_SECRET", PLACEHOLDER_SECRETS[0]),
            session_ttl_hours,
            staff: StaffSeed {
                name: var("SOPORTE_STAFF_NAME", "Encargado de Soporte"),
                email: var("SOPORTE_STAFF_EMAIL", "encargado@soporte.com"),
                password: var("SOPORTE_STAFF_PASSWORD", DEFAULT_STAFF_PASSWORD),
            },
        })
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        PLACEHOLDER_SECRETS.contains(&self.session_secret.as_str())
    }

    pub fn uses_default_staff_password(&self) -> bool {
        self.staff.password == DEFAULT_STAFF_PASSWORD
    }
}

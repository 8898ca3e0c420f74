use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a support attention. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttentionStatus {
    #[serde(rename = "abierta")]
    Open,
    #[serde(rename = "cerrada")]
    Closed,
}

impl AttentionStatus {
    /// Value stored in the `status` column and used in query strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "abierta",
            Self::Closed => "cerrada",
        }
    }

    /// Human label for the HTML views.
    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Abierta",
            Self::Closed => "Cerrada",
        }
    }
}

impl fmt::Display for AttentionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown attention status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for AttentionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abierta" => Ok(Self::Open),
            "cerrada" => Ok(Self::Closed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Access level a route requires from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A requester (non-staff) account.
    User,
    /// An "encargado" account.
    Staff,
    /// Any authenticated session.
    Any,
}

impl Role {
    pub fn admits(self, is_staff: bool) -> bool {
        match self {
            Self::User => !is_staff,
            Self::Staff => is_staff,
            Self::Any => true,
        }
    }
}

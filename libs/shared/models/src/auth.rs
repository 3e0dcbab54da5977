use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four profiles a person can log in as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Paciente,
    Medico,
    Auxiliar,
    Administrador,
}

/// Side of an appointment a role acts for. Assistants act for their doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Paciente => "paciente",
            Role::Medico => "medico",
            Role::Auxiliar => "auxiliar",
            Role::Administrador => "administrador",
        }
    }

    /// Supabase table holding the profiles of this role.
    pub fn profile_table(&self) -> &'static str {
        match self {
            Role::Paciente => "pacientes",
            Role::Medico => "medicos",
            Role::Auxiliar => "auxiliares",
            Role::Administrador => "administradores",
        }
    }

    pub fn party(&self) -> Option<Party> {
        match self {
            Role::Paciente => Some(Party::Patient),
            Role::Medico | Role::Auxiliar => Some(Party::Doctor),
            Role::Administrador => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paciente" => Ok(Role::Paciente),
            "medico" | "médico" => Ok(Role::Medico),
            "auxiliar" => Ok(Role::Auxiliar),
            "administrador" | "admin" => Ok(Role::Administrador),
            other => Err(format!("Unknown profile: {}", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

/// Database role PostgREST switches to for a signed-in user.
pub const AUTHENTICATED_ROLE: &str = "authenticated";

/// Claims of the session token. The token is forwarded to PostgREST as is,
/// so `role` and `aud` carry the database role and the AgendaMed profile
/// travels in `profile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
    #[serde(default)]
    pub aud: Option<String>,
    pub role: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub profile: Role,
    /// Linked doctor, present only for assistants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub doctor_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrador
    }

    /// Doctor whose agenda this user manages: the doctor themselves or the
    /// doctor an assistant is linked to.
    pub fn agenda_doctor_id(&self) -> Option<&str> {
        match self.role {
            Role::Medico => Some(self.id.as_str()),
            Role::Auxiliar => self.doctor_id.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
}

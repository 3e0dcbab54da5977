use chrono::{TimeZone, Utc};
use tracing::{info, warn};

use shared_models::auth::{Role, User};
use shared_utils::jwt::decode_claims_unverified;
use shared_utils::validation::require_fields;

use crate::api::ApiClient;
use crate::error::ClientError;

/// Who is using the client: the profile picked on the selection screen and,
/// after login, the token and the user it belongs to.
#[derive(Debug, Default, Clone)]
pub struct Session {
    profile: Option<Role>,
    token: Option<String>,
    user: Option<User>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_profile(&mut self, role: Role) {
        self.profile = Some(role);
    }

    pub fn profile(&self) -> Option<Role> {
        self.profile
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Logs in with the selected profile. Without one nothing is sent. Any
    /// previous session is dropped first, so a rejected login leaves the
    /// client logged out.
    pub async fn login(&mut self, api: &mut ApiClient, email: &str, password: &str) -> Result<&User, ClientError> {
        let profile = self.profile.ok_or(ClientError::ProfileNotSelected)?;
        self.logout(api);
        require_fields(&[("email", email), ("senha", password)])?;

        let result = api.login(email.trim(), password, profile).await?;
        api.set_token(Some(result.token.clone()));

        info!("Logged in as {} ({})", result.user.id, profile);
        self.token = Some(result.token);
        Ok(self.user.insert(result.user))
    }

    /// Rebuilds the session from a stored token. An unreadable or expired
    /// token leaves the session logged out.
    pub fn restore(&mut self, api: &mut ApiClient, token: &str) -> bool {
        let claims = match decode_claims_unverified(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("Discarding stored token: {}", e);
                self.logout(api);
                return false;
            }
        };

        let now = Utc::now().timestamp().max(0) as u64;
        if claims.exp.is_some_and(|exp| exp < now) {
            warn!("Discarding expired stored token");
            self.logout(api);
            return false;
        }

        self.profile = Some(claims.profile);
        self.user = Some(User {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.profile,
            doctor_id: claims.doctor_id,
            created_at: claims.iat.and_then(|iat| Utc.timestamp_opt(iat as i64, 0).single()),
        });
        self.token = Some(token.to_string());
        api.set_token(Some(token.to_string()));
        true
    }

    /// Drops token and user; the profile choice is kept.
    pub fn logout(&mut self, api: &mut ApiClient) {
        self.token = None;
        self.user = None;
        api.set_token(None);
    }
}

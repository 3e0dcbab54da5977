use reqwest::Method;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseApiError, SupabaseClient};
use shared_models::auth::{Role, User};
use shared_utils::jwt::issue_token;
use shared_utils::validation::{require_fields, validate_email, validate_password};

use crate::models::{
    AuthError, ForgotPasswordRequest, LoginRequest, LoginResponse, ProfileRow, ResetPasswordRequest,
};

/// Maps Supabase rejections of the caller's credentials to `on_auth`.
fn classify(err: anyhow::Error, on_auth: AuthError) -> AuthError {
    match err.downcast_ref::<SupabaseApiError>() {
        Some(api) if api.is_auth() => on_auth,
        _ => AuthError::from(err),
    }
}

pub struct AuthService {
    supabase: SupabaseClient,
    supabase_jwt_secret: String,
    jwt_ttl_hours: i64,
    reset_redirect_url: Option<String>,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            supabase_jwt_secret: config.supabase_jwt_secret.clone(),
            jwt_ttl_hours: config.jwt_ttl_hours,
            reset_redirect_url: config.password_reset_redirect_url.clone(),
        }
    }

    /// Password login for the selected profile. The credentials are checked by
    /// Supabase Auth; the profile by the presence of a row in its table.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        let role = request.profile.ok_or(AuthError::ProfileNotSelected)?;
        require_fields(&[("email", &request.email), ("senha", &request.password)])?;

        debug!("Login attempt for {} as {}", request.email, role);

        let session = self.supabase
            .sign_in_with_password(request.email.trim(), &request.password)
            .await
            .map_err(|e| classify(e, AuthError::InvalidCredentials))?;

        let profile = self.find_profile(role, &session.user.id, &session.access_token).await?;

        let doctor_id = match role {
            Role::Auxiliar => Some(profile.doctor_id.ok_or(AuthError::AssistantWithoutDoctor)?),
            _ => None,
        };

        let user = User {
            id: profile.id,
            email: profile.email.or(session.user.email),
            name: profile.name,
            role,
            doctor_id,
            created_at: None,
        };

        let token = issue_token(&user, &self.supabase_jwt_secret, self.jwt_ttl_hours)
            .map_err(AuthError::TokenIssue)?;

        info!("User {} logged in as {}", user.id, role);
        Ok(LoginResponse { token, user })
    }

    async fn find_profile(
        &self,
        role: Role,
        user_id: &str,
        access_token: &str,
    ) -> Result<ProfileRow, AuthError> {
        let path = format!("/rest/v1/{}?id=eq.{}", role.profile_table(), user_id);
        let rows: Vec<ProfileRow> = self.supabase.request(
            Method::GET,
            &path,
            Some(access_token),
            None,
        ).await?;

        rows.into_iter().next().ok_or_else(|| {
            warn!("User {} has no '{}' profile", user_id, role);
            AuthError::ProfileMismatch(role)
        })
    }

    /// Asks Supabase to e-mail a recovery link. Unknown addresses are not
    /// reported back to the caller.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<(), AuthError> {
        validate_email(&request.email)?;

        self.supabase
            .send_password_recovery(request.email.trim(), self.reset_redirect_url.as_deref())
            .await?;

        info!("Password recovery requested for {}", request.email.trim());
        Ok(())
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AuthError> {
        require_fields(&[("access_token", &request.access_token)])?;
        validate_password(&request.password, &request.confirm_password)?;

        self.supabase
            .update_password(&request.access_token, &request.password)
            .await
            .map_err(|e| classify(e, AuthError::InvalidResetToken))?;

        info!("Password reset completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_utils::test_utils::TestConfig;

    #[tokio::test]
    async fn login_without_profile_fails_before_any_request() {
        // Nothing listens on the configured URL; reaching the network would
        // surface as an upstream error instead.
        let service = AuthService::new(&TestConfig::with_supabase_url("http://127.0.0.1:9"));
        let result = service.login(LoginRequest {
            email: "ana@example.com".to_string(),
            password: "segredo".to_string(),
            profile: None,
        }).await;

        assert_matches!(result, Err(AuthError::ProfileNotSelected));
    }

    #[test]
    fn auth_rejections_are_classified() {
        let err: anyhow::Error = SupabaseApiError { status: 400, message: "Invalid login credentials".to_string() }.into();
        assert_matches!(classify(err, AuthError::InvalidCredentials), AuthError::InvalidCredentials);

        let err: anyhow::Error = SupabaseApiError { status: 500, message: "boom".to_string() }.into();
        assert_matches!(classify(err, AuthError::InvalidCredentials), AuthError::Upstream(_));
    }
}

use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};

use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Fails with 403 unless the user holds one of `allowed`.
pub fn require_role(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Perfil '{}' não tem permissão para esta operação",
            user.role
        )))
    }
}

/// The caller's id as a `Uuid`, for building database filters.
pub fn user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: "u1".to_string(),
            email: None,
            name: None,
            role,
            doctor_id: None,
            created_at: None,
        }
    }

    #[test]
    fn require_role_allows_listed_roles_only() {
        assert!(require_role(&user(Role::Medico), &[Role::Medico, Role::Auxiliar]).is_ok());
        let err = require_role(&user(Role::Paciente), &[Role::Administrador]).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn user_id_rejects_non_uuid_subjects() {
        assert!(matches!(user_id(&user(Role::Medico)), Err(AppError::Auth(_))));

        let mut valid = user(Role::Medico);
        valid.id = "6f1c1c9e-0000-4000-8000-000000000001".to_string();
        assert!(user_id(&valid).is_ok());
    }
}

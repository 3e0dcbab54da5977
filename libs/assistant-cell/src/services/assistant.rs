use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseApiError, SupabaseClient};
use shared_models::auth::{Role, User};
use shared_utils::validation::{require_fields, validate_email, validate_password};

use crate::models::{Assistant, AssistantError, CreateAssistantRequest, UpdateAssistantRequest};

pub struct AssistantService {
    supabase: SupabaseClient,
}

/// Admins manage every assistant; a doctor only the ones linked to them.
pub fn can_manage(user: &User, assistant: &Assistant) -> bool {
    match user.role {
        Role::Administrador => true,
        Role::Medico => assistant.doctor_id.to_string() == user.id,
        _ => false,
    }
}

fn id_list(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

impl AssistantService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Assistant, AssistantError> {
        require_fields(&[("name", &request.name), ("email", &request.email)])?;
        validate_email(&request.email)?;
        validate_password(&request.password, &request.confirm_password)?;

        let email = request.email.trim().to_lowercase();
        debug!("Creating assistant {} for doctor {}", email, doctor_id);

        let auth_user = self.supabase.sign_up(&email, &request.password).await.map_err(|e| {
            match e.downcast_ref::<SupabaseApiError>() {
                Some(api) if api.is_conflict() => AssistantError::EmailAlreadyExists { email: email.clone() },
                _ => AssistantError::DatabaseError(e.to_string()),
            }
        })?;

        let now = Utc::now().to_rfc3339();
        let data = json!({
            "id": auth_user.id,
            "name": request.name.trim(),
            "email": email,
            "phone": request.phone,
            "doctor_id": doctor_id,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Assistant> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/auxiliares",
            Some(auth_token),
            Some(data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let assistant = result.into_iter().next()
            .ok_or_else(|| AssistantError::DatabaseError("Failed to create assistant profile".to_string()))?;

        info!("Assistant {} linked to doctor {}", assistant.id, doctor_id);
        Ok(assistant)
    }

    pub async fn get_assistant(
        &self,
        assistant_id: Uuid,
        auth_token: &str,
    ) -> Result<Assistant, AssistantError> {
        let path = format!("/rest/v1/auxiliares?id=eq.{}", assistant_id);
        let result: Vec<Assistant> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(AssistantError::NotFound)
    }

    /// Assistants of one doctor, or everyone's when `doctor_id` is `None`.
    pub async fn list_assistants(
        &self,
        doctor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Assistant>, AssistantError> {
        let path = match doctor_id {
            Some(id) => format!("/rest/v1/auxiliares?doctor_id=eq.{}&order=name.asc", id),
            None => "/rest/v1/auxiliares?order=name.asc".to_string(),
        };

        let assistants: Vec<Assistant> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        debug!("Found {} assistants", assistants.len());
        Ok(assistants)
    }

    pub async fn update_assistant(
        &self,
        assistant_id: Uuid,
        request: UpdateAssistantRequest,
        auth_token: &str,
    ) -> Result<Assistant, AssistantError> {
        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            require_fields(&[("name", &name)])?;
            update_data.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/auxiliares?id=eq.{}", assistant_id);
        let result: Vec<Assistant> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        result.into_iter().next().ok_or(AssistantError::NotFound)
    }

    /// Deletes the given profiles. With `doctor_id`, rows linked to other
    /// doctors are left untouched. Returns the deleted rows.
    pub async fn delete_assistants(
        &self,
        ids: &[Uuid],
        doctor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Assistant>, AssistantError> {
        if ids.is_empty() {
            return Err(AssistantError::EmptySelection);
        }

        let mut path = format!("/rest/v1/auxiliares?id=in.({})", id_list(ids));
        if let Some(doctor_id) = doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }

        let deleted: Vec<Assistant> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        info!("Deleted {} of {} requested assistant(s)", deleted.len(), ids.len());
        Ok(deleted)
    }
}

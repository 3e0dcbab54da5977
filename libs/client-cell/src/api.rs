use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, BookAppointmentRequest, RescheduleProposal, UpdateAppointmentRequest,
};
use appointment_cell::services::actions::ActionKind;
use shared_models::auth::{Role, User};

use crate::error::ClientError;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResult {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
struct AppointmentList {
    appointments: Vec<Appointment>,
}

/// HTTP wrapper around the AgendaMed API, carrying the session token.
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.auth_token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string));
        warn!("{} answered {}: {:?}", url, status, message);

        Err(ClientError::Api { status: status.as_u16(), message })
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, ClientError>
    where T: DeserializeOwned {
        let response = self.send(method, path, body).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn login(&self, email: &str, password: &str, profile: Role) -> Result<LoginResult, ClientError> {
        self.request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": email, "password": password, "profile": profile })),
        ).await
    }

    pub async fn list_appointments(&self) -> Result<Vec<Appointment>, ClientError> {
        let list: AppointmentList = self.request(Method::GET, "/consultas", None).await?;
        Ok(list.appointments)
    }

    pub async fn book_appointment(&self, request: &BookAppointmentRequest) -> Result<Appointment, ClientError> {
        let body = serde_json::to_value(request).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.request(Method::POST, "/consultas", Some(body)).await
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: &UpdateAppointmentRequest,
    ) -> Result<Appointment, ClientError> {
        let body = serde_json::to_value(request).map_err(|e| ClientError::Decode(e.to_string()))?;
        let path = format!("/consultas/{}", appointment_id);
        self.request(Method::PUT, &path, Some(body)).await
    }

    /// One POST to the action's endpoint. Rescheduling carries the proposal.
    pub async fn perform_action(
        &self,
        appointment_id: Uuid,
        kind: ActionKind,
        proposal: Option<RescheduleProposal>,
    ) -> Result<Appointment, ClientError> {
        let body = match (kind, proposal) {
            (ActionKind::Reschedule, Some(p)) => Some(json!({ "date": p.date, "time": p.time })),
            (ActionKind::Reschedule, None) => {
                return Err(ClientError::Validation("Informe a nova data e horário".to_string()));
            }
            _ => None,
        };

        let path = format!("/consultas/{}/{}", appointment_id, kind.endpoint());
        self.request(Method::POST, &path, body).await
    }
}

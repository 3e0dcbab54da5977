use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Error returned by Supabase itself (as opposed to transport failures).
/// Services can `downcast_ref` an `anyhow::Error` to this to branch on status.
#[derive(Debug, Error)]
#[error("Supabase API error ({status}): {message}")]
pub struct SupabaseApiError {
    pub status: u16,
    pub message: String,
}

impl SupabaseApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self.status, 400 | 401 | 403)
    }

    pub fn is_conflict(&self) -> bool {
        self.status == 409 || self.status == 422
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    /// Service-role clients authenticate every call with their own key.
    service_role: bool,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key: config.supabase_anon_key.clone(),
            service_role: false,
        }
    }

    /// Client for background jobs that run without a user token.
    pub fn with_service_role(config: &AppConfig) -> Option<Self> {
        config.supabase_service_role_key.as_ref().map(|key| Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key: key.clone(),
            service_role: true,
        })
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = match auth_token {
            Some(token) => Some(token),
            None if self.service_role => Some(self.api_key.as_str()),
            None => None,
        };

        if let Some(token) = bearer {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    /// Headers asking PostgREST to echo the written rows back.
    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let text = self.send(method, path, auth_token, body, extra_headers).await?;

        // PostgREST answers writes without `Prefer` with an empty body.
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        let data = serde_json::from_str::<T>(text)
            .map_err(|e| anyhow!("Failed to decode response from {}: {}", path, e))?;
        Ok(data)
    }

    /// Request whose response body is irrelevant.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<()> {
        self.send(method, path, auth_token, body, None).await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!("API error ({}): {}", status, text);
            return Err(SupabaseApiError {
                status: status.as_u16(),
                message: extract_error_message(&text),
            }.into());
        }

        Ok(text)
    }

    /// Password grant against Supabase Auth.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(json!({ "email": email, "password": password })),
        ).await
    }

    /// Registers credentials and returns the new auth user.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser> {
        let response: Value = self.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({ "email": email, "password": password })),
        ).await?;

        // Depending on email confirmation settings the user is either the
        // body itself or nested under `user`.
        let user = response.get("user").cloned().unwrap_or(response);
        Ok(serde_json::from_value(user)?)
    }

    pub async fn send_password_recovery(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        let path = match redirect_to {
            Some(url) => format!("/auth/v1/recover?redirect_to={}", urlencoding::encode(url)),
            None => "/auth/v1/recover".to_string(),
        };
        self.execute(Method::POST, &path, None, Some(json!({ "email": email }))).await
    }

    /// Sets a new password for the user owning `access_token` (a recovery token).
    pub async fn update_password(&self, access_token: &str, password: &str) -> Result<()> {
        self.execute(
            Method::PUT,
            "/auth/v1/user",
            Some(access_token),
            Some(json!({ "password": password })),
        ).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_structured_fields() {
        assert_eq!(extract_error_message(r#"{"msg":"Invalid login credentials"}"#), "Invalid login credentials");
        assert_eq!(extract_error_message(r#"{"message":"duplicate key"}"#), "duplicate key");
        assert_eq!(extract_error_message("plain failure"), "plain failure");
    }
}

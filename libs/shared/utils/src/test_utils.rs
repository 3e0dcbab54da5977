use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

pub struct TestConfig {
    pub supabase_jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: None,
            supabase_jwt_secret: self.supabase_jwt_secret.clone(),
            jwt_ttl_hours: 24,
            server_port: 3000,
            clinic_utc_offset_minutes: -180,
            inactivation_window_business_days: 5,
            maintenance_interval_secs: 0,
            password_reset_redirect_url: None,
        }
    }

    /// Config pointing at a mock Supabase server.
    pub fn with_supabase_url(url: &str) -> AppConfig {
        let mut config = Self::default().to_app_config();
        config.supabase_url = url.to_string();
        config
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub doctor_id: Option<String>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", Role::Paciente)
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: "Test User".to_string(),
            role,
            doctor_id: None,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Medico)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Paciente)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Administrador)
    }

    pub fn assistant(email: &str, doctor_id: &str) -> Self {
        let mut user = Self::new(email, Role::Auxiliar);
        user.doctor_id = Some(doctor_id.to_string());
        user
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            name: Some(self.name.clone()),
            role: self.role,
            doctor_id: self.doctor_id.clone(),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let mut payload = json!({
            "sub": user.id,
            "email": user.email,
            "name": user.name,
            "aud": "authenticated",
            "role": "authenticated",
            "profile": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });
        if let Some(doctor_id) = &user.doctor_id {
            payload["doctor_id"] = json!(doctor_id);
        }

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn auth_session_response(user_id: &str, email: &str) -> serde_json::Value {
        json!({
            "access_token": "supabase-access-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {
                "id": user_id,
                "email": email
            }
        })
    }

    pub fn doctor_response(doctor_id: &str, email: &str, name: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "name": name,
            "email": email,
            "crm": "CRM/SP 123456",
            "specialty": "Clínica Geral",
            "phone": "(11) 99999-0000",
            "active": true,
            "inactivation_requested_at": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_response(patient_id: &str, email: &str, name: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "name": name,
            "email": email,
            "cpf": "123.456.789-00",
            "phone": "(11) 98888-0000",
            "birth_date": "1990-01-01",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn assistant_response(assistant_id: &str, doctor_id: &str, email: &str) -> serde_json::Value {
        json!({
            "id": assistant_id,
            "name": "Test Assistant",
            "email": email,
            "phone": null,
            "doctor_id": doctor_id,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn working_hours_response(doctor_id: &str, weekday: u8, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "weekday": weekday,
            "start": start,
            "end": end
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        status: &str,
        date: &str,
        time: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "patient_name": "Test Patient",
            "doctor_id": doctor_id,
            "doctor_name": "Dr. Test",
            "date": date,
            "time": time,
            "duration_minutes": 30,
            "status": status,
            "proposed_date": null,
            "proposed_time": null,
            "notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str) -> serde_json::Value {
        json!({
            "message": message
        })
    }
}

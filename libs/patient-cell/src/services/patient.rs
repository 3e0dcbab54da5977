use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseApiError, SupabaseClient};
use shared_utils::filter::Filter;
use shared_utils::validation::{require_fields, validate_email, validate_password};

use crate::models::{Patient, CreatePatientRequest, UpdatePatientRequest, PatientError};

pub struct PatientService {
    supabase: SupabaseClient,
    /// Present when a service-role key is configured; used to store the
    /// profile of a user who has no session yet.
    service: Option<SupabaseClient>,
}

fn check_birth_date(birth_date: Option<NaiveDate>) -> Result<(), PatientError> {
    match birth_date {
        Some(date) if date > Utc::now().date_naive() => Err(PatientError::InvalidBirthDate),
        _ => Ok(()),
    }
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service: SupabaseClient::with_service_role(config),
        }
    }

    /// Self-registration: creates the auth user, then the profile row with
    /// the same id.
    pub async fn register_patient(
        &self,
        request: CreatePatientRequest,
    ) -> Result<Patient, PatientError> {
        require_fields(&[("name", &request.name), ("email", &request.email)])?;
        validate_email(&request.email)?;
        validate_password(&request.password, &request.confirm_password)?;
        check_birth_date(request.birth_date)?;

        let email = request.email.trim().to_lowercase();
        debug!("Registering patient {}", email);

        let auth_user = self.supabase.sign_up(&email, &request.password).await.map_err(|e| {
            match e.downcast_ref::<SupabaseApiError>() {
                Some(api) if api.is_conflict() => PatientError::EmailAlreadyExists { email: email.clone() },
                _ => PatientError::DatabaseError(e.to_string()),
            }
        })?;

        let now = Utc::now().to_rfc3339();
        let patient_data = json!({
            "id": auth_user.id,
            "name": request.name.trim(),
            "email": email,
            "cpf": request.cpf,
            "phone": request.phone,
            "birth_date": request.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Patient> = match &self.service {
            Some(service) => service.request_with_headers(
                Method::POST,
                "/rest/v1/pacientes",
                None,
                Some(patient_data),
                Some(SupabaseClient::representation_headers()),
            ).await?,
            None => {
                let session = self.supabase.sign_in_with_password(&email, &request.password).await?;
                self.supabase.request_with_headers(
                    Method::POST,
                    "/rest/v1/pacientes",
                    Some(&session.access_token),
                    Some(patient_data),
                    Some(SupabaseClient::representation_headers()),
                ).await?
            }
        };

        let patient = result.into_iter().next()
            .ok_or_else(|| PatientError::DatabaseError("Failed to create patient profile".to_string()))?;

        info!("Patient registered with ID: {}", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/pacientes?id=eq.{}", patient_id);
        let result: Vec<Patient> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(PatientError::NotFound)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient profile: {}", patient_id);
        check_birth_date(request.birth_date)?;

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            require_fields(&[("name", &name)])?;
            update_data.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(cpf) = request.cpf {
            update_data.insert("cpf".to_string(), json!(cpf));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(birth_date) = request.birth_date {
            update_data.insert("birth_date".to_string(), json!(birth_date.format("%Y-%m-%d").to_string()));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/pacientes?id=eq.{}", patient_id);
        let result: Vec<Patient> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        result.into_iter().next().ok_or(PatientError::NotFound)
    }

    pub async fn list_patients(
        &self,
        filter: Option<&Filter>,
        limit: Option<i32>,
        offset: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        let mut query_parts = vec!["order=name.asc".to_string()];

        if let Some(filter) = filter {
            query_parts.push(filter.to_postgrest());
        }
        if let Some(limit) = limit {
            query_parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = offset {
            query_parts.push(format!("offset={}", offset));
        }

        let path = format!("/rest/v1/pacientes?{}", query_parts.join("&"));
        let patients: Vec<Patient> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        debug!("Found {} patients", patients.len());
        Ok(patients)
    }
}

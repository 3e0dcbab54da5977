use std::collections::BTreeSet;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseApiError, SupabaseClient};
use shared_utils::filter::Filter;
use shared_utils::validation::{require_fields, validate_email, validate_password};

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, DoctorPatient, UpdateDoctorRequest,
};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Registers the credentials with Supabase Auth, then stores the profile
    /// under the auth user's id.
    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        require_fields(&[
            ("name", &request.name),
            ("email", &request.email),
            ("crm", &request.crm),
            ("specialty", &request.specialty),
        ]).map_err(|e| DoctorError::ValidationError(e.message().to_string()))?;
        validate_email(&request.email).map_err(|e| DoctorError::ValidationError(e.message().to_string()))?;
        validate_password(&request.password, &request.confirm_password)
            .map_err(|e| DoctorError::ValidationError(e.message().to_string()))?;

        let email = request.email.trim().to_lowercase();
        debug!("Creating doctor profile for {}", email);

        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &format!("/rest/v1/medicos?email=eq.{}&select=id", urlencoding::encode(&email)),
            Some(auth_token),
            None,
        ).await?;
        if !existing.is_empty() {
            return Err(DoctorError::EmailAlreadyExists { email });
        }

        let auth_user = self.supabase.sign_up(&email, &request.password).await.map_err(|e| {
            match e.downcast_ref::<SupabaseApiError>() {
                Some(api) if api.is_conflict() => DoctorError::EmailAlreadyExists { email: email.clone() },
                _ => DoctorError::DatabaseError(e.to_string()),
            }
        })?;

        let now = Utc::now().to_rfc3339();
        let doctor_data = json!({
            "id": auth_user.id,
            "name": request.name.trim(),
            "email": email,
            "crm": request.crm.trim(),
            "specialty": request.specialty.trim(),
            "phone": request.phone,
            "active": true,
            "inactivation_requested_at": null,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Doctor> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/medicos",
            Some(auth_token),
            Some(doctor_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let doctor = result.into_iter().next()
            .ok_or_else(|| DoctorError::DatabaseError("Failed to create doctor profile".to_string()))?;

        info!("Doctor profile created with ID: {}", doctor.id);
        Ok(doctor)
    }

    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/medicos?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }

    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(DoctorError::ValidationError("O campo 'name' é obrigatório".to_string()));
            }
            update_data.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(crm) = request.crm {
            update_data.insert("crm".to_string(), json!(crm.trim()));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty.trim()));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/medicos?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }

    /// Lists doctors ordered by name. Only active doctors unless `include_inactive`.
    pub async fn list_doctors(
        &self,
        filter: Option<&Filter>,
        include_inactive: bool,
        limit: Option<i32>,
        offset: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let mut query_parts = vec!["order=name.asc".to_string()];

        if !include_inactive {
            query_parts.push("active=eq.true".to_string());
        }
        if let Some(filter) = filter {
            query_parts.push(filter.to_postgrest());
        }
        if let Some(limit) = limit {
            query_parts.push(format!("limit={}", limit));
        }
        if let Some(offset) = offset {
            query_parts.push(format!("offset={}", offset));
        }

        let path = format!("/rest/v1/medicos?{}", query_parts.join("&"));
        let doctors: Vec<Doctor> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        debug!("Found {} doctors", doctors.len());
        Ok(doctors)
    }

    /// Patients with at least one appointment with this doctor.
    pub async fn list_doctor_patients(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<DoctorPatient>, DoctorError> {
        let path = format!("/rest/v1/consultas?doctor_id=eq.{}&select=patient_id", doctor_id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let ids: BTreeSet<&str> = rows.iter()
            .filter_map(|row| row.get("patient_id").and_then(Value::as_str))
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids.into_iter().collect::<Vec<_>>().join(",");
        let path = format!(
            "/rest/v1/pacientes?id=in.({})&select=id,name,email,phone&order=name.asc",
            id_list
        );
        let patients: Vec<DoctorPatient> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        if patients.is_empty() {
            warn!("Doctor {} has appointments but no readable patient profiles", doctor_id);
        }

        Ok(patients)
    }
}

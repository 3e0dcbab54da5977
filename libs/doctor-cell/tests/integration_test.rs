use std::sync::Arc;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use serde_json::{json, Value};
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use doctor_cell::router::doctor_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};

fn create_test_app(config: AppConfig) -> Router {
    doctor_routes(Arc::new(config))
}

fn token_for(user: &TestUser, config: &AppConfig) -> String {
    JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, Some(24))
}

const PREVIOUS_HOURS_ID: &str = "7a2d2d9e-0000-4000-8000-0000000000a1";

/// The schedule stored before a replace: Monday 08:00-12:00.
async fn mount_previous_hours(mock_server: &MockServer, doctor_id: &str) {
    let mut row = MockSupabaseResponses::working_hours_response(doctor_id, 1, "08:00:00", "12:00:00");
    row["id"] = json!(PREVIOUS_HOURS_ID);
    Mock::given(method("GET"))
        .and(path("/rest/v1/horarios"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(mock_server)
        .await;
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, json)
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_list_doctors_requires_token() {
    let app = create_test_app(TestConfig::default().to_app_config());

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_patient_lists_only_active_doctors() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let user = TestUser::patient("paciente@example.com");
    let token = token_for(&user, &config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/medicos"))
        .and(query_param("active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response("6f1c1c9e-0000-4000-8000-000000000001", "ana@clinica.com", "Dra. Ana"),
            MockSupabaseResponses::doctor_response("6f1c1c9e-0000-4000-8000-000000000002", "bruno@clinica.com", "Dr. Bruno")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let (status, body) = send(app, authed("GET", "/", &token, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["doctors"][0]["status"]["state"], "active");
    assert_eq!(body["doctors"][1]["name"], "Dr. Bruno");
}

#[tokio::test]
async fn test_list_doctors_rejects_unknown_filter_field() {
    let config = TestConfig::default().to_app_config();
    let user = TestUser::admin("admin@example.com");
    let token = token_for(&user, &config);

    let app = create_test_app(config);
    let uri = format!("/?filter={}", urlencoding::encode("password eq 'x'"));
    let (status, body) = send(app, authed("GET", &uri, &token, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn test_create_doctor_requires_admin() {
    let config = TestConfig::default().to_app_config();
    let user = TestUser::patient("paciente@example.com");
    let token = token_for(&user, &config);

    let app = create_test_app(config);
    let body = json!({
        "name": "Dra. Ana",
        "email": "ana@clinica.com",
        "password": "segredo",
        "confirm_password": "segredo",
        "crm": "CRM/SP 1",
        "specialty": "Cardiologia",
        "phone": null
    });
    let (status, _) = send(app, authed("POST", "/", &token, Some(body))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_creates_doctor() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = token_for(&admin, &config);
    let new_id = "6f1c1c9e-0000-4000-8000-0000000000aa";

    Mock::given(method("GET"))
        .and(path("/rest/v1/medicos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": new_id,
            "email": "ana@clinica.com"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/medicos"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::doctor_response(new_id, "ana@clinica.com", "Dra. Ana")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let body = json!({
        "name": "Dra. Ana",
        "email": "Ana@Clinica.com",
        "password": "segredo",
        "confirm_password": "segredo",
        "crm": "CRM/SP 1",
        "specialty": "Cardiologia",
        "phone": null
    });
    let (status, body) = send(app, authed("POST", "/", &token, Some(body))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], new_id);
    assert_eq!(body["status"]["state"], "active");
}

#[tokio::test]
async fn test_create_doctor_rejects_mismatched_passwords() {
    let config = TestConfig::default().to_app_config();
    let admin = TestUser::admin("admin@example.com");
    let token = token_for(&admin, &config);

    let app = create_test_app(config);
    let body = json!({
        "name": "Dra. Ana",
        "email": "ana@clinica.com",
        "password": "segredo",
        "confirm_password": "outro-segredo",
        "crm": "CRM/SP 1",
        "specialty": "Cardiologia",
        "phone": null
    });
    let (status, body) = send(app, authed("POST", "/", &token, Some(body))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "As senhas não coincidem");
}

#[tokio::test]
async fn test_overlapping_working_hours_are_rejected_before_any_write() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("medico@example.com");
    let token = token_for(&doctor, &config);

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/horarios"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let body = json!([
        { "weekday": 1, "start": "08:00:00", "end": "12:00:00" },
        { "weekday": 1, "start": "11:00:00", "end": "13:00:00" }
    ]);
    let uri = format!("/{}/horarios", doctor.id);
    let (status, body) = send(app, authed("PUT", &uri, &token, Some(body))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("sobrepostos"));
}

#[tokio::test]
async fn test_assistant_replaces_linked_doctor_hours() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor_id = "6f1c1c9e-0000-4000-8000-000000000001";
    let assistant = TestUser::assistant("aux@example.com", doctor_id);
    let token = token_for(&assistant, &config);

    mount_previous_hours(&mock_server, doctor_id).await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/horarios"))
        .and(query_param("id", format!("in.({})", PREVIOUS_HOURS_ID)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/horarios"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::working_hours_response(doctor_id, 1, "08:00:00", "12:00:00")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let body = json!([{ "weekday": 1, "start": "08:00:00", "end": "12:00:00" }]);
    let uri = format!("/{}/horarios", doctor_id);
    let (status, body) = send(app, authed("PUT", &uri, &token, Some(body))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["working_hours"][0]["weekday"], 1);
}

#[tokio::test]
async fn test_failed_hours_write_keeps_previous_schedule() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("ana@clinica.com");
    let token = token_for(&doctor, &config);

    mount_previous_hours(&mock_server, &doctor.id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/horarios"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/horarios"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let body = json!([{ "weekday": 2, "start": "14:00:00", "end": "18:00:00" }]);
    let uri = format!("/{}/horarios", doctor.id);
    let (status, _) = send(app, authed("PUT", &uri, &token, Some(body))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_failed_cleanup_removes_new_hours() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor = TestUser::doctor("ana@clinica.com");
    let token = token_for(&doctor, &config);
    let new_id = "7a2d2d9e-0000-4000-8000-0000000000b2";

    mount_previous_hours(&mock_server, &doctor.id).await;

    let mut inserted = MockSupabaseResponses::working_hours_response(&doctor.id, 2, "14:00:00", "18:00:00");
    inserted["id"] = json!(new_id);
    Mock::given(method("POST"))
        .and(path("/rest/v1/horarios"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([inserted])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/horarios"))
        .and(query_param("id", format!("in.({})", PREVIOUS_HOURS_ID)))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/horarios"))
        .and(query_param("id", format!("in.({})", new_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let body = json!([{ "weekday": 2, "start": "14:00:00", "end": "18:00:00" }]);
    let uri = format!("/{}/horarios", doctor.id);
    let (status, _) = send(app, authed("PUT", &uri, &token, Some(body))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_assistant_cannot_touch_other_doctor_hours() {
    let config = TestConfig::default().to_app_config();
    let assistant = TestUser::assistant("aux@example.com", "6f1c1c9e-0000-4000-8000-000000000001");
    let token = token_for(&assistant, &config);

    let app = create_test_app(config);
    let body = json!([]);
    let (status, _) = send(
        app,
        authed("PUT", "/6f1c1c9e-0000-4000-8000-000000000002/horarios", &token, Some(body)),
    ).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_requests_inactivation() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = token_for(&admin, &config);
    let doctor_id = "6f1c1c9e-0000-4000-8000-000000000001";

    Mock::given(method("GET"))
        .and(path("/rest/v1/medicos"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(doctor_id, "ana@clinica.com", "Dra. Ana")
        ])))
        .mount(&mock_server)
        .await;

    let mut pending = MockSupabaseResponses::doctor_response(doctor_id, "ana@clinica.com", "Dra. Ana");
    pending["inactivation_requested_at"] = json!(chrono::Utc::now().to_rfc3339());

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/medicos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pending])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let uri = format!("/{}/solicitar-inativacao", doctor_id);
    let (status, body) = send(app, authed("POST", &uri, &token, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["state"], "pending_inactivation");
    assert_eq!(body["status"]["remaining"]["expired"], false);
}

#[tokio::test]
async fn test_second_inactivation_request_conflicts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = token_for(&admin, &config);
    let doctor_id = "6f1c1c9e-0000-4000-8000-000000000001";

    let mut pending = MockSupabaseResponses::doctor_response(doctor_id, "ana@clinica.com", "Dra. Ana");
    pending["inactivation_requested_at"] = json!(chrono::Utc::now().to_rfc3339());

    Mock::given(method("GET"))
        .and(path("/rest/v1/medicos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pending])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let uri = format!("/{}/solicitar-inativacao", doctor_id);
    let (status, _) = send(app, authed("POST", &uri, &token, None)).await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_expired_request_reports_inactive() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("paciente@example.com");
    let token = token_for(&patient, &config);
    let doctor_id = "6f1c1c9e-0000-4000-8000-000000000001";

    let mut expired = MockSupabaseResponses::doctor_response(doctor_id, "ana@clinica.com", "Dra. Ana");
    expired["inactivation_requested_at"] = json!("2020-01-06T12:00:00Z");

    Mock::given(method("GET"))
        .and(path("/rest/v1/medicos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([expired])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let uri = format!("/{}/inativacao", doctor_id);
    let (status, body) = send(app, authed("GET", &uri, &token, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["state"], "inactive");
}

#[tokio::test]
async fn test_unknown_doctor_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("paciente@example.com");
    let token = token_for(&patient, &config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/medicos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let (status, body) = send(
        app,
        authed("GET", "/6f1c1c9e-0000-4000-8000-000000000009", &token, None),
    ).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Médico não encontrado");
}

#[tokio::test]
async fn test_malformed_doctor_id_is_rejected_before_lookup() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("paciente@example.com");
    let token = token_for(&patient, &config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/medicos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let (status, _) = send(app, authed("GET", "/x%26select%3D*", &token, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

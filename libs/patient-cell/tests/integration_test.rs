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

use patient_cell::router::patient_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};

fn create_test_app(config: AppConfig) -> Router {
    patient_routes(Arc::new(config))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, json)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_public_registration_creates_profile() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let new_id = "0b7e7a52-0000-4000-8000-000000000001";

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": new_id, "email": "carla@example.com" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockSupabaseResponses::auth_session_response(new_id, "carla@example.com")
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/pacientes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(new_id, "carla@example.com", "Carla Souza")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let body = json!({
        "name": "Carla Souza",
        "email": "carla@example.com",
        "password": "segredo",
        "confirm_password": "segredo",
        "cpf": "123.456.789-00",
        "phone": null,
        "birth_date": "1990-01-01"
    });
    let (status, body) = send(app, json_request("POST", "/", None, body)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], new_id);
    assert_eq!(body["name"], "Carla Souza");
}

#[tokio::test]
async fn test_registration_with_taken_email_conflicts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "msg": "User already registered"
        })))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let body = json!({
        "name": "Carla Souza",
        "email": "carla@example.com",
        "password": "segredo",
        "confirm_password": "segredo",
        "cpf": null,
        "phone": null,
        "birth_date": null
    });
    let (status, body) = send(app, json_request("POST", "/", None, body)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("carla@example.com"));
}

#[tokio::test]
async fn test_registration_rejects_short_password() {
    let app = create_test_app(TestConfig::default().to_app_config());
    let body = json!({
        "name": "Carla Souza",
        "email": "carla@example.com",
        "password": "123",
        "confirm_password": "123",
        "cpf": null,
        "phone": null,
        "birth_date": null
    });
    let (status, body) = send(app, json_request("POST", "/", None, body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "A senha deve ter pelo menos 6 caracteres");
}

#[tokio::test]
async fn test_patient_cannot_list_patients() {
    let config = TestConfig::default().to_app_config();
    let user = TestUser::patient("carla@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let app = create_test_app(config);
    let (status, _) = send(app, get("/", &token)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_doctor_lists_patients_with_filter() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let user = TestUser::doctor("medico@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/pacientes"))
        .and(query_param("and", r#"(name.ilike."*carla*")"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response("0b7e7a52-0000-4000-8000-000000000001", "carla@example.com", "Carla Souza")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let uri = format!("/?filter={}", urlencoding::encode("name like 'carla'"));
    let (status, body) = send(app, get(&uri, &token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_patient_cannot_read_another_patient() {
    let config = TestConfig::default().to_app_config();
    let user = TestUser::patient("carla@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let app = create_test_app(config);
    let (status, _) = send(app, get("/0b7e7a52-0000-4000-8000-000000000099", &token)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patient_reads_own_profile() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let user = TestUser::patient("carla@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/pacientes"))
        .and(query_param("id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&user.id, &user.email, "Carla Souza")
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let (status, body) = send(app, get("/me", &token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "carla@example.com");
}

#[tokio::test]
async fn test_malformed_patient_id_never_reaches_database() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let user = TestUser::doctor("medico@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/pacientes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let (status, body) = send(app, get("/abc%26limit%3D1", &token)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Identificador de paciente inválido"));
}

#[tokio::test]
async fn test_assistant_lists_clinic_patients() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let user = TestUser::assistant("aux@example.com", "0b7e7a52-0000-4000-8000-0000000000dd");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/pacientes"))
        .and(query_param("order", "name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response("0b7e7a52-0000-4000-8000-000000000001", "carla@example.com", "Carla Souza"),
            MockSupabaseResponses::patient_response("0b7e7a52-0000-4000-8000-000000000002", "joao@example.com", "João Lima")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let (status, body) = send(app, get("/", &token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
}

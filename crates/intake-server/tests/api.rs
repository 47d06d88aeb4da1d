//! HTTP tests for the form and submission endpoints.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, IF_MATCH};
use axum::http::{HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use intake_server::{AppState, AuthConfig, ServerConfig, TokenGrant, build_router};
use intake_spec::MemoryStore;
use serde_json::{Value, json};
use uuid::Uuid;

const INSTITUTION: &str = "6f1c2a4e-8d3b-4f6a-9c1e-2b7d5a9e0c11";
const OTHER_INSTITUTION: &str = "0b5d8f3a-1c2e-4d7f-8a9b-3c4d5e6f7a8b";
const REGISTRAR: &str = "registrar-token";
const STUDENT: &str = "student-token";

fn auth(public_submissions: bool) -> AuthConfig {
    AuthConfig {
        tokens: vec![
            TokenGrant {
                token: REGISTRAR.into(),
                principal: "registrar".into(),
                institution_id: Some(Uuid::parse_str(INSTITUTION).unwrap()),
                admin: false,
            },
            TokenGrant {
                token: STUDENT.into(),
                principal: "student-42".into(),
                institution_id: None,
                admin: false,
            },
        ],
        public_submissions,
    }
}

fn create_test_server(public_submissions: bool) -> TestServer {
    let config = ServerConfig {
        auth: auth(public_submissions),
        ..ServerConfig::default()
    };
    let state = AppState::new(Arc::new(MemoryStore::new()), &config);
    TestServer::new(build_router(Arc::new(state))).unwrap()
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

fn forms_url(path: &str) -> String {
    format!("/api/forms/{INSTITUTION}{path}")
}

/// Creates the student application form and returns `(form_id, fields)`.
async fn seed_form(server: &TestServer) -> (u64, Vec<Value>) {
    let response = server
        .post(&forms_url(""))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .json(&json!({ "name": "Student Application", "type": "student_application" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    let form_id = body["data"]["id"].as_u64().unwrap();

    let response = server
        .post(&forms_url(&format!("/{form_id}/fields")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .json(&json!([
            { "field_label": "Full Name", "field_type": "text", "is_required": true },
            { "field_label": "Email", "field_type": "email", "is_required": true },
            { "field_label": "Grade", "field_type": "select",
              "options": ["Elementary", "Middle", "High"] }
        ]))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    (form_id, body["data"].as_array().unwrap().clone())
}

fn field_id(fields: &[Value], name: &str) -> i64 {
    fields
        .iter()
        .find(|field| field["field_name"] == name)
        .and_then(|field| field["field_id"].as_i64())
        .unwrap()
}

fn error_code(response: &TestResponse) -> String {
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    body["error"]["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(false);
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_and_fetch_form() {
    let server = create_test_server(false);
    let (form_id, fields) = seed_form(&server).await;
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[1]["field_name"], "email");
    assert_eq!(fields[2]["display_order"], 2);

    let response = server.get(&forms_url(&format!("/{form_id}"))).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["form"]["name"], "Student Application");
    assert_eq!(body["data"]["form"]["version"], 1);
    assert_eq!(body["data"]["fields"].as_array().unwrap().len(), 3);

    let response = server.get(&forms_url("")).await;
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mutations_require_credentials() {
    let server = create_test_server(false);
    let response = server
        .post(&forms_url(""))
        .json(&json!({ "name": "Contact", "type": "contact" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&response), "unauthenticated");

    let response = server
        .post(&forms_url(""))
        .add_header(AUTHORIZATION, bearer("unknown"))
        .json(&json!({ "name": "Contact", "type": "contact" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_foreign_institution_is_forbidden() {
    let server = create_test_server(false);
    let response = server
        .post(&format!("/api/forms/{OTHER_INSTITUTION}"))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .json(&json!({ "name": "Contact", "type": "contact" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&response), "forbidden");
}

#[tokio::test]
async fn test_blank_form_name_is_unprocessable() {
    let server = create_test_server(false);
    let response = server
        .post(&forms_url(""))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .json(&json!({ "name": "  ", "type": "feedback" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"]["fields"][0]["code"], "blank_name");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let server = create_test_server(false);
    let response = server
        .post(&forms_url(""))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response), "bad_request");
}

#[tokio::test]
async fn test_stale_if_match_conflicts() {
    let server = create_test_server(false);
    let (form_id, fields) = seed_form(&server).await;

    let response = server
        .post(&forms_url(&format!("/{form_id}/fields")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .add_header(IF_MATCH, HeaderValue::from_static("0"))
        .json(&json!([fields[0]]))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let response = server
        .post(&forms_url(&format!("/{form_id}/fields")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .add_header(IF_MATCH, HeaderValue::from_static("1"))
        .json(&json!([fields[0]]))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_form_update_honours_if_match() {
    let server = create_test_server(false);
    let (form_id, _) = seed_form(&server).await;

    let response = server
        .put(&forms_url(&format!("/{form_id}")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .add_header(IF_MATCH, HeaderValue::from_static("0"))
        .json(&json!({ "name": "Student Application 2027" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&response), "conflict");

    let response = server
        .put(&forms_url(&format!("/{form_id}")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .add_header(IF_MATCH, HeaderValue::from_static("\"1\""))
        .json(&json!({ "name": "Student Application 2027" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["version"], 2);

    let response = server
        .put(&forms_url(&format!("/{form_id}")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .json(&json!({}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["name"], "Student Application 2027");
}

#[tokio::test]
async fn test_submission_missing_email_is_rejected() {
    let server = create_test_server(false);
    let (form_id, fields) = seed_form(&server).await;

    let response = server
        .post(&forms_url(&format!("/{form_id}/submit")))
        .add_header(AUTHORIZATION, bearer(STUDENT))
        .json(&json!({
            "values": [{ "field_id": field_id(&fields, "full_name"), "value": "Ana" }]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    let errors = body["error"]["fields"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["field_name"], "email");
    assert_eq!(errors[0]["code"], "missing_required");
}

#[tokio::test]
async fn test_submission_is_stored_for_authenticated_student() {
    let server = create_test_server(false);
    let (form_id, fields) = seed_form(&server).await;

    let response = server
        .post(&forms_url(&format!("/{form_id}/submit")))
        .add_header(AUTHORIZATION, bearer(STUDENT))
        .json(&json!({
            "submitted_by": "someone-else",
            "values": [
                { "field_id": field_id(&fields, "full_name"), "value": "Ana" },
                { "field_id": field_id(&fields, "email"), "value": "ana@example.com" },
                { "field_id": field_id(&fields, "grade"), "value": "Middle" }
            ]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["submitted_by"], "student-42");
    assert_eq!(body["data"]["values"].as_array().unwrap().len(), 3);

    let response = server
        .get(&forms_url(&format!("/{form_id}/submissions")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_anonymous_submissions_follow_config() {
    let closed = create_test_server(false);
    let (form_id, _) = seed_form(&closed).await;
    let response = closed
        .post(&forms_url(&format!("/{form_id}/submit")))
        .json(&json!({ "values": [] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let open = create_test_server(true);
    let (form_id, fields) = seed_form(&open).await;
    let response = open
        .post(&forms_url(&format!("/{form_id}/submit")))
        .json(&json!({
            "submitted_by": "walk-in",
            "idempotency_key": "kiosk-1",
            "values": [
                { "field_id": field_id(&fields, "full_name"), "value": "Bea" },
                { "field_id": field_id(&fields, "email"), "value": "bea@example.com" }
            ]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["submitted_by"], "walk-in");
}

#[tokio::test]
async fn test_inactive_forms_are_hidden_from_anonymous_callers() {
    let server = create_test_server(true);
    let (form_id, _) = seed_form(&server).await;

    let response = server
        .put(&forms_url(&format!("/{form_id}")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .json(&json!({ "is_active": false }))
        .await;
    response.assert_status_ok();

    server
        .get(&forms_url(&format!("/{form_id}")))
        .await
        .assert_status_not_found();

    let response = server
        .get(&forms_url(&format!("/{form_id}")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .await;
    response.assert_status_ok();

    let response = server
        .get(&forms_url(""))
        .add_query_param("include_inactive", true)
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .await;
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = server
        .post(&forms_url(&format!("/{form_id}/submit")))
        .json(&json!({ "values": [] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"]["fields"][0]["code"], "form_inactive");
}

#[tokio::test]
async fn test_delete_cascades_and_missing_forms_are_not_found() {
    let server = create_test_server(false);
    let (form_id, _) = seed_form(&server).await;

    let response = server
        .delete(&forms_url(&format!("/{form_id}")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .await;
    response.assert_status_ok();

    let response = server.get(&forms_url(&format!("/{form_id}"))).await;
    response.assert_status_not_found();
    assert_eq!(error_code(&response), "not_found");

    let response = server
        .get(&forms_url(&format!("/{form_id}/submissions")))
        .add_header(AUTHORIZATION, bearer(REGISTRAR))
        .await;
    response.assert_status_not_found();
}

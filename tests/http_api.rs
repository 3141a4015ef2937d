use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use secrecy::Secret;
use serde_json::{json, Value};
use tower::ServiceExt;

use chamada::api::middleware::state::AppState;
use chamada::config::Config;
use chamada::db;

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        host: "127.0.0.1".to_string(),
        port: 8000,
        token_secret: Secret::new("integration-test-secret".to_string()),
        token_ttl_hours: 24,
        password_iterations: 1_000,
        check_in_base_url: "http://172.17.0.1:3000".to_string(),
        check_in_ttl_seconds: 600,
        check_in_single_use: false,
        sweep_schedule: None,
    }
}

async fn app() -> Router {
    let config = test_config();
    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    chamada::api::router().with_state(AppState::new(pool, config))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    (status, bytes.to_vec())
}

async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, token, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

async fn signin(app: &Router, name: &str, reg: &str, is_teacher: bool) -> String {
    let (status, body) = send_json(
        app,
        Method::POST,
        "/signin",
        None,
        Some(json!({
            "name": name,
            "email": format!("{}@example.com", reg),
            "studentNumber": reg,
            "password": "password",
            "isTeacher": is_teacher,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn signin_then_login() {
    let app = app().await;
    signin(&app, "Ana", "T-1", true).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "matricula": "T-1", "password": "password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["nome"], "Ana");
    assert_eq!(body["user"]["isTeacher"], true);
    assert!(body["token"].as_str().is_some());
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "registrationNumber": "T-1", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");
}

#[tokio::test]
async fn duplicate_signin_conflicts() {
    let app = app().await;
    signin(&app, "Ana", "T-1", true).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/signin",
        None,
        Some(json!({
            "name": "Other",
            "email": "other@example.com",
            "studentNumber": "T-1",
            "password": "password",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_registration");
}

#[tokio::test]
async fn missing_or_garbled_bearer_is_unauthorized() {
    let app = app().await;

    let (status, _) = send_json(&app, Method::GET, "/chamada", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send_json(&app, Method::GET, "/chamada", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn students_cannot_enroll() {
    let app = app().await;
    let student = signin(&app, "Alice", "123", false).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/chamada",
        Some(&student),
        Some(json!({ "nome": "Bob", "matricula": "456", "type": "Adicionar" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn teacher_roster_flow() {
    let app = app().await;
    let teacher = signin(&app, "Ana", "T-1", true).await;
    let student = signin(&app, "Alice", "123", false).await;

    for (nome, matricula) in [("Alice", "123"), ("Bob", "456")] {
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/chamada",
            Some(&teacher),
            Some(json!({ "nome": nome, "matricula": matricula, "type": "Adicionar" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["aluno"]["presencas"], 0);
    }

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/chamada",
        Some(&teacher),
        Some(json!({ "nome": "Alice", "matricula": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_enrolled");

    let (status, body) =
        send_json(&app, Method::POST, "/presenca/Alice/123", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aluno"]["presencas"], 1);

    let (status, _) =
        send_json(&app, Method::POST, "/presenca/Alice/999", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_json(&app, Method::GET, "/chamada", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "alunos": {
            "Alice": { "matricula": "123", "presencas": 1 },
            "Bob": { "matricula": "456", "presencas": 0 },
        }})
    );

    let (status, body) = send_json(&app, Method::GET, "/chamada", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "teachers": { "Ana": 1 } }));

    let (status, body) =
        send_json(&app, Method::GET, "/chamada/totais", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "teachers": { "Ana": 1 } }));

    let (status, _) = send_json(&app, Method::DELETE, "/chamada/Bob", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, Method::DELETE, "/chamada/Bob", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn check_in_redemption_flow() {
    let app = app().await;
    let teacher = signin(&app, "Ana", "T-1", true).await;
    let alice = signin(&app, "Alice", "123", false).await;
    let carol = signin(&app, "Carol", "789", false).await;

    let (status, _) = send_json(
        &app,
        Method::POST,
        "/chamada",
        Some(&teacher),
        Some(json!({ "nome": "Alice", "matricula": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, issued) = send_json(
        &app,
        Method::POST,
        "/check-in/tokens",
        Some(&teacher),
        Some(json!({ "ttlSeconds": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = issued["token"].as_str().unwrap().to_string();
    assert_eq!(
        issued["checkInUrl"],
        format!("http://172.17.0.1:3000/presenca_aluno/{}", token)
    );

    let redeem_uri = format!("/presenca_aluno/{}", token);

    let (status, body) = send_json(&app, Method::POST, &redeem_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aluno"]["presencas"], 1);

    // Not on this teacher's roster
    let (status, _) = send_json(&app, Method::POST, &redeem_uri, Some(&carol), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Carol may not check Alice in
    let (status, _) = send_json(
        &app,
        Method::POST,
        &redeem_uri,
        Some(&carol),
        Some(json!({ "nome": "Alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
        send_json(&app, Method::POST, "/presenca_aluno/unknown", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_token");

    let (status, _) = send_json(
        &app,
        Method::DELETE,
        &format!("/check-in/tokens/{}", token),
        Some(&teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send_json(&app, Method::POST, &redeem_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_token");

    let (_, body) = send_json(&app, Method::GET, "/chamada", Some(&alice), None).await;
    assert_eq!(body, json!({ "teachers": { "Ana": 1 } }));
}

#[tokio::test]
async fn check_in_token_ttl_is_bounded() {
    let app = app().await;
    let teacher = signin(&app, "Ana", "T-1", true).await;

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/check-in/tokens",
        Some(&teacher),
        Some(json!({ "ttlSeconds": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn huge_check_in_ttl_is_rejected_not_panicking() {
    let app = app().await;
    let teacher = signin(&app, "Ana", "T-1", true).await;

    for ttl in [i64::MAX, i64::MIN, 86_401] {
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/check-in/tokens",
            Some(&teacher),
            Some(json!({ "ttlSeconds": ttl })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "ttlSeconds = {}", ttl);
        assert_eq!(body["code"], "validation_error");
    }

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/check-in/tokens",
        Some(&teacher),
        Some(json!({ "ttlSeconds": 86_400 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn user_me_gives_teachers_a_check_in_token() {
    let app = app().await;
    let teacher = signin(&app, "Ana", "T-1", true).await;
    let student = signin(&app, "Alice", "123", false).await;

    let (status, body) = send_json(&app, Method::GET, "/user/me", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["matricula"], "T-1");
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert!(body["checkInUrl"].as_str().unwrap().ends_with(token));
    assert!(body["expiresAt"].is_string());

    // Polling reuses the live token instead of minting a new one
    let (_, again) = send_json(&app, Method::GET, "/user/me", Some(&teacher), None).await;
    assert_eq!(again["token"], token);

    let (status, body) = send_json(&app, Method::GET, "/user/me", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isTeacher"], false);
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn qr_codes_are_only_rendered_for_the_issuer() {
    let app = app().await;
    let teacher = signin(&app, "Ana", "T-1", true).await;
    let other = signin(&app, "Bia", "T-2", true).await;

    let (_, issued) =
        send_json(&app, Method::POST, "/check-in/tokens", Some(&teacher), None).await;
    let token = issued["token"].as_str().unwrap();

    let request = Request::builder()
        .uri(format!("/check-in/tokens/{}/qr.svg", token))
        .header(header::AUTHORIZATION, format!("Bearer {}", teacher))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/svg+xml"
    );

    let (status, png) = send(
        &app,
        Method::GET,
        &format!("/check-in/tokens/{}/qr.png", token),
        Some(&teacher),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&png[..4], b"\x89PNG");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/check-in/tokens/{}/qr.svg", token),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_database() {
    let app = app().await;

    let (status, body) = send_json(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["database"]["status"], "healthy");
}

mod common;

use axum::http::{Method, StatusCode};
use careerlaunch_api::{
    auth::{CAPABILITIES, TokenIssuer, access::allowed_roles},
    create_router,
    models::{JobType, Role},
};
use common::{InMemoryStore, bearer_for, body_json, empty_request, json_request, seed_user, test_state};
use serde_json::json;
use std::time::Duration;
use tower::util::ServiceExt;
use uuid::Uuid;

fn job_body() -> serde_json::Value {
    json!({
        "title": "Backend Engineer",
        "description": "Build APIs",
        "requirements": "Rust, SQL",
        "company": "Acme",
        "location": "Dublin",
        "salary": 55000,
        "jobType": "full-time"
    })
}

// --- Capability Table ---

#[test]
fn test_capability_table_covers_role_rules() {
    assert_eq!(allowed_roles(&Method::POST, "/jobs"), Some(&[Role::Employer][..]));
    assert_eq!(allowed_roles(&Method::POST, "/applications"), Some(&[Role::Candidate][..]));
    assert_eq!(allowed_roles(&Method::GET, "/applications"), Some(&[Role::Employer][..]));
    assert!(allowed_roles(&Method::GET, "/jobs/{id}").unwrap().contains(&Role::Candidate));
    assert!(allowed_roles(&Method::PATCH, "/jobs/{id}").is_none());
    assert_eq!(allowed_roles(&Method::HEAD, "/jobs"), allowed_roles(&Method::GET, "/jobs"));
    assert_eq!(
        allowed_roles(&Method::HEAD, "/employer/stats"),
        Some(&[Role::Employer][..])
    );
}

#[test]
fn test_capability_table_has_no_duplicate_entries() {
    for (i, a) in CAPABILITIES.iter().enumerate() {
        for b in &CAPABILITIES[i + 1..] {
            assert!(
                !(a.method == b.method && a.path == b.path),
                "duplicate capability for {} {}",
                a.method,
                a.path
            );
        }
    }
}

// --- Middleware ---

#[tokio::test]
async fn test_health_is_public() {
    let app = create_router(test_state(InMemoryStore::new()));

    let response = app.oneshot(empty_request("GET", "/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_401_missing_credentials() {
    let app = create_router(test_state(InMemoryStore::new()));

    let response = app.oneshot(empty_request("GET", "/jobs", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "missing_credentials");
}

#[tokio::test]
async fn test_non_bearer_scheme_is_missing_credentials() {
    let app = create_router(test_state(InMemoryStore::new()));

    let response = app
        .oneshot(empty_request("GET", "/jobs", Some("Basic dXNlcjpwYXNz")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "missing_credentials");
}

#[tokio::test]
async fn test_garbage_token_is_401_malformed() {
    let app = create_router(test_state(InMemoryStore::new()));

    let response = app
        .oneshot(empty_request("GET", "/jobs", Some("Bearer not.a.token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "malformed_token");
}

#[tokio::test]
async fn test_expired_token_is_401_token_expired() {
    let state = test_state(InMemoryStore::new());
    let token = state
        .tokens
        .issue(Uuid::new_v4(), Role::Candidate, Duration::ZERO)
        .unwrap();
    let app = create_router(state);

    let auth = format!("Bearer {token}");
    let response = app.oneshot(empty_request("GET", "/jobs", Some(&auth))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "token_expired");
}

#[tokio::test]
async fn test_foreign_key_token_is_401_invalid_token() {
    let foreign = TokenIssuer::new(b"some-other-deployment-key", Duration::from_secs(60)).unwrap();
    let token = foreign
        .issue(Uuid::new_v4(), Role::Employer, Duration::from_secs(60))
        .unwrap();
    let app = create_router(test_state(InMemoryStore::new()));

    let auth = format!("Bearer {token}");
    let response = app.oneshot(empty_request("GET", "/jobs", Some(&auth))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "invalid_token");
}

#[tokio::test]
async fn test_candidate_cannot_post_job() {
    let store = InMemoryStore::new();
    let state = test_state(store.clone());
    let candidate = seed_user(&store, Role::Candidate).await;
    let auth = bearer_for(&state, &candidate);
    let app = create_router(state);

    let response = app
        .oneshot(json_request("POST", "/jobs", Some(&auth), job_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "forbidden");
    assert_eq!(store.job_count(), 0);
}

#[tokio::test]
async fn test_employer_posts_job_and_candidate_reads_it() {
    let store = InMemoryStore::new();
    let state = test_state(store.clone());
    let employer = seed_user(&store, Role::Employer).await;
    let candidate = seed_user(&store, Role::Candidate).await;
    let employer_auth = bearer_for(&state, &employer);
    let candidate_auth = bearer_for(&state, &candidate);
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/jobs", Some(&employer_auth), job_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["employerId"], employer.id.to_string());
    assert_eq!(created["salary"], "55000");
    assert_eq!(created["jobType"], "full-time");

    let uri = format!("/jobs/{}", created["id"].as_str().unwrap());
    let response = app
        .oneshot(empty_request("GET", &uri, Some(&candidate_auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["title"], "Backend Engineer");
}

#[tokio::test]
async fn test_head_follows_get_rules() {
    let store = InMemoryStore::new();
    let state = test_state(store.clone());
    let candidate = seed_user(&store, Role::Candidate).await;
    let auth = bearer_for(&state, &candidate);
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(empty_request("HEAD", "/jobs", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(empty_request("HEAD", "/employer/stats", Some(&auth)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_employer_cannot_apply() {
    let store = InMemoryStore::new();
    let state = test_state(store.clone());
    let employer = seed_user(&store, Role::Employer).await;
    let job = careerlaunch_api::repository::JobRepository::create_job(
        store.as_ref(),
        employer.id,
        common::job_request("Ops", JobType::Contract),
    )
    .await
    .unwrap();
    let auth = bearer_for(&state, &employer);
    let app = create_router(state);

    let response = app
        .oneshot(json_request(
            "POST",
            "/applications",
            Some(&auth),
            json!({ "jobId": job.id, "coverLetter": "Hire me" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(store.application_count(), 0);
}

#[tokio::test]
async fn test_candidate_cannot_read_employer_dashboard() {
    let store = InMemoryStore::new();
    let state = test_state(store.clone());
    let candidate = seed_user(&store, Role::Candidate).await;
    let auth = bearer_for(&state, &candidate);
    let app = create_router(state);

    for uri in ["/employer/stats", "/employer/jobs", "/applications"] {
        let response = app
            .clone()
            .oneshot(empty_request("GET", uri, Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn test_me_returns_profile_without_password_hash() {
    let store = InMemoryStore::new();
    let state = test_state(store.clone());
    let candidate = seed_user(&store, Role::Candidate).await;
    let auth = bearer_for(&state, &candidate);
    let app = create_router(state);

    let response = app.oneshot(empty_request("GET", "/me", Some(&auth))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], candidate.id.to_string());
    assert_eq!(body["role"], "candidate");
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = create_router(test_state(InMemoryStore::new()));

    let response = app.oneshot(empty_request("GET", "/health", None)).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

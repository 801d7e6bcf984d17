//! Tests for optional authentication on the health endpoint and the 404 fallback.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use clinicgate::db::Role;
use common::TestApp;

#[tokio::test]
async fn test_health_anonymous() {
    let t = TestApp::new().await;

    let (status, body) = t.get("/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "OK");
    assert!(body["data"].get("authenticatedAs").is_none());
}

#[tokio::test]
async fn test_health_with_valid_token() {
    let t = TestApp::new().await;
    let (_, token) = t.user("alice", Role::Patient).await;

    let (status, body) = t.get("/api/health", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["authenticatedAs"], "alice");
}

#[tokio::test]
async fn test_health_never_rejects() {
    let t = TestApp::new().await;
    let (id, inactive) = t.user("gone", Role::Staff).await;
    t.db.users().set_active(id, false).await.unwrap();

    for token in ["garbage", inactive.as_str()] {
        let (status, body) = t.get("/api/health", Some(token)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].get("authenticatedAs").is_none());
    }
}

#[tokio::test]
async fn test_health_ignores_malformed_authorization() {
    let t = TestApp::new().await;
    let (_, token) = t.user("alice", Role::Staff).await;

    let malformed = [
        "Basic YWxpY2U6c2VjcmV0".to_string(),
        "Bearer".to_string(),
        "Bearer ".to_string(),
        token.clone(),
        format!("bearer {}", token),
    ];
    for value in malformed {
        let request = Request::builder()
            .uri("/api/health")
            .header("Authorization", value.as_str())
            .body(Body::empty())
            .unwrap();
        let (status, body) = t.send(request).await;
        assert_eq!(status, StatusCode::OK, "Authorization: {}", value);
        assert_eq!(body["success"], true);
        assert!(body["data"].get("authenticatedAs").is_none());
    }
}

#[tokio::test]
async fn test_health_survives_store_failure() {
    let t = TestApp::new().await;
    let (_, token) = t.user("alice", Role::Staff).await;
    sqlx::query("DROP TABLE users")
        .execute(t.db.pool())
        .await
        .unwrap();

    let (status, body) = t.get("/api/health", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("authenticatedAs").is_none());
}

#[tokio::test]
async fn test_unknown_route() {
    let t = TestApp::new().await;

    for uri in ["/api/nothing-here", "/elsewhere"] {
        let (status, body) = t.get(uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Route not found");
    }
}

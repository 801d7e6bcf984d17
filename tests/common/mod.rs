#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use clinicgate::{
    ServerConfig,
    cli::ClientIpHeader,
    create_app,
    db::{Database, NewUser, Role},
    jwt::TokenService,
};
use serde_json::Value;
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub tokens: TokenService,
}

impl TestApp {
    /// App with X-Forwarded-For IP extraction, since oneshot requests carry no socket address.
    pub async fn new() -> Self {
        Self::with_ip_header(Some(ClientIpHeader::XForwardedFor)).await
    }

    pub async fn with_ip_header(ip_header: Option<ClientIpHeader>) -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let config = ServerConfig {
            db: db.clone(),
            jwt_secret: JWT_SECRET.to_vec(),
            ip_header,
        };
        Self {
            app: create_app(&config),
            db,
            tokens: TokenService::new(JWT_SECRET),
        }
    }

    /// Insert an active user with the given role and return (id, access_token).
    pub async fn user(&self, username: &str, role: Role) -> (i64, String) {
        let id = self
            .db
            .users()
            .create(&NewUser {
                username,
                role,
                ..Default::default()
            })
            .await
            .unwrap();
        let token = self.tokens.issue_access_token(id, role).unwrap().token;
        (id, token)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri).header("x-forwarded-for", "10.0.0.1");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "10.0.0.1")
            .header("user-agent", "clinic-tests/1.0");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn activity_count(&self) -> usize {
        self.db.activity().list_recent().await.unwrap().len()
    }
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    // Extractor rejections from axum are plain text
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}

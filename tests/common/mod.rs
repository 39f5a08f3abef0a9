//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request},
    response::Response,
    routing::get,
    Router,
};
use serde_json::Value;

use greenlight::config::ApiConfig;
use greenlight::data::{
    Account, MemoryPermissionStore, MemoryUserStore, MovieStore, PermissionStore, Token, User,
};
use greenlight::http::{AppState, HttpServer};
use greenlight::mailer::{MailError, Mailer};

pub const READER: &str = "READERTOKEN0000000000000000";
pub const WRITER: &str = "WRITERTOKEN0000000000000000";
pub const INACTIVE: &str = "INACTIVETOKEN00000000000000";
pub const NO_PERMS: &str = "NOPERMSTOKEN000000000000000";

/// Keeps every activation token it is asked to deliver.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// The most recent activation token sent to `email`.
    pub fn token_for(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        sent.iter().rev().find(|(to, _)| to == email).map(|(_, token)| token.clone())
    }
}

impl Mailer for RecordingMailer {
    fn send_activation(&self, account: &Account, token: &Token) -> Result<(), MailError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((account.email.clone(), token.plaintext.clone()));
        Ok(())
    }
}

/// Stores behind a test server, kept concrete so tests can inspect them.
pub struct Stores {
    pub movies: Arc<MovieStore>,
    pub users: Arc<MemoryUserStore>,
    pub permissions: Arc<MemoryPermissionStore>,
    pub mailer: Arc<RecordingMailer>,
}

impl Stores {
    pub fn seeded() -> Self {
        let users = MemoryUserStore::new();
        let permissions = MemoryPermissionStore::new();
        let ttl = Duration::from_secs(3600);

        users.provision(READER, User { id: 1, activated: true }, ttl);
        users.provision(WRITER, User { id: 2, activated: true }, ttl);
        users.provision(INACTIVE, User { id: 3, activated: false }, ttl);
        users.provision(NO_PERMS, User { id: 4, activated: true }, ttl);

        permissions.grant_permissions(1, &["movies:read"]).unwrap();
        permissions.grant_permissions(2, &["movies:read", "movies:write"]).unwrap();
        permissions.grant_permissions(3, &["movies:read", "movies:write"]).unwrap();

        Self {
            movies: Arc::new(MovieStore::new()),
            users: Arc::new(users),
            permissions: Arc::new(permissions),
            mailer: Arc::new(RecordingMailer::default()),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            movies: self.movies.clone(),
            users: self.users.clone(),
            permissions: self.permissions.clone(),
            mailer: self.mailer.clone(),
            environment: "testing".into(),
        }
    }
}

/// Default config with the limiter switched off.
pub fn config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.rate_limit.enabled = false;
    config
}

async fn boom() -> &'static str {
    panic!("handler exploded")
}

/// A server with an extra ungated `/v1/panic` route that always panics.
pub fn server(config: ApiConfig, stores: &Stores) -> HttpServer {
    let extra = Router::new().route("/v1/panic", get(boom));
    HttpServer::with_routes(config, stores.state(), extra)
}

pub fn request(method: Method, path: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
    request_from("203.0.113.7:40000".parse().unwrap(), method, path, token, body)
}

pub fn request_from(
    addr: SocketAddr,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let mut request = builder.body(body).unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Build a reqwest client that never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

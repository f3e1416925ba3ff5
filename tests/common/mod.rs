#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use bizdesk_api::{
    auth::{cookie_value, ADMIN_ROLE},
    config::AppConfig,
    db::{self, DbPool},
    entities::counterparty::CounterpartyKind,
    events,
    services::counterparties::CounterpartyInput,
    AppState,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@bizdesk.test";
pub const CLERK_EMAIL: &str = "clerk@bizdesk.test";
pub const VIEWER_EMAIL: &str = "viewer@bizdesk.test";
pub const PASSWORD: &str = "correct-horse-42";

/// Application backed by a throwaway SQLite file and upload directory.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None, |_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        Self::build(None, tweak).await
    }

    pub async fn with_vehicles(vehicles_db: DbPool) -> Self {
        Self::build(Some(vehicles_db), |_| {}).await
    }

    async fn build(vehicles_db: Option<DbPool>, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("bizdesk.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.upload_dir = dir.path().join("uploads");
        tweak(&mut cfg);
        std::fs::create_dir_all(&cfg.upload_dir).expect("upload dir");

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::channel();
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(
            Arc::new(pool),
            vehicles_db.map(Arc::new),
            cfg,
            Arc::new(event_sender),
        );

        for (name, email, role) in [
            ("Admin", ADMIN_EMAIL, ADMIN_ROLE),
            ("Clerk", CLERK_EMAIL, "clerk"),
            ("Viewer", VIEWER_EMAIL, "viewer"),
        ] {
            state
                .auth
                .create_user(name, email, PASSWORD)
                .await
                .expect("seed user");
            state.auth.grant_role(email, role).await.expect("grant role");
        }

        let router = bizdesk_api::build_router(state.clone());

        Self {
            router,
            state,
            dir,
            _event_task: event_task,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// JSON request carrying `cookie` when given.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("build request")).await
    }

    /// Logs in through `/auth/login` and returns the `name=token` cookie pair.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/auth/login",
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
                None,
            )
            .await;
        assert_eq!(response.status(), 200, "login as {} failed", email);
        self.session_cookie(&response)
            .expect("login sets the session cookie")
    }

    /// `name=token` from a `Set-Cookie` response header, if one carries a token.
    pub fn session_cookie(&self, response: &Response) -> Option<String> {
        let name = &self.state.config.session_cookie_name;
        let mut headers = axum::http::HeaderMap::new();
        for value in response.headers().get_all(header::SET_COOKIE) {
            let first = value.to_str().ok()?.split(';').next()?.to_string();
            headers.append(header::COOKIE, first.parse().ok()?);
        }
        cookie_value(&headers, name).map(|token| format!("{}={}", name, token))
    }

    pub async fn admin(&self) -> String {
        self.login(ADMIN_EMAIL).await
    }

    pub async fn user_id(&self, email: &str) -> Uuid {
        self.state
            .auth
            .login(email, PASSWORD)
            .await
            .expect("login")
            .user
            .user_id
    }

    pub async fn seed_counterparty(&self, code: &str, kind: CounterpartyKind) -> Uuid {
        self.state
            .counterparty_service()
            .create(CounterpartyInput {
                code: code.to_string(),
                name: format!("{} Co., Ltd.", code),
                kind,
                tax_id: None,
                email: None,
                phone: None,
                address: None,
            })
            .await
            .expect("seed counterparty")
            .id
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn response_bytes(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes")
        .to_vec()
}

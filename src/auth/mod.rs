/*!
 * # Authentication and Authorization Module
 *
 * Browser sessions backed by the `sessions` table. A login verifies the
 * argon2 password hash, stores the SHA-256 of a random token and hands the
 * token back as an `HttpOnly` cookie. Every protected request resolves the
 * cookie to a user, that user's roles, and the permissions granted to those
 * roles through `role_permissions`.
 */

use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::events::{Event, EventSender};
use crate::metrics::{LOGIN_FAILURES, SESSIONS_OPENED};

// Entity modules
pub mod role_permission;
pub mod session;
pub mod user;
pub mod user_role;

// Feature modules
mod password;
mod permissions;

// Re-exports
pub use password::*;
pub use permissions::*;

/// Length of the random session token handed to the browser
pub const SESSION_TOKEN_LENGTH: usize = 48;

/// Authenticated user resolved from the session cookie
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    #[serde(skip)]
    pub session_id: Uuid,
}

impl AuthUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if the user has a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Check if the user is an admin
    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Admins pass every permission check.
    pub fn can(&self, permission: &str) -> bool {
        self.is_admin() || self.has_permission(permission)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Session cookie settings
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_ttl: ChronoDuration,
    pub secure_cookie: bool,
}

impl AuthConfig {
    pub fn new(cookie_name: String, session_ttl_secs: i64, secure_cookie: bool) -> Self {
        Self {
            cookie_name,
            session_ttl: ChronoDuration::seconds(session_ttl_secs),
            secure_cookie,
        }
    }

    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.session_cookie_name.clone(),
            cfg.session_ttl_secs as i64,
            cfg.is_production(),
        )
    }
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

/// Issues, resolves and revokes sessions
#[derive(Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Hex SHA-256 of a session token; only this value is stored.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            config,
            db,
            event_sender,
        }
    }

    /// Verifies credentials and opens a session.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, AuthError> {
        let db = self.db.as_ref();
        let email = email.trim().to_lowercase();

        let account = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(db)
            .await?;

        let account = match account {
            Some(account) if account.active && verify_password(&account.password_hash, password) => {
                account
            }
            _ => {
                LOGIN_FAILURES.inc();
                warn!(%email, "login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + self.config.session_ttl;
        let session = session::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(account.id),
            token_hash: Set(hash_token(&token)),
            created_at: Set(now),
            expires_at: Set(expires_at),
        }
        .insert(db)
        .await?;

        let user = self.load_auth_user(account, session.id).await?;

        SESSIONS_OPENED.inc();
        info!(user_id = %user.user_id, session_id = %session.id, "session opened");
        self.event_sender
            .send_or_log(Event::SessionOpened(session.id))
            .await;

        Ok(LoginSession {
            token,
            expires_at,
            user,
        })
    }

    /// Deletes the session behind `token`. Unknown tokens are ignored.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let db = self.db.as_ref();
        let existing = session::Entity::find()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .one(db)
            .await?;

        if let Some(existing) = existing {
            session::Entity::delete_by_id(existing.id).exec(db).await?;
            info!(session_id = %existing.id, "session closed");
            self.event_sender
                .send_or_log(Event::SessionClosed(existing.id))
                .await;
        }
        Ok(())
    }

    /// Maps a cookie token to the user it belongs to.
    ///
    /// Unknown and expired tokens and inactive users are all unauthenticated.
    /// Expired sessions are deleted on sight.
    pub async fn resolve_session(&self, token: &str) -> Result<AuthUser, AuthError> {
        let db = self.db.as_ref();
        let existing = session::Entity::find()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .one(db)
            .await?
            .ok_or(AuthError::InvalidSession)?;

        if existing.expires_at <= Utc::now() {
            session::Entity::delete_by_id(existing.id).exec(db).await?;
            debug!(session_id = %existing.id, "expired session removed");
            return Err(AuthError::SessionExpired);
        }

        let account = user::Entity::find_by_id(existing.user_id)
            .one(db)
            .await?
            .filter(|account| account.active)
            .ok_or(AuthError::InvalidSession)?;

        self.load_auth_user(account, existing.id).await
    }

    async fn load_auth_user(
        &self,
        account: user::Model,
        session_id: Uuid,
    ) -> Result<AuthUser, AuthError> {
        let roles = self.get_user_roles(account.id).await?;
        let permissions = self.get_user_permissions(account.id).await?;
        Ok(AuthUser {
            user_id: account.id,
            name: account.name,
            email: account.email,
            roles,
            permissions,
            session_id,
        })
    }

    /// Role names held by the user
    pub async fn get_user_roles(&self, user_id: Uuid) -> Result<Vec<String>, AuthError> {
        let roles = user_role::Entity::find()
            .select_only()
            .column(user_role::Column::RoleName)
            .filter(user_role::Column::UserId.eq(user_id))
            .order_by_asc(user_role::Column::RoleName)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await?;
        Ok(roles)
    }

    /// Permissions granted to any of the user's roles
    pub async fn get_user_permissions(&self, user_id: Uuid) -> Result<Vec<String>, AuthError> {
        let permissions = role_permission::Entity::find()
            .select_only()
            .column(role_permission::Column::Permission)
            .join(JoinType::InnerJoin, role_permission::Relation::UserRole.def())
            .filter(user_role::Column::UserId.eq(user_id))
            .distinct()
            .order_by_asc(role_permission::Column::Permission)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await?;
        Ok(permissions)
    }

    /// Creates an active account. Emails are stored lower-cased.
    #[instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<user::Model, AuthError> {
        let db = self.db.as_ref();
        let email = email.trim().to_lowercase();

        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .count(db)
            .await?;
        if taken > 0 {
            return Err(AuthError::Conflict(format!("{} is already registered", email)));
        }

        let now = Utc::now();
        let account = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.trim().to_string()),
            email: Set(email),
            password_hash: Set(hash_password(password)?),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(user_id = %account.id, "user created");
        Ok(account)
    }

    /// Gives `role` to the account registered under `email`. Granting twice is a no-op.
    #[instrument(skip(self))]
    pub async fn grant_role(&self, email: &str, role: &str) -> Result<(), AuthError> {
        let db = self.db.as_ref();
        let account = user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(db)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let held = user_role::Entity::find()
            .filter(user_role::Column::UserId.eq(account.id))
            .filter(user_role::Column::RoleName.eq(role))
            .count(db)
            .await?;
        if held > 0 {
            return Ok(());
        }

        user_role::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(account.id),
            role_name: Set(role.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        info!(user_id = %account.id, role, "role granted");
        Ok(())
    }

    /// `Set-Cookie` value carrying a fresh session token
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.config.cookie_name,
            token,
            self.config.session_ttl.num_seconds()
        );
        if self.config.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that makes the browser drop the session cookie
    pub fn clearing_cookie(&self) -> String {
        let mut cookie = format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
            self.config.cookie_name
        );
        if self.config.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Session token from the request's `Cookie` headers
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        cookie_value(headers, &self.config.cookie_name)
    }
}

/// Finds `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid session")]
    InvalidSession,

    #[error("Session has expired")]
    SessionExpired,

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<DbErr> for AuthError {
    fn from(err: DbErr) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingAuth
            | Self::InvalidCredentials
            | Self::InvalidSession
            | Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::WeakPassword(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::MissingAuth => "AUTH_MISSING",
            Self::InvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::InvalidSession => "AUTH_INVALID_SESSION",
            Self::SessionExpired => "AUTH_SESSION_EXPIRED",
            Self::UserNotFound => "AUTH_USER_NOT_FOUND",
            Self::InsufficientPermissions => "AUTH_INSUFFICIENT_PERMISSIONS",
            Self::WeakPassword(_) => "AUTH_WEAK_PASSWORD",
            Self::Conflict(_) => "AUTH_CONFLICT",
            Self::Validation(_) => "AUTH_VALIDATION",
            Self::DatabaseError(_) => "AUTH_DATABASE_ERROR",
            Self::InternalError(_) => "AUTH_INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::MissingAuth => "Authentication required".to_string(),
            Self::DatabaseError(_) | Self::InternalError(_) => {
                tracing::error!(error = %self, "authentication failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.can(&required_permission) {
        debug!(user_id = %user.user_id, permission = %required_permission, "permission denied");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Resolves the session cookie and stores the [`AuthUser`] in the request extensions
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    let Some(token) = auth_service.token_from_headers(request.headers()) else {
        return AuthError::MissingAuth.into_response();
    };

    match auth_service.resolve_session(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Authentication routes, mounted under `/auth`
pub fn auth_routes() -> axum::Router<Arc<AuthService>> {
    let me = axum::Router::new()
        .route("/me", axum::routing::get(me_handler))
        .with_auth();

    axum::Router::new()
        .route("/login", axum::routing::post(login_handler))
        .route("/logout", axum::routing::post(logout_handler))
        .merge(me)
        .layer(DefaultBodyLimit::max(1024 * 64))
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginCredentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: AuthUser,
    pub expires_at: DateTime<Utc>,
}

fn set_cookie(response: &mut Response, cookie: &str) -> Result<(), AuthError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| AuthError::InternalError(format!("invalid cookie header: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(())
}

/// Login handler
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Session opened; the token is set as a cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Response, AuthError> {
    credentials
        .validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let session = auth_service
        .login(&credentials.email, &credentials.password)
        .await?;

    let mut response = Json(LoginResponse {
        user: session.user,
        expires_at: session.expires_at,
    })
    .into_response();
    set_cookie(&mut response, &auth_service.session_cookie(&session.token))?;
    Ok(response)
}

/// Logout handler; always clears the cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Session closed")),
    tag = "auth"
)]
pub async fn logout_handler(
    State(auth_service): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    if let Some(token) = auth_service.token_from_headers(&headers) {
        auth_service.logout(&token).await?;
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    set_cookie(&mut response, &auth_service.clearing_cookie())?;
    Ok(response)
}

/// Current user handler
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = AuthUser),
        (status = 401, description = "No valid session")
    ),
    tag = "auth"
)]
pub async fn me_handler(user: AuthUser) -> Json<AuthUser> {
    Json(user)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.route_layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

/*!
 * # Authentication and Authorization Module
 *
 * JWT access tokens with rotating refresh tokens for the operations API.
 *
 * - Access tokens are HS256 JWTs carrying the user's role and the permissions
 *   derived from it.
 * - Refresh tokens are JWTs as well, but only their SHA-256 digest is stored
 *   in `refresh_tokens`; presenting one revokes it and issues a fresh pair.
 *
 * Route protection is layered with [`AuthRouterExt`], and handlers read the
 * caller through the [`AuthUser`] extractor.
 */

use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::entities::{refresh_token, user};

mod password;
mod permissions;
mod rbac;

pub use password::{hash_password, verify_password};
pub use permissions::*;
pub use rbac::*;

const REFRESH_SCOPE: &str = "refresh";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,              // Subject (user ID)
    pub name: Option<String>,     // User's full name
    pub email: Option<String>,    // User's email
    pub roles: Vec<String>,       // Account roles
    pub permissions: Vec<String>, // Permissions derived from the roles
    pub jti: String,              // JWT ID
    pub iat: i64,                 // Issued at time
    pub exp: i64,                 // Expiration time
    pub nbf: i64,                 // Not valid before time
    pub iss: String,              // Issuer
    pub aud: String,              // Audience
    pub scope: Option<String>,    // "refresh" on refresh tokens
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if any granted permission covers `permission`, wildcards included
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|granted| check_permission(granted, permission))
    }

    /// Check if the user is an admin
    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    pub fn is_delivery_driver(&self) -> bool {
        self.has_role("delivery_driver")
    }

    /// The subject as a UUID.
    pub fn user_uuid(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.user_id).map_err(|_| AuthError::InvalidToken)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            roles: claims.roles,
            permissions: claims.permissions,
            token_id: claims.jti,
        }
    }
}

/// Reads the caller placed in the request extensions by [`auth_middleware`].
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

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Result<Self, AuthError> {
        if jwt_secret.trim().is_empty() {
            return Err(AuthError::InternalError(
                "JWT secret must not be empty".to_string(),
            ));
        }
        if access_token_expiration.is_zero() || refresh_token_expiration.is_zero() {
            return Err(AuthError::InternalError(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        Ok(Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
            refresh_token_expiration,
        })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, AuthError> {
        Self::new(
            config.jwt_secret.clone(),
            config.auth_audience.clone(),
            config.auth_issuer.clone(),
            Duration::from_secs(config.jwt_expiration as u64),
            Duration::from_secs(config.refresh_token_expiration as u64),
        )
    }
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
    blacklisted_tokens: Arc<RwLock<Vec<BlacklistedToken>>>,
}

/// Access token revoked at logout, kept until it would have expired anyway
#[derive(Clone, Debug)]
struct BlacklistedToken {
    jti: String,
    expiry: DateTime<Utc>,
}

/// Hex SHA-256 digest under which a refresh token is stored.
pub fn refresh_token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            db,
            blacklisted_tokens: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Check a username and password against the users table
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<user::Model, AuthError> {
        let user = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.can_login() {
            warn!(user_id = %user.id, "login attempt on inactive account");
            return Err(AuthError::InvalidCredentials);
        }

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Issue an access/refresh token pair and persist the refresh digest
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn generate_token(&self, user: &user::Model) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;
        let refresh_exp = now
            + ChronoDuration::from_std(self.config.refresh_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let roles = vec![user.role.to_string()];
        let permissions = permissions_for_roles(&roles);

        let access_claims = Claims {
            sub: user.id.to_string(),
            name: Some(user.full_name()),
            email: Some(user.email.clone()),
            roles,
            permissions,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            scope: None,
        };

        // Refresh tokens carry no roles; they are re-derived on rotation
        let refresh_claims = Claims {
            sub: user.id.to_string(),
            name: None,
            email: None,
            roles: vec![],
            permissions: vec![],
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            scope: Some(REFRESH_SCOPE.to_string()),
        };

        let access_token = self.encode_claims(&access_claims)?;
        let refresh_token = self.encode_claims(&refresh_claims)?;

        refresh_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            token_hash: Set(refresh_token_digest(&refresh_token)),
            expires_at: Set(refresh_exp),
            revoked: Set(false),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        debug!("issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            refresh_expires_in: self.config.refresh_token_expiration.as_secs() as i64,
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Validate an access token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.decode_claims(token)?;

        if claims.scope.as_deref() == Some(REFRESH_SCOPE) {
            return Err(AuthError::InvalidToken);
        }

        if self.is_token_blacklisted(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Find the stored row for a presented refresh token, if it is still usable
    async fn usable_refresh_token(
        &self,
        token: &str,
    ) -> Result<(Claims, refresh_token::Model), AuthError> {
        let claims = self.decode_claims(token)?;
        if claims.scope.as_deref() != Some(REFRESH_SCOPE) {
            return Err(AuthError::InvalidToken);
        }

        let stored = refresh_token::Entity::find()
            .filter(refresh_token::Column::TokenHash.eq(refresh_token_digest(token)))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidToken)?;

        if stored.revoked {
            return Err(AuthError::RevokedToken);
        }
        if !stored.is_usable(Utc::now()) {
            return Err(AuthError::TokenExpired);
        }
        if stored.user_id.to_string() != claims.sub {
            return Err(AuthError::InvalidToken);
        }

        Ok((claims, stored))
    }

    async fn revoke_stored(&self, stored: refresh_token::Model) -> Result<(), AuthError> {
        let mut active: refresh_token::ActiveModel = stored.into();
        active.revoked = Set(true);
        active
            .update(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Exchange a refresh token for a new pair; the presented token is revoked
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let (_, stored) = self.usable_refresh_token(refresh_token).await?;

        let user = user::Entity::find_by_id(stored.user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if !user.can_login() {
            return Err(AuthError::InvalidCredentials);
        }

        self.revoke_stored(stored).await?;
        self.generate_token(&user).await
    }

    /// Revoke a refresh token and, when given, the access token it was paired with
    #[instrument(skip_all)]
    pub async fn logout(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let (claims, stored) = self.usable_refresh_token(refresh_token).await?;
        self.revoke_stored(stored).await?;

        if let Some(token) = access_token {
            if let Ok(access) = self.validate_token(token).await {
                if access.sub == claims.sub {
                    self.revoke_token(access).await;
                }
            }
        }

        info!(user_id = %claims.sub, "user logged out");
        Ok(())
    }

    /// Blacklist an access token until its natural expiry
    async fn revoke_token(&self, claims: Claims) {
        let expiry = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);

        let mut blacklist = self.blacklisted_tokens.write().await;
        blacklist.push(BlacklistedToken {
            jti: claims.jti,
            expiry,
        });

        let now = Utc::now();
        blacklist.retain(|t| t.expiry > now);
    }

    async fn is_token_blacklisted(&self, token_id: &str) -> bool {
        let blacklist = self.blacklisted_tokens.read().await;
        blacklist.iter().any(|t| t.jti == token_id)
    }
}

/// Token pair response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginCredentials {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAuth => "AUTH_MISSING",
            Self::InvalidFormat => "AUTH_INVALID_FORMAT",
            Self::InvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::InvalidToken => "AUTH_INVALID_TOKEN",
            Self::TokenExpired => "AUTH_TOKEN_EXPIRED",
            Self::RevokedToken => "AUTH_REVOKED_TOKEN",
            Self::TokenCreation(_) => "AUTH_TOKEN_CREATION_FAILED",
            Self::UserNotFound => "AUTH_USER_NOT_FOUND",
            Self::InsufficientPermissions => "AUTH_INSUFFICIENT_PERMISSIONS",
            Self::InvalidRequest(_) => "AUTH_INVALID_REQUEST",
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
            Self::InvalidToken => "Invalid authentication token".to_string(),
            Self::RevokedToken => "Authentication token has been revoked".to_string(),
            // Internal failures are logged, not returned
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => {
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
    let user = match request.extensions().get::<AuthUser>() {
        Some(user) => user.clone(),
        None => return Err(AuthError::MissingAuth),
    };

    // Admins have all permissions
    if user.is_admin() {
        return Ok(next.run(request).await);
    }

    if !user.has_permission(&required_permission) {
        debug!(
            user_id = %user.user_id,
            permission = %required_permission,
            "permission denied"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that extracts and validates bearer tokens
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

    match extract_auth_from_headers(request.headers(), &auth_service).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Bearer token from the Authorization header, if one is present
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AuthError::InvalidFormat),
    }
}

async fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = bearer_token(headers)?.ok_or(AuthError::MissingAuth)?;
    let claims = auth_service.validate_token(token).await?;
    Ok(AuthUser::from(claims))
}

/// Authentication routes
pub fn auth_routes() -> axum::Router<Arc<AuthService>> {
    axum::Router::new()
        .route("/token", axum::routing::post(login_handler))
        .route("/token/refresh", axum::routing::post(refresh_token_handler))
        .route("/logout", axum::routing::post(logout_handler))
        .layer(DefaultBodyLimit::max(1024 * 64)) // 64KB limit
}

/// Obtain a token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 401, description = "Invalid credentials"),
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<TokenPair>, AuthError> {
    credentials
        .validate()
        .map_err(|_| AuthError::InvalidCredentials)?;

    let user = auth_service
        .authenticate(&credentials.username, &credentials.password)
        .await?;
    let token_pair = auth_service.generate_token(&user).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(token_pair))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/token/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Unknown, revoked or expired refresh token"),
    ),
    tag = "auth"
)]
pub async fn refresh_token_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(refresh_request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    refresh_request
        .validate()
        .map_err(|e| AuthError::InvalidRequest(e.to_string()))?;

    let token_pair = auth_service
        .refresh_token(&refresh_request.refresh_token)
        .await?;

    Ok(Json(token_pair))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Unknown or revoked refresh token"),
    ),
    tag = "auth"
)]
pub async fn logout_handler(
    State(auth_service): State<Arc<AuthService>>,
    headers: HeaderMap,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    request
        .validate()
        .map_err(|e| AuthError::InvalidRequest(e.to_string()))?;

    let access_token = bearer_token(&headers).ok().flatten();
    auth_service
        .logout(&request.refresh_token, access_token)
        .await?;

    Ok(Json(
        serde_json::json!({ "message": "Successfully logged out" }),
    ))
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
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::{UserRole, UserStatus};
    use assert_matches::assert_matches;
    use sea_orm::Database;

    const SECRET: &str = "unit_test_secret_that_is_long_enough_to_satisfy_the_sixty_four_char_rule";

    async fn service() -> AuthService {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        let config = AuthConfig::new(
            SECRET.to_string(),
            "aud".to_string(),
            "iss".to_string(),
            Duration::from_secs(600),
            Duration::from_secs(3600),
        )
        .unwrap();
        AuthService::new(config, Arc::new(db))
    }

    async fn seed_user(svc: &AuthService, role: UserRole, status: UserStatus) -> user::Model {
        let now = Utc::now();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(format!("user-{}", Uuid::new_v4().simple())),
            email: Set("driver@example.com".to_string()),
            first_name: Set("Juan".to_string()),
            last_name: Set("Cruz".to_string()),
            phone_number: Set(None),
            role: Set(role),
            status: Set(status),
            password_hash: Set(hash_password("correct-horse").unwrap()),
            is_active: Set(status == UserStatus::Active),
            date_joined: Set(now),
            updated_at: Set(now),
        }
        .insert(&*svc.db)
        .await
        .unwrap()
    }

    #[test]
    fn auth_config_rejects_empty_secret() {
        let result = AuthConfig::new(
            " ".into(),
            "aud".into(),
            "iss".into(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert_matches!(result, Err(AuthError::InternalError(_)));
    }

    #[test]
    fn auth_user_wildcard_permissions() {
        let user = AuthUser {
            user_id: Uuid::new_v4().to_string(),
            name: None,
            email: None,
            roles: vec!["manager".into()],
            permissions: permissions_for_role("manager"),
            token_id: "t".into(),
        };
        assert!(user.has_permission("orders:delete"));
        assert!(user.has_permission("users:read"));
        assert!(!user.has_permission("users:manage"));
        assert!(!user.is_admin());
    }

    #[tokio::test]
    async fn token_pair_round_trip_and_rotation() {
        let svc = service().await;
        let user = seed_user(&svc, UserRole::DeliveryDriver, UserStatus::Active).await;

        let authed = svc.authenticate(&user.username, "correct-horse").await.unwrap();
        let pair = svc.generate_token(&authed).await.unwrap();

        let claims = svc.validate_token(&pair.access_token).await.unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.roles, vec!["delivery_driver".to_string()]);

        // refresh tokens are not accepted as access tokens
        assert_matches!(
            svc.validate_token(&pair.refresh_token).await,
            Err(AuthError::InvalidToken)
        );

        let rotated = svc.refresh_token(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);
        assert_matches!(
            svc.refresh_token(&pair.refresh_token).await,
            Err(AuthError::RevokedToken)
        );
    }

    #[tokio::test]
    async fn wrong_password_and_archived_users_are_rejected() {
        let svc = service().await;
        let active = seed_user(&svc, UserRole::Manager, UserStatus::Active).await;
        let archived = seed_user(&svc, UserRole::Manager, UserStatus::Archived).await;

        assert_matches!(
            svc.authenticate(&active.username, "nope").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_matches!(
            svc.authenticate(&archived.username, "correct-horse").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_matches!(
            svc.authenticate("missing", "correct-horse").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn logout_revokes_refresh_and_access_tokens() {
        let svc = service().await;
        let user = seed_user(&svc, UserRole::Admin, UserStatus::Active).await;
        let pair = svc.generate_token(&user).await.unwrap();

        svc.logout(&pair.refresh_token, Some(&pair.access_token))
            .await
            .unwrap();

        assert_matches!(
            svc.validate_token(&pair.access_token).await,
            Err(AuthError::RevokedToken)
        );
        assert_matches!(
            svc.refresh_token(&pair.refresh_token).await,
            Err(AuthError::RevokedToken)
        );
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_matches!(bearer_token(&headers), Ok(None));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_matches!(bearer_token(&headers), Err(AuthError::InvalidFormat));

        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_matches!(bearer_token(&headers), Ok(Some("abc.def")));
    }

    #[test]
    fn error_codes() {
        assert_eq!(AuthError::MissingAuth.code(), "AUTH_MISSING");
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}

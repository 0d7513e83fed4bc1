use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::{DatabaseConnection, DbErr, SqlErr};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::entities::user;
use crate::db::services::{refresh_token_service, user_service};
use crate::server::config::ServerConfig;
use crate::web::error::AppError;
use crate::web::models::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, TokenResponse, UserResponse,
};

pub const USER_ROLE: &str = "user";
pub const ACCESS_TOKEN: &str = "access";
pub const REFRESH_TOKEN: &str = "refresh";

/// Signing secret and lifetimes for issued tokens.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        }
    }
}

pub fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let username_len = req.username.chars().count();
    if !(5..=16).contains(&username_len) {
        return Err(AppError::InvalidInput(
            "Username must be between 5 and 16 characters.".to_string(),
        ));
    }
    let email_ok = req
        .email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !email_ok {
        return Err(AppError::InvalidInput("A valid email is required.".to_string()));
    }
    if req.password.len() < 8 {
        return Err(AppError::InvalidInput(
            "Password must be at least 8 characters long.".to_string(),
        ));
    }
    Ok(())
}

pub async fn register_user(db: &DatabaseConnection, req: RegisterRequest) -> Result<UserResponse, AppError> {
    validate_registration(&req)?;

    if user_service::get_user_by_username(db, &req.username).await?.is_some() {
        return Err(AppError::Conflict("Username is already taken.".to_string()));
    }
    if user_service::get_user_by_email(db, &req.email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered.".to_string()));
    }

    let password_hash = hash(&req.password, DEFAULT_COST)
        .map_err(|e| AppError::PasswordHashingError(e.to_string()))?;

    // A concurrent registration can still win the race to the unique index.
    let created = user_service::create_user(db, &req.username, &req.email, &password_hash)
        .await
        .map_err(|e: DbErr| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict("Username or email is already registered.".to_string())
            }
            _ => AppError::from(e),
        })?;

    info!(user_id = created.id, username = %created.username, "User registered.");
    Ok(created.into())
}

pub async fn login_user(
    db: &DatabaseConnection,
    req: LoginRequest,
    settings: &TokenSettings,
) -> Result<LoginResponse, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Username and password are required.".to_string(),
        ));
    }

    let user = user_service::get_user_by_username(db, &req.username)
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    if !user.is_active {
        return Err(AppError::InvalidCredentials);
    }

    let valid_password = verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;
    if !valid_password {
        return Err(AppError::InvalidCredentials);
    }

    let access_token = issue_token(&user, ACCESS_TOKEN, settings)?;
    let refresh_token = issue_token(&user, REFRESH_TOKEN, settings)?;
    refresh_token_service::upsert_refresh_token(
        db,
        user.id,
        &refresh_token,
        Utc::now() + settings.refresh_ttl,
    )
    .await?;

    info!(user_id = user.id, "User logged in.");
    Ok(LoginResponse {
        access_token,
        refresh_token,
        token_type: "bearer".to_string(),
        user_id: user.id,
        username: user.username,
    })
}

/// Exchanges a refresh token for a new access token. The token must be the
/// one currently stored for the user and must not be revoked or expired.
pub async fn refresh_access_token(
    db: &DatabaseConnection,
    refresh_token: &str,
    settings: &TokenSettings,
) -> Result<TokenResponse, AppError> {
    let claims = decode_token(refresh_token, REFRESH_TOKEN, &settings.secret)?;

    let stored = refresh_token_service::get_refresh_token_for_user(db, claims.user_id)
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    if stored.deleted || stored.token != refresh_token || stored.expires_at <= Utc::now() {
        warn!(user_id = claims.user_id, "Rejected stale or revoked refresh token.");
        return Err(AppError::InvalidCredentials);
    }

    let user = user_service::get_user_by_id(db, claims.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::InvalidCredentials)?;

    Ok(TokenResponse {
        access_token: issue_token(&user, ACCESS_TOKEN, settings)?,
        token_type: "bearer".to_string(),
    })
}

pub async fn logout_user(db: &DatabaseConnection, user_id: i32) -> Result<(), AppError> {
    let revoked = refresh_token_service::revoke_refresh_token(db, user_id).await?;
    info!(user_id, revoked, "User logged out.");
    Ok(())
}

pub fn issue_token(user: &user::Model, token_type: &str, settings: &TokenSettings) -> Result<String, AppError> {
    let (ttl, jti) = if token_type == REFRESH_TOKEN {
        (settings.refresh_ttl, Some(Uuid::new_v4().to_string()))
    } else {
        (settings.access_ttl, None)
    };

    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id,
        role: USER_ROLE.to_string(),
        token_type: token_type.to_string(),
        jti,
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(settings.secret.as_ref()))
        .map_err(|e| AppError::TokenCreationError(e.to_string()))
}

/// Verifies signature, expiry, role and token type.
pub fn decode_token(token: &str, expected_type: &str, secret: &str) -> Result<Claims, AppError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!(error = ?e, "JWT decoding failed.");
        AppError::InvalidCredentials
    })?
    .claims;

    if claims.role != USER_ROLE || claims.token_type != expected_type {
        return Err(AppError::InvalidCredentials);
    }
    Ok(claims)
}

use argon2::Argon2;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
};
use jsonwebtoken::{
    errors::Result as JwtResult, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

use crate::{
    error::{AppError, AppResult},
    models::Role,
};

/// Sessions expire one day after login.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

pub fn hash_password(password: impl AsRef<[u8]>) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_ref(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(
    password: impl AsRef<[u8]>,
    password_hash: impl AsRef<str>,
) -> password_hash::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash.as_ref())?;
    Ok(Argon2::default()
        .verify_password(password.as_ref(), &parsed_hash)
        .is_ok())
}

lazy_static::lazy_static! {
    static ref DUMMY_HASH: Option<String> = hash_password(rand::random::<[u8; 32]>()).ok();
}

/// Spends the same Argon2 work as [`verify_password`] for a login whose
/// account does not exist. Always `false`.
pub fn verify_unknown_account(password: impl AsRef<[u8]>) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    false
}

pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

pub type SharedKeys = Arc<Keys>;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

impl Keys {
    /// Fails when `secret` is not valid base64.
    pub fn from_base64_secret(secret: &str) -> JwtResult<Keys> {
        Ok(Keys {
            encoding: EncodingKey::from_base64_secret(secret)?,
            decoding: DecodingKey::from_base64_secret(secret)?,
        })
    }

    pub fn generate_jwt(&self, user_id: i32, role: Role, lifetime: Duration) -> JwtResult<String> {
        let iat = jsonwebtoken::get_current_timestamp();
        self.encode(&Claims {
            sub: user_id,
            role,
            iat,
            exp: iat + lifetime.as_secs(),
        })
    }

    pub fn encode(&self, claims: &Claims) -> JwtResult<String> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding)
    }

    pub fn validate_jwt(&self, token: &str) -> JwtResult<TokenData<Claims>> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
    }
}

/// Identity decoded from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: i32,
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejects with 401 when no bearer token is sent and 403 when it does not
/// verify or has expired.
pub struct ExtractAuth(pub Session);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ExtractAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> AppResult<Self> {
        let keys = parts
            .extensions
            .get::<SharedKeys>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("signing keys are not installed on the router"))?;

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::from(StatusCode::UNAUTHORIZED, "Access denied"))?;

        let data = keys.validate_jwt(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            AppError::from(StatusCode::FORBIDDEN, "Invalid token")
        })?;

        Ok(ExtractAuth(Session {
            user_id: data.claims.sub,
            role: data.claims.role,
        }))
    }
}

/// Authenticates like [`ExtractAuth`], then requires the admin role.
pub struct AdminOnly(pub Session);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminOnly {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> AppResult<Self> {
        let ExtractAuth(session) = ExtractAuth::from_request_parts(parts, state).await?;
        if !session.is_admin() {
            return Err(AppError::from(
                StatusCode::FORBIDDEN,
                "Admin access required",
            ));
        }
        Ok(AdminOnly(session))
    }
}

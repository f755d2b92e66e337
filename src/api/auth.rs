use super::{JsonBody, MessageResponse};
use crate::{
    auth::{self, SharedKeys, TOKEN_LIFETIME},
    email::{self, DynMailer},
    error::{AppError, AppResult},
    models::Role,
    otp,
    store::{DynStore, NewUser},
};
use axum::{http::StatusCode, routing::post, Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct SignupRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

/// Clients send the code either as a string or as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum OtpCode {
    Text(String),
    Number(u64),
}

impl OtpCode {
    fn normalized(&self) -> String {
        match self {
            OtpCode::Text(s) => s.trim().to_string(),
            OtpCode::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct VerifyEmailRequest {
    email: Option<String>,
    otp: Option<OtpCode>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct UserProfile {
    id: i32,
    name: String,
    email: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    role: Role,
    user: UserProfile,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn invalid_credentials() -> AppError {
    AppError::from(StatusCode::UNAUTHORIZED, "Invalid credentials")
}

async fn signup(
    Extension(store): Extension<DynStore>,
    Extension(mailer): Extension<DynMailer>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let (Some(name), Some(email), Some(password)) = (
        required(req.name),
        required(req.email),
        required(req.password),
    ) else {
        return Err(AppError::bad_request(
            "Name, email and password are required",
        ));
    };
    let role = match req.role.as_deref() {
        None => Role::User,
        Some(role) => role
            .parse::<Role>()
            .map_err(|_| AppError::bad_request("Invalid role"))?,
    };

    let email = otp::normalize_email(&email);
    let code = otp::generate_otp();
    let user_id = store
        .create_user(NewUser {
            name: name.trim().to_string(),
            email: email.clone(),
            password_hash: auth::hash_password(password)?,
            role,
            otp: code.clone(),
            otp_expires_at: otp::expires_at(Utc::now().naive_utc()),
        })
        .await?;

    tracing::info!(user_id, %role, "registered user pending email verification");
    email::dispatch(&mailer, otp::verification_mail(&email, &code));

    Ok((
        StatusCode::CREATED,
        MessageResponse::new("Signup successful. OTP sent to email."),
    ))
}

async fn verify_email(
    Extension(store): Extension<DynStore>,
    JsonBody(req): JsonBody<VerifyEmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    let (Some(email), Some(code)) = (required(req.email), req.otp) else {
        return Err(AppError::bad_request("Email and OTP required"));
    };
    let email = otp::normalize_email(&email);

    if !store
        .verify_otp(&email, &code.normalized(), Utc::now().naive_utc())
        .await?
    {
        return Err(AppError::bad_request("Invalid or expired OTP"));
    }

    tracing::info!("email verified");
    Ok(MessageResponse::new("Email verified successfully"))
}

async fn login(
    Extension(store): Extension<DynStore>,
    Extension(keys): Extension<SharedKeys>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (Some(email), Some(password)) = (required(req.email), req.password) else {
        return Err(AppError::bad_request("Email and password are required"));
    };

    let Some(user) = store
        .find_user_by_email(&otp::normalize_email(&email))
        .await?
    else {
        auth::verify_unknown_account(password);
        return Err(invalid_credentials());
    };

    if !user.is_verified {
        return Err(AppError::from(
            StatusCode::FORBIDDEN,
            "Please verify your email before login",
        ));
    }

    if !auth::verify_password(password, &user.password_hash)? {
        return Err(invalid_credentials());
    }

    let role = user
        .role
        .parse::<Role>()
        .map_err(|e| anyhow::anyhow!("user {} has a corrupt role: {e}", user.id))?;
    let token = keys.generate_jwt(user.id, role, TOKEN_LIFETIME)?;

    tracing::info!(user_id = user.id, %role, "issued session token");
    Ok(Json(LoginResponse {
        token,
        role,
        user: UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    }))
}

pub fn app() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/verify-email", post(verify_email))
        .route("/login", post(login))
}

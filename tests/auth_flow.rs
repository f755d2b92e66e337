mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use club_hub_events::{
    auth::Claims,
    models::Role,
    otp::OTP_RANGE,
    store::Store,
};
use common::{TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn api_root_reports_liveness() -> Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app.request(Method::GET, "/api", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "API is running");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_answer_with_json() -> Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app.request(Method::GET, "/api/nowhere", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Cannot GET /api/nowhere");
    Ok(())
}

#[tokio::test]
async fn signup_stores_an_unverified_user_and_mails_the_code() -> Result<()> {
    let app = TestApp::new()?;
    assert_eq!(
        app.signup("Alice", "  Alice@Campus.EDU ", "user").await?,
        StatusCode::CREATED
    );

    let user = app
        .store
        .find_user_by_email("alice@campus.edu")
        .await?
        .expect("user stored under the normalized address");
    assert!(!user.is_verified);
    assert_ne!(user.password_hash, PASSWORD);
    let otp = user.otp.expect("pending otp");
    assert!(OTP_RANGE.contains(&otp.parse::<u32>()?));
    assert!(user.otp_expires_at.is_some());

    let mails = app.wait_for_mail(1).await;
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "alice@campus.edu");
    assert!(mails[0].body.contains(&otp));
    Ok(())
}

#[tokio::test]
async fn signup_validates_its_input() -> Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app
        .post("/api/signup", None, json!({ "name": "Bob", "email": "bob@campus.edu" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name, email and password are required");

    let (status, _) = app
        .post(
            "/api/signup",
            None,
            json!({ "name": "Bob", "email": "bob@campus.edu", "password": "x", "role": "root" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.signup("Bob", "bob@campus.edu", "user").await?, StatusCode::CREATED);
    assert_eq!(app.signup("Bobby", "BOB@campus.edu", "user").await?, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn otp_is_consumed_by_the_first_verification() -> Result<()> {
    let app = TestApp::new()?;
    app.signup("Alice", "alice@campus.edu", "user").await?;
    let otp = app.pending_otp("alice@campus.edu").await?;

    let (status, body) = app
        .post("/api/verify-email", None, json!({ "email": "alice@campus.edu", "otp": "000000" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired OTP");

    let numeric: u64 = otp.parse()?;
    let (status, body) = app
        .post("/api/verify-email", None, json!({ "email": "alice@campus.edu", "otp": numeric }))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");

    let user = app.store.find_user_by_email("alice@campus.edu").await?.unwrap();
    assert!(user.is_verified);
    assert_eq!(user.otp, None);
    assert_eq!(user.otp_expires_at, None);

    let (status, body) = app
        .post("/api/verify-email", None, json!({ "email": "alice@campus.edu", "otp": otp }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired OTP");
    Ok(())
}

#[tokio::test]
async fn otp_expires_after_ten_minutes() -> Result<()> {
    let app = TestApp::new()?;
    app.signup("Alice", "alice@campus.edu", "user").await?;
    let otp = app.pending_otp("alice@campus.edu").await?;

    let later = Utc::now().naive_utc() + Duration::minutes(11);
    assert!(!app.store.verify_otp("alice@campus.edu", &otp, later).await?);

    let (status, _) = app.login("alice@campus.edu", PASSWORD).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn verify_email_requires_both_fields() -> Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app
        .post("/api/verify-email", None, json!({ "email": "alice@campus.edu" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email and OTP required");
    Ok(())
}

#[tokio::test]
async fn login_requires_a_verified_email() -> Result<()> {
    let app = TestApp::new()?;
    app.signup("Alice", "alice@campus.edu", "user").await?;

    let (status, body) = app.login("alice@campus.edu", PASSWORD).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Please verify your email before login");
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() -> Result<()> {
    let app = TestApp::new()?;
    app.user("Alice", "alice@campus.edu").await?;

    let wrong_password = app.login("alice@campus.edu", "not it").await?;
    let unknown_email = app.login("nobody@campus.edu", PASSWORD).await?;
    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
    assert_eq!(wrong_password.1["error"], "Invalid credentials");

    let (status, body) = app
        .post("/api/login", None, json!({ "email": "alice@campus.edu" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email and password are required");
    Ok(())
}

#[tokio::test]
async fn signup_verify_login_scenario() -> Result<()> {
    let app = TestApp::new()?;
    app.signup("Alice", "alice@campus.edu", "user").await?;
    app.verify("alice@campus.edu").await?;

    let (status, body) = app.login("ALICE@campus.edu", PASSWORD).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["email"], "alice@campus.edu");
    assert!(body["user"].get("password_hash").is_none());

    let token = body["token"].as_str().unwrap();
    let claims = app.keys.validate_jwt(token)?.claims;
    assert_eq!(claims.role, Role::User);
    assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);

    let (status, _) = app.get("/api/events/upcoming", token).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn gate_distinguishes_missing_and_invalid_tokens() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.user("Alice", "alice@campus.edu").await?;

    let (status, body) = app.request(Method::GET, "/api/events/upcoming", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Access denied");

    let mut tampered = token.clone();
    tampered.push('x');
    let (status, body) = app.get("/api/events/upcoming", &tampered).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Invalid token");

    let now = jsonwebtoken::get_current_timestamp();
    let expired = app.keys.encode(&Claims {
        sub: 1,
        role: Role::User,
        iat: now - 2 * 24 * 60 * 60,
        exp: now - 24 * 60 * 60,
    })?;
    let (status, body) = app.get("/api/events/upcoming", &expired).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Invalid token");
    Ok(())
}

#[tokio::test]
async fn admin_routes_reject_plain_users() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.user("Alice", "alice@campus.edu").await?;

    let (status, body) = app.get("/api/clubs", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admin access required");

    let (status, _) = app
        .post("/api/createclubs", Some(&token), json!({ "name": "Robotics", "password": "pw" }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/admin/dashboard", &token).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.request(Method::GET, "/api/clubs", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Access denied");
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app
        .post("/api/login", None, json!(42))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    Ok(())
}

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use club_hub_events::{
    auth::Keys,
    certificate::FileCertificates,
    email::{Mail, Mailer},
    store::{memory::MemoryStore, Store},
    Services,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "dGVzdC1zaWduaW5nLXNlY3JldA==";
pub const PASSWORD: &str = "correct horse battery staple";

/// Keeps every mail instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: Mail) -> Result<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub keys: Keys,
    pub certificate_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Result<TestApp> {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let certificate_dir = tempfile::tempdir()?;

        let router = club_hub_events::app(Services {
            store: store.clone(),
            keys: Arc::new(Keys::from_base64_secret(JWT_SECRET)?),
            mailer: mailer.clone(),
            certificates: Arc::new(FileCertificates::new(certificate_dir.path())),
        });

        Ok(TestApp {
            router,
            store,
            mailer,
            keys: Keys::from_base64_secret(JWT_SECRET)?,
            certificate_dir,
        })
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Reads back the pending code the way the mailbox owner would.
    pub async fn pending_otp(&self, email: &str) -> Result<String> {
        self.store
            .find_user_by_email(email)
            .await?
            .context("user was not stored")?
            .otp
            .context("user has no pending otp")
    }

    pub async fn signup(&self, name: &str, email: &str, role: &str) -> Result<StatusCode> {
        let body = serde_json::json!({
            "name": name,
            "email": email,
            "password": PASSWORD,
            "role": role,
        });
        Ok(self.post("/api/signup", None, body).await?.0)
    }

    pub async fn verify(&self, email: &str) -> Result<StatusCode> {
        let otp = self.pending_otp(email).await?;
        let body = serde_json::json!({ "email": email, "otp": otp });
        Ok(self.post("/api/verify-email", None, body).await?.0)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(StatusCode, Value)> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.post("/api/login", None, body).await
    }

    /// Signs up, verifies and logs in, returning the session token.
    pub async fn session(&self, name: &str, email: &str, role: &str) -> Result<String> {
        assert_eq!(self.signup(name, email, role).await?, StatusCode::CREATED);
        assert_eq!(self.verify(email).await?, StatusCode::OK);
        let (status, body) = self.login(email, PASSWORD).await?;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"]
            .as_str()
            .map(str::to_string)
            .context("login response carries no token")
    }

    pub async fn admin(&self) -> Result<String> {
        self.session("Ada Admin", "admin@campus.edu", "admin").await
    }

    pub async fn user(&self, name: &str, email: &str) -> Result<String> {
        self.session(name, email, "user").await
    }

    pub async fn club(&self, admin: &str, name: &str) -> Result<i64> {
        let body = serde_json::json!({
            "name": name,
            "description": "robots and more",
            "password": "club-secret",
        });
        let (status, body) = self.post("/api/createclubs", Some(admin), body).await?;
        assert_eq!(status, StatusCode::CREATED, "club creation failed: {body}");
        body["id"].as_i64().context("club response carries no id")
    }

    pub async fn event(&self, admin: &str, club_id: i64, title: &str, date: &str) -> Result<i64> {
        let body = serde_json::json!({
            "title": title,
            "date": date,
            "venue": "Main Hall",
            "time": "10:00",
        });
        let uri = format!("/api/clubs/{club_id}/addevents");
        let (status, body) = self.post(&uri, Some(admin), body).await?;
        assert_eq!(status, StatusCode::CREATED, "event creation failed: {body}");
        body["id"].as_i64().context("event response carries no id")
    }

    pub async fn register(&self, token: &str, event_id: i64) -> Result<(StatusCode, Value)> {
        let uri = format!("/api/events/register/{event_id}");
        self.request(Method::POST, &uri, Some(token), None).await
    }

    /// Lets spawned mail tasks run until `count` mails were recorded.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<Mail> {
        for _ in 0..1000 {
            if self.mailer.sent().len() >= count {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.mailer.sent()
    }
}

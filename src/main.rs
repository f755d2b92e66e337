use std::sync::Arc;

use axum::http::Method;
use club_hub_events::{
    auth::Keys,
    certificate::FileCertificates,
    email::SmtpMailer,
    store::postgres::{connect_to_db, PgStore},
    Services,
};
use envconfig::Envconfig;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: String,
    #[envconfig(from = "PORT", default = "5000")]
    pub port: u16,
    #[envconfig(from = "JWT_SECRET")]
    pub jwt_secret: String,
    #[envconfig(from = "EMAIL_USERNAME")]
    pub email_username: String,
    #[envconfig(from = "EMAIL_PASSWORD")]
    pub email_password: String,
    #[envconfig(from = "SMTP_RELAY", default = "smtp.gmail.com")]
    pub smtp_relay: String,
    #[envconfig(from = "CERTIFICATE_DIR", default = "certificates")]
    pub certificate_dir: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::init_from_env()?;
    let keys = match Keys::from_base64_secret(&config.jwt_secret) {
        Ok(keys) => keys,
        Err(e) => {
            tracing::error!(error = %e, "JWT_SECRET must be valid base64");
            std::process::exit(1);
        }
    };

    let mailer = SmtpMailer::new(
        &config.smtp_relay,
        &config.email_username,
        &config.email_password,
    )?;
    if let Err(e) = mailer.sanity_check().await {
        tracing::warn!(error = %e, "email sanity check failed. verification and certificate mail will not be delivered");
    }

    let pool = connect_to_db(&config.db_url)?;
    let services = Services {
        store: Arc::new(PgStore::new(pool)),
        keys: Arc::new(keys),
        mailer: Arc::new(mailer),
        certificates: Arc::new(FileCertificates::new(&config.certificate_dir)),
    };

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = club_hub_events::app(services).layer(cors);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

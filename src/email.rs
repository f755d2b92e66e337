use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::{path::PathBuf, sync::Arc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> anyhow::Result<()>;
}

pub type DynMailer = Arc<dyn Mailer>;

/// Sends `mail` in the background. Failures are logged and not retried.
pub fn dispatch(mailer: &DynMailer, mail: Mail) {
    let mailer = mailer.clone();
    tokio::spawn(async move {
        let to = mail.to.clone();
        let subject = mail.subject.clone();
        match mailer.send(mail).await {
            Ok(()) => tracing::info!(%to, %subject, "mail sent"),
            Err(e) => tracing::error!(%to, %subject, error = ?e, "failed to send mail"),
        }
    });
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(relay: &str, username: &str, password: &str) -> anyhow::Result<SmtpMailer> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        let from = Mailbox::new(Some("Club Hub Events".to_string()), username.parse()?);
        Ok(SmtpMailer { transport, from })
    }

    /// Connects to the relay once so a bad configuration shows up at startup.
    pub async fn sanity_check(&self) -> anyhow::Result<()> {
        if self.transport.test_connection().await? {
            Ok(())
        } else {
            anyhow::bail!("smtp relay refused the connection")
        }
    }
}

fn content_type_for(path: &std::path::Path) -> ContentType {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("txt") => ContentType::TEXT_PLAIN,
        Some("pdf") => ContentType::parse("application/pdf").unwrap_or(ContentType::TEXT_PLAIN),
        _ => ContentType::parse("application/octet-stream").unwrap_or(ContentType::TEXT_PLAIN),
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: Mail) -> anyhow::Result<()> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(mail.to.parse::<Mailbox>()?)
            .subject(mail.subject);

        let message = if mail.attachments.is_empty() {
            builder.body(mail.body)?
        } else {
            let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(mail.body));
            for path in &mail.attachments {
                let filename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("attachment")
                    .to_string();
                let content = tokio::fs::read(path).await?;
                parts = parts.singlepart(Attachment::new(filename).body(content, content_type_for(path)));
            }
            builder.multipart(parts)?
        };

        self.transport.send(message).await?;
        Ok(())
    }
}

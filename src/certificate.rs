use async_trait::async_trait;
use nanoid::nanoid;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::models::Position;

#[async_trait]
pub trait CertificateGenerator: Send + Sync {
    /// Renders a certificate and returns the path of the written file.
    async fn generate(
        &self,
        name: &str,
        event_title: &str,
        position: Position,
    ) -> anyhow::Result<PathBuf>;
}

pub type DynCertificates = Arc<dyn CertificateGenerator>;

/// Writes plain-text certificates into a directory, creating it on first use.
pub struct FileCertificates {
    dir: PathBuf,
}

impl FileCertificates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// File stem built from ASCII alphanumerics only, runs of anything else
/// collapsed to a single `_`.
fn file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c);
        } else if !stem.is_empty() && !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_end_matches('_');
    if stem.is_empty() {
        "certificate".to_string()
    } else {
        stem.to_string()
    }
}

fn render(name: &str, event_title: &str, position: Position, date: chrono::NaiveDate) -> String {
    format!(
        "Certificate of Achievement\n\n\
         This is proudly presented to\n\n\
         {name}\n\n\
         for securing \"{title}\" in\n\n\
         {event_title}\n\n\
         Date: {date}\n",
        title = position.title(),
        date = date.format("%d %B %Y"),
    )
}

#[async_trait]
impl CertificateGenerator for FileCertificates {
    async fn generate(
        &self,
        name: &str,
        event_title: &str,
        position: Position,
    ) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self
            .dir
            .join(format!("{}-{}.txt", file_stem(name), nanoid!()));
        let today = chrono::Local::now().date_naive();
        tokio::fs::write(&path, render(name, event_title, position, today)).await?;

        Ok(path)
    }
}

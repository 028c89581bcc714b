//! Outbound mail, delivered through an HTTP relay.
//!
//! Delivery failure is surfaced to the caller; writes that caused the mail
//! (signup, reset request) roll back instead of swallowing the error.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_token: String,
    pub sender: String,
    pub timeout_secs: u64,
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("MAIL_API_URL").unwrap_or_default(),
            api_token: std::env::var("MAIL_API_TOKEN").unwrap_or_default(),
            sender: std::env::var("MAIL_SENDER")
                .unwrap_or_else(|_| "no-reply@vetcare.local".to_string()),
            timeout_secs: std::env::var("MAIL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail relay rejected the message: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError>;
}

pub struct HttpMailer {
    http: reqwest::Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError> {
        if self.config.api_url.is_empty() {
            return Err(MailerError::Rejected("mail relay is not configured".into()));
        }

        let payload = serde_json::json!({
            "from": self.config.sender,
            "to": to,
            "subject": subject,
            "text": body,
        });

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(MailerError::Rejected(format!("{status}: {detail}")));
        }

        Ok(())
    }
}

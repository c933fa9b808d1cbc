use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use shared_config::{AppConfig, MailBackend};

use crate::{EmailMessage, NotificationError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError>;
}

pub fn mailer_from_config(config: &AppConfig) -> Arc<dyn Mailer> {
    match config.mail_backend {
        MailBackend::Console => Arc::new(ConsoleMailer),
        MailBackend::Http => Arc::new(HttpMailer::new(&config.mail_api_url, &config.mail_api_key)),
    }
}

/// Writes mail to the log instead of delivering it.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        info!(
            from = %message.from,
            to = ?message.to,
            subject = %message.subject,
            "Outgoing email\n{}",
            message.text_body
        );
        Ok(())
    }
}

/// Delivers mail through a JSON relay endpoint.
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        if self.api_url.is_empty() {
            return Err(NotificationError::MailError("Mail API URL is not configured".to_string()));
        }

        debug!("Posting email '{}' to {}", message.subject, self.api_url);

        let mut request = self.client.post(&self.api_url).json(&json!({
            "from": message.from,
            "to": message.to,
            "subject": message.subject,
            "text": message.text_body,
            "html": message.html_body,
        }));

        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Mail API error ({}): {}", status, body);
            return Err(NotificationError::MailError(format!("Mail API returned {}: {}", status, body)));
        }

        Ok(())
    }
}

/// Keeps every message in memory. Used by tests and local tooling.
#[derive(Default, Clone)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.lock().await.clone()
    }

    pub async fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .await
            .iter()
            .filter(|m| m.to.iter().any(|to| to == address))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        self.outbox.lock().await.push(message);
        Ok(())
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email service is unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Email service rejected the message: {0}")]
    Rejected(String),
}

/// A templated message for the email dispatch service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplatedEmail {
    pub template: String,
    pub to: String,
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DispatchRes {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: TemplatedEmail) -> Result<(), EmailError>;
}

/// Posts to the templating email service.
pub struct HttpMailer {
    client: Client,
    url: String,
}

impl HttpMailer {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: TemplatedEmail) -> Result<(), EmailError> {
        let res: DispatchRes = self
            .client
            .post(&self.url)
            .json(&email)
            .send()
            .await?
            .json()
            .await?;

        if !res.success {
            return Err(EmailError::Rejected(
                res.error.unwrap_or_else(|| "unknown error".into()),
            ));
        }

        debug!(template = %email.template, "Email dispatched");
        Ok(())
    }
}

//! Outbound email, behind a trait so tests and keyless dev setups never hit
//! the network.

use async_trait::async_trait;
use serde_json::json;

use crate::config::EmailConfig;

const DEFAULT_FROM: &str = "Idea Board <onboarding@resend.dev>";
const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_code(&self, to: &str, code: &str) -> anyhow::Result<()>;
}

/// Build the mailer the config calls for: the real provider when an API key
/// is present, otherwise a logger.
pub fn from_config(config: &EmailConfig) -> Box<dyn Mailer> {
    match &config.api_key {
        Some(key) => Box::new(ResendMailer::new(
            key.clone(),
            config.from.clone().unwrap_or_else(|| DEFAULT_FROM.to_string()),
        )),
        None => {
            tracing::warn!("No email API key configured; login codes will be logged, not sent");
            Box::new(LogMailer)
        }
    }
}

/// Sends through the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        let body = json!({
            "from": self.from,
            "to": [to],
            "subject": "Your Verification Code",
            "html": format!(
                "<p>Your verification code is: <strong>{}</strong></p>\
                 <p>It will expire in 10 minutes.</p>",
                code
            ),
        });

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("email provider returned {}: {}", status, text);
        }
        Ok(())
    }
}

/// Development mailer: logs the code instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        tracing::info!(to, code, "Login code (email delivery disabled)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        assert!(LogMailer.send_code("user@x.com", "123456").await.is_ok());
    }

    #[test]
    fn from_config_without_key_is_log_mailer() {
        // Just verify it constructs; the choice is logged.
        let mailer = from_config(&EmailConfig::default());
        drop(mailer);
    }
}

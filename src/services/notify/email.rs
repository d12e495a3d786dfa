use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::Notifier;

/// Transactional email over Resend's HTTP API.
pub struct ResendEmailProvider {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl ResendEmailProvider {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for ResendEmailProvider {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let payload = json!({
            "from": self.from,
            "to": [to],
            "subject": subject,
            "text": body,
        });

        self.client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("failed to send email")?
            .error_for_status()
            .context("email API returned error")?;

        Ok(())
    }
}

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

use super::{Email, Mailer};

const API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct SendGridMailer {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl SendGridMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        let attachments: Vec<serde_json::Value> = email
            .attachments
            .iter()
            .map(|a| {
                json!({
                    "content": base64::engine::general_purpose::STANDARD.encode(&a.content),
                    "type": a.content_type,
                    "filename": a.filename,
                    "disposition": "attachment",
                })
            })
            .collect();

        let mut body = json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.from },
            "subject": email.subject,
            "content": [{ "type": "text/plain", "value": email.body }],
        });
        if !attachments.is_empty() {
            body["attachments"] = json!(attachments);
        }

        self.client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call SendGrid API")?
            .error_for_status()
            .context("SendGrid API returned error")?;

        Ok(())
    }
}

/// Transactional email
///
/// Three messages are sent: the address verification link after
/// registration, the password-reset link, and the project invite. Sending is
/// best effort: callers log a [`MailError`] and carry on.
///
/// [`HttpMailer`] posts to a JSON email API (`{from, to, subject, html}`
/// with a bearer key). [`LogMailer`] is used when no key is configured and
/// only writes the message to the log, which is what local development and
/// tests want.

pub mod templates;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Default provider endpoint
pub const DEFAULT_API_URL: &str = "https://api.resend.com/emails";

pub const DEFAULT_FROM: &str = "ProjeXY <no-reply@projexy.app>";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Failed to build mail client: {0}")]
    Client(String),

    #[error("Mail request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Mail provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl EmailMessage {
    pub fn verification(to: &str, base_url: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Verify Your Email Address for ProjeXY".to_string(),
            html: templates::render_verification(&verification_url(base_url, token)),
        }
    }

    pub fn password_reset(to: &str, base_url: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your ProjeXY password".to_string(),
            html: templates::render_password_reset(&reset_url(base_url, token)),
        }
    }

    pub fn invite(to: &str, base_url: &str, inviter_name: &str, project_name: &str, project_id: Uuid) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("You've been invited to the project: {}", project_name),
            html: templates::render_invite(inviter_name, project_name, &project_url(base_url, project_id)),
        }
    }
}

pub fn verification_url(base_url: &str, token: &str) -> String {
    format!("{}/verify-email/{}", base_url.trim_end_matches('/'), token)
}

pub fn reset_url(base_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={}", base_url.trim_end_matches('/'), token)
}

pub fn project_url(base_url: &str, project_id: Uuid) -> String {
    format!("{}/projects/{}", base_url.trim_end_matches('/'), project_id)
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MailError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let body = ProviderRequest {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(512)
                .collect();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(subject = %message.subject, "Email sent");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            html = %message.html,
            "Email delivery disabled, message logged"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_builders() {
        assert_eq!(
            verification_url("http://localhost:3000/", "abc"),
            "http://localhost:3000/verify-email/abc"
        );
        assert_eq!(
            reset_url("https://projexy.app", "abc"),
            "https://projexy.app/reset-password?token=abc"
        );

        let id = Uuid::nil();
        assert_eq!(
            project_url("https://projexy.app", id),
            "https://projexy.app/projects/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_verification_message() {
        let message = EmailMessage::verification("ada@example.com", "https://projexy.app", "tok123");
        assert_eq!(message.to, "ada@example.com");
        assert!(message.html.contains("https://projexy.app/verify-email/tok123"));
    }

    #[test]
    fn test_invite_message() {
        let id = Uuid::new_v4();
        let message = EmailMessage::invite("bob@example.com", "https://projexy.app", "Ada", "Apollo", id);
        assert_eq!(message.subject, "You've been invited to the project: Apollo");
        assert!(message.html.contains(&format!("/projects/{}", id)));
        assert!(message.html.contains("Ada"));
    }

    #[test]
    fn test_provider_request_shape() {
        let body = serde_json::to_value(ProviderRequest {
            from: DEFAULT_FROM,
            to: ["a@b.c"],
            subject: "s",
            html: "<p>h</p>",
        })
        .unwrap();

        assert_eq!(body["to"][0], "a@b.c");
        assert_eq!(body["from"], DEFAULT_FROM);
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        let message = EmailMessage::password_reset("a@b.c", "http://localhost:3000", "tok");
        assert!(LogMailer.send(message).await.is_ok());
    }
}

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SmtpConfig;

/// Outbound notification of a freshly provisioned credential.
#[async_trait]
pub trait CredentialMailer: Send + Sync {
    async fn send_credential_email(
        &self,
        to_email: &str,
        plaintext_password: &str,
    ) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, anyhow::Error> {
        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let mailer = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| anyhow::anyhow!("Invalid SMTP relay {}: {}", config.host, e))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, port = config.port, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: String,
        html_body: String,
    ) -> Result<(), anyhow::Error> {
        let email = Message::builder()
            .from(self.from_email.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        // SmtpTransport is blocking.
        let mailer = self.mailer.clone();
        let response = tokio::task::spawn_blocking(move || mailer.send(&email)).await??;

        tracing::info!(
            to = %to_email,
            subject = %subject,
            code = %response.code(),
            "Email sent"
        );
        Ok(())
    }
}

#[async_trait]
impl CredentialMailer for EmailService {
    async fn send_credential_email(
        &self,
        to_email: &str,
        plaintext_password: &str,
    ) -> Result<(), anyhow::Error> {
        let html_body = format!(
            r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Your application has been approved</h2>
        <p>Your temporary password is:</p>
        <p style="font-family: monospace; font-size: 16px;">{}</p>
        <p>Please change it after your first sign-in.</p>
    </body>
</html>
"###,
            html_escape(plaintext_password)
        );

        let plain_body = format!(
            "Your application has been approved.\n\nYour temporary password is: {}\n\nPlease change it after your first sign-in.",
            plaintext_password
        );

        self.send_email(
            to_email,
            "Your application has been approved",
            plain_body,
            html_body,
        )
        .await
    }
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Records sends instead of delivering them.
#[derive(Clone, Default)]
pub struct MockEmailService {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(recipient, password)` of every attempted send, in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CredentialMailer for MockEmailService {
    async fn send_credential_email(
        &self,
        to_email: &str,
        plaintext_password: &str,
    ) -> Result<(), anyhow::Error> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((to_email.to_string(), plaintext_password.to_string()));
        if self.fail {
            anyhow::bail!("SMTP relay refused connection");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_email_service_creation() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: "mailer@example.com".to_string(),
            password: SecretString::new("app-password".to_string()),
            from: "noreply@example.com".to_string(),
        };

        assert!(EmailService::new(&config).is_ok());
    }

    #[test]
    fn password_is_escaped_in_html() {
        assert_eq!(html_escape("a<b>&\""), "a&lt;b&gt;&amp;&quot;");
    }

    #[tokio::test]
    async fn mock_records_attempts_even_when_failing() {
        let mailer = MockEmailService::failing();
        assert!(mailer
            .send_credential_email("a@x.com", "secret")
            .await
            .is_err());
        assert_eq!(mailer.sent(), vec![("a@x.com".to_string(), "secret".to_string())]);
    }
}

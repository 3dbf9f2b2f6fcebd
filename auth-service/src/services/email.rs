//! Outbound email is an external collaborator. The service only hands over links.

use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Mutex;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_activation_email(
        &self,
        to_email: &str,
        activation_link: &str,
    ) -> Result<(), AppError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_link: &str,
    ) -> Result<(), AppError>;
}

/// Records that a message was due. Links carry secrets and are never logged.
#[derive(Clone, Default)]
pub struct LogEmailProvider;

#[async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send_activation_email(
        &self,
        to_email: &str,
        _activation_link: &str,
    ) -> Result<(), AppError> {
        tracing::info!(to = %to_email, kind = "activation", "Email delivery delegated");
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        _reset_link: &str,
    ) -> Result<(), AppError> {
        tracing::info!(to = %to_email, kind = "password_reset", "Email delivery delegated");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Activation,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub kind: EmailKind,
    pub link: String,
}

/// Captures every message so tests can follow the links.
#[derive(Default)]
pub struct MockEmailService {
    sent: Mutex<Vec<SentEmail>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Most recent link of `kind` sent to `to`.
    pub fn last_link(&self, to: &str, kind: EmailKind) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.to == to && m.kind == kind)
            .map(|m| m.link)
    }

    fn record(&self, to: &str, kind: EmailKind, link: &str) -> Result<(), AppError> {
        self.sent
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock mailbox poisoned: {}", e)))?
            .push(SentEmail {
                to: to.to_string(),
                kind,
                link: link.to_string(),
            });
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_activation_email(
        &self,
        to_email: &str,
        activation_link: &str,
    ) -> Result<(), AppError> {
        self.record(to_email, EmailKind::Activation, activation_link)
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_link: &str,
    ) -> Result<(), AppError> {
        self.record(to_email, EmailKind::PasswordReset, reset_link)
    }
}

/// Extracts the `token` query parameter from a link.
pub fn token_from_link(link: &str) -> Option<&str> {
    link.split_once("token=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_captures_latest_link() {
        let mock = MockEmailService::new();
        mock.send_password_reset_email("a@x.com", "http://app/reset-password?token=one")
            .await
            .unwrap();
        mock.send_password_reset_email("a@x.com", "http://app/reset-password?token=two")
            .await
            .unwrap();

        let link = mock.last_link("a@x.com", EmailKind::PasswordReset).unwrap();
        assert_eq!(token_from_link(&link), Some("two"));
        assert!(mock.last_link("a@x.com", EmailKind::Activation).is_none());
    }

    #[test]
    fn token_is_read_from_query() {
        assert_eq!(token_from_link("http://x/activate?token=abc&x=1"), Some("abc"));
        assert_eq!(token_from_link("http://x/activate"), None);
    }
}

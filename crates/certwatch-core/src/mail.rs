//! Mail boundary for the health-check email.
//!
//! Delivery is delegated to a [`MailTransport`]. [`HttpRelayTransport`]
//! hands messages to an HTTP mail relay that owns the SMTP session;
//! [`crate::fakes::RecordingTransport`] captures them in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregator::AggregateReport;
use crate::error::{ConfigError, MailError};
use crate::report::{render_health_email, HealthEmail};

/// Sender, recipients and relay credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailConfig {
    /// HTTP relay endpoint that accepts JSON messages.
    pub relay_url: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub from: String,
    pub to: Vec<String>,
}

impl MailConfig {
    /// Read `MAIL_RELAY_URL`, `SMTP_USER`, `SMTP_PASS`, `MAIL_FROM` and
    /// `MAIL_TO` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        let relay_url = required("MAIL_RELAY_URL")?.trim().to_string();
        let user = required("SMTP_USER")?;
        let pass = required("SMTP_PASS")?;
        let from = required("MAIL_FROM")?;
        let to: Vec<String> = required("MAIL_TO")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if to.is_empty() {
            return Err(ConfigError::MissingVar("MAIL_TO".to_string()));
        }

        Ok(Self {
            relay_url,
            user,
            pass,
            from,
            to,
        })
    }
}

/// A rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

impl MailMessage {
    pub fn new(config: &MailConfig, email: HealthEmail) -> Self {
        Self {
            from: config.from.clone(),
            to: config.to.clone(),
            subject: email.subject,
            html: email.html,
        }
    }
}

/// Outbound "send message" boundary.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Posts messages as JSON to an HTTP mail relay.
pub struct HttpRelayTransport {
    endpoint: String,
    user: String,
    pass: String,
    http_client: reqwest::Client,
}

impl HttpRelayTransport {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("certwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(Self {
            endpoint: config.relay_url.clone(),
            user: config.user.clone(),
            pass: config.pass.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl MailTransport for HttpRelayTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .basic_auth(&self.user, Some(&self.pass))
            .json(message)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Render the health-check email for `report` and send it.
pub async fn send_health_report(
    transport: &dyn MailTransport,
    config: &MailConfig,
    report: &AggregateReport,
) -> Result<MailMessage, MailError> {
    let message = MailMessage::new(config, render_health_email(report));
    transport.send(&message).await?;
    info!(
        event = "report.mailed",
        recipients = message.to.len(),
        subject = %message.subject,
    );
    Ok(message)
}

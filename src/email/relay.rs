use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::{Error, Result};

/// Parameters handed to the relay's template
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct RelayPayload {
    pub to_email: String,
    pub to_name: String,
    pub from_name: String,
    pub from_email: String,
    pub subject: String,
    pub message: String,
    pub hotel: String,
    pub contact: String,
    pub purpose: String,
    pub notes: String,
    #[serde(rename = "followDate")]
    pub follow_date: String,
}

/// Delivers a composed email. Returns the relay's message id.
pub trait EmailRelay: Send + Sync {
    fn send(
        &self,
        service_id: &str,
        template_id: &str,
        payload: &RelayPayload,
        credential: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: &'a RelayPayload,
}

/// Posts to a hosted template-email endpoint.
pub struct HttpRelay {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRelay {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Relay(e.to_string()))?;
        Ok(Self { client, endpoint: config.endpoint.clone() })
    }
}

impl EmailRelay for HttpRelay {
    async fn send(
        &self,
        service_id: &str,
        template_id: &str,
        payload: &RelayPayload,
        credential: &str,
    ) -> Result<String> {
        let request = SendRequest { service_id, template_id, user_id: credential, template_params: payload };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Relay(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Relay(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Relay(format!("HTTP error: {} {}", status, text.trim())));
        }

        // The hosted relay answers with a bare status text; fall back to a local id
        let message_id = match text.trim() {
            "" => Uuid::new_v4().to_string(),
            body => body.to_string(),
        };
        Ok(message_id)
    }
}

/// Logs the email instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct DryRunRelay;

impl EmailRelay for DryRunRelay {
    async fn send(
        &self,
        _service_id: &str,
        template_id: &str,
        payload: &RelayPayload,
        _credential: &str,
    ) -> Result<String> {
        let message_id = Uuid::new_v4().to_string();
        info!(
            to = %payload.to_email,
            subject = %payload.subject,
            template = template_id,
            message_id = %message_id,
            "[DRY RUN] Email not sent"
        );
        Ok(message_id)
    }
}

/// Either relay, chosen from config at startup
pub enum ConfiguredRelay {
    Http(HttpRelay),
    DryRun(DryRunRelay),
}

impl ConfiguredRelay {
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        if config.dry_run {
            Ok(ConfiguredRelay::DryRun(DryRunRelay))
        } else {
            Ok(ConfiguredRelay::Http(HttpRelay::new(config)?))
        }
    }
}

impl EmailRelay for ConfiguredRelay {
    async fn send(
        &self,
        service_id: &str,
        template_id: &str,
        payload: &RelayPayload,
        credential: &str,
    ) -> Result<String> {
        match self {
            ConfiguredRelay::Http(relay) => relay.send(service_id, template_id, payload, credential).await,
            ConfiguredRelay::DryRun(relay) => relay.send(service_id, template_id, payload, credential).await,
        }
    }
}

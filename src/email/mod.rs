//! Templated business email: composition, delivery through a relay and a
//! bounded send log.

pub mod relay;
pub mod template;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{RelayConfig, SenderConfig};
use crate::error::Result;
use crate::load_json;
use crate::model::VisitRecord;
use crate::storage::{KvStore, KEY_EMAIL_HISTORY, KEY_EMAIL_TEMPLATES};

use self::relay::{EmailRelay, RelayPayload};
use self::template::{
    default_templates, render, EmailTemplate, PlaceholderPolicy, TemplateField, TemplateFields, TemplateKind,
};

pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedEmail {
    pub kind: TemplateKind,
    pub to_email: Option<String>,
    pub to_name: Option<String>,
    pub subject: String,
    pub body: String,
    /// Values the email was rendered from; forwarded to the relay
    pub fields: TemplateFields,
}

/// Result of a send attempt. Failures are reported here, never raised.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SendOutcome {
    fn sent(message_id: String) -> Self {
        Self { success: true, message_id: Some(message_id), error: None, timestamp: Utc::now() }
    }

    fn failed(error: impl ToString) -> Self {
        Self { success: false, message_id: None, error: Some(error.to_string()), timestamp: Utc::now() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub to: String,
    pub subject: String,
    pub hotel: String,
    pub status: String,
    pub message_id: String,
}

pub struct EmailManager<R> {
    store: Arc<dyn KvStore>,
    relay: R,
    relay_config: RelayConfig,
    sender: SenderConfig,
    templates: BTreeMap<TemplateKind, EmailTemplate>,
    policy: PlaceholderPolicy,
}

impl<R: EmailRelay> EmailManager<R> {
    /// Loads the built-in templates overlaid with any saved edits.
    pub fn new(store: Arc<dyn KvStore>, relay: R, relay_config: RelayConfig, sender: SenderConfig) -> Result<Self> {
        let mut templates = default_templates();
        let saved: Option<BTreeMap<TemplateKind, EmailTemplate>> = load_json(store.as_ref(), KEY_EMAIL_TEMPLATES)?;
        if let Some(saved) = saved {
            info!("Loaded {} customised email templates", saved.len());
            templates.extend(saved);
        }

        Ok(Self { store, relay, relay_config, sender, templates, policy: PlaceholderPolicy::default() })
    }

    pub fn with_policy(mut self, policy: PlaceholderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn template(&self, kind: TemplateKind) -> Option<&EmailTemplate> {
        self.templates.get(&kind)
    }

    /// Renders a template for a visit. `fields` override what the visit supplies.
    pub fn compose(&self, kind: TemplateKind, visit: &VisitRecord, fields: &TemplateFields) -> Result<ComposedEmail> {
        let template = self
            .templates
            .get(&kind)
            .ok_or_else(|| template::TemplateError::UnknownTemplate(kind.to_string()))?;
        let fields = TemplateFields::from_visit(visit).merged(fields);

        let subject = render(&template.subject, &fields, self.policy)?;
        let mut body = render(&template.body, &fields, self.policy)?;
        body.push_str(&format!("\n{}\n{}", self.sender.name, self.sender.email));

        Ok(ComposedEmail {
            kind,
            to_email: visit.contact_email.clone(),
            to_name: visit.contact_person.clone(),
            subject,
            body,
            fields,
        })
    }

    /// Delivers a composed email. No retry; the outcome says what happened.
    pub async fn send(&self, email: &ComposedEmail) -> SendOutcome {
        let Some(to_email) = email.to_email.clone().filter(|addr| !addr.trim().is_empty()) else {
            return SendOutcome::failed("no recipient address");
        };

        let field = |f: TemplateField| email.fields.get(f).unwrap_or_default().to_string();
        let payload = RelayPayload {
            to_email,
            to_name: email.to_name.clone().unwrap_or_default(),
            from_name: self.sender.name.clone(),
            from_email: self.sender.email.clone(),
            subject: email.subject.clone(),
            message: email.body.clone(),
            hotel: field(TemplateField::Hotel),
            contact: field(TemplateField::Contact),
            purpose: field(TemplateField::Purpose),
            notes: field(TemplateField::Notes),
            follow_date: field(TemplateField::FollowDate),
        };

        let result = self
            .relay
            .send(
                &self.relay_config.service_id,
                &self.relay_config.template_id,
                &payload,
                &self.relay_config.user_key,
            )
            .await;

        match result {
            Ok(message_id) => {
                if let Err(e) = self.log_sent(&payload, &message_id) {
                    warn!("Email sent but not logged: {}", e);
                }
                info!(to = %payload.to_email, kind = %email.kind, "Email sent");
                SendOutcome::sent(message_id)
            }
            Err(e) => {
                error!("Email sending failed: {}", e);
                SendOutcome::failed(e)
            }
        }
    }

    /// Composes and sends in one step; composition errors become a failed outcome.
    pub async fn send_template(&self, kind: TemplateKind, visit: &VisitRecord, fields: &TemplateFields) -> SendOutcome {
        match self.compose(kind, visit, fields) {
            Ok(email) => self.send(&email).await,
            Err(e) => SendOutcome::failed(e),
        }
    }

    /// Oldest first, at most [`HISTORY_LIMIT`] entries.
    pub fn history(&self) -> Result<Vec<EmailLogEntry>> {
        Ok(load_json(self.store.as_ref(), KEY_EMAIL_HISTORY)?.unwrap_or_default())
    }

    /// Replaces a template and persists the full template set.
    pub fn edit_template(&mut self, kind: TemplateKind, template: EmailTemplate) -> Result<()> {
        self.templates.insert(kind, template);
        self.store.set(KEY_EMAIL_TEMPLATES, &serde_json::to_string(&self.templates)?)?;
        Ok(())
    }

    fn log_sent(&self, payload: &RelayPayload, message_id: &str) -> Result<()> {
        let mut log = self.history()?;
        log.push(EmailLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            to: payload.to_email.clone(),
            subject: payload.subject.clone(),
            hotel: payload.hotel.clone(),
            status: "sent".to_string(),
            message_id: message_id.to_string(),
        });
        if log.len() > HISTORY_LIMIT {
            log.drain(..log.len() - HISTORY_LIMIT);
        }
        self.store.set(KEY_EMAIL_HISTORY, &serde_json::to_string(&log)?)?;
        Ok(())
    }
}

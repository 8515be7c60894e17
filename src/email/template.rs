use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::VisitRecord;

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum TemplateKind {
    FollowUp,
    ThankYou,
    ServiceProposal,
    MeetingRequest,
    ContractRenewal,
    Custom,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 6] = [
        TemplateKind::FollowUp,
        TemplateKind::ThankYou,
        TemplateKind::ServiceProposal,
        TemplateKind::MeetingRequest,
        TemplateKind::ContractRenewal,
        TemplateKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::FollowUp => "followUp",
            TemplateKind::ThankYou => "thankYou",
            TemplateKind::ServiceProposal => "serviceProposal",
            TemplateKind::MeetingRequest => "meetingRequest",
            TemplateKind::ContractRenewal => "contractRenewal",
            TemplateKind::Custom => "custom",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TemplateError::UnknownTemplate(s.to_string()))
    }
}

/// Fields a template may reference. Anything else in braces is an unknown
/// placeholder and handled per [`PlaceholderPolicy`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum TemplateField {
    Hotel,
    Contact,
    Purpose,
    Notes,
    FollowDate,
    FollowUpAction,
    ServiceProposal,
    Timeline,
    ExpectedResults,
    ProposalDate,
    ServiceDetails,
    ProposedValue,
    #[serde(rename = "expectedROI")]
    ExpectedRoi,
    SatisfactionIncrease,
    RevenueGenerated,
    ServicesCount,
    RenewalProposal,
    CustomMessage,
}

impl TemplateField {
    pub const ALL: [TemplateField; 18] = [
        TemplateField::Hotel,
        TemplateField::Contact,
        TemplateField::Purpose,
        TemplateField::Notes,
        TemplateField::FollowDate,
        TemplateField::FollowUpAction,
        TemplateField::ServiceProposal,
        TemplateField::Timeline,
        TemplateField::ExpectedResults,
        TemplateField::ProposalDate,
        TemplateField::ServiceDetails,
        TemplateField::ProposedValue,
        TemplateField::ExpectedRoi,
        TemplateField::SatisfactionIncrease,
        TemplateField::RevenueGenerated,
        TemplateField::ServicesCount,
        TemplateField::RenewalProposal,
        TemplateField::CustomMessage,
    ];

    /// Name used inside `{...}`
    pub fn key(&self) -> &'static str {
        match self {
            TemplateField::Hotel => "hotel",
            TemplateField::Contact => "contact",
            TemplateField::Purpose => "purpose",
            TemplateField::Notes => "notes",
            TemplateField::FollowDate => "followDate",
            TemplateField::FollowUpAction => "followUpAction",
            TemplateField::ServiceProposal => "serviceProposal",
            TemplateField::Timeline => "timeline",
            TemplateField::ExpectedResults => "expectedResults",
            TemplateField::ProposalDate => "proposalDate",
            TemplateField::ServiceDetails => "serviceDetails",
            TemplateField::ProposedValue => "proposedValue",
            TemplateField::ExpectedRoi => "expectedROI",
            TemplateField::SatisfactionIncrease => "satisfactionIncrease",
            TemplateField::RevenueGenerated => "revenueGenerated",
            TemplateField::ServicesCount => "servicesCount",
            TemplateField::RenewalProposal => "renewalProposal",
            TemplateField::CustomMessage => "customMessage",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        TemplateField::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// Values for template placeholders
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateFields(BTreeMap<TemplateField, String>);

impl TemplateFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fields a visit can fill on its own
    pub fn from_visit(visit: &VisitRecord) -> Self {
        let mut fields = Self::new();
        let pairs = [
            (TemplateField::Hotel, &visit.hotel_name),
            (TemplateField::Contact, &visit.contact_person),
            (TemplateField::Purpose, &visit.purpose),
            (TemplateField::Notes, &visit.notes),
        ];
        for (field, value) in pairs {
            if let Some(value) = value {
                fields.set(field, value.clone());
            }
        }
        fields
    }

    pub fn with(mut self, field: TemplateField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: TemplateField, value: impl Into<String>) {
        self.0.insert(field, value.into());
    }

    pub fn get(&self, field: TemplateField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// Values in `other` win
    pub fn merged(mut self, other: &TemplateFields) -> Self {
        for (field, value) in &other.0 {
            self.0.insert(*field, value.clone());
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderPolicy {
    /// Unknown placeholders are removed from the output
    #[default]
    Drop,
    /// Unknown placeholders fail the render
    Reject,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
}

impl EmailTemplate {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self { subject: subject.into(), body: body.into() }
    }
}

/// Substitutes `{field}` placeholders. Braces not enclosing an identifier are
/// copied through as text.
pub fn render(text: &str, fields: &TemplateFields, policy: PlaceholderPolicy) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let closed = name_len > 0 && after[name_len..].starts_with('}');
        if !closed {
            out.push('{');
            rest = after;
            continue;
        }

        let name = &after[..name_len];
        match TemplateField::from_key(name) {
            Some(field) => out.push_str(fields.get(field).unwrap_or_default()),
            None if policy == PlaceholderPolicy::Reject => {
                return Err(TemplateError::UnknownPlaceholder(name.to_string()));
            }
            None => {}
        }
        rest = &after[name_len + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

pub fn default_templates() -> BTreeMap<TemplateKind, EmailTemplate> {
    let mut templates = BTreeMap::new();

    templates.insert(
        TemplateKind::FollowUp,
        EmailTemplate::new(
            "Follow-up: Hotel Visit - {hotel}",
            "Dear {contact},\n\n\
             Thank you for taking the time to meet with me today at {hotel}. I enjoyed our \
             discussion about {purpose} and the opportunities for collaboration.\n\n\
             Key points from our meeting:\n{notes}\n\n\
             Next Steps:\n\
             - {followUpAction}\n\
             - Follow-up meeting scheduled for: {followDate}\n\n\
             I look forward to continuing our partnership.\n\n\
             Best regards,",
        ),
    );

    templates.insert(
        TemplateKind::ThankYou,
        EmailTemplate::new(
            "Thank You - {hotel} Partnership Discussion",
            "Dear {contact},\n\n\
             Thank you for the warm welcome at {hotel} today. It was a pleasure meeting with you.\n\n\
             I'm excited about the partnership opportunities we discussed, particularly:\n\
             - {serviceProposal}\n\
             - Implementation timeline: {timeline}\n\
             - Expected outcomes: {expectedResults}\n\n\
             I'll follow up with a detailed proposal by {proposalDate} as discussed.\n\n\
             Warm regards,",
        ),
    );

    templates.insert(
        TemplateKind::ServiceProposal,
        EmailTemplate::new(
            "Service Proposal - {hotel} Partnership Opportunity",
            "Dear {contact},\n\n\
             Following our meeting at {hotel}, I'm pleased to present our service proposal.\n\n\
             Proposed Services:\n{serviceDetails}\n\n\
             Investment: {proposedValue}\n\
             Implementation: {timeline}\n\
             Expected ROI: {expectedROI}\n\n\
             Please let me know your availability for a follow-up meeting.\n\n\
             Best regards,",
        ),
    );

    templates.insert(
        TemplateKind::MeetingRequest,
        EmailTemplate::new(
            "Meeting Request - {hotel} Partnership Discussion",
            "Dear {contact},\n\n\
             I'm reaching out to explore potential partnership opportunities with {hotel}.\n\n\
             I would appreciate the opportunity to meet with you to discuss:\n\
             - Customized programs for your guests\n\
             - Revenue-sharing partnership models\n\
             - Implementation strategies that align with your brand\n\n\
             Would you be available for a brief meeting next week?\n\n\
             Best regards,",
        ),
    );

    templates.insert(
        TemplateKind::ContractRenewal,
        EmailTemplate::new(
            "Partnership Renewal - {hotel} Contract Discussion",
            "Dear {contact},\n\n\
             As we approach the renewal period for our partnership agreement with {hotel}, \
             I wanted to reach out about the continued success of our collaboration.\n\n\
             Current Partnership Highlights:\n\
             - Guest satisfaction improvement: {satisfactionIncrease}%\n\
             - Additional revenue generated: £{revenueGenerated}\n\
             - Services delivered: {servicesCount} sessions\n\n\
             For the upcoming term, I'd like to propose:\n{renewalProposal}\n\n\
             Could we schedule a meeting to discuss the renewal terms?\n\n\
             Best regards,",
        ),
    );

    templates.insert(
        TemplateKind::Custom,
        EmailTemplate::new("Custom Email - {hotel}", "Dear {contact},\n\n{customMessage}\n\nBest regards,"),
    );

    templates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> TemplateFields {
        TemplateFields::new()
            .with(TemplateField::Hotel, "The Savoy")
            .with(TemplateField::Contact, "Ms. Lee")
    }

    #[test]
    fn test_render_known_fields() {
        let out = render("Dear {contact}, see you at {hotel}.", &fields(), PlaceholderPolicy::Drop).unwrap();
        assert_eq!(out, "Dear Ms. Lee, see you at The Savoy.");
    }

    #[test]
    fn test_missing_known_field_renders_empty() {
        let out = render("Date: {followDate}!", &fields(), PlaceholderPolicy::Reject).unwrap();
        assert_eq!(out, "Date: !");
    }

    #[test]
    fn test_unknown_placeholder_dropped() {
        let out = render("Hi {nickname}, {hotel}", &fields(), PlaceholderPolicy::Drop).unwrap();
        assert_eq!(out, "Hi , The Savoy");
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = render("Hi {nickname}", &fields(), PlaceholderPolicy::Reject).unwrap_err();
        assert_eq!(err, TemplateError::UnknownPlaceholder("nickname".into()));
    }

    #[test]
    fn test_stray_braces_are_text() {
        let out = render("{ not a field } {} {hotel", &fields(), PlaceholderPolicy::Reject).unwrap();
        assert_eq!(out, "{ not a field } {} {hotel");
    }

    #[test]
    fn test_defaults_use_only_known_fields() {
        for (kind, template) in default_templates() {
            assert!(render(&template.subject, &fields(), PlaceholderPolicy::Reject).is_ok(), "{}", kind);
            assert!(render(&template.body, &fields(), PlaceholderPolicy::Reject).is_ok(), "{}", kind);
        }
        assert_eq!(default_templates().len(), TemplateKind::ALL.len());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!("followUp".parse::<TemplateKind>(), Ok(TemplateKind::FollowUp));
        assert_eq!("CONTRACTRENEWAL".parse::<TemplateKind>(), Ok(TemplateKind::ContractRenewal));
        assert!("newsletter".parse::<TemplateKind>().is_err());
        assert_eq!(TemplateField::from_key("expectedROI"), Some(TemplateField::ExpectedRoi));
    }
}

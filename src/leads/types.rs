use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::scoring::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub u64);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionId(pub u64);

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Whether a lead eventually converted. `Unknown` leads are excluded from training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    #[default]
    Unknown,
    NotConverted,
    Converted,
}

impl ConversionStatus {
    pub fn label(&self) -> Option<bool> {
        match self {
            ConversionStatus::Unknown => None,
            ConversionStatus::NotConverted => Some(false),
            ConversionStatus::Converted => Some(true),
        }
    }
}

impl From<bool> for ConversionStatus {
    fn from(converted: bool) -> Self {
        if converted {
            ConversionStatus::Converted
        } else {
            ConversionStatus::NotConverted
        }
    }
}

/// Engagement counters. Each one only ever grows, and always equals the fold
/// of the lead's interaction log up to `Lead::applied_through`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Engagement {
    pub website_visits: u64,
    pub email_opens: u64,
    pub content_downloads: u64,
}

impl Engagement {
    /// Bump the counter matching `kind`. Returns false for kinds that have no counter.
    pub fn record(&mut self, kind: &InteractionKind) -> bool {
        match kind {
            InteractionKind::WebsiteVisit => self.website_visits += 1,
            InteractionKind::EmailOpen => self.email_opens += 1,
            InteractionKind::ContentDownload => self.content_downloads += 1,
            InteractionKind::Meeting | InteractionKind::Other(_) => return false,
        }
        true
    }

    /// Rebuild counters from an interaction log.
    pub fn fold<'a>(interactions: impl IntoIterator<Item = &'a Interaction>) -> Self {
        let mut engagement = Engagement::default();
        for interaction in interactions {
            engagement.record(&interaction.kind);
        }
        engagement
    }
}

/// Caller-supplied attributes for a new lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadAttributes {
    pub company_name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub company_size: Option<u64>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl LeadAttributes {
    /// Reject malformed attributes before any state is touched.
    /// Returns all problems at once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.company_name.trim().is_empty() {
            errors.push("company_name: must not be empty".to_string());
        }
        if let Some(ref industry) = self.industry {
            if industry.trim().is_empty() {
                errors.push("industry: must not be blank when given".to_string());
            }
        }
        if let Some(ref country) = self.country {
            if country.trim().is_empty() {
                errors.push("country: must not be blank when given".to_string());
            }
        }
        if let Some(ref email) = self.contact_email {
            let email = email.trim();
            match email.split_once('@') {
                Some((user, domain)) if !user.is_empty() && !domain.is_empty() => {}
                _ => errors.push(format!("contact_email: invalid address '{}'", email)),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub company_name: String,
    pub industry: Option<String>,
    pub company_size: Option<u64>,
    pub country: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub engagement: Engagement,
    pub score: f64,
    pub tier: Tier,
    #[serde(default)]
    pub conversion_status: ConversionStatus,
    /// Last log entry folded into `engagement`.
    #[serde(default)]
    pub applied_through: Option<InteractionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Build an unscored lead. Score and tier are filled in by the processor.
    pub fn new(id: LeadId, attributes: LeadAttributes, now: DateTime<Utc>) -> Self {
        Self {
            id,
            company_name: attributes.company_name.trim().to_string(),
            industry: attributes.industry.map(|s| s.trim().to_string()),
            company_size: attributes.company_size,
            country: attributes.country.map(|s| s.trim().to_string()),
            contact_email: attributes.contact_email.map(|s| s.trim().to_string()),
            engagement: Engagement::default(),
            score: 0.0,
            tier: Tier::None,
            conversion_status: ConversionStatus::Unknown,
            applied_through: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stamp a mutation, keeping `updated_at >= created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}

/// Interaction type. Types the scorer does not know are kept verbatim in
/// `Other` so the audit trail stays complete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum InteractionKind {
    WebsiteVisit,
    EmailOpen,
    ContentDownload,
    Meeting,
    Other(String),
}

impl InteractionKind {
    pub fn as_str(&self) -> &str {
        match self {
            InteractionKind::WebsiteVisit => "website_visit",
            InteractionKind::EmailOpen => "email_open",
            InteractionKind::ContentDownload => "content_download",
            InteractionKind::Meeting => "meeting",
            InteractionKind::Other(raw) => raw,
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "website_visit" | "website_visits" | "visit" => InteractionKind::WebsiteVisit,
            "email_open" | "email_opens" | "open" => InteractionKind::EmailOpen,
            "content_download" | "content_downloads" | "download" => {
                InteractionKind::ContentDownload
            }
            "meeting" => InteractionKind::Meeting,
            _ => InteractionKind::Other(s.trim().to_string()),
        })
    }
}

impl From<String> for InteractionKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<InteractionKind> for String {
    fn from(kind: InteractionKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub lead_id: LeadId,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub details: Option<String>,
}

/// An interaction before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub lead_id: LeadId,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
    pub details: Option<String>,
}

pub mod templates;

pub use templates::{validate_catalog, EmailTemplate, RenderedMessage, TemplateCatalog};

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{LeadError, Result};
use crate::leads::{Lead, LeadId};
use crate::scoring::{TierTemplates, Transition};

/// A request for the notification collaborator to send one templated message.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub lead_id: LeadId,
    pub template_key: String,
    pub substitution_data: BTreeMap<String, String>,
}

impl ActionRequest {
    /// Build the request for a transition: template chosen by destination tier.
    pub fn for_transition(transition: &Transition, lead: &Lead, templates: &TierTemplates) -> Self {
        let mut data = BTreeMap::new();
        data.insert("lead_id".to_string(), lead.id.to_string());
        data.insert("company_name".to_string(), lead.company_name.clone());
        data.insert("tier".to_string(), transition.to.to_string());
        data.insert("previous_tier".to_string(), transition.from.to_string());
        data.insert("score".to_string(), format!("{:.1}", transition.score));
        if let Some(ref email) = lead.contact_email {
            data.insert("contact_email".to_string(), email.clone());
        }
        if let Some(ref industry) = lead.industry {
            data.insert("industry".to_string(), industry.clone());
        }
        if let Some(ref country) = lead.country {
            data.insert("country".to_string(), country.clone());
        }

        Self {
            lead_id: lead.id,
            template_key: templates.for_tier(transition.to).to_string(),
            substitution_data: data,
        }
    }
}

/// External notification collaborator (email, CRM task, ...).
///
/// Called off the async runtime, so implementations may block.
pub trait Notifier: Send + Sync {
    fn send(&self, request: &ActionRequest) -> Result<()>;
}

/// Renders the catalog template and logs the message instead of delivering it.
pub struct LogNotifier {
    catalog: TemplateCatalog,
}

impl LogNotifier {
    pub fn new(catalog: TemplateCatalog) -> Self {
        Self { catalog }
    }
}

impl Notifier for LogNotifier {
    fn send(&self, request: &ActionRequest) -> Result<()> {
        let message = self
            .catalog
            .render(&request.template_key, &request.substitution_data)
            .ok_or_else(|| {
                LeadError::dispatch(format!("unknown template '{}'", request.template_key))
            })?;
        let recipient = request
            .substitution_data
            .get("contact_email")
            .ok_or_else(|| LeadError::dispatch(format!("lead {} has no contact email", request.lead_id)))?;

        info!(
            lead_id = %request.lead_id,
            template = %message.template_id,
            "Email would be sent to {}: {}",
            recipient,
            message.subject
        );
        Ok(())
    }
}

/// Sends action requests without blocking the scoring path.
///
/// Each send runs on the blocking pool. A failed send is logged and dropped;
/// it never reaches the caller that produced the transition.
pub struct ActionDispatcher {
    notifier: Arc<dyn Notifier>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl ActionDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Fire and forget. Must be called from within a tokio runtime.
    pub fn dispatch(&self, request: ActionRequest) {
        debug!(lead_id = %request.lead_id, template = %request.template_key, "Dispatching action");
        let notifier = Arc::clone(&self.notifier);
        let handle = tokio::task::spawn_blocking(move || {
            match notifier.send(&request) {
                Ok(()) => debug!(lead_id = %request.lead_id, "Action delivered"),
                Err(e) => warn!(
                    lead_id = %request.lead_id,
                    template = %request.template_key,
                    "Action dispatch failed: {}",
                    e
                ),
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for every send started so far.
    pub async fn drain(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.pending.lock());
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!("Dispatch task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every request it is asked to send.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<ActionRequest>>,
    }

    impl RecordingNotifier {
        pub fn sent(&self) -> Vec<ActionRequest> {
            self.sent.lock().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, request: &ActionRequest) -> Result<()> {
            self.sent.lock().push(request.clone());
            Ok(())
        }
    }

    pub struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn send(&self, _request: &ActionRequest) -> Result<()> {
            Err(LeadError::dispatch("smtp unreachable"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingNotifier, RecordingNotifier};
    use super::*;
    use crate::leads::LeadAttributes;
    use crate::scoring::Tier;
    use chrono::Utc;

    fn lead(email: Option<&str>) -> Lead {
        Lead::new(
            LeadId(3),
            LeadAttributes {
                company_name: "Hooli".to_string(),
                company_size: Some(800),
                industry: Some("Software".to_string()),
                contact_email: email.map(str::to_string),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn transition(from: Tier, to: Tier) -> Transition {
        Transition {
            lead_id: LeadId(3),
            from,
            to,
            interaction_id: None,
            score: 82.0,
        }
    }

    #[test]
    fn test_request_uses_destination_tier_template() {
        let templates = TierTemplates::default();
        let cases = [
            (Tier::None, "welcome"),
            (Tier::Low, "nurture"),
            (Tier::Medium, "follow_up"),
            (Tier::High, "meeting_request"),
        ];
        for (to, expected) in cases {
            let request = ActionRequest::for_transition(&transition(Tier::Low, to), &lead(None), &templates);
            assert_eq!(request.template_key, expected);
        }
    }

    #[test]
    fn test_request_substitution_data() {
        let request = ActionRequest::for_transition(
            &transition(Tier::Low, Tier::High),
            &lead(Some("cto@hooli.example")),
            &TierTemplates::default(),
        );
        let data = &request.substitution_data;
        assert_eq!(data["company_name"], "Hooli");
        assert_eq!(data["previous_tier"], "low");
        assert_eq!(data["tier"], "high");
        assert_eq!(data["score"], "82.0");
        assert_eq!(data["contact_email"], "cto@hooli.example");
        assert_eq!(data["industry"], "Software");
        assert!(!data.contains_key("country"));
    }

    #[test]
    fn test_log_notifier_needs_recipient() {
        let notifier = LogNotifier::new(TemplateCatalog::default());
        let templates = TierTemplates::default();

        let with_email = ActionRequest::for_transition(
            &transition(Tier::Low, Tier::Medium),
            &lead(Some("ops@hooli.example")),
            &templates,
        );
        assert!(notifier.send(&with_email).is_ok());

        let without = ActionRequest::for_transition(&transition(Tier::Low, Tier::Medium), &lead(None), &templates);
        assert!(matches!(notifier.send(&without), Err(LeadError::Dispatch(_))));
    }

    #[tokio::test]
    async fn test_dispatch_delivers_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = ActionDispatcher::new(notifier.clone());

        let request = ActionRequest::for_transition(
            &transition(Tier::Low, Tier::High),
            &lead(None),
            &TierTemplates::default(),
        );
        dispatcher.dispatch(request.clone());
        dispatcher.drain().await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], request);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_contained() {
        let dispatcher = ActionDispatcher::new(Arc::new(FailingNotifier));
        let request = ActionRequest::for_transition(
            &transition(Tier::None, Tier::Low),
            &lead(None),
            &TierTemplates::default(),
        );
        dispatcher.dispatch(request);
        // Completes without panicking or surfacing the error
        dispatcher.drain().await;
    }
}

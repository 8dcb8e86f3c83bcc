use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scoring::{Tier, TierTemplates};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EmailTemplate {
    /// Identifier in the delivery provider
    pub template_id: String,
    pub subject: String,
    /// Body text; `{name}` placeholders are filled from the substitution data
    pub body: String,
}

/// A template rendered for one lead.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub template_id: String,
    pub subject: String,
    pub body: String,
}

/// Template key -> template.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, EmailTemplate>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        let entries = [
            (
                "welcome",
                "template_001",
                "Welcome, {company_name}",
                "Hi {company_name}, thanks for your interest. Here is where to get started.",
            ),
            (
                "follow_up",
                "template_002",
                "Following up with {company_name}",
                "Hi {company_name}, we noticed your recent activity and wanted to follow up.",
            ),
            (
                "nurture",
                "template_003",
                "Resources for {company_name}",
                "Hi {company_name}, here are a few resources we think you will find useful.",
            ),
            (
                "meeting_request",
                "template_004",
                "Time to talk, {company_name}?",
                "Hi {company_name}, it looks like a good time to talk. Can we book a meeting?",
            ),
        ];

        let templates = entries
            .into_iter()
            .map(|(key, id, subject, body)| {
                (
                    key.to_string(),
                    EmailTemplate {
                        template_id: id.to_string(),
                        subject: subject.to_string(),
                        body: body.to_string(),
                    },
                )
            })
            .collect();
        Self { templates }
    }
}

impl TemplateCatalog {
    pub fn get(&self, key: &str) -> Option<&EmailTemplate> {
        self.templates.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, template: EmailTemplate) {
        self.templates.insert(key.into(), template);
    }

    /// Fill `{name}` placeholders. Unknown placeholders are left untouched.
    pub fn render(&self, key: &str, data: &BTreeMap<String, String>) -> Option<RenderedMessage> {
        let template = self.get(key)?;
        Some(RenderedMessage {
            template_id: template.template_id.clone(),
            subject: substitute(&template.subject, data),
            body: substitute(&template.body, data),
        })
    }
}

/// Single pass over `text`; substituted values are never rescanned.
fn substitute(text: &str, data: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match tail[1..].find(['{', '}']) {
            Some(end) if tail.as_bytes()[end + 1] == b'}' => {
                let name = &tail[1..end + 1];
                match data.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&tail[..end + 2]),
                }
                rest = &tail[end + 2..];
            }
            _ => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Every tier's template key must exist in the catalog.
pub fn validate_catalog(catalog: &TemplateCatalog, mapping: &TierTemplates) -> Result<(), Vec<String>> {
    let errors: Vec<String> = Tier::ALL
        .iter()
        .filter(|tier| catalog.get(mapping.for_tier(**tier)).is_none())
        .map(|tier| {
            format!(
                "notifications.templates: no template '{}' for tier {}",
                mapping.for_tier(*tier),
                tier
            )
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_catalog_covers_default_mapping() {
        assert!(validate_catalog(&TemplateCatalog::default(), &TierTemplates::default()).is_ok());
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let catalog = TemplateCatalog::default();
        let message = catalog
            .render("meeting_request", &data(&[("company_name", "Initech")]))
            .unwrap();
        assert_eq!(message.template_id, "template_004");
        assert_eq!(message.subject, "Time to talk, Initech?");
        assert!(message.body.starts_with("Hi Initech,"));
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let mut catalog = TemplateCatalog::default();
        catalog.insert(
            "custom",
            EmailTemplate {
                template_id: "t9".to_string(),
                subject: "{company_name} / {region}".to_string(),
                body: String::new(),
            },
        );
        let message = catalog
            .render("custom", &data(&[("company_name", "Umbrella")]))
            .unwrap();
        assert_eq!(message.subject, "Umbrella / {region}");
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        let message = TemplateCatalog::default()
            .render(
                "welcome",
                &data(&[("company_name", "{score} Corp"), ("score", "82.0")]),
            )
            .unwrap();
        assert_eq!(message.subject, "Welcome, {score} Corp");
    }

    #[test]
    fn test_render_keeps_stray_braces() {
        let mut catalog = TemplateCatalog::default();
        catalog.insert(
            "braces",
            EmailTemplate {
                template_id: "t8".to_string(),
                subject: "{ {company_name}} {".to_string(),
                body: "{}".to_string(),
            },
        );
        let message = catalog
            .render("braces", &data(&[("company_name", "Acme")]))
            .unwrap();
        assert_eq!(message.subject, "{ Acme} {");
        assert_eq!(message.body, "{}");
    }

    #[test]
    fn test_render_unknown_key() {
        assert!(TemplateCatalog::default().render("missing", &BTreeMap::new()).is_none());
    }

    #[test]
    fn test_missing_mapped_template() {
        let mut mapping = TierTemplates::default();
        mapping.high = "vip_call".to_string();
        let errors = validate_catalog(&TemplateCatalog::default(), &mapping).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("vip_call"));
    }

    #[test]
    fn test_catalog_parse() {
        let yaml = r#"
welcome:
  template_id: t1
  subject: Hello
  body: "Hi {company_name}"
"#;
        let catalog: TemplateCatalog = serde_saphyr::from_str(yaml).unwrap();
        assert_eq!(catalog.get("welcome").unwrap().template_id, "t1");
        assert!(catalog.get("nurture").is_none());
    }
}

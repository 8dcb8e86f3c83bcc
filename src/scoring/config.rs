use serde::{Deserialize, Serialize};

use super::features::Feature;
use super::tier::Tier;

/// Main scoring configuration.
///
/// Loaded once at startup and treated as immutable. Changing it means building
/// a new value and swapping it in whole.
///
/// Example YAML:
/// ```yaml
/// scoring:
///   weights:
///     company_size: 0.3
///     website_visits: 0.2
///     email_opens: 0.25
///     content_downloads: 0.25
///   thresholds: { high: 80, medium: 50, low: 30 }
///   templates: { none: welcome, low: nurture, medium: follow_up, high: meeting_request }
///   features:
///     company_size: { min: 0, max: 1000 }
///     website_visits: { min: 0, max: 50 }
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// One weight per feature, must sum to 1.0
    #[serde(default)]
    pub weights: FeatureWeights,

    /// Lower bounds of the named tiers, strictly decreasing
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Template key sent when a lead moves into each tier
    #[serde(default)]
    pub templates: TierTemplates,

    /// Clip range for each raw feature before it is scaled to 0-100
    #[serde(default)]
    pub features: FeatureRanges,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeatureWeights {
    pub company_size: f64,
    pub website_visits: f64,
    pub email_opens: f64,
    pub content_downloads: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            company_size: 0.3,
            website_visits: 0.2,
            email_opens: 0.25,
            content_downloads: 0.25,
        }
    }
}

impl FeatureWeights {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::CompanySize => self.company_size,
            Feature::WebsiteVisits => self.website_visits,
            Feature::EmailOpens => self.email_opens,
            Feature::ContentDownloads => self.content_downloads,
        }
    }

    pub fn sum(&self) -> f64 {
        Feature::ALL.iter().map(|f| self.get(*f)).sum()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    pub high: f64,
    pub medium: f64,
    /// Floor of the lowest named tier. Anything below is `none`.
    pub low: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: 80.0,
            medium: 50.0,
            low: 30.0,
        }
    }
}

impl Thresholds {
    /// Named tiers with their floors, highest first.
    pub fn descending(&self) -> [(Tier, f64); 3] {
        [
            (Tier::High, self.high),
            (Tier::Medium, self.medium),
            (Tier::Low, self.low),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TierTemplates {
    pub none: String,
    pub low: String,
    pub medium: String,
    pub high: String,
}

impl Default for TierTemplates {
    fn default() -> Self {
        Self {
            none: "welcome".to_string(),
            low: "nurture".to_string(),
            medium: "follow_up".to_string(),
            high: "meeting_request".to_string(),
        }
    }
}

impl TierTemplates {
    pub fn for_tier(&self, tier: Tier) -> &str {
        match tier {
            Tier::None => &self.none,
            Tier::Low => &self.low,
            Tier::Medium => &self.medium,
            Tier::High => &self.high,
        }
    }
}

/// Inclusive clip range for one raw feature.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeatureRange {
    #[serde(default)]
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeatureRanges {
    pub company_size: FeatureRange,
    pub website_visits: FeatureRange,
    pub email_opens: FeatureRange,
    pub content_downloads: FeatureRange,
}

impl Default for FeatureRanges {
    fn default() -> Self {
        Self {
            company_size: FeatureRange::new(0.0, 1000.0),
            website_visits: FeatureRange::new(0.0, 50.0),
            email_opens: FeatureRange::new(0.0, 20.0),
            content_downloads: FeatureRange::new(0.0, 10.0),
        }
    }
}

impl FeatureRanges {
    pub fn get(&self, feature: Feature) -> FeatureRange {
        match feature {
            Feature::CompanySize => self.company_size,
            Feature::WebsiteVisits => self.website_visits,
            Feature::EmailOpens => self.email_opens,
            Feature::ContentDownloads => self.content_downloads,
        }
    }
}

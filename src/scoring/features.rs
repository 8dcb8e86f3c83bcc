use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::{FeatureRange, FeatureRanges};
use crate::error::{LeadError, Result};
use crate::leads::Lead;

/// Recognized scoring features, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CompanySize,
    WebsiteVisits,
    EmailOpens,
    ContentDownloads,
}

impl Feature {
    pub const COUNT: usize = 4;

    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::CompanySize,
        Feature::WebsiteVisits,
        Feature::EmailOpens,
        Feature::ContentDownloads,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::CompanySize => "company_size",
            Feature::WebsiteVisits => "website_visits",
            Feature::EmailOpens => "email_opens",
            Feature::ContentDownloads => "content_downloads",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Feature::CompanySize => 0,
            Feature::WebsiteVisits => 1,
            Feature::EmailOpens => 2,
            Feature::ContentDownloads => 3,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-order feature values, each on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; Feature::COUNT]);

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Turns a lead's attributes and counters into a `FeatureVector`.
///
/// Each raw value is clipped to its configured range and mapped linearly onto
/// 0-100. The ranges come from configuration, so the mapping is identical on
/// every call.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    ranges: FeatureRanges,
}

impl FeatureExtractor {
    pub fn new(ranges: FeatureRanges) -> Self {
        Self { ranges }
    }

    pub fn extract(&self, lead: &Lead) -> Result<FeatureVector> {
        let company_size = lead.company_size.ok_or(LeadError::MissingFeature {
            feature: Feature::CompanySize.name(),
        })?;

        let raw = [
            company_size as f64,
            lead.engagement.website_visits as f64,
            lead.engagement.email_opens as f64,
            lead.engagement.content_downloads as f64,
        ];

        let mut values = [0.0; Feature::COUNT];
        for feature in Feature::ALL {
            values[feature.index()] = scale(raw[feature.index()], self.ranges.get(feature));
        }
        Ok(FeatureVector(values))
    }
}

fn scale(value: f64, range: FeatureRange) -> f64 {
    let span = range.max - range.min;
    if span <= 0.0 {
        return 0.0;
    }
    let clipped = value.clamp(range.min, range.max);
    (clipped - range.min) / span * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::{Engagement, LeadAttributes, LeadId};
    use chrono::Utc;

    fn lead(company_size: Option<u64>, engagement: Engagement) -> Lead {
        let mut lead = Lead::new(
            LeadId(1),
            LeadAttributes {
                company_name: "Acme".to_string(),
                company_size,
                ..Default::default()
            },
            Utc::now(),
        );
        lead.engagement = engagement;
        lead
    }

    #[test]
    fn test_extract_scales_to_percent() {
        let extractor = FeatureExtractor::new(FeatureRanges::default());
        let vector = extractor
            .extract(&lead(
                Some(500),
                Engagement {
                    website_visits: 25,
                    email_opens: 5,
                    content_downloads: 10,
                },
            ))
            .unwrap();

        assert_eq!(vector.get(Feature::CompanySize), 50.0);
        assert_eq!(vector.get(Feature::WebsiteVisits), 50.0);
        assert_eq!(vector.get(Feature::EmailOpens), 25.0);
        assert_eq!(vector.get(Feature::ContentDownloads), 100.0);
    }

    #[test]
    fn test_extract_clips_out_of_range() {
        let extractor = FeatureExtractor::new(FeatureRanges::default());
        let vector = extractor
            .extract(&lead(
                Some(250_000),
                Engagement {
                    website_visits: 10_000,
                    email_opens: 0,
                    content_downloads: 0,
                },
            ))
            .unwrap();

        assert_eq!(vector.get(Feature::CompanySize), 100.0);
        assert_eq!(vector.get(Feature::WebsiteVisits), 100.0);
        assert_eq!(vector.get(Feature::EmailOpens), 0.0);
    }

    #[test]
    fn test_extract_respects_range_floor() {
        let mut ranges = FeatureRanges::default();
        ranges.website_visits = FeatureRange::new(10.0, 20.0);
        let extractor = FeatureExtractor::new(ranges);
        let vector = extractor
            .extract(&lead(
                Some(0),
                Engagement {
                    website_visits: 5,
                    ..Default::default()
                },
            ))
            .unwrap();
        assert_eq!(vector.get(Feature::WebsiteVisits), 0.0);
    }

    #[test]
    fn test_missing_company_size() {
        let extractor = FeatureExtractor::new(FeatureRanges::default());
        let err = extractor
            .extract(&lead(None, Engagement::default()))
            .unwrap_err();
        assert!(matches!(
            err,
            LeadError::MissingFeature {
                feature: "company_size"
            }
        ));
    }

    #[test]
    fn test_extract_is_stable() {
        let extractor = FeatureExtractor::new(FeatureRanges::default());
        let input = lead(
            Some(120),
            Engagement {
                website_visits: 3,
                email_opens: 7,
                content_downloads: 1,
            },
        );
        assert_eq!(extractor.extract(&input).unwrap(), extractor.extract(&input).unwrap());
    }
}

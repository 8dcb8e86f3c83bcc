use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::config::Thresholds;
use crate::leads::{InteractionId, LeadId};

/// Qualification bucket. Ordering follows qualification: `None < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::None, Tier::Low, Tier::Medium, Tier::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::None => "none",
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Tier::None),
            "low" => Ok(Tier::Low),
            "medium" => Ok(Tier::Medium),
            "high" => Ok(Tier::High),
            other => anyhow::bail!("Unknown tier: {}", other),
        }
    }
}

/// A lead moved from one tier to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub lead_id: LeadId,
    pub from: Tier,
    pub to: Tier,
    /// Interaction that caused the move; `None` when the lead was just created.
    pub interaction_id: Option<InteractionId>,
    pub score: f64,
}

impl Transition {
    pub fn is_upgrade(&self) -> bool {
        self.to > self.from
    }
}

/// Maps scores to tiers through the threshold table.
#[derive(Debug, Clone)]
pub struct TierAssigner {
    thresholds: Thresholds,
}

impl TierAssigner {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Highest tier whose floor is <= score, else `none`. NaN lands in `none`.
    pub fn assign(&self, score: f64) -> Tier {
        self.thresholds
            .descending()
            .into_iter()
            .find(|(_, floor)| score >= *floor)
            .map(|(tier, _)| tier)
            .unwrap_or(Tier::None)
    }

    /// Produce a transition only when the tier actually changed.
    pub fn transition(
        &self,
        lead_id: LeadId,
        previous: Tier,
        current: Tier,
        score: f64,
        interaction_id: Option<InteractionId>,
    ) -> Option<Transition> {
        if previous == current {
            return None;
        }
        Some(Transition {
            lead_id,
            from: previous,
            to: current,
            interaction_id,
            score,
        })
    }
}

use std::io::IsTerminal;
use chrono::{Duration, Utc};
use owo_colors::OwoColorize;
use terminal_size::{Width, terminal_size};

use crate::classifier::RetrainOutcome;
use crate::leads::Lead;
use crate::scoring::{Tier, Transition};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Format a score with one decimal place
pub fn format_score(score: f64) -> String {
    format!("{:.1}", score)
}

/// Tier label, colored by how warm the lead is
pub fn format_tier(tier: Tier, use_colors: bool) -> String {
    if use_colors {
        paint_tier(tier.as_str(), tier)
    } else {
        tier.to_string()
    }
}

fn paint_tier(text: &str, tier: Tier) -> String {
    match tier {
        Tier::High => text.green().bold().to_string(),
        Tier::Medium => text.yellow().to_string(),
        Tier::Low => text.cyan().to_string(),
        Tier::None => text.dimmed().to_string(),
    }
}

/// Format a single lead with detailed multi-line output
pub fn format_lead_detail(lead: &Lead, use_colors: bool) -> String {
    let size = lead
        .company_size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let updated = format_age(Utc::now() - lead.updated_at);
    let converted = match lead.conversion_status.label() {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    };

    let name = if use_colors {
        lead.company_name.bold().to_string()
    } else {
        lead.company_name.clone()
    };

    format!(
        "{} (#{})\n  Score: {} ({})\n  Industry: {}\n  Size: {}\n  Country: {}\n  Contact: {}\n  Engagement: {} visits, {} opens, {} downloads\n  Converted: {}\n  Updated: {} ago",
        name,
        lead.id,
        format_score(lead.score),
        format_tier(lead.tier, use_colors),
        lead.industry.as_deref().unwrap_or("-"),
        size,
        lead.country.as_deref().unwrap_or("-"),
        lead.contact_email.as_deref().unwrap_or("-"),
        lead.engagement.website_visits,
        lead.engagement.email_opens,
        lead.engagement.content_downloads,
        converted,
        updated
    )
}

/// One line describing a tier change
pub fn format_transition(transition: &Transition, use_colors: bool) -> String {
    let direction = if transition.is_upgrade() { "up" } else { "down" };
    format!(
        "Lead {} moved {}: {} -> {} (score {})",
        transition.lead_id,
        direction,
        format_tier(transition.from, use_colors),
        format_tier(transition.to, use_colors),
        format_score(transition.score)
    )
}

/// Summary of a training run
pub fn format_retrain(outcome: &RetrainOutcome) -> String {
    if outcome.promoted {
        format!(
            "Model v{} promoted (held-out accuracy {:.3})",
            outcome.version, outcome.accuracy
        )
    } else {
        let active = outcome
            .active_version
            .map(|v| format!("v{} stays active", v))
            .unwrap_or_else(|| "no model active".to_string());
        format!(
            "Model v{} rejected (held-out accuracy {:.3}), {}",
            outcome.version, outcome.accuracy, active
        )
    }
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate a name to fit available width, accounting for Unicode
fn truncate_name(name: &str, max_width: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_width {
        name.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Format leads as a table with columns: Id, Score, Tier, Company
/// No headers. Leads are printed in the order given.
pub fn format_lead_table(leads: &[Lead], use_colors: bool) -> String {
    if leads.is_empty() {
        return "No leads found.".to_string();
    }

    let term_width = get_terminal_width();

    let id_width = 5;
    let score_width = 5;
    let tier_width = 6;
    let separator = "  ";
    let fixed_width = id_width + 1 + score_width + tier_width + separator.len() * 2;

    leads
        .iter()
        .map(|lead| {
            let id_str = format!("{:>width$}.", lead.id, width = id_width - 1);
            let score_padded = format!("{:>width$}", format_score(lead.score), width = score_width);
            let tier_padded = format!("{:<width$}", lead.tier.as_str(), width = tier_width);

            let name = match term_width {
                Some(width) if width > fixed_width + 10 => {
                    truncate_name(&lead.company_name, width - fixed_width)
                }
                Some(_) => truncate_name(&lead.company_name, 20),
                None => lead.company_name.clone(),
            };

            if use_colors {
                // Pad before coloring, escape codes have no width
                format!(
                    "{} {}{}{}{}{}",
                    id_str.dimmed(),
                    score_padded.bold(),
                    separator,
                    paint_tier(&tier_padded, lead.tier),
                    separator,
                    name
                )
            } else {
                format!(
                    "{} {}{}{}{}{}",
                    id_str, score_padded, separator, tier_padded, separator, name
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format leads as tab-separated values for scripting
/// Columns: id, score, tier, company (no headers, no colors)
pub fn format_tsv(leads: &[Lead]) -> String {
    leads
        .iter()
        .map(|lead| {
            format!(
                "{}\t{}\t{}\t{}",
                lead.id,
                format_score(lead.score),
                lead.tier,
                lead.company_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a duration into a human-readable age string
/// "2h" for hours, "3d" for days, "1w" for weeks
pub fn format_age(duration: Duration) -> String {
    let hours = duration.num_hours();
    let days = duration.num_days();
    let weeks = days / 7;

    if weeks >= 1 {
        format!("{}w", weeks)
    } else if days >= 1 {
        format!("{}d", days)
    } else if hours >= 1 {
        format!("{}h", hours)
    } else {
        let minutes = duration.num_minutes();
        if minutes >= 1 {
            format!("{}m", minutes)
        } else {
            "now".to_string()
        }
    }
}

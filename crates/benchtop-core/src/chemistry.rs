//! Reaction detection and color mixing for container contents.
//!
//! The reaction rule table always wins: if the exact set of reagents present
//! matches a rule, its outcome color is used and the weighted average is
//! never consulted. Otherwise the display color falls back to a
//! volume-weighted RGB average of the base colors.
//!
//! [`mix`] is a pure function of the contents multiset: dispense order never
//! changes the result.

use crate::color::{Color, blend_weighted};
use crate::contents::Contents;
use crate::id::RuleId;
use crate::registry::Registry;

/// Result of mixing a container's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MixOutcome {
    pub color: Color,
    /// The reaction rule that matched, if any.
    pub rule: Option<RuleId>,
}

/// Compute the display color for a container, checking the experiment's
/// reaction rule table before falling back to weighted averaging.
pub fn mix(contents: &Contents, registry: &Registry) -> MixOutcome {
    if contents.is_empty() {
        return MixOutcome::default();
    }

    let distinct = contents.distinct_reagents();

    // A single reagent shows its base color unmodified, no matter how many
    // times it was dispensed. Rules require at least two distinct reagents.
    if distinct.len() == 1 {
        let color = registry
            .get_reagent(distinct[0])
            .map(|def| def.color)
            .unwrap_or(Color::Transparent);
        return MixOutcome { color, rule: None };
    }

    if let Some(rule_id) = registry.match_rule(&distinct) {
        let color = registry
            .get_rule(rule_id)
            .map(|rule| rule.outcome)
            .unwrap_or(Color::Transparent);
        return MixOutcome {
            color,
            rule: Some(rule_id),
        };
    }

    // Weighted average over individual entries: duplicates shift the blend
    // even though they never change rule matching.
    let parts: Vec<(Color, u64)> = contents
        .entries()
        .iter()
        .filter_map(|entry| {
            registry
                .get_reagent(entry.reagent)
                .map(|def| (def.color, entry.volume as u64))
        })
        .collect();

    MixOutcome {
        color: blend_weighted(&parts),
        rule: None,
    }
}

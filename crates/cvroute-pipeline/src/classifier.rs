//! Deterministic routing-label classification from the qualification field.

use cvroute_core::RoutingLabel;

/// Keywords (lowercase) that route a qualification to each non-fallback label.
const KEYWORDS: &[(RoutingLabel, &[&str])] = &[(
    RoutingLabel::Actuarial,
    &["actuarial", "actuary", "actuaries"],
)];

/// Classify a qualification. Pure; absent or unmatched input yields the fallback.
pub fn classify(qualification: Option<&str>) -> RoutingLabel {
    let Some(text) = qualification else {
        return RoutingLabel::FALLBACK;
    };
    let lowered = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lowered.contains(w)))
        .map(|(label, _)| *label)
        .unwrap_or(RoutingLabel::FALLBACK)
}

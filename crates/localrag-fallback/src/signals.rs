//! Keyword signals over a lowercased query.
//!
//! Matching is plain substring containment, so "errors" triggers "error".

use localrag_core::types::EscalationReason;

const URGENT_KEYWORDS: &[&str] = &["urgent", "problem", "help", "error", "failure"];

const SENSITIVE_KEYWORDS: &[&str] = &["implement", "integrate", "integration", "install"];

const DEMO_REQUEST_KEYWORDS: &[&str] = &["show me", "see it", "walkthrough", "preview"];

/// Below this confidence a fallback always escalates.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Pricing,
    Features,
    Implementation,
    SuccessStories,
    Demo,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Pricing => "pricing",
            Intent::Features => "features",
            Intent::Implementation => "implementation",
            Intent::SuccessStories => "success_stories",
            Intent::Demo => "demo",
            Intent::General => "general",
        }
    }
}

// Checked in order; the first intent with a matching keyword wins.
const INTENT_RULES: &[(Intent, &[&str])] = &[
    (Intent::Pricing, &["price", "pricing", "cost", "how much", "plan", "subscription", "fee"]),
    (Intent::Features, &["feature", "function", "capabilit", "what can", "does it", "include"]),
    (Intent::Implementation, &["implementation", "setup", "set up", "onboarding", "get started", "how long"]),
    (Intent::SuccessStories, &["success", "case study", "testimonial", "customer", "client", "result"]),
    (Intent::Demo, &["demo", "trial", "try", "example"]),
];

fn contains_any(query: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| query.contains(k))
}

pub fn classify_intent(query: &str) -> Intent {
    let lower = query.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|(_, keywords)| contains_any(&lower, keywords))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::General)
}

/// Escalation reason in priority order: urgent, sensitive, then low confidence.
pub fn escalation_reason(query: &str, confidence: f32) -> Option<EscalationReason> {
    let lower = query.to_lowercase();
    if contains_any(&lower, URGENT_KEYWORDS) {
        Some(EscalationReason::Urgent)
    } else if contains_any(&lower, SENSITIVE_KEYWORDS) {
        Some(EscalationReason::Sensitive)
    } else if confidence < LOW_CONFIDENCE_THRESHOLD {
        Some(EscalationReason::LowConfidence)
    } else {
        None
    }
}

pub fn wants_demo(query: &str) -> bool {
    contains_any(&query.to_lowercase(), DEMO_REQUEST_KEYWORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_follow_rule_order() {
        assert_eq!(classify_intent("How much does the plan cost?"), Intent::Pricing);
        // pricing is checked before features
        assert_eq!(classify_intent("Which features are in the premium plan?"), Intent::Pricing);
        assert_eq!(classify_intent("What features does it have"), Intent::Features);
        assert_eq!(classify_intent("How long is onboarding?"), Intent::Implementation);
        assert_eq!(classify_intent("Any customer stories?"), Intent::SuccessStories);
        assert_eq!(classify_intent("Can I get a DEMO"), Intent::Demo);
        assert_eq!(classify_intent("hello there"), Intent::General);
    }

    #[test]
    fn urgent_beats_sensitive_beats_confidence() {
        assert_eq!(escalation_reason("Urgent: integration broke", 1.0), Some(EscalationReason::Urgent));
        assert_eq!(escalation_reason("how do I install it", 0.1), Some(EscalationReason::Sensitive));
        assert_eq!(escalation_reason("normal question", 0.49), Some(EscalationReason::LowConfidence));
        assert_eq!(escalation_reason("normal question", 0.5), None);
    }

    #[test]
    fn demo_requests() {
        assert!(wants_demo("Show me how it looks"));
        assert!(!wants_demo("what is it"));
    }
}

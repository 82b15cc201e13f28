//! Fallback handler: turns a [`FallbackContext`] into a [`FallbackResponse`]
//! and keeps aggregate usage statistics.
//!
//! Each call is independent; the only state is the statistics block, guarded
//! by a mutex so one handler can serve concurrent searches.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use localrag_core::chunker::infer_category;
use localrag_core::types::{
    ActionSuggestion, FallbackContext, FallbackResponse, FallbackStats, ResponseType, Tone, GENERIC_CATEGORY,
};

use crate::signals::{classify_intent, escalation_reason, wants_demo, Intent};
use crate::templates::{escalation_message, fallback_message};

/// Interactions after which the handler switches to a familiar tone.
const FAMILIAR_AFTER: u32 = 3;

#[derive(Debug, Default)]
struct StatsState {
    total_fallbacks: u64,
    by_category: HashMap<String, u64>,
    total_escalations: u64,
    confidence_sum: f64,
}

#[derive(Debug, Default)]
pub struct FallbackHandler {
    stats: Mutex<StatsState>,
}

fn normalize_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) }
}

fn suggestions(intent: Intent, query: &str) -> Vec<ActionSuggestion> {
    let mut out = Vec::with_capacity(3);
    let mut push = |s: ActionSuggestion| {
        if !out.contains(&s) {
            out.push(s);
        }
    };
    match intent {
        Intent::Pricing | Intent::Implementation => push(ActionSuggestion::Contact),
        Intent::Features | Intent::General => push(ActionSuggestion::Documentation),
        Intent::Demo => push(ActionSuggestion::Demo),
        Intent::SuccessStories => push(ActionSuggestion::Testimonials),
    }
    if wants_demo(query) {
        push(ActionSuggestion::Demo);
    }
    push(ActionSuggestion::Contact);
    out
}

impl FallbackHandler {
    pub fn new() -> Self { Self::default() }

    fn state(&self) -> MutexGuard<'_, StatsState> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_fallback(&self, context: &FallbackContext) -> FallbackResponse {
        let query = context.query.trim();
        let category = match context.category.trim() {
            "" => GENERIC_CATEGORY.to_string(),
            c => c.to_string(),
        };
        let confidence = normalize_confidence(context.confidence);
        let tone = if context.previous_interactions.unwrap_or(0) >= FAMILIAR_AFTER { Tone::Familiar } else { Tone::Formal };
        let user_name = context.user_name.as_deref();

        let reason = escalation_reason(query, confidence);
        let intent = classify_intent(query);
        let family = infer_category(&category);

        let (message, response_type) = match reason {
            Some(reason) => (escalation_message(tone, user_name, reason), ResponseType::Escalation),
            None => {
                let ty = if intent == Intent::General { ResponseType::Predefined } else { ResponseType::Contextual };
                (fallback_message(tone, user_name, family, intent), ty)
            }
        };

        {
            let mut stats = self.state();
            stats.total_fallbacks += 1;
            *stats.by_category.entry(category.clone()).or_insert(0) += 1;
            stats.confidence_sum += f64::from(confidence);
            if reason.is_some() {
                stats.total_escalations += 1;
            }
        }

        tracing::debug!(
            category = %category,
            intent = intent.as_str(),
            escalation = reason.map(|r| r.as_str()),
            confidence,
            "fallback response"
        );

        FallbackResponse {
            message,
            response_type,
            category,
            should_escalate: reason.is_some(),
            escalation_reason: reason,
            action_suggestions: suggestions(intent, query),
            tone,
            confidence,
        }
    }

    pub fn stats(&self) -> FallbackStats {
        let stats = self.state();
        let (average_confidence, escalation_rate) = if stats.total_fallbacks == 0 {
            (0.0, 0.0)
        } else {
            let n = stats.total_fallbacks as f64;
            (stats.confidence_sum / n, stats.total_escalations as f64 / n)
        };
        FallbackStats {
            total_fallbacks: stats.total_fallbacks,
            by_category: stats.by_category.clone(),
            total_escalations: stats.total_escalations,
            average_confidence,
            escalation_rate,
        }
    }

    pub fn reset_stats(&self) {
        *self.state() = StatsState::default();
        tracing::info!("fallback statistics reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(normalize_confidence(-0.3), 0.0);
        assert_eq!(normalize_confidence(1.7), 1.0);
        assert_eq!(normalize_confidence(f32::NAN), 0.0);
        assert_eq!(normalize_confidence(0.42), 0.42);
    }

    #[test]
    fn suggestions_are_unique_and_include_contact() {
        assert_eq!(suggestions(Intent::Pricing, "price?"), vec![ActionSuggestion::Contact]);
        assert_eq!(
            suggestions(Intent::Demo, "show me a demo"),
            vec![ActionSuggestion::Demo, ActionSuggestion::Contact]
        );
        assert_eq!(
            suggestions(Intent::General, "show me"),
            vec![ActionSuggestion::Documentation, ActionSuggestion::Demo, ActionSuggestion::Contact]
        );
        assert_eq!(
            suggestions(Intent::SuccessStories, "customers"),
            vec![ActionSuggestion::Testimonials, ActionSuggestion::Contact]
        );
    }
}

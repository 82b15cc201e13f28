use localrag_core::types::{EscalationReason, Tone};

use crate::signals::Intent;

pub fn greeting(tone: Tone, user_name: Option<&str>) -> String {
    let word = match tone {
        Tone::Formal => "Hello",
        Tone::Familiar => "Hi",
    };
    match user_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{} {},", word, name),
        None => format!("{},", word),
    }
}

pub fn escalation_message(tone: Tone, user_name: Option<&str>, reason: EscalationReason) -> String {
    let detail = match reason {
        EscalationReason::Urgent => "It sounds like something needs attention right away.",
        EscalationReason::Sensitive => "Setting this up properly deserves a conversation with a specialist.",
        EscalationReason::LowConfidence => "I want to make sure you get an accurate answer.",
    };
    format!(
        "{} {} I'm passing your question to a member of our team, who will get back to you shortly.",
        greeting(tone, user_name),
        detail
    )
}

/// Body for a (category family, intent) pair, if one is written for it.
fn intent_body(family: &str, intent: Intent) -> Option<&'static str> {
    let body = match (family, intent) {
        ("digital_menu", Intent::Pricing) => {
            "our digital menu plans are priced per venue, and a member of our team can put together a quote for yours."
        }
        ("digital_menu", Intent::Features) => {
            "the digital menu covers QR ordering, live menu updates and multi-language dishes."
        }
        ("digital_menu", Intent::Implementation) => {
            "most venues have their digital menu live within a day, and we handle the menu import for you."
        }
        ("digital_menu", Intent::SuccessStories) => {
            "restaurants using our digital menu report faster table turnover and fewer ordering mistakes."
        }
        ("digital_menu", Intent::Demo) => "we'd be glad to walk you through the digital menu on a live venue.",
        ("reviews_reputation", Intent::Pricing) => {
            "reputation monitoring is included in our standard plan, and larger groups get volume pricing."
        }
        ("reviews_reputation", Intent::Features) => {
            "we collect reviews from the major platforms in one inbox and help you reply to each of them."
        }
        ("reviews_reputation", Intent::SuccessStories) => {
            "businesses that answer their reviews consistently see their average rating climb within weeks."
        }
        ("reservations", Intent::Pricing) => "reservations are billed per month with no fee per booking.",
        ("reservations", Intent::Features) => {
            "the reservation system handles table plans, reminders and deposits for no-show protection."
        }
        ("reservations", Intent::Demo) => "we can show you a live booking flow from your guest's point of view.",
        (_, Intent::Pricing) => "pricing depends on the modules you choose, and we're happy to prepare a quote.",
        (_, Intent::Features) => "our platform brings menus, reservations and reviews together in one place.",
        (_, Intent::Implementation) => "getting started takes a short onboarding call, after which our team does the setup.",
        (_, Intent::SuccessStories) => "many venues already use our platform, and we're happy to share their stories.",
        (_, Intent::Demo) => "we'd be happy to arrange a personalised demo for you.",
        (_, Intent::General) => return None,
    };
    Some(body)
}

fn family_body(family: &str) -> &'static str {
    match family {
        "digital_menu" => "I couldn't find a precise answer about our digital menu, but our documentation covers it in detail.",
        "reviews_reputation" => "I couldn't find a precise answer about review management, but our documentation covers it in detail.",
        "reservations" => "I couldn't find a precise answer about reservations, but our documentation covers it in detail.",
        _ => "I couldn't find a precise answer to that, but our documentation and our team can help.",
    }
}

/// Message for a non-escalating fallback.
pub fn fallback_message(tone: Tone, user_name: Option<&str>, family: &str, intent: Intent) -> String {
    let body = intent_body(family, intent).unwrap_or_else(|| family_body(family));
    format!("{} {}", greeting(tone, user_name), body)
}

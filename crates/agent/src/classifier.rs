//! Rule-first intent routing with a pluggable AI fallback.
//!
//! `detect_rules` always gets the first look; the fallback classifier is
//! consulted only when no rule fires, under a bounded timeout, and its
//! output passes through a vocabulary intersection before it can touch
//! state. Any fallback failure degrades to `Unknown` with whatever the
//! deterministic extractor found.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use sakan_core::intent::{self, Intent};
use sakan_core::lexicon;
use sakan_core::preferences;
use sakan_core::state::{ConversationState, Field, PaymentPlan, StatePatch};
use sakan_core::text;

/// What the fallback classifier sees: the raw turn plus a compact view of
/// the accumulated state and the last few transcript lines.
#[derive(Clone, Debug, Serialize)]
pub struct ClassifierRequest {
    pub text: String,
    pub state_summary: Value,
    pub recent_turns: Vec<String>,
}

/// Raw fallback output. Nothing here is trusted until it passes the
/// vocabulary intersection below.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClassifierResponse {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub entities: Value,
    #[serde(default)]
    pub missing_slots: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Seam for the external classifier (an LLM service in production, a
/// canned double in tests).
#[async_trait]
pub trait FallbackClassifier: Send + Sync {
    async fn classify(&self, request: &ClassifierRequest) -> anyhow::Result<ClassifierResponse>;
}

/// Used when classification is disabled: every unrouted turn stays
/// `Unknown` and only deterministic extraction applies.
pub struct NoopClassifier;

#[async_trait]
impl FallbackClassifier for NoopClassifier {
    async fn classify(&self, _request: &ClassifierRequest) -> anyhow::Result<ClassifierResponse> {
        Ok(ClassifierResponse { intent: "general_question".to_string(), ..Default::default() })
    }
}

/// Routed turn: the intent plus the merged per-turn patch (classifier
/// entities overlaid by the deterministic extractor).
#[derive(Clone, Debug, PartialEq)]
pub struct RoutedIntent {
    pub intent: Intent,
    pub patch: StatePatch,
    pub from_fallback: bool,
}

/// External classifier vocabulary, folded onto the internal enum.
/// Anything unrecognized becomes `Unknown`.
fn map_external_intent(name: &str) -> Intent {
    match name.trim() {
        "search_projects" => Intent::ProvidePreferences,
        "filter_units" => Intent::FilterResults,
        "project_details" => Intent::ShowDetails,
        "compare_projects" => Intent::Compare,
        "schedule_visit" => Intent::ConfirmChoice,
        "budget_check" => Intent::RefineSearch,
        _ => Intent::Unknown,
    }
}

fn money_value(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return (n > 0).then_some(n);
    }
    if let Some(f) = value.as_f64() {
        return (f > 0.0).then_some(f as i64);
    }
    let raw = value.as_str()?.replace([',', ' '], "");
    let parsed: f64 = raw.parse().ok()?;
    (parsed > 0.0).then_some(parsed as i64)
}

fn parse_payment_plan(raw: &str) -> Option<PaymentPlan> {
    let t = raw.to_lowercase();
    if t.contains("either") || t.contains("both") {
        Some(PaymentPlan::Either)
    } else if t.contains("install") || t.contains("قسط") || t.contains("تقسيط") {
        Some(PaymentPlan::Installments)
    } else if t.contains("cash") || t.contains("كاش") {
        Some(PaymentPlan::Cash)
    } else {
        None
    }
}

/// Intersects fallback entities with the known slot vocabulary and
/// re-normalizes each value through the core parsers. Keys outside the
/// allow-list and values that fail to parse are dropped silently.
fn entities_patch(entities: &Value) -> StatePatch {
    let mut patch = StatePatch::default();
    let Some(map) = entities.as_object() else {
        return patch;
    };

    for (key, value) in map {
        match key.as_str() {
            "budget_min" => {
                if let Some(amount) = money_value(value) {
                    patch.budget_min = Field::Set(amount);
                }
            }
            "budget_max" => {
                if let Some(amount) = money_value(value) {
                    patch.budget_max = Field::Set(amount);
                }
            }
            "location_area" => {
                if let Some(raw) = value.as_str() {
                    let trimmed = raw.trim();
                    if !trimmed.is_empty() {
                        let normalized = text::normalize(trimmed);
                        let resolved =
                            lexicon::lookup_location(&normalized).unwrap_or(trimmed);
                        patch.location = Field::Set(text::title_case_location(resolved));
                    }
                }
            }
            "unit_type" => {
                if let Some(raw) = value.as_str() {
                    let normalized = text::normalize(raw);
                    if normalized != "any" {
                        if let Some(unit_type) = lexicon::lookup_unit_type(&normalized) {
                            patch.unit_type = Field::Set(unit_type);
                        }
                    }
                }
            }
            "bedrooms" => {
                if let Some(n) = value.as_u64().filter(|&n| n >= 1 && n <= 20) {
                    patch.bedrooms = Field::Set(n as u8);
                }
            }
            "payment_plan" => {
                if let Some(plan) = value.as_str().and_then(parse_payment_plan) {
                    patch.payment_plan = Field::Set(plan);
                }
            }
            _ => {}
        }
    }
    patch
}

/// Compact state view sent with each fallback request.
pub fn state_summary(state: &ConversationState) -> Value {
    json!({
        "location": state.location,
        "budget_min": state.budget_min,
        "budget_max": state.budget_max,
        "unit_type": state.unit_type.map(|u| u.display_name()),
        "bedrooms": state.bedrooms,
        "payment_plan": state.payment_plan,
        "results_shown": state.last_results.len(),
    })
}

/// Routes one turn: rules first, then the fallback under `timeout`. The
/// returned patch is always the two-pass merge - fallback entities first,
/// the deterministic extractor's findings layered on top so they win on
/// conflict.
pub async fn route(
    fallback: &dyn FallbackClassifier,
    timeout: Duration,
    message: &str,
    state: &ConversationState,
    recent_turns: Vec<String>,
) -> RoutedIntent {
    let deterministic = preferences::extract(message);

    if let Some(hit) = intent::detect_rules(message) {
        return RoutedIntent { intent: hit, patch: deterministic, from_fallback: false };
    }

    let request = ClassifierRequest {
        text: message.to_string(),
        state_summary: state_summary(state),
        recent_turns,
    };
    let response = match tokio::time::timeout(timeout, fallback.classify(&request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(error)) => {
            tracing::warn!(%error, "fallback classifier failed; degrading to rules only");
            return RoutedIntent {
                intent: Intent::Unknown,
                patch: deterministic,
                from_fallback: false,
            };
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "fallback classifier timed out");
            return RoutedIntent {
                intent: Intent::Unknown,
                patch: deterministic,
                from_fallback: false,
            };
        }
    };

    let intent = map_external_intent(&response.intent);
    tracing::debug!(external = %response.intent, ?intent, confidence = response.confidence, "fallback classified turn");
    RoutedIntent {
        intent,
        patch: entities_patch(&response.entities).overlay(&deterministic),
        from_fallback: true,
    }
}

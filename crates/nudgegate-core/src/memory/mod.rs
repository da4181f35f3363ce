//! Preference Memory: turns feedback on past decisions into decayed,
//! explainable preference facts.
//!
//! Profiles are upserted with a stored confidence that never changes on
//! read; age-based decay is a projection applied when summaries are
//! built. Negative signals are written at higher confidence than
//! positive ones so distrust generalizes faster than trust.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{CoreError, Result, ValidationError};
use crate::model::{parse_feedback, Action, ActionType, Context, MemoryEvent, Profile};
use crate::settings::QuietHours;
use crate::storage::Database;

/// Stored confidence halves every 21 days of age.
const CONFIDENCE_HALF_LIFE_DAYS: f64 = 21.0;

/// Decayed-confidence floor for inclusion in the generator-facing
/// profile summary.
const SUMMARY_CONFIDENCE_FLOOR: f64 = 0.5;

/// Stored-confidence floor for the user-facing explanation view.
const EXPLANATION_CONFIDENCE_FLOOR: f64 = 0.4;

/// Read-time confidence projection: `confidence * 0.5^(age_days / 21)`.
pub fn decay_confidence(confidence: f64, updated_at_ms: i64, now_ms: i64) -> f64 {
    if updated_at_ms <= 0 {
        return confidence;
    }
    let age_ms = now_ms - updated_at_ms;
    if age_ms <= 0 {
        return confidence;
    }
    let age_days = age_ms as f64 / (24.0 * 60.0 * 60.0 * 1000.0);
    confidence * 0.5_f64.powf(age_days / CONFIDENCE_HALF_LIFE_DAYS)
}

/// Confidence-decaying preference store over the shared database.
pub struct MemoryService {
    db: Arc<Database>,
    night_window: QuietHours,
}

impl MemoryService {
    /// Default night window 22:00-07:00.
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_night_window(db, QuietHours::default())
    }

    pub fn with_night_window(db: Arc<Database>, night_window: QuietHours) -> Self {
        Self { db, night_window }
    }

    /// Digests feedback on a previously-recorded decision into profile
    /// facts and one memory event.
    pub fn process_feedback(&self, request_id: &str, raw_feedback: &str) -> Result<()> {
        self.process_feedback_at(request_id, raw_feedback, Utc::now())
    }

    /// [`MemoryService::process_feedback`] with an explicit clock.
    pub fn process_feedback_at(
        &self,
        request_id: &str,
        raw_feedback: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let (final_action_json, context_json) = self
            .db
            .decision_payloads(request_id)?
            .ok_or_else(|| ValidationError::UnknownDecision(request_id.to_string()))?;

        let action_type = action_type_from_payload(&final_action_json);
        let (feedback, feedback_text) = parse_feedback(raw_feedback);
        let positive = feedback.is_positive();
        let negative = feedback.is_negative();
        let now_ms = now.timestamp_millis();

        let event_type = if feedback.is_implicit() {
            "implicit_feedback"
        } else {
            "feedback"
        };
        let mut summary = format!("Feedback '{}' for action '{}'", feedback.as_str(), action_type);
        if !feedback_text.is_empty() {
            summary.push_str(": ");
            summary.push_str(&feedback_text);
        }

        if action_type != ActionType::Unknown && action_type != ActionType::DoNotDisturb {
            let key = format!("accepts_action_{}", action_type.as_str().to_lowercase());
            if negative {
                self.set_profile_logged(&key, "false", 0.7, now_ms);
            } else if positive {
                self.set_profile_logged(&key, "true", 0.6, now_ms);
            }
        }
        if negative {
            self.set_profile_logged("preferred_intervention_budget", "low", 0.6, now_ms);
        } else if positive {
            self.set_profile_logged("preferred_intervention_budget", "high", 0.5, now_ms);
        }

        // Time-of-day tolerance, learned only when the decision itself
        // happened inside the night window.
        if let Ok(ctx) = serde_json::from_str::<Context>(&context_json) {
            if ctx.timestamp_ms > 0 {
                if let Some(decided_at) = DateTime::<Utc>::from_timestamp_millis(ctx.timestamp_ms) {
                    if self.night_window.contains(decided_at.time()) {
                        if negative {
                            self.set_profile_logged("tolerance_night_intervention", "low", 0.7, now_ms);
                        } else if positive {
                            self.set_profile_logged("tolerance_night_intervention", "high", 0.5, now_ms);
                        }
                    }
                }
            }
        }

        self.db
            .append_memory_event(event_type, &summary, 0.5, now_ms)?;
        Ok(())
    }

    /// Natural-language-ready `key: value` lines for every profile whose
    /// decayed confidence still clears the floor, most recent first.
    pub fn profile_summary(&self) -> String {
        self.profile_summary_at(Utc::now().timestamp_millis())
    }

    pub fn profile_summary_at(&self, now_ms: i64) -> String {
        let profiles = match self.db.list_profiles() {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!(error = %err, "list profiles failed");
                return String::new();
            }
        };

        let lines: Vec<String> = profiles
            .iter()
            .filter(|p| {
                decay_confidence(p.confidence, p.updated_at_ms, now_ms) >= SUMMARY_CONFIDENCE_FLOOR
            })
            .map(|p| format!("- {}: {}", p.key, p.value))
            .collect();
        lines.join("\n")
    }

    /// Most recent memory events, newest first, one `- summary` line
    /// each.
    pub fn recent_events(&self, limit: u32) -> String {
        let events = match self.db.list_memory_events(limit) {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "list memory events failed");
                return String::new();
            }
        };
        let lines: Vec<String> = events.iter().map(|e| format!("- {}", e.summary)).collect();
        lines.join("\n")
    }

    pub fn add_event(&self, event_type: &str, summary: &str, importance: f64) -> Result<()> {
        self.db
            .append_memory_event(event_type, summary, importance, Utc::now().timestamp_millis())?;
        Ok(())
    }

    pub fn set_profile(&self, key: &str, value: &str, confidence: f64) -> Result<()> {
        self.db
            .upsert_profile(key, value, confidence, Utc::now().timestamp_millis())?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.db.list_profiles().map_err(CoreError::from)
    }

    pub fn list_events(&self, limit: u32) -> Result<Vec<MemoryEvent>> {
        self.db.list_memory_events(limit).map_err(CoreError::from)
    }

    /// Atomically wipes profiles and events ("forget me").
    pub fn reset(&self) -> Result<()> {
        self.db.reset_memory().map_err(CoreError::from)
    }

    /// Human-readable lines explaining what has been learned, for the
    /// "why am I seeing more/fewer suggestions" view. Filters out
    /// low-confidence facts and maps known keys to friendly labels.
    pub fn learning_explanations(&self) -> Result<Vec<String>> {
        let profiles = self.db.list_profiles()?;
        let mut explanations = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if profile.confidence < EXPLANATION_CONFIDENCE_FLOOR {
                continue;
            }
            let key = profile.key.trim();
            let value = profile.value.trim();
            let line = match key {
                "preferred_intervention_budget" => {
                    format!("Suggestion frequency preference: {value}")
                }
                "tolerance_night_intervention" => {
                    format!("Night-time suggestion tolerance: {value}")
                }
                _ => {
                    if let Some(action) = key.strip_prefix("accepts_action_") {
                        format!("Accepts {}: {}", describe_action(action), value)
                    } else {
                        format!("{key}: {value}")
                    }
                }
            };
            explanations.push(line);
        }
        Ok(explanations)
    }

    fn set_profile_logged(&self, key: &str, value: &str, confidence: f64, now_ms: i64) {
        if let Err(err) = self.db.upsert_profile(key, value, confidence, now_ms) {
            warn!(key, error = %err, "profile upsert failed");
        }
    }
}

/// Resolves the action type a decision record settled on. Parses the
/// stored action first; falls back to a substring scan for malformed
/// historical rows so old feedback still lands somewhere sensible.
fn action_type_from_payload(final_action_json: &str) -> ActionType {
    if let Ok(action) = serde_json::from_str::<Action>(final_action_json) {
        if action.action_type != ActionType::Unknown {
            return action.action_type;
        }
    }
    for action_type in [
        ActionType::DoNotDisturb,
        ActionType::Encourage,
        ActionType::TaskBreakdown,
        ActionType::RestReminder,
        ActionType::Reframe,
    ] {
        if final_action_json.contains(action_type.as_str()) {
            return action_type;
        }
    }
    ActionType::Unknown
}

fn describe_action(raw: &str) -> &str {
    match raw {
        "rest_reminder" => "rest reminders",
        "encourage" => "encouragement",
        "task_breakdown" => "task breakdown",
        "reframe" => "reframing",
        "do_not_disturb" => "do not disturb",
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecisionRecord, GatewayDecision, RiskLevel};
    use chrono::TimeZone;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn service() -> MemoryService {
        MemoryService::new(Arc::new(Database::open_memory().unwrap()))
    }

    fn record_decision(
        service: &MemoryService,
        request_id: &str,
        action_type: ActionType,
        decided_at: DateTime<Utc>,
    ) {
        let action = Action {
            action_type,
            message: "take a break".into(),
            confidence: 0.9,
            cost: 0.0,
            risk_level: RiskLevel::Low,
        };
        let context = Context {
            timestamp_ms: decided_at.timestamp_millis(),
            ..Context::default()
        };
        service
            .db
            .insert_decision(&DecisionRecord {
                request_id: request_id.into(),
                context,
                raw_action: action.clone(),
                final_action: action,
                decision: GatewayDecision::allow(),
                policy_version: "policy_v0".into(),
                latency_ms: 5,
                created_at_ms: decided_at.timestamp_millis(),
                user_feedback: None,
            })
            .unwrap();
    }

    fn profile_value(service: &MemoryService, key: &str) -> Option<(String, f64)> {
        service
            .list_profiles()
            .unwrap()
            .into_iter()
            .find(|p| p.key == key)
            .map(|p| (p.value, p.confidence))
    }

    #[test]
    fn decay_halves_at_half_life() {
        let t0 = 1_000_000;
        let decayed = decay_confidence(0.8, t0, t0 + 21 * DAY_MS);
        assert!((decayed - 0.4).abs() < 1e-9);
    }

    #[test]
    fn decay_is_strictly_decreasing_in_age() {
        let t0 = 1_000_000;
        let mut previous = decay_confidence(0.9, t0, t0);
        for days in 1..60 {
            let current = decay_confidence(0.9, t0, t0 + days * DAY_MS);
            assert!(current < previous);
            previous = current;
        }
    }

    #[test]
    fn decay_leaves_fresh_entries_alone() {
        assert_eq!(decay_confidence(0.7, 5_000, 5_000), 0.7);
        assert_eq!(decay_confidence(0.7, 0, 5_000), 0.7);
    }

    #[test]
    fn night_dislike_updates_all_three_profiles() {
        // DISLIKE on a TASK_BREAKDOWN decision at 23:00.
        let service = service();
        let decided_at = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        record_decision(&service, "req-1", ActionType::TaskBreakdown, decided_at);

        service
            .process_feedback_at("req-1", "DISLIKE", decided_at)
            .unwrap();

        assert_eq!(
            profile_value(&service, "accepts_action_task_breakdown"),
            Some(("false".into(), 0.7))
        );
        assert_eq!(
            profile_value(&service, "preferred_intervention_budget"),
            Some(("low".into(), 0.6))
        );
        assert_eq!(
            profile_value(&service, "tolerance_night_intervention"),
            Some(("low".into(), 0.7))
        );

        let events = service.list_events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "feedback");
        assert!(events[0].summary.contains("DISLIKE"));
        assert!(events[0].summary.contains("TASK_BREAKDOWN"));
    }

    #[test]
    fn daytime_feedback_skips_night_tolerance() {
        let service = service();
        let decided_at = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
        record_decision(&service, "req-1", ActionType::Encourage, decided_at);

        service
            .process_feedback_at("req-1", "LIKE", decided_at)
            .unwrap();

        assert_eq!(
            profile_value(&service, "accepts_action_encourage"),
            Some(("true".into(), 0.6))
        );
        assert_eq!(
            profile_value(&service, "preferred_intervention_budget"),
            Some(("high".into(), 0.5))
        );
        assert!(profile_value(&service, "tolerance_night_intervention").is_none());
    }

    #[test]
    fn implicit_feedback_is_tagged() {
        let service = service();
        let decided_at = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
        record_decision(&service, "req-1", ActionType::RestReminder, decided_at);

        service
            .process_feedback_at("req-1", "IGNORED", decided_at)
            .unwrap();

        let events = service.list_events(10).unwrap();
        assert_eq!(events[0].event_type, "implicit_feedback");
        // Ignoring generalizes to distrust.
        assert_eq!(
            profile_value(&service, "accepts_action_rest_reminder"),
            Some(("false".into(), 0.7))
        );
    }

    #[test]
    fn noop_decisions_learn_no_acceptance_fact() {
        let service = service();
        let decided_at = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
        record_decision(&service, "req-1", ActionType::DoNotDisturb, decided_at);

        service
            .process_feedback_at("req-1", "DISLIKE", decided_at)
            .unwrap();

        assert!(profile_value(&service, "accepts_action_do_not_disturb").is_none());
        assert!(profile_value(&service, "preferred_intervention_budget").is_some());
    }

    #[test]
    fn unknown_request_is_an_error() {
        let service = service();
        assert!(service.process_feedback("missing", "LIKE").is_err());
    }

    #[test]
    fn fallback_substring_parse_handles_malformed_rows() {
        assert_eq!(
            action_type_from_payload("{\"mangled\": \"REST_REMINDER stuff\""),
            ActionType::RestReminder
        );
        assert_eq!(action_type_from_payload("not json at all"), ActionType::Unknown);
        // Well-formed rows never hit the fallback.
        assert_eq!(
            action_type_from_payload(r#"{"action_type":"REFRAME","risk_level":"LOW"}"#),
            ActionType::Reframe
        );
    }

    #[test]
    fn summary_excludes_decayed_entries() {
        let service = service();
        let now_ms = 100 * DAY_MS;
        // Fresh fact stays; a 42-day-old 0.8 decays to 0.2 and drops out.
        service
            .db
            .upsert_profile("prefers_breaks", "true", 0.9, now_ms)
            .unwrap();
        service
            .db
            .upsert_profile("old_fact", "stale", 0.8, now_ms - 42 * DAY_MS)
            .unwrap();

        let summary = service.profile_summary_at(now_ms);
        assert!(summary.contains("- prefers_breaks: true"));
        assert!(!summary.contains("old_fact"));
    }

    #[test]
    fn summary_orders_most_recent_first() {
        let service = service();
        let now_ms = DAY_MS;
        service.db.upsert_profile("first", "1", 0.9, now_ms - 1000).unwrap();
        service.db.upsert_profile("second", "2", 0.9, now_ms).unwrap();
        let summary = service.profile_summary_at(now_ms);
        let first_pos = summary.find("second").unwrap();
        let second_pos = summary.find("first").unwrap();
        assert!(first_pos < second_pos);
    }

    #[test]
    fn recent_events_newest_first() {
        let service = service();
        service.db.append_memory_event("feedback", "older", 0.5, 1_000).unwrap();
        service.db.append_memory_event("feedback", "newer", 0.5, 2_000).unwrap();
        let text = service.recent_events(10);
        assert_eq!(text, "- newer\n- older");
    }

    #[test]
    fn reset_clears_everything() {
        let service = service();
        service.set_profile("k", "v", 0.9).unwrap();
        service.add_event("feedback", "something", 0.5).unwrap();
        service.reset().unwrap();
        assert!(service.list_profiles().unwrap().is_empty());
        assert!(service.list_events(10).unwrap().is_empty());
        assert!(service.profile_summary().is_empty());
    }

    #[test]
    fn explanations_filter_and_label() {
        let service = service();
        service.set_profile("accepts_action_rest_reminder", "false", 0.7).unwrap();
        service.set_profile("preferred_intervention_budget", "low", 0.6).unwrap();
        service.set_profile("faint_signal", "x", 0.2).unwrap();

        let explanations = service.learning_explanations().unwrap();
        assert!(explanations
            .iter()
            .any(|l| l == "Accepts rest reminders: false"));
        assert!(explanations
            .iter()
            .any(|l| l == "Suggestion frequency preference: low"));
        assert!(!explanations.iter().any(|l| l.contains("faint_signal")));
    }
}

//! Integration tests for the feedback-to-preference loop.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use nudgegate_core::model::{
    Action, ActionType, Context, DecisionRecord, GatewayDecision, RiskLevel,
};
use nudgegate_core::settings::QuietHours;
use nudgegate_core::{Database, MemoryService};

fn record(db: &Database, request_id: &str, action_type: ActionType, ts_ms: i64) {
    let action = Action {
        action_type,
        message: "msg".into(),
        confidence: 0.8,
        cost: 0.0,
        risk_level: RiskLevel::Low,
    };
    db.insert_decision(&DecisionRecord {
        request_id: request_id.into(),
        context: Context {
            timestamp_ms: ts_ms,
            ..Context::default()
        },
        raw_action: action.clone(),
        final_action: action,
        decision: GatewayDecision::allow(),
        policy_version: "policy_v0".into(),
        latency_ms: 2,
        created_at_ms: ts_ms,
        user_feedback: None,
    })
    .unwrap();
}

#[test]
fn repeated_feedback_converges_on_latest_signal() {
    let db = Arc::new(Database::open_memory().unwrap());
    let memory = MemoryService::new(db.clone());
    let noon = Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap();

    record(&db, "req-1", ActionType::RestReminder, noon.timestamp_millis());
    record(&db, "req-2", ActionType::RestReminder, noon.timestamp_millis());

    memory.process_feedback_at("req-1", "LIKE", noon).unwrap();
    memory
        .process_feedback_at("req-2", "DISLIKE: not now", noon + chrono::Duration::hours(1))
        .unwrap();

    // The later dislike wins the profile slot.
    let profiles = memory.list_profiles().unwrap();
    let accepts = profiles
        .iter()
        .find(|p| p.key == "accepts_action_rest_reminder")
        .unwrap();
    assert_eq!(accepts.value, "false");
    assert_eq!(accepts.confidence, 0.7);

    // Both rounds left an event, newest first, with the free text kept.
    let events = memory.list_events(10).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].summary.contains("not now"));
}

#[test]
fn custom_night_window_is_honored() {
    let db = Arc::new(Database::open_memory().unwrap());
    let window = QuietHours::parse("20:00-06:00").unwrap();
    let memory = MemoryService::with_night_window(db.clone(), window);

    let evening = Utc.with_ymd_and_hms(2026, 4, 2, 21, 0, 0).unwrap();
    record(&db, "req-1", ActionType::Encourage, evening.timestamp_millis());
    memory.process_feedback_at("req-1", "DISLIKE", evening).unwrap();

    let profiles = memory.list_profiles().unwrap();
    assert!(profiles
        .iter()
        .any(|p| p.key == "tolerance_night_intervention" && p.value == "low"));
}

#[test]
fn summary_reflects_decay_over_time() {
    let db = Arc::new(Database::open_memory().unwrap());
    let memory = MemoryService::new(db.clone());
    let noon = Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap();

    record(&db, "req-1", ActionType::Encourage, noon.timestamp_millis());
    memory.process_feedback_at("req-1", "LIKE", noon).unwrap();

    // Fresh: accepts_action_encourage (0.6) clears the 0.5 floor.
    let summary = memory.profile_summary_at(noon.timestamp_millis());
    assert!(summary.contains("accepts_action_encourage: true"));

    // Ten half-lives later nothing survives.
    let much_later = noon + chrono::Duration::days(210);
    let summary = memory.profile_summary_at(much_later.timestamp_millis());
    assert!(summary.is_empty());
}

#[test]
fn reset_is_total() {
    let db = Arc::new(Database::open_memory().unwrap());
    let memory = MemoryService::new(db.clone());
    let noon = Utc.with_ymd_and_hms(2026, 4, 2, 12, 0, 0).unwrap();

    record(&db, "req-1", ActionType::Reframe, noon.timestamp_millis());
    memory.process_feedback_at("req-1", "ADOPTED", noon).unwrap();
    assert!(!memory.list_profiles().unwrap().is_empty());

    memory.reset().unwrap();
    assert!(memory.list_profiles().unwrap().is_empty());
    assert!(memory.list_events(10).unwrap().is_empty());

    // The decision log itself is untouched: feedback can still be
    // re-processed after a reset.
    memory.process_feedback_at("req-1", "ADOPTED", noon).unwrap();
    assert!(!memory.list_profiles().unwrap().is_empty());
}

//! Context enrichment and the auto-suggestion pre-gate.
//!
//! Runs upstream of the generator on every suggestion request: focus
//! signals and memory summaries are merged into the caller's `Context`,
//! and unsolicited suggestions are rate-limited before the (costly)
//! generator is ever invoked. Caller-provided signal keys are never
//! overwritten.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::CoreError;
use crate::focus::{derive_focus_state, FocusMonitor, DEFAULT_SWITCH_WINDOW_MS};
use crate::gateway::{max_action_cost, Gateway};
use crate::memory::MemoryService;
use crate::model::{Context, FocusStateSnapshot, ReasonCode};
use crate::settings::keys;
use crate::storage::Database;

/// Minimum gap between two unsolicited suggestion attempts.
pub const AUTO_SUGGEST_WINDOW_MS: i64 = 10 * 60 * 1000;

/// Outcome of the auto-suggestion pre-gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSuggestGate {
    /// Invoke the generator.
    Proceed,
    /// A suggestion was attempted too recently.
    Throttled,
    /// The gateway would reject even the most expensive action.
    Blocked(ReasonCode),
}

/// Merges focus signals and memory summaries into the context.
///
/// With a live, enabled monitor the signals come from its in-memory
/// window state and a focus-state snapshot is persisted for history;
/// otherwise they are reconstructed from stored focus events over the
/// trailing window.
pub fn enrich_context(
    ctx: &mut Context,
    db: &Database,
    monitor: &FocusMonitor,
    memory: &MemoryService,
) -> Result<(), CoreError> {
    ctx.profile_summary = memory.profile_summary();
    ctx.memory_summary = memory.recent_events(5);

    if let Some(budget) = db.get_setting(keys::INTERVENTION_BUDGET)? {
        if let Some(normalized) = normalize_budget(&budget) {
            ctx.signals
                .entry("intervention_budget".to_string())
                .or_insert_with(|| normalized.to_string());
        }
    }

    if monitor.enabled() {
        let switch_count = monitor.switch_count();
        ctx.switch_count = switch_count;
        ctx.signals
            .entry("switch_count".to_string())
            .or_insert_with(|| switch_count.to_string());

        let (no_progress, no_progress_elapsed) = monitor.no_progress();
        if no_progress {
            let minutes = no_progress_elapsed.num_milliseconds() as f64 / 60_000.0;
            ctx.signals
                .entry("no_progress_minutes".to_string())
                .or_insert_with(|| format!("{minutes:.1}"));
        }

        if let Some(current) = monitor.current()? {
            for (key, value) in [
                ("focus_app", current.app_name.clone()),
                ("focus_bundle_id", current.bundle_id.clone()),
                ("focus_window_title", current.window_title.clone()),
                ("focus_minutes", format!("{:.1}", current.focus_minutes)),
            ] {
                ctx.signals.entry(key.to_string()).or_insert(value);
            }

            let state = derive_focus_state(
                current.focus_minutes,
                switch_count,
                no_progress,
                no_progress_elapsed.num_milliseconds(),
            );
            ctx.focus_state = Some(state);
            ctx.signals
                .entry("focus_state".to_string())
                .or_insert_with(|| state.to_string());

            let snapshot = FocusStateSnapshot {
                ts_ms: Utc::now().timestamp_millis(),
                focus_state: state,
                switch_count,
                no_progress_ms: no_progress_elapsed.num_milliseconds(),
                focus_minutes: current.focus_minutes,
                app_name: current.app_name,
                window_title: current.window_title,
            };
            if let Err(err) = db.insert_focus_state_snapshot(&snapshot) {
                warn!(error = %err, "persist focus state snapshot failed");
            }
        }
    } else {
        let now_ms = Utc::now().timestamp_millis();
        let metrics = db.focus_metrics(DEFAULT_SWITCH_WINDOW_MS, now_ms)?;
        ctx.switch_count = metrics.switch_count;
        ctx.signals
            .entry("switch_count".to_string())
            .or_insert_with(|| metrics.switch_count.to_string());
        ctx.signals
            .entry("focus_minutes_window".to_string())
            .or_insert_with(|| format!("{:.1}", metrics.focus_minutes));

        let state = derive_focus_state(metrics.focus_minutes, metrics.switch_count, false, 0);
        ctx.focus_state = Some(state);
        ctx.signals
            .entry("focus_state".to_string())
            .or_insert_with(|| state.to_string());
    }

    Ok(())
}

/// Decides whether an unsolicited suggestion attempt may invoke the
/// generator: at most one per window, and only when the gateway could
/// admit even the most expensive action. Claims the window on success.
pub fn should_auto_suggest(
    db: &Database,
    gateway: &Gateway,
    ctx: &Context,
    now: DateTime<Utc>,
) -> Result<AutoSuggestGate, CoreError> {
    let now_ms = now.timestamp_millis();
    if let Some(raw) = db.get_setting(keys::LAST_AUTO_SUGGEST_MS)? {
        if let Ok(last_ms) = raw.trim().parse::<i64>() {
            if now_ms - last_ms < AUTO_SUGGEST_WINDOW_MS {
                return Ok(AutoSuggestGate::Throttled);
            }
        }
    }

    let (allowed, reason) = gateway.can_intervene_at(ctx, max_action_cost(), now);
    if !allowed {
        return Ok(AutoSuggestGate::Blocked(reason));
    }

    db.upsert_setting(keys::LAST_AUTO_SUGGEST_MS, &now_ms.to_string(), now_ms)?;
    Ok(AutoSuggestGate::Proceed)
}

fn normalize_budget(value: &str) -> Option<&'static str> {
    match value.trim().to_lowercase().as_str() {
        "low" => Some("1"),
        "medium" => Some("2"),
        "high" => Some("3"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FocusEvent, Mode};
    use std::sync::Arc;

    fn setup() -> (Arc<Database>, FocusMonitor, MemoryService) {
        let db = Arc::new(Database::open_memory().unwrap());
        let monitor = FocusMonitor::new(db.clone(), None);
        let memory = MemoryService::new(db.clone());
        (db, monitor, memory)
    }

    #[test]
    fn disabled_monitor_falls_back_to_stored_metrics() {
        let (db, monitor, memory) = setup();
        let now_ms = Utc::now().timestamp_millis();
        for offset in [3, 2, 1] {
            db.insert_focus_event(&FocusEvent {
                ts_ms: now_ms - offset * 60_000,
                app_name: "App".into(),
                ..FocusEvent::default()
            })
            .unwrap();
        }

        let mut ctx = Context::default();
        enrich_context(&mut ctx, &db, &monitor, &memory).unwrap();
        assert_eq!(ctx.switch_count, 2);
        assert_eq!(ctx.signals.get("switch_count").unwrap(), "2");
        assert!(ctx.focus_state.is_some());
        assert!(ctx.signals.contains_key("focus_minutes_window"));
    }

    #[test]
    fn caller_signals_are_not_overwritten() {
        let (db, monitor, memory) = setup();
        let mut ctx = Context::default();
        ctx.signals
            .insert("switch_count".to_string(), "999".to_string());
        enrich_context(&mut ctx, &db, &monitor, &memory).unwrap();
        assert_eq!(ctx.signals.get("switch_count").unwrap(), "999");
    }

    #[test]
    fn summaries_are_merged() {
        let (db, monitor, memory) = setup();
        memory.set_profile("prefers_breaks", "true", 0.9).unwrap();
        memory.add_event("feedback", "liked a reminder", 0.5).unwrap();

        let mut ctx = Context::default();
        enrich_context(&mut ctx, &db, &monitor, &memory).unwrap();
        assert!(ctx.profile_summary.contains("prefers_breaks"));
        assert!(ctx.memory_summary.contains("liked a reminder"));
    }

    #[test]
    fn budget_signal_is_normalized() {
        let (db, monitor, memory) = setup();
        db.upsert_setting(keys::INTERVENTION_BUDGET, "high", 0).unwrap();
        let mut ctx = Context::default();
        enrich_context(&mut ctx, &db, &monitor, &memory).unwrap();
        assert_eq!(ctx.signals.get("intervention_budget").unwrap(), "3");
    }

    #[test]
    fn auto_suggest_claims_and_enforces_window() {
        let (db, _monitor, _memory) = setup();
        let gateway = Gateway::new(db.clone());
        let ctx = Context {
            mode: Mode::Active,
            ..Context::default()
        };
        let now = Utc::now();

        let first = should_auto_suggest(&db, &gateway, &ctx, now).unwrap();
        assert_eq!(first, AutoSuggestGate::Proceed);

        let second = should_auto_suggest(&db, &gateway, &ctx, now).unwrap();
        assert_eq!(second, AutoSuggestGate::Throttled);

        let later = now + chrono::Duration::milliseconds(AUTO_SUGGEST_WINDOW_MS + 1);
        let third = should_auto_suggest(&db, &gateway, &ctx, later).unwrap();
        assert_eq!(third, AutoSuggestGate::Proceed);
    }

    #[test]
    fn auto_suggest_respects_gateway_rejection() {
        let (db, _monitor, _memory) = setup();
        db.upsert_setting(keys::BUDGET_ACTIVE, "0", 0).unwrap();
        let gateway = Gateway::new(db.clone());
        let ctx = Context {
            mode: Mode::Active,
            ..Context::default()
        };
        let gate = should_auto_suggest(&db, &gateway, &ctx, Utc::now()).unwrap();
        assert_eq!(gate, AutoSuggestGate::Blocked(ReasonCode::BudgetExhausted));
    }
}

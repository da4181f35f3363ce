//! Decision Gateway: the single chokepoint between the suggestion
//! generator and the user.
//!
//! Every candidate action passes through [`Gateway::evaluate`], which
//! applies static safety rules and then stateful admission control
//! (per-mode point budgets, hourly/daily caps, a cooldown clock). A
//! rejection never fails the request; it degrades the candidate to the
//! safe do-nothing action and records why.
//!
//! Budget replenishment and usage-bucket resets are recomputed lazily
//! from elapsed wall-clock time on each call. There is no background
//! ticker; internal entry points take an explicit `now` so every
//! time-dependent path is testable.

mod config;
mod rules;

pub use config::{GatewayConfig, ModeBudgets, DEFAULT_COOLDOWN_SECONDS, DEFAULT_RECOVERY_RATE};
pub use rules::{action_cost, max_action_cost};

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::model::{
    Action, BudgetUsage, Context, DecisionOutcome, GatewayDecision, Mode, ReasonCode,
};
use crate::storage::SettingsStore;

/// One value per interruption mode.
#[derive(Debug, Clone, Copy)]
struct PerMode<T> {
    silent: T,
    light: T,
    active: T,
}

impl<T: Copy> PerMode<T> {
    fn splat(value: T) -> Self {
        Self {
            silent: value,
            light: value,
            active: value,
        }
    }

    fn get(&self, mode: Mode) -> T {
        match mode {
            Mode::Silent => self.silent,
            Mode::Light => self.light,
            Mode::Active => self.active,
        }
    }

    fn set(&mut self, mode: Mode, value: T) {
        match mode {
            Mode::Silent => self.silent = value,
            Mode::Light => self.light = value,
            Mode::Active => self.active = value,
        }
    }
}

const ALL_MODES: [Mode; 3] = [Mode::Silent, Mode::Light, Mode::Active];

struct GatewayState {
    config: GatewayConfig,
    current: PerMode<f64>,
    last_update: PerMode<DateTime<Utc>>,
    last_intervention: Option<DateTime<Utc>>,
    daily_used: f64,
    hourly_used: f64,
    day_bucket: String,
    hour_bucket: String,
    usage_loaded: bool,
}

/// Point-in-time view of the gateway's admission state, for status
/// displays and tests.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub mode_budgets: ModeBudgets,
    pub current_points: ModeBudgets,
    pub daily_used: f64,
    pub hourly_used: f64,
    pub cooldown_seconds: f64,
    pub cooldown_remaining_seconds: f64,
}

/// Admission-control state machine guarding all interventions.
///
/// All mutable state sits behind one mutex: admission requires an atomic
/// check-then-deduct, so two concurrent requests can never both spend the
/// same last slice of budget.
pub struct Gateway {
    store: Arc<dyn SettingsStore>,
    state: Mutex<GatewayState>,
}

impl Gateway {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        let config = GatewayConfig::default();
        let now = Utc::now();
        let state = GatewayState {
            current: PerMode {
                silent: config.mode_budgets.silent,
                light: config.mode_budgets.light,
                active: config.mode_budgets.active,
            },
            last_update: PerMode::splat(now),
            last_intervention: None,
            daily_used: 0.0,
            hourly_used: 0.0,
            day_bucket: String::new(),
            hour_bucket: String::new(),
            usage_loaded: false,
            config,
        };
        Self {
            store,
            state: Mutex::new(state),
        }
    }

    /// Evaluates a candidate action against the full rule chain and,
    /// when it is admitted, spends budget for it.
    ///
    /// Never errors: rejected candidates come back as the do-nothing
    /// action with the decision explaining why.
    pub fn evaluate(&self, ctx: &Context, candidate: Action) -> (Action, GatewayDecision) {
        self.evaluate_at(ctx, candidate, Utc::now())
    }

    /// [`Gateway::evaluate`] with an explicit clock.
    pub fn evaluate_at(
        &self,
        ctx: &Context,
        candidate: Action,
        now: DateTime<Utc>,
    ) -> (Action, GatewayDecision) {
        let mut state = self.lock();
        self.refresh_config(&mut state);
        self.load_usage(&mut state, now);
        replenish(&mut state, ctx.mode, now);

        // 1. Static rules, strict order, first match wins.
        if let Some(reason) = rules::validate(&candidate) {
            return rules::reject(&candidate, DecisionOutcome::Override, reason);
        }
        if rules::is_high_risk(&candidate) {
            return rules::reject(&candidate, DecisionOutcome::Deny, ReasonCode::HighRiskBlocked);
        }
        if rules::is_low_quality(&candidate) {
            return rules::reject(
                &candidate,
                DecisionOutcome::Override,
                ReasonCode::LowQualityAction,
            );
        }
        if rules::silent_override(ctx, &candidate) {
            return rules::reject(
                &candidate,
                DecisionOutcome::Override,
                ReasonCode::ModeSilentOverride,
            );
        }

        // 2. Stateful admission control, only for real interventions.
        if candidate.action_type.is_intervention() {
            let cost = rules::action_cost(candidate.action_type);

            if let Some(reason) = admission_check(&state, ctx.mode, cost, now) {
                info!(
                    reason = %reason,
                    mode = %ctx.mode,
                    cost,
                    remaining = state.current.get(ctx.mode),
                    "gateway rejected intervention"
                );
                return rules::reject(&candidate, DecisionOutcome::Override, reason);
            }

            let remaining = state.current.get(ctx.mode) - cost;
            state.current.set(ctx.mode, remaining);
            state.last_intervention = Some(now);
            state.hourly_used += cost;
            state.daily_used += cost;
            self.persist_usage(&state);
            info!(cost, remaining, mode = %ctx.mode, "gateway intervention allowed");
        }

        (candidate, GatewayDecision::allow())
    }

    /// Dry-run admission check for a hypothetical intervention of the
    /// given cost. Performs the same stateful checks as `evaluate`
    /// without spending budget or touching the cooldown; used to gate
    /// auto-suggestions before the generator is invoked.
    pub fn can_intervene(&self, ctx: &Context, cost: f64) -> (bool, ReasonCode) {
        self.can_intervene_at(ctx, cost, Utc::now())
    }

    /// [`Gateway::can_intervene`] with an explicit clock.
    pub fn can_intervene_at(
        &self,
        ctx: &Context,
        cost: f64,
        now: DateTime<Utc>,
    ) -> (bool, ReasonCode) {
        let mut state = self.lock();
        self.refresh_config(&mut state);
        self.load_usage(&mut state, now);
        replenish(&mut state, ctx.mode, now);

        match admission_check(&state, ctx.mode, cost, now) {
            Some(reason) => (false, reason),
            None => (true, ReasonCode::Allow),
        }
    }

    /// Resets the cooldown clock so the next admissible intervention is
    /// not throttled. Called whenever the user actively engages:
    /// cooldown exists to limit unsolicited interruptions, never to
    /// block an ongoing conversation.
    pub fn clear_cooldown(&self) {
        let mut state = self.lock();
        state.last_intervention = None;
        info!("gateway cooldown cleared");
    }

    /// Current admission state, with budgets replenished to `now`.
    pub fn status(&self) -> GatewayStatus {
        self.status_at(Utc::now())
    }

    /// [`Gateway::status`] with an explicit clock.
    pub fn status_at(&self, now: DateTime<Utc>) -> GatewayStatus {
        let mut state = self.lock();
        self.refresh_config(&mut state);
        self.load_usage(&mut state, now);
        for mode in ALL_MODES {
            replenish(&mut state, mode, now);
        }

        let cooldown_remaining = match state.last_intervention {
            Some(last) if state.config.cooldown_seconds > 0.0 => {
                (state.config.cooldown_seconds - elapsed_seconds(last, now)).max(0.0)
            }
            _ => 0.0,
        };

        GatewayStatus {
            mode_budgets: state.config.mode_budgets,
            current_points: ModeBudgets {
                silent: state.current.silent,
                light: state.current.light,
                active: state.current.active,
            },
            daily_used: state.daily_used,
            hourly_used: state.hourly_used,
            cooldown_seconds: state.config.cooldown_seconds,
            cooldown_remaining_seconds: cooldown_remaining,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Re-reads settings and clamps current points to the (possibly
    /// shrunk) maxima so the in-range invariant survives config changes.
    fn refresh_config(&self, state: &mut GatewayState) {
        state.config = GatewayConfig::resolve(self.store.as_ref());
        for mode in ALL_MODES {
            let max = state.config.mode_budgets.get(mode);
            if state.current.get(mode) > max {
                state.current.set(mode, max);
            }
        }
    }

    /// Loads persisted usage counters once, then resets any bucket whose
    /// calendar key has rolled over.
    fn load_usage(&self, state: &mut GatewayState, now: DateTime<Utc>) {
        if !state.usage_loaded {
            match self.store.budget_usage() {
                Ok(Some(usage)) => {
                    state.daily_used = usage.daily_used;
                    state.hourly_used = usage.hourly_used;
                    state.day_bucket = usage.daily_day;
                    state.hour_bucket = usage.hourly_hour;
                    state.usage_loaded = true;
                }
                Ok(None) => state.usage_loaded = true,
                Err(err) => warn!(error = %err, "load budget usage failed"),
            }
        }

        let current_day = now.format("%Y-%m-%d").to_string();
        let current_hour = now.format("%Y-%m-%d-%H").to_string();
        let mut changed = false;

        if state.day_bucket != current_day {
            state.day_bucket = current_day;
            state.daily_used = 0.0;
            changed = true;
        }
        if state.hour_bucket != current_hour {
            state.hour_bucket = current_hour;
            state.hourly_used = 0.0;
            changed = true;
        }
        if changed {
            self.persist_usage(state);
        }
    }

    /// Persistence failures here are logged and absorbed: the in-memory
    /// counters stay authoritative for the rest of the process.
    fn persist_usage(&self, state: &GatewayState) {
        let usage = BudgetUsage {
            daily_used: state.daily_used,
            daily_day: state.day_bucket.clone(),
            hourly_used: state.hourly_used,
            hourly_hour: state.hour_bucket.clone(),
        };
        if let Err(err) = self.store.set_budget_usage(&usage) {
            warn!(error = %err, "persist budget usage failed");
        }
    }
}

/// Lazy replenishment: points recovered are proportional to elapsed
/// minutes, saturating at the mode maximum. Idempotent at zero elapsed.
fn replenish(state: &mut GatewayState, mode: Mode, now: DateTime<Utc>) {
    let last = state.last_update.get(mode);
    let elapsed_minutes = (now - last).num_milliseconds() as f64 / 60_000.0;
    if elapsed_minutes <= 0.0 {
        return;
    }

    let max = state.config.mode_budgets.get(mode);
    let recovered = elapsed_minutes * state.config.recovery_rate;
    let replenished = (state.current.get(mode) + recovered).min(max);
    state.current.set(mode, replenished);
    state.last_update.set(mode, now);
}

/// The stateful checks shared by `evaluate` and `can_intervene`:
/// cooldown, hourly cap, daily cap, then per-mode points.
fn admission_check(
    state: &GatewayState,
    mode: Mode,
    cost: f64,
    now: DateTime<Utc>,
) -> Option<ReasonCode> {
    if state.config.cooldown_seconds > 0.0 {
        if let Some(last) = state.last_intervention {
            if elapsed_seconds(last, now) < state.config.cooldown_seconds {
                return Some(ReasonCode::CooldownActive);
            }
        }
    }
    if state.config.hourly_cap > 0.0 && state.hourly_used + cost > state.config.hourly_cap {
        return Some(ReasonCode::BudgetExhausted);
    }
    if state.config.daily_cap > 0.0 && state.daily_used + cost > state.config.daily_cap {
        return Some(ReasonCode::BudgetExhausted);
    }
    if state.current.get(mode) < cost {
        return Some(ReasonCode::BudgetExhausted);
    }
    None
}

fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

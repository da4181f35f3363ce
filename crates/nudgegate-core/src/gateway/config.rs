//! Gateway configuration resolved from the settings source.
//!
//! Resolution runs on every evaluation, so changed settings apply on the
//! next request without a restart. Absent or unparseable keys fall back
//! to the documented defaults.

use serde::{Deserialize, Serialize};

use crate::model::Mode;
use crate::settings::keys;
use crate::storage::SettingsStore;

/// Points recovered per minute of elapsed wall-clock time.
pub const DEFAULT_RECOVERY_RATE: f64 = 0.5;

/// Minimum seconds between two real interventions.
pub const DEFAULT_COOLDOWN_SECONDS: f64 = 300.0;

/// Per-mode maximum budgets in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeBudgets {
    pub silent: f64,
    pub light: f64,
    pub active: f64,
}

impl Default for ModeBudgets {
    fn default() -> Self {
        Self {
            silent: 2.0,
            light: 6.0,
            active: 10.0,
        }
    }
}

impl ModeBudgets {
    pub fn get(&self, mode: Mode) -> f64 {
        match mode {
            Mode::Silent => self.silent,
            Mode::Light => self.light,
            Mode::Active => self.active,
        }
    }

    pub fn set(&mut self, mode: Mode, value: f64) {
        match mode {
            Mode::Silent => self.silent = value,
            Mode::Light => self.light = value,
            Mode::Active => self.active = value,
        }
    }

    fn scale(&mut self, factor: f64) {
        self.silent *= factor;
        self.light *= factor;
        self.active *= factor;
    }
}

/// Effective gateway configuration for a single evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub mode_budgets: ModeBudgets,
    /// Points per minute.
    pub recovery_rate: f64,
    pub cooldown_seconds: f64,
    /// 0 disables the cap.
    pub hourly_cap: f64,
    /// 0 disables the cap.
    pub daily_cap: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode_budgets: ModeBudgets::default(),
            recovery_rate: DEFAULT_RECOVERY_RATE,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            hourly_cap: 0.0,
            daily_cap: 0.0,
        }
    }
}

impl GatewayConfig {
    /// Builds the effective configuration from the settings source.
    ///
    /// The coarse `intervention_budget` preference scales all mode maxima
    /// first; explicit per-mode overrides are applied on top of the
    /// scaled values. Read failures are treated as absent keys.
    pub fn resolve(store: &dyn SettingsStore) -> Self {
        let mut config = GatewayConfig::default();

        if let Some(value) = read(store, keys::INTERVENTION_BUDGET) {
            config.mode_budgets.scale(budget_factor(&value));
        }
        if let Some(parsed) = read_float(store, keys::BUDGET_SILENT) {
            config.mode_budgets.silent = parsed;
        }
        if let Some(parsed) = read_float(store, keys::BUDGET_LIGHT) {
            config.mode_budgets.light = parsed;
        }
        if let Some(parsed) = read_float(store, keys::BUDGET_ACTIVE) {
            config.mode_budgets.active = parsed;
        }
        if let Some(parsed) = read_float(store, keys::HOURLY_BUDGET_CAP) {
            config.hourly_cap = parsed;
        }
        if let Some(parsed) = read_float(store, keys::DAILY_BUDGET_CAP) {
            config.daily_cap = parsed;
        }
        if let Some(value) = read(store, keys::COOLDOWN_SECONDS) {
            if let Ok(parsed) = value.trim().parse::<i64>() {
                if parsed >= 0 {
                    config.cooldown_seconds = parsed as f64;
                }
            }
        }

        config
    }
}

fn budget_factor(value: &str) -> f64 {
    match value.trim().to_lowercase().as_str() {
        "low" => 0.7,
        "high" => 1.3,
        _ => 1.0,
    }
}

fn read(store: &dyn SettingsStore, key: &str) -> Option<String> {
    store.get_setting(key).ok().flatten()
}

fn read_float(store: &dyn SettingsStore, key: &str) -> Option<f64> {
    let value = read(store, key)?;
    match value.trim().parse::<f64>() {
        Ok(parsed) if parsed >= 0.0 => Some(parsed),
        _ => None,
    }
}

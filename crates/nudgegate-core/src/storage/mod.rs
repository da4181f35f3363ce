pub mod database;

pub use database::Database;

use std::path::PathBuf;

use crate::error::DatabaseError;
use crate::model::BudgetUsage;

/// Read-only settings source plus the budget-usage state contract the
/// gateway persists through. `Database` implements it; tests substitute
/// in-memory fakes.
pub trait SettingsStore: Send + Sync {
    fn get_setting(&self, key: &str) -> Result<Option<String>, DatabaseError>;
    fn budget_usage(&self) -> Result<Option<BudgetUsage>, DatabaseError>;
    fn set_budget_usage(&self, usage: &BudgetUsage) -> Result<(), DatabaseError>;
}

/// Returns `~/.config/nudgegate[-dev]/` based on NUDGEGATE_ENV.
///
/// Set NUDGEGATE_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("NUDGEGATE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("nudgegate-dev")
    } else {
        base_dir.join("nudgegate")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

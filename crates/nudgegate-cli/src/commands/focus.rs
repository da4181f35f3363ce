//! Focus monitor commands: status, enable/disable, event history.

use clap::Subcommand;
use serde_json::json;

use nudgegate_core::FocusError;

use crate::common::{open_services, CliResult};

#[derive(Subcommand)]
pub enum FocusAction {
    /// Show monitor state and current focus signals
    Status,
    /// Enable focus monitoring
    Enable,
    /// Disable focus monitoring (finalizes the open session)
    Disable,
    /// List recorded focus events, newest first
    Events {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// List derived focus-state snapshots, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

pub fn run(action: FocusAction) -> CliResult {
    let services = open_services()?;
    match action {
        FocusAction::Status => {
            let (no_progress, elapsed) = services.monitor.no_progress();
            let output = json!({
                "supported": services.monitor.supported(),
                "enabled": services.monitor.enabled(),
                "switch_count": services.monitor.switch_count(),
                "no_progress": no_progress,
                "no_progress_minutes": elapsed.num_milliseconds() as f64 / 60_000.0,
                "current": services.monitor.current()?,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        FocusAction::Enable => set_enabled(&services, true)?,
        FocusAction::Disable => set_enabled(&services, false)?,
        FocusAction::Events { limit } => {
            let events = services.db.list_focus_events(limit)?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        FocusAction::History { limit } => {
            let snapshots = services.db.list_focus_state_snapshots(limit, 0, 0)?;
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        }
    }
    Ok(())
}

fn set_enabled(services: &crate::common::Services, enabled: bool) -> CliResult {
    match services.monitor.set_enabled(enabled) {
        Ok(()) => {
            println!(
                "focus monitoring {}",
                if enabled { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        // Expected on hosts without a frontmost-app source; not a failure.
        Err(FocusError::Unsupported) => {
            println!("focus monitoring is not supported on this host");
            Ok(())
        }
    }
}

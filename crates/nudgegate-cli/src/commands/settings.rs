//! Settings commands: get, set (with validation), list.

use chrono::Utc;
use clap::Subcommand;

use nudgegate_core::settings::normalize_value;

use crate::common::{open_services, CliResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print one setting value
    Get { key: String },
    /// Validate and store a setting value
    Set { key: String, value: String },
    /// List all stored settings
    List,
}

pub fn run(action: SettingsAction) -> CliResult {
    let services = open_services()?;
    match action {
        SettingsAction::Get { key } => match services.db.get_setting(&key)? {
            Some(value) => println!("{value}"),
            None => println!("(unset)"),
        },
        SettingsAction::Set { key, value } => {
            let normalized = normalize_value(&key, &value)?;
            services
                .db
                .upsert_setting(&key, &normalized, Utc::now().timestamp_millis())?;
            println!("{key} = {normalized}");
        }
        SettingsAction::List => {
            let settings = services.db.list_settings()?;
            if settings.is_empty() {
                println!("(no settings stored)");
            } else {
                for item in settings {
                    println!("{} = {}", item.key, item.value);
                }
            }
        }
    }
    Ok(())
}

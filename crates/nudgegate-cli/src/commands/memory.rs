//! Preference memory commands: summaries, raw listings, explanation
//! view, and the "forget me" reset.

use clap::Subcommand;

use crate::common::{open_services, CliResult};

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Profile summary as fed to the generator (decay applied)
    Summary,
    /// Raw profile rows with stored confidences
    Profiles,
    /// Recent memory events, newest first
    Events {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Human-readable explanation of what has been learned
    Explain,
    /// Wipe all profiles and memory events
    Reset {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: MemoryAction) -> CliResult {
    let services = open_services()?;
    match action {
        MemoryAction::Summary => {
            let summary = services.memory.profile_summary();
            if summary.is_empty() {
                println!("(no preferences learned yet)");
            } else {
                println!("{summary}");
            }
        }
        MemoryAction::Profiles => {
            let profiles = services.memory.list_profiles()?;
            println!("{}", serde_json::to_string_pretty(&profiles)?);
        }
        MemoryAction::Events { limit } => {
            let events = services.memory.list_events(limit)?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        MemoryAction::Explain => {
            let explanations = services.memory.learning_explanations()?;
            if explanations.is_empty() {
                println!("(nothing learned yet)");
            } else {
                for line in explanations {
                    println!("{line}");
                }
            }
        }
        MemoryAction::Reset { yes } => {
            if !yes {
                println!("this wipes all learned preferences; re-run with --yes to confirm");
                return Ok(());
            }
            services.memory.reset()?;
            println!("preference memory cleared");
        }
    }
    Ok(())
}

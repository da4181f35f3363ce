use clap::{Parser, Subcommand};

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "nudgegate-cli", version, about = "Nudgegate CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decision gateway: evaluate, dry-run, feedback, status
    Gate {
        #[command(subcommand)]
        action: commands::gate::GateAction,
    },
    /// Focus monitor control and history
    Focus {
        #[command(subcommand)]
        action: commands::focus::FocusAction,
    },
    /// Preference memory inspection and reset
    Memory {
        #[command(subcommand)]
        action: commands::memory::MemoryAction,
    },
    /// Settings management
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Gate { action } => commands::gate::run(action),
        Commands::Focus { action } => commands::focus::run(action),
        Commands::Memory { action } => commands::memory::run(action),
        Commands::Settings { action } => commands::settings::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}

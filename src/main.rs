use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod assembly;
mod compat;
mod config;
mod data;
mod estimate;
mod export;
mod orchestrator;
mod progress;
mod storage;
mod store;

use orchestrator::AppContext;
use storage::FileStorage;

#[derive(Parser)]
#[command(name = "splitkb")]
#[command(about = "splitkb - plan, price and assemble a split keyboard build", long_about = None)]
struct Cli {
    /// Directory holding saved choices, progress and settings
    #[arg(long, global = true, default_value = "kb-data")]
    data_dir: PathBuf,

    /// JSON file overriding the built-in component prices
    #[arg(long, global = true)]
    prices: Option<PathBuf>,

    /// JSON file replacing the built-in assembly guide
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current choices
    Show,

    /// Set a build choice (e.g. `set controller nice-nano`)
    Set {
        /// Field: build-method, form-factor, key-count, controller, switch, connectivity, firmware, keycaps
        field: String,

        /// New value, or "none" to unset
        value: String,

        /// Apply even if the change introduces compatibility errors
        #[arg(long)]
        force: bool,
    },

    /// Turn an optional feature on or off
    Feature {
        /// Feature: hotswap, rgb, oled, encoder, trackball, wireless
        name: String,

        /// on or off
        state: String,
    },

    /// Reset all choices to defaults
    Reset,

    /// Check the current choices for compatibility problems
    Check,

    /// Estimate cost, complexity and build time
    Estimate,

    /// Print the assembly guide for the current build
    Guide,

    /// Track assembly progress
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Export the build plan
    Export {
        /// Export format (json or text)
        #[arg(long, default_value = "text")]
        format: String,

        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Set the display currency (USD or NPR)
    Currency {
        code: String,
    },
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Show completion per phase
    Show,

    /// Mark a step complete, or incomplete if it already is
    Toggle {
        /// Step ID from the guide
        step_id: String,
    },

    /// Mark a step complete (on) or incomplete (off)
    Set {
        /// Step ID from the guide
        step_id: String,

        /// on or off
        state: String,
    },

    /// Clear all assembly progress
    Reset,
}

fn parse_switch(state: &str) -> Result<bool> {
    match state.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => anyhow::bail!("Expected on or off, got: {}", state),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let storage = FileStorage::new(&cli.data_dir);
    let ctx = AppContext::new(&storage, cli.prices.as_deref(), cli.catalog.as_deref())?;

    match cli.command {
        Commands::Show => orchestrator::show(&ctx)?,
        Commands::Set {
            field,
            value,
            force,
        } => {
            tracing::info!(field = %field, value = %value, force = %force, "Setting choice");
            orchestrator::set_choice(&ctx, &field, &value, force)?;
        }
        Commands::Feature { name, state } => {
            tracing::info!(feature = %name, state = %state, "Setting feature");
            orchestrator::set_feature(&ctx, &name, parse_switch(&state)?)?;
        }
        Commands::Reset => {
            tracing::info!("Resetting choices");
            orchestrator::reset(&ctx)?;
        }
        Commands::Check => orchestrator::check(&ctx)?,
        Commands::Estimate => orchestrator::estimate(&ctx)?,
        Commands::Guide => orchestrator::guide(&ctx)?,
        Commands::Progress { action } => match action {
            ProgressAction::Show => orchestrator::progress_show(&ctx)?,
            ProgressAction::Toggle { step_id } => {
                tracing::info!(step = %step_id, "Toggling step");
                orchestrator::progress_toggle(&ctx, &step_id)?;
            }
            ProgressAction::Set { step_id, state } => {
                tracing::info!(step = %step_id, state = %state, "Setting step");
                orchestrator::progress_set(&ctx, &step_id, parse_switch(&state)?)?;
            }
            ProgressAction::Reset => {
                tracing::info!("Resetting progress");
                orchestrator::progress_reset(&ctx)?;
            }
        },
        Commands::Export { format, output } => {
            tracing::info!(format = %format, "Exporting build plan");
            orchestrator::export(&ctx, &format, output.as_deref())?;
        }
        Commands::Currency { code } => {
            tracing::info!(currency = %code, "Setting currency");
            orchestrator::set_currency(&ctx, &code)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch() {
        assert!(parse_switch("on").unwrap());
        assert!(parse_switch("OFF").map(|v| !v).unwrap());
        assert!(parse_switch("maybe").is_err());
    }

    #[test]
    fn test_cli_parses_global_data_dir() {
        let cli = Cli::try_parse_from(["splitkb", "check", "--data-dir", "/tmp/kb"]).unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/kb"));
        assert!(matches!(cli.command, Commands::Check));
    }
}

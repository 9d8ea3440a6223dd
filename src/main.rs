//! md2image - administration entry point for the state store
//!
//! # Overview
//!
//! The chat bot and the HTTP API attach to the library's service layer in
//! their own processes. This binary operates on the same state document for
//! operators: it loads settings, opens the store and runs one control
//! command against it.
//!
//! # Execution Flow
//!
//! 1. Parse command line arguments
//! 2. Load settings (`md2image.yaml` in the config dir, then environment)
//! 3. Initialize logging → `<log_dir>/md2image.<date>`, then log the settings
//! 4. Open the state store, creating the default document on first run
//! 5. Run the requested command through [`ControlService`]
//!
//! A malformed or unreadable state document aborts the command without
//! touching the file.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use md2image::models::ListName;
use md2image::services::{ControlService, ListOp, ModuleRegistry};
use md2image::{APP_NAME, ConfigManager, StateManager, StateStore, VERSION};

#[derive(Parser, Debug)]
#[command(name = "md2image", version, about = "Manage md2image access lists and usage statistics", long_about = None)]
struct Cli {
    /// Directory holding md2image.yaml
    #[arg(long, env = "MD2IMAGE_CONFIG_DIR", default_value = ".")]
    config_dir: Utf8PathBuf,

    /// Override the state document location from settings
    #[arg(long)]
    state: Option<Utf8PathBuf>,

    /// Mirror log output to the console
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show access mode, list sizes and counters
    Status,
    /// Print statistics and configuration as JSON
    Stats,
    /// Show or change public access
    Public {
        #[arg(value_enum)]
        mode: Option<PublicMode>,
    },
    /// Show or edit the whitelist
    Whitelist {
        #[command(subcommand)]
        action: Option<ListAction>,
    },
    /// Show or edit the blacklist
    Blacklist {
        #[command(subcommand)]
        action: Option<ListAction>,
    },
    /// Check enabled modules against the built-in registry
    Modules,
    /// Write a settings template to the config dir
    InitConfig,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PublicMode {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
enum ListAction {
    /// Add identities
    Add {
        #[arg(allow_hyphen_values = true)]
        ids: Vec<String>,
    },
    /// Remove identities
    Remove {
        #[arg(allow_hyphen_values = true)]
        ids: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let settings = config_manager.load_settings()?;

    let _log_guard = md2image::logging::setup_logging_with_console(
        &settings.log_dir,
        APP_NAME,
        settings.debug_mode,
        cli.verbose,
    )?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    // Settings were parsed before the subscriber existed
    settings.log_summary();

    let state_path = cli.state.unwrap_or_else(|| settings.state_path.clone());
    let open_state = || -> Result<StateManager> {
        let store = StateStore::open_seeded(&state_path, settings.public_enabled)
            .with_context(|| format!("Failed to open state store: {}", state_path))?;
        Ok(StateManager::new(store))
    };

    let state = match cli.command {
        Command::InitConfig => {
            config_manager.write_template(&settings)?;
            println!("Wrote {}", config_manager.settings_path());
            return Ok(());
        }
        Command::Status => {
            let state = open_state()?;
            let status = ControlService::new(state.clone()).status()?;
            println!("Public access: {}", status.public_enabled);
            println!("Whitelist: {} identities", status.whitelist_len);
            println!("Blacklist: {} identities", status.blacklist_len);
            println!("Total requests: {}", status.total_requests);
            println!(
                "Succeeded: {} / Failed: {}",
                status.render_success, status.render_failed
            );
            state
        }
        Command::Stats => {
            let state = open_state()?;
            let report = ControlService::new(state.clone()).stats()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            state
        }
        Command::Public { mode } => {
            let state = open_state()?;
            let control = ControlService::new(state.clone());
            let enabled = match mode {
                Some(PublicMode::On) => control.set_public_status(true)?,
                Some(PublicMode::Off) => control.set_public_status(false)?,
                None => control.get_public_status()?,
            };
            println!("Public access: {}", enabled);
            state
        }
        Command::Whitelist { action } => {
            let state = open_state()?;
            run_list_command(&ControlService::new(state.clone()), ListName::Whitelist, action)?;
            state
        }
        Command::Blacklist { action } => {
            let state = open_state()?;
            run_list_command(&ControlService::new(state.clone()), ListName::Blacklist, action)?;
            state
        }
        Command::Modules => {
            let state = open_state()?;
            let registry = ModuleRegistry::builtin();
            let enabled = state.read(|s| s.config.enabled_modules.clone())?;
            for name in &enabled {
                let marker = if registry.contains(name) { "ok" } else { "unknown" };
                println!("{} ({})", name, marker);
            }
            if enabled.is_empty() {
                println!("No modules enabled");
            }
            state
        }
    };

    state.metrics().log_summary();
    Ok(())
}

fn run_list_command(control: &ControlService, list: ListName, action: Option<ListAction>) -> Result<()> {
    let edit = match action {
        None => {
            println!("{}: {:?}", list, control.get_list(list)?);
            return Ok(());
        }
        Some(ListAction::Add { ids }) => control.modify_list_from_tokens(list, ListOp::Add, &ids)?,
        Some(ListAction::Remove { ids }) => {
            control.modify_list_from_tokens(list, ListOp::Remove, &ids)?
        }
    };

    if !edit.skipped.is_empty() {
        eprintln!("Skipped invalid identities: {:?}", edit.skipped);
    }
    println!("{}: {:?}", list, edit.entries);
    Ok(())
}

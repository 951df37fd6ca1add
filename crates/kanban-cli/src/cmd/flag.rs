use crate::cmd::open_store;
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use kanban_core::config::{normalize_flag, Settings, FEATURE_FLAGS};
use std::path::Path;

#[derive(Subcommand)]
pub enum FlagSubcommand {
    /// Turn a feature flag on
    Enable { name: String },
    /// Turn a feature flag off
    Disable { name: String },
    /// Show flag values from config.toml
    List,
}

pub fn run(root: &Path, subcmd: FlagSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let mut settings = Settings::load(store.root()).context("failed to load config.toml")?;
    let (name, enabled) = match subcmd {
        FlagSubcommand::List => {
            let flags = settings.flags();
            if json {
                return print_json(&flags);
            }
            for (name, on) in &flags {
                println!("{name}: {}", if *on { "on" } else { "off" });
            }
            println!("\nAvailable flags:");
            for (name, description) in FEATURE_FLAGS {
                println!("  {name}: {description}");
            }
            return Ok(());
        }
        FlagSubcommand::Enable { name } => (name, true),
        FlagSubcommand::Disable { name } => (name, false),
    };

    let name = normalize_flag(&name);
    let previous = settings.set_flag(&name, enabled)?;
    if previous != enabled {
        settings.save(store.root())?;
    }
    if json {
        return print_json(&serde_json::json!({
            "flag": name,
            "enabled": enabled,
            "changed": previous != enabled,
        }));
    }
    let state = if enabled { "enabled" } else { "disabled" };
    if previous == enabled {
        println!("{name} already {state}");
    } else {
        println!("{name} {state}");
    }
    Ok(())
}

//! `config get`, `config set`, `config list` and `config path`.

use clap::Subcommand;
use livetransit::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print a value
    Get {
        /// Key in section.key form (e.g. live.poll_interval)
        key: String,
    },

    /// Change a value and save the file
    Set {
        /// Key in section.key form (e.g. live.poll_interval)
        key: String,

        /// New value; an empty string clears optional keys
        value: String,
    },

    /// Print every setting
    List,

    /// Print the config file location
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'livetransit config list' to see available keys.",
            key
        ))
    })
}

fn run_get(key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load()?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let mut config = ConfigFile::load()?;
    config_key.set(&mut config, value)?;
    config.save()?;

    println!("Set {} = {}", config_key.name(), value);
    Ok(())
}

fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    print!("{}", render_list(&config));
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

/// All keys grouped by section, INI style.
fn render_list(config: &ConfigFile) -> String {
    let mut out = String::new();
    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section));
            current_section = section;
        }

        let value = key.get(config);
        if value.is_empty() {
            out.push_str(&format!("  {} = (not set)\n", key.key_name()));
        } else {
            out.push_str(&format!("  {} = {}\n", key.key_name(), value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_list_groups_sections() {
        let rendered = render_list(&ConfigFile::default());
        assert!(rendered.starts_with("[backend]\n"));
        assert!(rendered.contains("\n[live]\n"));
        assert!(rendered.contains("  poll_interval = 5\n"));
        assert!(rendered.contains("  max_entries = (not set)\n"));
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        assert!(matches!(parse_key("map.colour"), Err(CliError::Config(_))));
        assert!(parse_key("live.freshness").is_ok());
    }
}

//! `init` - write a config file with every default.

use livetransit::config::{config_file_path, ConfigFile};

use crate::error::CliError;

pub fn run() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load()?;
    config.save()?;

    println!("Configuration file: {}", path.display());
    println!("Backend:            {}", config.backend.url);
    println!();
    println!("Edit this file or use 'livetransit config set' to change settings.");
    println!("Command-line options override config file values when given.");
    Ok(())
}

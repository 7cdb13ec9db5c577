//! `transfer config` – show the resolved configuration file path and contents.

use anyhow::Result;
use transfer_core::config;

pub fn run_config() -> Result<()> {
    let path = config::config_path()?;
    let cfg = config::load_or_init()?;
    println!("config file: {}", path.display());
    println!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}

//! CLI command handlers. Each command is in its own file for clarity.

mod config;
mod download;
mod upload;

pub use config::run_config;
pub use download::run_download;
pub use upload::run_upload;

use std::collections::HashMap;

use anyhow::{bail, Result};

/// Parses repeated `--header "Key: Value"` flags into a header map.
pub(crate) fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::with_capacity(raw.len());
    for entry in raw {
        let Some((key, value)) = entry.split_once(':') else {
            bail!("invalid header '{entry}', expected 'Key: Value'");
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

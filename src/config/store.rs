use std::path::Path;
use tracing::{debug, info};

use super::VhidConfig;
use crate::error::Result;

/// Load and validate a TOML configuration file
///
/// Sections and fields missing from the file fall back to their defaults.
pub fn load(path: &Path) -> Result<VhidConfig> {
    let text = std::fs::read_to_string(path)?;
    let config: VhidConfig = toml::from_str(&text)?;
    config.validate()?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load `path` when given, otherwise use the built-in defaults
pub fn load_or_default(path: Option<&Path>) -> Result<VhidConfig> {
    match path {
        Some(path) => load(path),
        None => {
            debug!("No configuration file given, using defaults");
            Ok(VhidConfig::default())
        }
    }
}

//! Config loader (strict parsing).

pub mod schema;

use std::fs;

use dataapi_core::error::{DataApiError, Result};

pub use schema::{DataApiConfig, MetricsConfig};

pub fn load_from_file(path: &str) -> Result<DataApiConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| DataApiError::Config(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<DataApiConfig> {
    let cfg: DataApiConfig = serde_yaml::from_str(s)
        .map_err(|e| DataApiError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

//! Credential lookup.

use std::path::Path;

pub const API_KEY_ENV: &str = "NOTION_API_KEY";
const ENV_FILE: &str = ".env";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("NOTION_API_KEY not found in --api-key, the environment or .env")]
    MissingApiKey,
}

/// Returns the explicit key when non-blank, else `NOTION_API_KEY` from the
/// `.env` file in `dir`. The file is read without touching the process
/// environment.
pub fn resolve_api_key(explicit: Option<&str>, dir: &Path) -> Result<String, ConfigError> {
    if let Some(key) = explicit.map(str::trim).filter(|key| !key.is_empty()) {
        return Ok(key.to_string());
    }
    dotenvy::from_path_iter(dir.join(ENV_FILE))
        .ok()
        .and_then(|entries| {
            entries
                .filter_map(Result::ok)
                .find(|(key, _)| key == API_KEY_ENV)
        })
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingApiKey)
}

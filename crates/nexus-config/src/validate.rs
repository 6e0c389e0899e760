//! Configuration validation.
//!
//! Runs after defaults are applied, so only genuinely bad values remain.

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a loaded configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_policy(config)?;
    validate_prometheus(config)?;
    Ok(())
}

fn validate_policy(config: &Config) -> ConfigResult<()> {
    let p = &config.policy;
    let lists = [
        ("policy.allow_modules", &p.allow_modules),
        ("policy.deny_modules", &p.deny_modules),
        ("policy.allow_tools", &p.allow_tools),
        ("policy.deny_tools", &p.deny_tools),
        ("policy.confirm_tools", &p.confirm_tools),
    ];
    for (field, patterns) in lists {
        if patterns.iter().any(|pat| pat.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                field: field.to_owned(),
                message: "patterns must not be empty".to_owned(),
            });
        }
    }
    Ok(())
}

fn validate_prometheus(config: &Config) -> ConfigResult<()> {
    let prom = &config.modules.prometheus;
    if !prom.enabled {
        return Ok(());
    }
    let url = Url::parse(&prom.url).map_err(|e| ConfigError::ValidationError {
        field: "modules.prometheus.url".to_owned(),
        message: format!("invalid url '{}': {e}", prom.url),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::ValidationError {
            field: "modules.prometheus.url".to_owned(),
            message: format!("url '{}' must be http(s) with a host", prom.url),
        });
    }
    Ok(())
}

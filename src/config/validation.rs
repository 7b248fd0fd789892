use crate::config::types::{ClientConfig, Config, PathsConfig, WorkersConfig};
use crate::ConfigError;
use std::path::Path;
use url::Url;

/// Upper bound for concurrent workers; the rate limiter serializes requests anyway
const MAX_JOBS: usize = 64;

/// Validates the entire configuration
///
/// Called after command line overrides have been applied, so the values
/// checked are the ones the run will use.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_client_config(&config.client)?;
    validate_paths_config(&config.paths)?;
    validate_workers_config(&config.workers)?;
    validate_redirects(config)?;
    Ok(())
}

/// Validates remote access settings
fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if !config.timer.is_finite() || config.timer < 0.0 {
        return Err(ConfigError::Validation(format!(
            "timer must be a non-negative number of seconds, got {}",
            config.timer
        )));
    }

    validate_email(&config.from)?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if config.timeout == 0 {
        return Err(ConfigError::Validation(
            "timeout must be at least 1 second".to_string(),
        ));
    }

    if config.max_retries == 0 {
        return Err(ConfigError::Validation(
            "max-retries must be >= 1 (it counts the first attempt)".to_string(),
        ));
    }

    Ok(())
}

fn validate_paths_config(config: &PathsConfig) -> Result<(), ConfigError> {
    for (name, path) in [
        ("cache-dir", &config.cache_dir),
        ("index-file", &config.index_file),
        ("db-file", &config.db_file),
        ("backup-dir", &config.backup_dir),
    ] {
        validate_path(name, path)?;
    }
    Ok(())
}

fn validate_path(name: &str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }
    Ok(())
}

fn validate_workers_config(config: &WorkersConfig) -> Result<(), ConfigError> {
    if config.jobs < 1 || config.jobs > MAX_JOBS {
        return Err(ConfigError::Validation(format!(
            "jobs must be between 1 and {}, got {}",
            MAX_JOBS, config.jobs
        )));
    }
    Ok(())
}

/// Redirect targets must be review IDs themselves
fn validate_redirects(config: &Config) -> Result<(), ConfigError> {
    for (from, to) in &config.redirects {
        if to.is_empty() || !to.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Validation(format!(
                "redirect target for '{}' must be a numeric review ID, got '{}'",
                from, to
            )));
        }
    }
    Ok(())
}

/// Basic email validation for the `From` header
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation("from cannot be empty".to_string()));
    }

    // Must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    Ok(())
}

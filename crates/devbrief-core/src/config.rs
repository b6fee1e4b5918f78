use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_SUBREDDITS: &str = "programming,machinelearning,Python,golang,rust,webdev,LocalLLaMA";
const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(invalid(var, "must be a finite number".to_string()))
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("DEVBRIEF_ENV", "development"))?;
    let log_level = or_default("DEVBRIEF_LOG_LEVEL", "info");
    let watchlist_path = PathBuf::from(or_default(
        "DEVBRIEF_WATCHLIST_PATH",
        "./config/watchlist.yaml",
    ));
    let report_path = PathBuf::from(or_default(
        "DEVBRIEF_REPORT_PATH",
        "./reports/final_report.md",
    ));

    let db_max_connections = parse_u32("DEVBRIEF_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("DEVBRIEF_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("DEVBRIEF_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let github_token = optional("GITHUB_TOKEN");
    let trending_limit = parse_u32("DEVBRIEF_TRENDING_LIMIT", "10")?;
    let trending_window_days = parse_u32("DEVBRIEF_TRENDING_WINDOW_DAYS", "7")?;
    let hn_story_limit = parse_usize("DEVBRIEF_HN_STORY_LIMIT", "50")?;
    let reddit_subreddits = parse_list(&or_default("DEVBRIEF_REDDIT_SUBREDDITS", DEFAULT_SUBREDDITS));
    let reddit_post_limit = parse_u32("DEVBRIEF_REDDIT_POST_LIMIT", "10")?;
    let reddit_client_id = optional("REDDIT_CLIENT_ID");
    let reddit_client_secret = optional("REDDIT_CLIENT_SECRET");

    let user_agent = or_default("DEVBRIEF_USER_AGENT", "devbrief/0.1 (daily-briefing)");
    let request_timeout_secs = parse_u64("DEVBRIEF_REQUEST_TIMEOUT_SECS", "30")?;
    let max_concurrent_fetches = parse_usize("DEVBRIEF_MAX_CONCURRENT_FETCHES", "8")?;
    let fetch_max_retries = parse_u32("DEVBRIEF_FETCH_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("DEVBRIEF_RETRY_BACKOFF_BASE_MS", "1000")?;

    let gemini_api_key = optional("GEMINI_API_KEY");
    let llm_model = or_default("DEVBRIEF_LLM_MODEL", "gemini-2.0-flash");
    let llm_base_url = or_default("DEVBRIEF_LLM_BASE_URL", DEFAULT_LLM_BASE_URL);
    let llm_timeout_secs = parse_u64("DEVBRIEF_LLM_TIMEOUT_SECS", "120")?;

    let approval_threshold = parse_f64("DEVBRIEF_APPROVAL_THRESHOLD", "7.5")?;
    if !(0.0..=10.0).contains(&approval_threshold) {
        return Err(invalid(
            "DEVBRIEF_APPROVAL_THRESHOLD",
            format!("{approval_threshold} is outside 0..=10"),
        ));
    }

    let max_attempts = parse_u32("DEVBRIEF_MAX_ATTEMPTS", "3")?;
    if max_attempts == 0 {
        return Err(invalid(
            "DEVBRIEF_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }

    let steady_tolerance = parse_f64("DEVBRIEF_STEADY_TOLERANCE", "0.5")?;
    if steady_tolerance < 0.0 {
        return Err(invalid(
            "DEVBRIEF_STEADY_TOLERANCE",
            "must not be negative".to_string(),
        ));
    }

    let decline_ratio = parse_f64("DEVBRIEF_DECLINE_RATIO", "0.5")?;
    if decline_ratio < 0.0 {
        return Err(invalid(
            "DEVBRIEF_DECLINE_RATIO",
            "must not be negative".to_string(),
        ));
    }

    let schedule_cron = or_default("DEVBRIEF_SCHEDULE_CRON", "0 0 9 * * *");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        watchlist_path,
        report_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        github_token,
        trending_limit,
        trending_window_days,
        hn_story_limit,
        reddit_subreddits,
        reddit_post_limit,
        reddit_client_id,
        reddit_client_secret,
        user_agent,
        request_timeout_secs,
        max_concurrent_fetches,
        fetch_max_retries,
        retry_backoff_base_ms,
        gemini_api_key,
        llm_model,
        llm_base_url,
        llm_timeout_secs,
        approval_threshold,
        max_attempts,
        steady_tolerance,
        decline_ratio,
        schedule_cron,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "DEVBRIEF_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

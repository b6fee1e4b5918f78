use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub watchlist_path: PathBuf,
    pub report_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub github_token: Option<String>,
    pub trending_limit: u32,
    pub trending_window_days: u32,
    pub hn_story_limit: usize,
    pub reddit_subreddits: Vec<String>,
    pub reddit_post_limit: u32,
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    pub fetch_max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub gemini_api_key: Option<String>,
    pub llm_model: String,
    pub llm_base_url: String,
    pub llm_timeout_secs: u64,
    /// Minimum evaluation score (0–10) for a draft to be approved.
    pub approval_threshold: f64,
    /// Upper bound on draft/evaluate cycles per briefing run.
    pub max_attempts: u32,
    /// Growth rates (stars/day) with a smaller magnitude count as flat.
    pub steady_tolerance: f64,
    /// Fraction of prior momentum that must be lost before a growing repo is declining.
    pub decline_ratio: f64,
    pub schedule_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("watchlist_path", &self.watchlist_path)
            .field("report_path", &self.report_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "github_token",
                &self.github_token.as_ref().map(|_| "[redacted]"),
            )
            .field("trending_limit", &self.trending_limit)
            .field("trending_window_days", &self.trending_window_days)
            .field("hn_story_limit", &self.hn_story_limit)
            .field("reddit_subreddits", &self.reddit_subreddits)
            .field("reddit_post_limit", &self.reddit_post_limit)
            .field("reddit_client_id", &self.reddit_client_id)
            .field(
                "reddit_client_secret",
                &self.reddit_client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_concurrent_fetches", &self.max_concurrent_fetches)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_model", &self.llm_model)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("approval_threshold", &self.approval_threshold)
            .field("max_attempts", &self.max_attempts)
            .field("steady_tolerance", &self.steady_tolerance)
            .field("decline_ratio", &self.decline_ratio)
            .field("schedule_cron", &self.schedule_cron)
            .finish()
    }
}

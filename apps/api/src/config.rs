use anyhow::{Context, Result};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:5000/api/submit";
const DEFAULT_LOGIN_URL: &str = "http://127.0.0.1:5000/api/login";
const DEFAULT_USER_STORE_PATH: &str = ".optilife/user.json";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub collector_url: String,
    pub login_url: String,
    pub user_store_path: String,
    pub llm_timeout_secs: u64,
    pub session_idle_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_base_url: env_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            collector_url: env_or("COLLECTOR_URL", DEFAULT_COLLECTOR_URL),
            login_url: env_or("LOGIN_URL", DEFAULT_LOGIN_URL),
            user_store_path: env_or("USER_STORE_PATH", DEFAULT_USER_STORE_PATH),
            llm_timeout_secs: env_or("LLM_TIMEOUT_SECS", "120")
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            session_idle_secs: env_or("SESSION_IDLE_SECS", "1800")
                .parse::<u64>()
                .context("SESSION_IDLE_SECS must be a whole number of seconds")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

// src/config.rs

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds to.
    pub bind_addr: String,
    /// SQLite URL for persisting attempts and leaderboard scores.
    /// When absent, everything lives in process memory.
    pub database_url: Option<String>,
    /// Optional JSON catalog loaded at boot.
    pub seed_file: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            seed_file: None,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let database_url = non_empty_var("DATABASE_URL");

        let seed_file = non_empty_var("QUIZ_SEED_FILE").map(PathBuf::from);

        let cors_origins = non_empty_var("CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_CORS_ORIGIN.to_string()]);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            bind_addr,
            database_url,
            seed_file,
            cors_origins,
            rust_log,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_split_and_trimmed() {
        let origins = parse_origins(" http://a.test , ,http://b.test");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn default_config_is_in_memory() {
        let config = Config::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
    }
}

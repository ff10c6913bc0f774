use std::env;

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_LOG_FILTER: &str = "learnhub=info,axum=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Postgres URL. Without one the service keeps everything in memory.
    pub database_url: Option<String>,
    pub port: u16,
    pub log_filter: String,
}

impl Config {
    /// Reads `DATABASE_URL`, `PORT` and `RUST_LOG`. Call after
    /// `dotenvy::dotenv()` so `.env` values are visible.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            port: lookup("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

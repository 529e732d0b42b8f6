use std::time::Duration;

use serde::Deserialize;

/// Per-IP signup throttling, read from `RATE_LIMIT_WINDOW_MS` and
/// `RATE_LIMIT_MAX_REQUESTS`.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 15 * 60 * 1000,
            max_requests: 5,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Argon2 cost parameters for the privacy digests. Defaults are the argon2
/// crate defaults; lower them only in tests.
#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Allowed browser origin; unset means permissive CORS for local work.
    pub cors_origin: Option<String>,
    /// Server-side salt mixed into every IP digest.
    pub ip_salt: String,
    pub rate_limit: RateLimitConfig,
    pub digest: DigestConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let rate_limit = RateLimitConfig {
            window_ms: std::env::var("RATE_LIMIT_WINDOW_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(15 * 60 * 1000),
            max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(5),
        };

        let digest = DigestConfig {
            memory_kib: std::env::var("DIGEST_MEMORY_KIB")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(argon2::Params::DEFAULT_M_COST),
            iterations: std::env::var("DIGEST_ITERATIONS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(argon2::Params::DEFAULT_T_COST),
            parallelism: std::env::var("DIGEST_PARALLELISM")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(argon2::Params::DEFAULT_P_COST),
        };

        let ip_salt = match std::env::var("IP_SALT") {
            Ok(v) if !v.is_empty() => v,
            _ => {
                tracing::warn!("IP_SALT not set; using built-in default salt");
                "default-salt-change-this".to_string()
            }
        };

        let cors_origin = std::env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty());

        Ok(Self {
            database_url,
            cors_origin,
            ip_salt,
            rate_limit,
            digest,
        })
    }
}

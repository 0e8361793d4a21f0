use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "skincare-gateway")]
#[command(about = "API gateway for the AI skincare assistant")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Generation service base URL
    #[arg(long, env = "GENERATION_URL", default_value = "http://localhost:8091")]
    pub generation_url: String,

    // Model id sent to the generation service
    #[arg(long, env = "GENERATION_MODEL", default_value = "gemini-3-flash-preview")]
    pub model: String,

    // Generation service API key. Required - the gateway refuses to start
    // without it instead of failing on the first request.
    #[arg(long, env = "GENERATION_API_KEY", hide_env_values = true)]
    pub generation_api_key: Option<String>,

    // Auth service base URL
    #[arg(long, env = "AUTH_URL", default_value = "http://localhost:9999")]
    pub auth_url: String,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Retry attempts after the first failed generation call
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    // Base backoff delay in milliseconds, doubled per retry
    #[arg(long, default_value_t = 1000)]
    pub retry_base_ms: u64,

    // Allowed CORS origins (comma-separated)
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "http://localhost:3000")]
    pub allowed_origins: String,
}

// Validated runtime configuration, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub generation_url: String,
    pub model: String,
    pub generation_api_key: String,
    pub auth_url: String,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub allowed_origins: Vec<String>,
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, ConfigError> {
        let generation_api_key = args
            .generation_api_key
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing("GENERATION_API_KEY"))?;

        if args.rate_limit == 0 {
            return Err(ConfigError::Invalid("rate limit must be greater than zero"));
        }
        if args.rate_window == 0 {
            return Err(ConfigError::Invalid("rate window must be greater than zero"));
        }

        let allowed_origins = args
            .allowed_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Config {
            port: args.port,
            generation_url: trim_trailing_slash(args.generation_url),
            model: args.model,
            generation_api_key,
            auth_url: trim_trailing_slash(args.auth_url),
            rate_limit: args.rate_limit,
            rate_window: Duration::from_secs(args.rate_window),
            max_retries: args.max_retries,
            retry_base: Duration::from_millis(args.retry_base_ms),
            allowed_origins,
        })
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Configuration management for the API server
///
/// Configuration comes from environment variables (a `.env` file is loaded
/// first when present).
///
/// # Environment Variables
///
/// | Variable | Default | Notes |
/// |----------|---------|-------|
/// | `API_HOST` | `0.0.0.0` | |
/// | `API_PORT` | `8080` | |
/// | `APP_BASE_URL` | `http://localhost:3000` | Prefix of links in emails |
/// | `CORS_ORIGINS` | `*` | Comma-separated |
/// | `PRODUCTION` | `false` | Enables HSTS |
/// | `DATABASE_URL` | required | |
/// | `DATABASE_MAX_CONNECTIONS` | `10` | |
/// | `JWT_SECRET` | required | At least 32 characters |
/// | `REDIS_URL` | unset | Enables the Redis realtime transport |
/// | `REALTIME_APP_KEY` | `projexy` | |
/// | `REALTIME_APP_SECRET` | `JWT_SECRET` | |
/// | `EMAIL_API_URL` | Resend endpoint | |
/// | `EMAIL_API_KEY` | unset | Without it mail is only logged |
/// | `EMAIL_FROM` | `ProjeXY <no-reply@projexy.app>` | |
/// | `STRIPE_WEBHOOK_SECRET` | unset | Without it every webhook is rejected |
///
/// # Example
///
/// ```no_run
/// use projexy_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use projexy_shared::email::{DEFAULT_API_URL, DEFAULT_FROM};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// `None` keeps realtime delivery in-process
    pub redis: Option<RedisSettings>,

    pub realtime: RealtimeConfig,
    pub email: EmailConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Public URL of the web app, used to build links in emails
    pub base_url: String,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,

    pub production: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct JwtConfig {
    /// HS256 signing key
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig").field("secret", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Clone)]
pub struct RealtimeConfig {
    pub app_key: String,
    pub app_secret: String,
}

impl std::fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("app_key", &self.app_key)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct BillingConfig {
    pub webhook_secret: Option<String>,
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - a numeric or boolean variable doesn't parse
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key → value source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is invalid: {}", e))?;

        let base_url = var("APP_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let cors_origins = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let production = match var("PRODUCTION").as_deref() {
            None => false,
            Some(value) => parse_bool(value)
                .ok_or_else(|| anyhow::anyhow!("PRODUCTION must be true or false"))?,
        };

        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let realtime = RealtimeConfig {
            app_key: var("REALTIME_APP_KEY").unwrap_or_else(|| "projexy".to_string()),
            app_secret: var("REALTIME_APP_SECRET").unwrap_or_else(|| jwt_secret.clone()),
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                base_url,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            redis: var("REDIS_URL").map(|url| RedisSettings { url }),
            realtime,
            email: EmailConfig {
                api_url: var("EMAIL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                api_key: var("EMAIL_API_KEY"),
                from: var("EMAIL_FROM").unwrap_or_else(|| DEFAULT_FROM.to_string()),
            },
            billing: BillingConfig {
                webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether CORS should accept any origin
    pub fn cors_is_permissive(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

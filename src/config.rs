use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_AMOUNT_CENTS: i32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub admin: Option<AdminBootstrapConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Amount assigned to newly created subscriptions, in minor currency units.
    #[serde(default = "default_amount_cents")]
    pub default_amount_cents: i32,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_amount_cents: DEFAULT_AMOUNT_CENTS,
        }
    }
}

fn default_amount_cents() -> i32 {
    DEFAULT_AMOUNT_CENTS
}

/// Staff account created at startup when it does not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBootstrapConfig {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Without a config file everything comes from the environment
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::from_toml_str(&config_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_vars(get_env)?,
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "Failed to read config file {config_path}: {e}"
                )));
            }
        };

        // Environment variables win over file values
        config.apply_env_overrides();

        if config.jwt.secret.trim().is_empty() {
            return Err(AppError::ConfigError("jwt.secret must not be empty".into()));
        }

        Ok(config)
    }

    pub fn from_toml_str(config_str: &str) -> AppResult<Self> {
        toml::from_str(config_str)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config file: {e}")))
    }

    /// Builds the config from variables resolved through `var`.
    /// `DATABASE_URL` and `JWT_SECRET` have no defaults.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = var("DATABASE_URL").ok_or_else(|| {
            AppError::ConfigError("DATABASE_URL is not set and no config.toml was found".into())
        })?;
        let jwt_secret = var("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                AppError::ConfigError("JWT_SECRET is not set and no config.toml was found".into())
            })?;
        let parse = |name: &str| var(name).and_then(|v| v.parse::<i64>().ok());

        Ok(Config {
            server: ServerConfig {
                host: var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: var("SERVER_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(8080),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: var("DB_MAX_CONNECTIONS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_token_expires_in: parse("JWT_ACCESS_EXPIRES_IN").unwrap_or(3600),
                refresh_token_expires_in: parse("JWT_REFRESH_EXPIRES_IN").unwrap_or(86_400),
            },
            billing: BillingConfig {
                default_amount_cents: var("BILLING_DEFAULT_AMOUNT_CENTS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_AMOUNT_CENTS),
            },
            admin: None,
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.refresh_token_expires_in = n;
        }
        if let Ok(v) = env::var("BILLING_DEFAULT_AMOUNT_CENTS")
            && let Ok(n) = v.parse()
        {
            self.billing.default_amount_cents = n;
        }

        // Admin bootstrap
        if let (Some(username), Some(password)) =
            (get_env("ADMIN_USERNAME"), get_env("ADMIN_PASSWORD"))
        {
            self.admin = Some(AdminBootstrapConfig {
                username,
                email: get_env("ADMIN_EMAIL").unwrap_or_default(),
                password,
            });
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

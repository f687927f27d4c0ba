use std::time::Duration;

use clap::{ArgAction, Args, Parser, ValueEnum};
use serde::Serialize;

/// Build time stamped by the release pipeline; empty for local builds.
pub const BUILD_TIME: &str = match option_env!("CINEVAULT_BUILD_TIME") {
    Some(t) => t,
    None => "unknown",
};

#[derive(Debug, Clone, Parser)]
#[command(name = "cinevault-api", version, about = "Cinevault movie catalog API server")]
pub struct Config {
    /// API server port
    #[arg(long, env = "CINEVAULT_PORT", default_value_t = 4000)]
    pub port: u16,

    /// Environment (development|staging|production)
    #[arg(long = "env", env = "CINEVAULT_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    #[command(flatten)]
    pub db: DatabaseConfig,

    #[command(flatten)]
    pub limiter: LimiterConfig,

    #[command(flatten)]
    pub smtp: SmtpConfig,

    /// Trusted CORS origins (space separated)
    #[arg(
        long = "cors-trusted-origins",
        env = "CINEVAULT_CORS_TRUSTED_ORIGINS",
        value_delimiter = ' ',
        num_args = 0..
    )]
    pub cors_trusted_origins: Vec<String>,

    /// Grace period for in-flight requests once shutdown starts
    #[arg(long, env = "CINEVAULT_SHUTDOWN_GRACE", value_parser = humantime::parse_duration, default_value = "5s")]
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Args)]
pub struct DatabaseConfig {
    /// PostgreSQL DSN
    #[arg(long = "db-dsn", env = "CINEVAULT_DB_DSN", default_value = "")]
    pub dsn: String,

    /// PostgreSQL max open connections
    #[arg(long = "db-max-open-conns", env = "CINEVAULT_DB_MAX_OPEN_CONNS", default_value_t = 25)]
    pub max_open_conns: u32,

    /// PostgreSQL connections kept open while idle
    #[arg(long = "db-min-idle-conns", env = "CINEVAULT_DB_MIN_IDLE_CONNS", default_value_t = 0)]
    pub min_idle_conns: u32,

    /// PostgreSQL max connection idle time
    #[arg(long = "db-max-idle-time", env = "CINEVAULT_DB_MAX_IDLE_TIME", value_parser = humantime::parse_duration, default_value = "15m")]
    pub max_idle_time: Duration,

    /// Apply pending migrations before serving
    #[arg(long = "db-migrate", env = "CINEVAULT_DB_MIGRATE", default_value_t = false)]
    pub migrate: bool,
}

#[derive(Debug, Clone, Args)]
pub struct LimiterConfig {
    /// Enable rate limiter
    #[arg(
        long = "limiter-enabled",
        env = "CINEVAULT_LIMITER_ENABLED",
        action = ArgAction::Set,
        default_value_t = true
    )]
    pub enabled: bool,

    /// Rate limiter maximum requests per second
    #[arg(long = "limiter-rps", env = "CINEVAULT_LIMITER_RPS", default_value_t = 2.0)]
    pub rps: f64,

    /// Rate limiter maximum burst
    #[arg(long = "limiter-burst", env = "CINEVAULT_LIMITER_BURST", default_value_t = 4)]
    pub burst: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 2.0,
            burst: 4,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct SmtpConfig {
    /// SMTP host; mail is only logged when empty
    #[arg(long = "smtp-host", env = "CINEVAULT_SMTP_HOST", default_value = "")]
    pub host: String,

    /// SMTP port
    #[arg(id = "smtp_port", long = "smtp-port", env = "CINEVAULT_SMTP_PORT", default_value_t = 2525)]
    pub port: u16,

    /// SMTP username
    #[arg(long = "smtp-username", env = "CINEVAULT_SMTP_USERNAME", default_value = "")]
    pub username: String,

    /// SMTP password
    #[arg(long = "smtp-password", env = "CINEVAULT_SMTP_PASSWORD", default_value = "")]
    pub password: String,

    /// SMTP sender
    #[arg(
        long = "smtp-sender",
        env = "CINEVAULT_SMTP_SENDER",
        default_value = "Cinevault <no-reply@cinevault.local>"
    )]
    pub sender: String,
}

use anyhow::{anyhow, bail};
use std::env;
use std::net::SocketAddr;

use crate::utils::cookies::{CookieOptions, SameSite};

const DEV_JWT_SECRET: &str = "sessionkeeper-dev-secret-change-this-in-production";
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string; `None` selects the in-memory principal store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: u64,
    pub refresh_token_ttl_days: u64,
    pub max_sessions_per_user: usize,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// Value accepted by the fixed passcode verifier.
    pub otp_fixed_code: String,
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,
    pub password_min_length: usize,
    pub cors_allow_origins: Vec<String>,
    pub production_mode: bool,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let production_mode = parse_bool_env("PRODUCTION_MODE", false)?;

        let database_url = env::var("DATABASE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|_| anyhow!("Invalid BIND_ADDR value"))?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if production_mode => bail!("JWT_SECRET must be set when PRODUCTION_MODE=true"),
            Err(_) => DEV_JWT_SECRET.to_string(),
        };
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let cookie_same_site = match env::var("COOKIE_SAME_SITE") {
            Ok(value) => parse_same_site(&value)?,
            Err(_) => SameSite::Strict,
        };

        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let config = Config {
            database_url,
            bind_addr,
            jwt_secret,
            access_token_ttl_minutes: parse_env("ACCESS_TOKEN_TTL_MINUTES", 15)?,
            refresh_token_ttl_days: parse_env("REFRESH_TOKEN_TTL_DAYS", 7)?,
            max_sessions_per_user: parse_env("MAX_SESSIONS_PER_USER", 5)?,
            cookie_secure: parse_bool_env("COOKIE_SECURE", true)?,
            cookie_same_site,
            otp_fixed_code: env::var("OTP_FIXED_CODE").unwrap_or_else(|_| "123456".to_string()),
            password_hash_memory_kib: parse_env("PASSWORD_HASH_MEMORY_KIB", 19_456)?,
            password_hash_iterations: parse_env("PASSWORD_HASH_ITERATIONS", 2)?,
            password_min_length: parse_env("PASSWORD_MIN_LENGTH", 8)?,
            cors_allow_origins,
            production_mode,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.access_token_ttl_minutes == 0 {
            bail!("ACCESS_TOKEN_TTL_MINUTES must be greater than zero");
        }
        if self.refresh_token_ttl_days == 0 {
            bail!("REFRESH_TOKEN_TTL_DAYS must be greater than zero");
        }
        if self.max_sessions_per_user == 0 {
            bail!("MAX_SESSIONS_PER_USER must be greater than zero");
        }
        if self.otp_fixed_code.trim().is_empty() {
            bail!("OTP_FIXED_CODE must not be empty");
        }
        if self.production_mode && !self.cookie_secure {
            bail!("COOKIE_SECURE must be enabled when PRODUCTION_MODE=true");
        }
        Ok(())
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes as i64)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_ttl_days as i64)
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            secure: self.cookie_secure,
            same_site: self.cookie_same_site,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_bool_env(name: &str, default: bool) -> anyhow::Result<bool> {
    match env::var(name) {
        Ok(raw) => parse_bool(&raw).ok_or_else(|| anyhow!("Invalid {} value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_same_site(raw: &str) -> anyhow::Result<SameSite> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "strict" => Ok(SameSite::Strict),
        "lax" => Ok(SameSite::Lax),
        "none" => Ok(SameSite::None),
        _ => Err(anyhow!("Invalid COOKIE_SAME_SITE value: {}", raw)),
    }
}

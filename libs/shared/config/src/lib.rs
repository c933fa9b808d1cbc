use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailBackend {
    /// Log outgoing mail instead of delivering it.
    Console,
    /// POST outgoing mail as JSON to `mail_api_url`.
    Http,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub data_dir: Option<PathBuf>,
    pub redis_url: Option<String>,
    pub mail_backend: MailBackend,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub default_from_email: String,
    pub site_name: String,
    pub page_cache_ttl_seconds: u64,
    pub reminder_hour: u32,
    pub no_show_sweep_hour: u32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            jwt_secret: String::new(),
            token_ttl_hours: 24,
            data_dir: None,
            redis_url: None,
            mail_backend: MailBackend::Console,
            mail_api_url: String::new(),
            mail_api_key: String::new(),
            default_from_email: "hospital@example.com".to_string(),
            site_name: "Hospital Website".to_string(),
            page_cache_ttl_seconds: 300,
            reminder_hour: 9,
            no_show_sweep_hour: 0,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", defaults.port),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            token_ttl_hours: parse_or("TOKEN_TTL_HOURS", defaults.token_ttl_hours),
            data_dir: env::var("DATA_DIR").ok().filter(|v| !v.is_empty()).map(PathBuf::from),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            mail_backend: match env::var("MAIL_BACKEND").as_deref() {
                Ok("http") => MailBackend::Http,
                Ok("console") | Err(_) => MailBackend::Console,
                Ok(other) => {
                    warn!("Unknown MAIL_BACKEND '{}', using console", other);
                    MailBackend::Console
                }
            },
            mail_api_url: env::var("MAIL_API_URL").unwrap_or_default(),
            mail_api_key: env::var("MAIL_API_KEY").unwrap_or_default(),
            default_from_email: env::var("DEFAULT_FROM_EMAIL")
                .unwrap_or(defaults.default_from_email),
            site_name: env::var("SITE_NAME").unwrap_or(defaults.site_name),
            page_cache_ttl_seconds: parse_or("PAGE_CACHE_TTL_SECONDS", defaults.page_cache_ttl_seconds),
            reminder_hour: parse_or("REMINDER_HOUR", defaults.reminder_hour).min(23),
            no_show_sweep_hour: parse_or("NO_SHOW_SWEEP_HOUR", defaults.no_show_sweep_hour).min(23),
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.mail_backend == MailBackend::Http && !config.is_mail_api_configured() {
            warn!("MAIL_BACKEND=http but MAIL_API_URL is empty; mail delivery will fail");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn is_mail_api_configured(&self) -> bool {
        !self.mail_api_url.is_empty()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_console_mail_and_in_memory_storage() {
        let config = AppConfig::default();
        assert_eq!(config.mail_backend, MailBackend::Console);
        assert!(config.data_dir.is_none());
        assert!(config.redis_url.is_none());
        assert!(!config.is_configured());
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }
}

//! config/app_config.rs
//! Configuración inmutable del job, leída desde variables de entorno (.env opcional).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

use crate::services::dispatch_service::RetryPolicy;

pub const DEFAULT_SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
pub const DEFAULT_BRAND_NAME: &str = "Solvv Platform";
pub const DEFAULT_LOGO_URL: &str = "https://i.ibb.co/mNqJ5hc/solvv-logo.png";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("TO_EMAILS does not contain any recipient")]
    NoRecipients,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub mail: MailConfig,
    pub report: ReportBranding,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub ssl_mode: PgSslMode,
}

// El password no debe aparecer en los logs.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("ssl_mode", &self.ssl_mode)
            .finish_non_exhaustive()
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(self.ssl_mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransportKind {
    SendGrid,
    Smtp,
}

#[derive(Clone)]
pub enum MailTransportConfig {
    SendGrid { api_key: String, api_url: String },
    Smtp(SmtpConfig),
}

impl std::fmt::Debug for MailTransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailTransportConfig::SendGrid { api_url, .. } => f
                .debug_struct("SendGrid")
                .field("api_url", api_url)
                .finish_non_exhaustive(),
            MailTransportConfig::Smtp(smtp) => f
                .debug_struct("Smtp")
                .field("host", &smtp.host)
                .field("port", &smtp.port)
                .field("user", &smtp.user)
                .finish_non_exhaustive(),
        }
    }
}

impl MailTransportConfig {
    pub fn kind(&self) -> MailTransportKind {
        match self {
            MailTransportConfig::SendGrid { .. } => MailTransportKind::SendGrid,
            MailTransportConfig::Smtp(_) => MailTransportKind::Smtp,
        }
    }
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransportConfig,
    /// Certificado raíz adicional (PEM) que confía solo el cliente de correo.
    pub ca_cert_path: Option<PathBuf>,
    pub from: String,
    pub recipients: Vec<String>,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl MailConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_delay)
    }
}

#[derive(Debug, Clone)]
pub struct ReportBranding {
    pub brand_name: String,
    pub logo_url: String,
}

impl Default for ReportBranding {
    fn default() -> Self {
        ReportBranding {
            brand_name: DEFAULT_BRAND_NAME.to_string(),
            logo_url: DEFAULT_LOGO_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Lee la configuración del entorno del proceso.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Igual que `from_env`, pero con una función de búsqueda arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let database = DatabaseConfig {
            host: env.required("DB_HOST")?,
            port: env.parsed("DB_PORT")?,
            name: env.required("DB_NAME")?,
            user: env.required("DB_USER")?,
            password: env.secret("DB_PASS")?,
            ssl_mode: match env.optional("DB_SSL_MODE") {
                Some(raw) => PgSslMode::from_str(&raw).map_err(|e| ConfigError::Invalid {
                    var: "DB_SSL_MODE",
                    reason: e.to_string(),
                })?,
                None => PgSslMode::Prefer,
            },
        };

        let transport = match env.optional("MAIL_TRANSPORT").as_deref() {
            None | Some("sendgrid") => MailTransportConfig::SendGrid {
                api_key: env.secret("KEY")?,
                api_url: env
                    .optional("SENDGRID_API_URL")
                    .unwrap_or_else(|| DEFAULT_SENDGRID_URL.to_string()),
            },
            Some("smtp") => MailTransportConfig::Smtp(SmtpConfig {
                host: env.required("SMTP_HOST")?,
                port: env.parsed_or("SMTP_PORT", 587)?,
                user: env.required("SMTP_USER")?,
                pass: env.secret("SMTP_PASS")?,
            }),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "MAIL_TRANSPORT",
                    reason: format!("unknown transport '{other}', expected sendgrid or smtp"),
                })
            }
        };

        let recipients = parse_recipients(&env.required("TO_EMAILS")?);
        if recipients.is_empty() {
            return Err(ConfigError::NoRecipients);
        }

        let max_attempts: u32 = env.parsed_or("MAIL_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "MAIL_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        let mail = MailConfig {
            transport,
            ca_cert_path: env.optional("MAIL_CA_CERT").map(PathBuf::from),
            from: env.required("FROM_EMAIL")?,
            recipients,
            max_attempts,
            retry_delay: Duration::from_secs(env.parsed_or("MAIL_RETRY_DELAY_SECS", 5)?),
        };

        let report = ReportBranding {
            brand_name: env
                .optional("REPORT_BRAND_NAME")
                .unwrap_or_else(|| DEFAULT_BRAND_NAME.to_string()),
            logo_url: env
                .optional("REPORT_LOGO_URL")
                .unwrap_or_else(|| DEFAULT_LOGO_URL.to_string()),
        };

        Ok(AppConfig {
            database,
            mail,
            report,
        })
    }
}

/// Separa la lista de TO_EMAILS por comas, descartando entradas vacías.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    // Una variable definida pero vacía cuenta como ausente.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Secretos: se respetan tal cual (sin trim); solo vacío cuenta como ausente.
    fn secret(&self, key: &'static str) -> Result<String, ConfigError> {
        (self.0)(key)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(key))
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parsed<T>(&self, key: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(key)?;
        raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key,
            reason: e.to_string(),
        })
    }

    fn parsed_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(_) => self.parsed(key),
            None => Ok(default),
        }
    }
}

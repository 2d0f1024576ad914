use std::env;
use std::fmt;
use std::path::PathBuf;

use lettre::Address;

use crate::mail::attachments::ResolverSettings;
use crate::models::SenderIdentity;

#[derive(Clone)]
pub struct Config {
    pub gmail_user: String,
    pub gmail_app_password: String,
    pub gmail_from_name: String,
    pub assets_dir: String,
    pub working_dir: PathBuf,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub send_concurrency: Option<usize>,
    pub default_to: Option<String>,
    pub templates_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build and validate a config from any key lookup. Every problem is
    /// collected before failing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();

        let gmail_user = lookup("GMAIL_USER").unwrap_or_default().trim().to_string();
        if gmail_user.is_empty() {
            problems.push("GMAIL_USER is required".to_string());
        } else if gmail_user.parse::<Address>().is_err() {
            problems.push(format!("GMAIL_USER '{}' is not a valid email address", gmail_user));
        }

        let gmail_app_password = lookup("GMAIL_APP_PASSWORD").unwrap_or_default();
        if gmail_app_password.trim().is_empty() {
            problems.push("GMAIL_APP_PASSWORD is required".to_string());
        }

        let smtp_port = match lookup("SMTP_PORT") {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                problems.push(format!("SMTP_PORT '{}' is not a valid port", raw));
                0
            }),
            None => 465,
        };

        let send_concurrency = match lookup("SEND_CONCURRENCY") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    problems.push(format!(
                        "SEND_CONCURRENCY '{}' must be a positive integer",
                        raw
                    ));
                    None
                }
            },
            None => None,
        };

        let working_dir = env::current_dir().map_err(ConfigError::WorkingDir)?;

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        Ok(Config {
            gmail_user,
            gmail_app_password,
            gmail_from_name: lookup("GMAIL_FROM_NAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "mailer".to_string()),
            assets_dir: lookup("ASSETS_DIR").unwrap_or_else(|| "./src".to_string()),
            working_dir,
            smtp_host: lookup("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            smtp_port,
            send_concurrency,
            default_to: lookup("MAIL_DEFAULT_TO").filter(|to| !to.trim().is_empty()),
            templates_path: lookup("MAIL_TEMPLATES").map(PathBuf::from),
        })
    }

    /// Port 465 is SMTPS; anything else upgrades with STARTTLS
    pub fn implicit_tls(&self) -> bool {
        self.smtp_port == 465
    }

    pub fn sender_identity(&self) -> SenderIdentity {
        SenderIdentity {
            display_name: self.gmail_from_name.clone(),
            address: self.gmail_user.clone(),
        }
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            assets_dir: self.assets_dir.clone(),
            working_dir: self.working_dir.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("gmail_user", &self.gmail_user)
            .field("gmail_app_password", &"<redacted>")
            .field("gmail_from_name", &self.gmail_from_name)
            .field("assets_dir", &self.assets_dir)
            .field("working_dir", &self.working_dir)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("send_concurrency", &self.send_concurrency)
            .field("default_to", &self.default_to)
            .field("templates_path", &self.templates_path)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("cannot determine working directory: {0}")]
    WorkingDir(std::io::Error),
}

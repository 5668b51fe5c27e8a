//! Worker configuration from environment variables.

use core_config::{
    env_optional, env_or_default, env_parse_or, env_required, ConfigError, FromEnv,
};
use domain_mailer::{
    MailStream, Sender, SmtpConfig, SmtpTls, TokenTtl, DEFAULT_FALLBACK_LANGUAGE,
    DEFAULT_USERS_TABLE,
};
use std::path::PathBuf;
use std::time::Duration;
use stream_worker::{FailurePolicy, StreamDef};

pub const DEFAULT_HEALTH_PORT: u16 = 8081;
const DEFAULT_SMTP_PORT: u16 = 465;
const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub queue_name: String,
    pub consumer_group: String,
    pub failure_policy: FailurePolicy,

    pub smtp: SmtpConfig,
    pub sender: Sender,
    pub company_name: String,

    pub fallback_language: String,
    /// Directory of `<lang>.json` catalogs merged over the bundled ones.
    pub catalog_dir: Option<PathBuf>,

    pub token_ttl: TokenTtl,
    pub users_table: String,

    pub health_port: u16,
}

impl FromEnv for MailerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let company_name = env_required("COMPANYNAME")?;

        let smtp = smtp_from_env()?;
        let sender_email = env_optional("SMTP_FROM_EMAIL")
            .or_else(|| smtp.username.clone())
            .ok_or_else(|| ConfigError::MissingEnvVar("SMTP_USER".to_string()))?;
        let sender = match env_optional("SMTP_FROM_NAME") {
            Some(name) => Sender::new(name, sender_email),
            None => Sender::webpanel(&company_name, sender_email),
        };

        let defaults = TokenTtl::default();
        let token_ttl = TokenTtl {
            confirmation: Duration::from_secs(env_parse_or(
                "TOKEN_CONFIRMATION_TTL_SECS",
                defaults.confirmation.as_secs(),
            )?),
            reset: Duration::from_secs(env_parse_or(
                "TOKEN_RESET_TTL_SECS",
                defaults.reset.as_secs(),
            )?),
        };

        let health_port = match env_optional("MAILER_HEALTH_PORT") {
            Some(_) => env_parse_or("MAILER_HEALTH_PORT", DEFAULT_HEALTH_PORT)?,
            None => env_parse_or("HEALTH_PORT", DEFAULT_HEALTH_PORT)?,
        };

        Ok(Self {
            queue_name: env_or_default("MAILER_QUEUE_NAME", MailStream::STREAM_NAME),
            consumer_group: env_or_default("MAILER_CONSUMER_GROUP", MailStream::CONSUMER_GROUP),
            failure_policy: failure_policy_from_env()?,
            smtp,
            sender,
            company_name,
            fallback_language: env_or_default("FALLBACK_LANGUAGE", DEFAULT_FALLBACK_LANGUAGE),
            catalog_dir: env_optional("MAILER_CATALOG_DIR").map(PathBuf::from),
            token_ttl,
            users_table: env_or_default("USERS_TABLE", DEFAULT_USERS_TABLE),
            health_port,
        })
    }
}

fn smtp_from_env() -> Result<SmtpConfig, ConfigError> {
    let tls: SmtpTls = env_parse_or("SMTP_TLS", SmtpTls::default())?;
    let mut smtp = SmtpConfig::new(
        env_required("SMTP_HOST")?,
        env_parse_or("SMTP_PORT", DEFAULT_SMTP_PORT)?,
    )
    .with_tls(tls)
    .with_timeout(Duration::from_secs(env_parse_or(
        "SMTP_TIMEOUT_SECS",
        DEFAULT_SMTP_TIMEOUT_SECS,
    )?));

    smtp.username = env_optional("SMTP_USER");
    smtp.password = env_optional("SMTP_PASSWORD");
    Ok(smtp)
}

fn failure_policy_from_env() -> Result<FailurePolicy, ConfigError> {
    let policy: FailurePolicy = env_parse_or("MAILER_FAILURE_POLICY", FailurePolicy::default())?;

    Ok(match policy {
        FailurePolicy::Retry { max_retries } => FailurePolicy::Retry {
            max_retries: env_parse_or("MAILER_MAX_RETRIES", max_retries)?,
        },
        single => single,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [(&str, Option<&str>); 3] = [
        ("COMPANYNAME", Some("Acme")),
        ("SMTP_HOST", Some("smtp.acme.test")),
        ("SMTP_USER", Some("noreply@acme.test")),
    ];

    const OPTIONAL: [&str; 16] = [
        "SMTP_PORT",
        "SMTP_PASSWORD",
        "SMTP_TLS",
        "SMTP_FROM_EMAIL",
        "SMTP_FROM_NAME",
        "SMTP_TIMEOUT_SECS",
        "MAILER_QUEUE_NAME",
        "MAILER_CONSUMER_GROUP",
        "MAILER_FAILURE_POLICY",
        "MAILER_MAX_RETRIES",
        "MAILER_CATALOG_DIR",
        "MAILER_HEALTH_PORT",
        "HEALTH_PORT",
        "FALLBACK_LANGUAGE",
        "TOKEN_CONFIRMATION_TTL_SECS",
        "TOKEN_RESET_TTL_SECS",
    ];

    fn with_env<F: FnOnce()>(overrides: &[(&str, Option<&str>)], f: F) {
        let mut vars: Vec<(&str, Option<&str>)> = OPTIONAL.iter().map(|k| (*k, None)).collect();
        vars.extend(REQUIRED);
        vars.push(("USERS_TABLE", None));
        for (key, value) in overrides {
            vars.retain(|(k, _)| k != key);
            vars.push((*key, *value));
        }
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn test_defaults() {
        with_env(&[], || {
            let config = MailerConfig::from_env().unwrap();

            assert_eq!(config.queue_name, "q_mail");
            assert_eq!(config.consumer_group, "mail_workers");
            assert_eq!(config.failure_policy, FailurePolicy::Retry { max_retries: 3 });
            assert_eq!(config.smtp.port, 465);
            assert_eq!(config.smtp.tls, SmtpTls::Implicit);
            assert_eq!(config.smtp.timeout, Duration::from_secs(30));
            assert_eq!(config.sender.to_string(), "Acme - Webpanel <noreply@acme.test>");
            assert_eq!(config.fallback_language, "de");
            assert_eq!(config.catalog_dir, None);
            assert_eq!(config.token_ttl, TokenTtl::default());
            assert_eq!(config.users_table, "users");
            assert_eq!(config.health_port, 8081);
        });
    }

    #[test]
    fn test_overrides() {
        with_env(
            &[
                ("SMTP_PORT", Some("587")),
                ("SMTP_TLS", Some("starttls")),
                ("SMTP_PASSWORD", Some("secret")),
                ("SMTP_FROM_EMAIL", Some("mail@acme.test")),
                ("SMTP_FROM_NAME", Some("Acme Support")),
                ("MAILER_FAILURE_POLICY", Some("retry")),
                ("MAILER_MAX_RETRIES", Some("5")),
                ("MAILER_CATALOG_DIR", Some("/etc/mailer/lang")),
                ("FALLBACK_LANGUAGE", Some("en")),
                ("TOKEN_RESET_TTL_SECS", Some("900")),
                ("HEALTH_PORT", Some("9000")),
            ],
            || {
                let config = MailerConfig::from_env().unwrap();

                assert_eq!(config.smtp.port, 587);
                assert_eq!(config.smtp.tls, SmtpTls::StartTls);
                assert_eq!(config.smtp.password.as_deref(), Some("secret"));
                assert_eq!(config.sender.to_string(), "Acme Support <mail@acme.test>");
                assert_eq!(config.failure_policy, FailurePolicy::Retry { max_retries: 5 });
                assert_eq!(config.catalog_dir, Some(PathBuf::from("/etc/mailer/lang")));
                assert_eq!(config.fallback_language, "en");
                assert_eq!(config.token_ttl.reset, Duration::from_secs(900));
                assert_eq!(config.health_port, 9000);
            },
        );
    }

    #[test]
    fn test_mailer_health_port_wins() {
        with_env(
            &[("MAILER_HEALTH_PORT", Some("8090")), ("HEALTH_PORT", Some("9000"))],
            || {
                assert_eq!(MailerConfig::from_env().unwrap().health_port, 8090);
            },
        );
    }

    #[test]
    fn test_single_attempt_policy() {
        with_env(&[("MAILER_FAILURE_POLICY", Some("single_attempt"))], || {
            assert_eq!(
                MailerConfig::from_env().unwrap().failure_policy,
                FailurePolicy::SingleAttempt
            );
        });
    }

    #[test]
    fn test_missing_company_name() {
        with_env(&[("COMPANYNAME", None)], || {
            let err = MailerConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "COMPANYNAME"));
        });
    }

    #[test]
    fn test_missing_sender_address() {
        with_env(&[("SMTP_USER", None)], || {
            let err = MailerConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "SMTP_USER"));
        });
    }

    #[test]
    fn test_invalid_values() {
        with_env(&[("SMTP_PORT", Some("smtp"))], || {
            let err = MailerConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "SMTP_PORT"));
        });

        with_env(&[("SMTP_TLS", Some("ssl3"))], || {
            let err = MailerConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "SMTP_TLS"));
        });

        with_env(&[("MAILER_FAILURE_POLICY", Some("forever"))], || {
            assert!(MailerConfig::from_env().is_err());
        });
    }
}

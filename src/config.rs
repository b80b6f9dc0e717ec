//! Startup configuration for the injector.
//!
//! Read once from the environment at process start and immutable afterwards.

use thiserror::Error;

/// Environment variable naming the registry domain to match.
pub const ENV_REGISTRY_DOMAIN: &str = "REGISTRY_DOMAIN";
/// Environment variable naming the image pull Secret.
pub const ENV_SECRET_NAME: &str = "REGISTRY_SECRET_NAME";
/// Environment variable naming the namespace holding the source Secret.
pub const ENV_SECRET_NAMESPACE: &str = "REGISTRY_SECRET_NAMESPACE";
/// Environment variable overriding the TLS certificate path.
pub const ENV_CERT_PATH: &str = "WEBHOOK_CERT_PATH";
/// Environment variable overriding the TLS private key path.
pub const ENV_KEY_PATH: &str = "WEBHOOK_KEY_PATH";

/// Configuration error raised during startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
}

/// Injector configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry domain whose images trigger injection. Compared exactly,
    /// case-sensitive, against the domain split from each container image.
    pub registry_domain: String,
    /// Name of the image pull Secret, both the source object and the
    /// per-namespace replicas.
    pub secret_name: String,
    /// Namespace holding the source Secret from which replicas are copied.
    pub secret_namespace: String,
    /// Path to the webhook TLS certificate (PEM format).
    pub cert_path: String,
    /// Path to the webhook TLS private key (PEM format).
    pub key_path: String,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `REGISTRY_SECRET_NAME` is required; the domain defaults to the public
    /// registry, the source namespace to `default`, and the TLS paths to the
    /// mount point used by the webhook deployment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret_name =
            non_empty_var(ENV_SECRET_NAME).ok_or(ConfigError::MissingVar(ENV_SECRET_NAME))?;

        Ok(Self {
            registry_domain: non_empty_var(ENV_REGISTRY_DOMAIN)
                .unwrap_or_else(|| crate::reference::DEFAULT_DOMAIN.to_string()),
            secret_name,
            secret_namespace: non_empty_var(ENV_SECRET_NAMESPACE)
                .unwrap_or_else(|| "default".to_string()),
            cert_path: non_empty_var(ENV_CERT_PATH)
                .unwrap_or_else(|| crate::webhooks::WEBHOOK_CERT_PATH.to_string()),
            key_path: non_empty_var(ENV_KEY_PATH)
                .unwrap_or_else(|| crate::webhooks::WEBHOOK_KEY_PATH.to_string()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

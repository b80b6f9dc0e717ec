//! image-pull-secrets-injector library crate
//!
//! A mutating admission webhook that injects an imagePullSecrets reference
//! into Pods pulling from a configured registry domain, replicating the
//! Secret into the Pod's namespace on first use.

pub mod config;
pub mod health;
pub mod injector;
pub mod reference;
pub mod store;
pub mod webhooks;

pub use config::Config;
pub use health::HealthState;
pub use injector::PodMutator;
pub use store::{KubeSecretStore, SecretLookup, SecretStore, StoreError};
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, run_webhook_server,
};

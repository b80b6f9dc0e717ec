//! image-pull-secrets-injector - a Pod mutating admission webhook.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads injector configuration from the environment
//! - Creates the Kubernetes client
//! - Starts the health server and the TLS webhook server

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::{error, info};

use image_pull_secrets_injector::config::Config;
use image_pull_secrets_injector::health::{HealthState, run_health_server};
use image_pull_secrets_injector::injector::PodMutator;
use image_pull_secrets_injector::store::KubeSecretStore;
use image_pull_secrets_injector::webhooks::{WebhookState, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("image_pull_secrets_injector=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting image-pull-secrets-injector");

    let config = Config::from_env()?;
    info!(
        domain = %config.registry_domain,
        secret_name = %config.secret_name,
        secret_namespace = %config.secret_namespace,
        "Loaded injector configuration"
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let cert_path = config.cert_path.clone();
    let key_path = config.key_path.clone();

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately (probes should work before TLS is up)
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let mutator = PodMutator::new(KubeSecretStore::new(client), config);
    let state = Arc::new(WebhookState::new(mutator, health_state.clone()));

    // Each admission request is independent; readiness only means the
    // webhook server is accepting connections.
    health_state.set_ready(true).await;

    let webhook_handle = tokio::spawn(async move {
        if let Err(e) = run_webhook_server(state, &cert_path, &key_path).await {
            error!("Webhook server error: {}", e);
        }
    });

    // Run until a shutdown signal arrives
    shutdown_signal().await;
    info!("Shutdown signal received, stopping");

    health_state.set_ready(false).await;
    webhook_handle.abort();
    health_handle.abort();

    Ok(())
}

/// Wait for SIGTERM (Kubernetes pod termination) or ctrl-c.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install ctrl-c handler: {}", e);
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

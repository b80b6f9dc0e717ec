//! Admission webhook server.
//!
//! Provides the HTTP endpoint for the Pod mutating admission webhook.
//!
//! To enable the webhook:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Create a MutatingWebhookConfiguration pointing at /pod/mutate
//! 3. Mount the TLS certificate secret to the injector pod at /etc/webhook/certs/
//!
//! The engine only mutates the Pod's imagePullSecrets list, so the patch the
//! transport returns is a diff of the Pod before and after mutation.

use axum::{Json, Router, extract::State, routing::post};
use k8s_openapi::api::core::v1::Pod;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::health::HealthState;
use crate::injector::PodMutator;
use crate::store::KubeSecretStore;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub mutator: PodMutator<KubeSecretStore>,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(mutator: PodMutator<KubeSecretStore>, health: Arc<HealthState>) -> Self {
        Self { mutator, health }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/pod/mutate", post(mutate_pod))
        .with_state(state)
}

/// Pod mutation admission webhook handler
async fn mutate_pod(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<Pod>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<Pod> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return Json(
                AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e)).into_review(),
            );
        }
    };

    state.health.metrics.record_admission();
    let response = mutate(&state, &request).await;
    Json(response.into_review())
}

/// Process a single Pod admission request
async fn mutate(state: &WebhookState, request: &AdmissionRequest<Pod>) -> AdmissionResponse {
    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );

    // Only CREATE and UPDATE carry an object to mutate
    if matches!(request.operation, Operation::Delete | Operation::Connect) {
        return AdmissionResponse::from(request);
    }

    let mut pod = match &request.object {
        Some(pod) => pod.clone(),
        None => {
            debug!(uid = %uid, "No Pod object in request, allowing unchanged");
            return AdmissionResponse::from(request);
        }
    };

    // Admission payloads frequently omit the namespace on the embedded
    // object; the request always carries it.
    if pod.metadata.namespace.is_none() {
        pod.metadata.namespace = request.namespace.clone();
    }

    let original = match serde_json::to_value(&pod) {
        Ok(value) => value,
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to serialize Pod");
            return AdmissionResponse::from(request).deny(format!("serialization error: {e}"));
        }
    };

    let namespace = pod.metadata.namespace.clone().unwrap_or_default();

    match state.mutator.mutate(&mut pod).await {
        Ok(false) => {
            debug!(uid = %uid, "Pod left unchanged");
            AdmissionResponse::from(request)
        }
        Ok(true) => {
            state.health.metrics.record_mutation(&namespace);
            info!(
                uid = %uid,
                namespace = %namespace,
                name = ?request.name,
                "Injecting image pull secret reference"
            );
            patched_response(request, &original, &pod)
        }
        Err(e) => {
            state.health.metrics.record_mutation_error(&namespace);
            warn!(uid = %uid, namespace = %namespace, error = %e, "Mutation failed");
            AdmissionResponse::from(request).deny(e.to_string())
        }
    }
}

/// Build an allowed response carrying the diff between the original and the
/// mutated Pod as a JSON patch.
fn patched_response(
    request: &AdmissionRequest<Pod>,
    original: &serde_json::Value,
    mutated: &Pod,
) -> AdmissionResponse {
    let mutated = match serde_json::to_value(mutated) {
        Ok(value) => value,
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to serialize mutated Pod");
            return AdmissionResponse::from(request).deny(format!("serialization error: {e}"));
        }
    };

    let patch = json_patch::diff(original, &mutated);

    match AdmissionResponse::from(request).with_patch(patch) {
        Ok(response) => response,
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to serialize patch");
            AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
        }
    }
}

/// Errors that can occur when running the webhook server
#[derive(Debug)]
pub enum WebhookError {
    /// TLS configuration error
    TlsConfig(String),
    /// Server error
    Server(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::TlsConfig(msg) => write!(f, "TLS configuration error: {}", msg),
            WebhookError::Server(msg) => write!(f, "Webhook server error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:9443 and serves the /pod/mutate endpoint. TLS
/// certificates are loaded from the paths specified.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    cert_path: &str,
    key_path: &str,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!(port = WEBHOOK_PORT, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}

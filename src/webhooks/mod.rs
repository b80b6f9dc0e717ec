//! Mutating admission webhook transport.
//!
//! Decodes AdmissionReview requests, hands the Pod to the injection engine,
//! and encodes the result as a JSON patch response.

mod server;

pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, WebhookState,
    create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};

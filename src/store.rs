//! Secret store abstraction.
//!
//! The provisioning engine only needs two capabilities from the cluster:
//! fetch a Secret by namespace/name and create one. Keeping that behind a
//! trait lets functional tests run against an in-memory store without a
//! live apiserver.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use thiserror::Error;

/// Result of a Secret lookup.
///
/// "Not found" is an expected, frequent outcome for the injector (a fresh
/// namespace has no replica yet), so it is part of the success type rather
/// than an error variant.
#[derive(Debug)]
pub enum SecretLookup {
    /// The Secret exists in the requested namespace.
    Found(Box<Secret>),
    /// No Secret with that name exists in the requested namespace.
    NotFound,
}

/// Errors surfaced by a [`SecretStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A create conflicted with an existing object.
    #[error("secret {0} already exists")]
    AlreadyExists(String),

    /// Any other apiserver failure.
    #[error(transparent)]
    Api(#[from] kube::Error),
}

impl StoreError {
    /// Whether this error is a create-conflict on an existing object.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

/// Read/create access to namespaced Secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a Secret, distinguishing absence from failure.
    async fn get(&self, namespace: &str, name: &str) -> Result<SecretLookup, StoreError>;

    /// Create a Secret in the namespace set on its metadata.
    async fn create(&self, secret: Secret) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: SecretStore + ?Sized> SecretStore for std::sync::Arc<S> {
    async fn get(&self, namespace: &str, name: &str) -> Result<SecretLookup, StoreError> {
        (**self).get(namespace, name).await
    }

    async fn create(&self, secret: Secret) -> Result<(), StoreError> {
        (**self).create(secret).await
    }
}

/// Production [`SecretStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<SecretLookup, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(secret) => Ok(SecretLookup::Found(Box::new(secret))),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(SecretLookup::NotFound),
            Err(e) => Err(StoreError::Api(e)),
        }
    }

    async fn create(&self, secret: Secret) -> Result<(), StoreError> {
        let namespace = secret.metadata.namespace.as_deref().unwrap_or_default();
        let name = secret.metadata.name.as_deref().unwrap_or_default();
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.create(&Default::default(), &secret).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 409 => {
                Err(StoreError::AlreadyExists(format!("{namespace}/{name}")))
            }
            Err(e) => Err(StoreError::Api(e)),
        }
    }
}

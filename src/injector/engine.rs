//! The Pod mutation engine.

use k8s_openapi::api::core::v1::{LocalObjectReference, Pod, Secret};
use kube::ResourceExt;

use crate::config::Config;
use crate::reference::split_domain;
use crate::store::{SecretLookup, SecretStore};

use super::error::{Error, Result};

/// Decides whether a Pod needs the configured image pull Secret and
/// provisions a namespace-local copy of it before attaching the reference.
///
/// The engine holds no mutable state across calls; all shared state lives in
/// the store. Repeated calls for the same Pod converge: the attached
/// reference short-circuits, and the existence check re-runs from scratch.
pub struct PodMutator<S> {
    store: S,
    config: Config,
}

impl<S: SecretStore> PodMutator<S> {
    /// Build an engine from its store and immutable configuration.
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    /// Inject the image pull Secret reference into `pod` if any of its
    /// container images come from the configured registry domain.
    ///
    /// Returns whether the Pod was changed. On error the Pod is left exactly
    /// as it was passed in: the spec is only touched after every store call
    /// has succeeded.
    pub async fn mutate(&self, pod: &mut Pod) -> Result<bool> {
        if self.has_pull_secret(pod) {
            return Ok(false);
        }

        if !self.matches_registry_domain(pod) {
            return Ok(false);
        }

        let namespace = pod.namespace().unwrap_or_else(|| "default".to_string());
        self.ensure_secret(&namespace).await?;

        pod.spec
            .get_or_insert_default()
            .image_pull_secrets
            .get_or_insert_default()
            .push(LocalObjectReference {
                name: self.config.secret_name.clone(),
            });

        Ok(true)
    }

    /// Whether the Pod already references the configured Secret.
    fn has_pull_secret(&self, pod: &Pod) -> bool {
        pod.spec
            .iter()
            .flat_map(|spec| spec.image_pull_secrets.iter().flatten())
            .any(|r| r.name == self.config.secret_name)
    }

    /// Whether any container image resolves to the configured domain.
    fn matches_registry_domain(&self, pod: &Pod) -> bool {
        pod.spec
            .iter()
            .flat_map(|spec| spec.containers.iter())
            .filter_map(|container| container.image.as_deref())
            .any(|image| split_domain(image).0 == self.config.registry_domain)
    }

    /// Make sure the Secret exists in `namespace`, replicating it from the
    /// source namespace on first use.
    ///
    /// Concurrent admission requests in a fresh namespace can race to create
    /// the copy; the store's create-conflict response arbitrates, and the
    /// loser proceeds as if the Secret had been found.
    async fn ensure_secret(&self, namespace: &str) -> Result<()> {
        let name = &self.config.secret_name;

        match self
            .store
            .get(namespace, name)
            .await
            .map_err(|e| Error::store_read(namespace, name, e))?
        {
            SecretLookup::Found(_) => Ok(()),
            SecretLookup::NotFound => {
                let source_namespace = &self.config.secret_namespace;
                let source = match self
                    .store
                    .get(source_namespace, name)
                    .await
                    .map_err(|e| Error::store_read(source_namespace, name, e))?
                {
                    SecretLookup::Found(secret) => secret,
                    SecretLookup::NotFound => {
                        return Err(Error::SourceSecretMissing {
                            namespace: source_namespace.clone(),
                            name: name.clone(),
                        });
                    }
                };

                match self.store.create(replicate(*source, namespace)).await {
                    Ok(()) => Ok(()),
                    // Another admission request created it first.
                    Err(e) if e.is_already_exists() => Ok(()),
                    Err(e) => Err(Error::store_write(namespace, name, e)),
                }
            }
        }
    }
}

/// Retarget a copy of the source Secret at `namespace`.
///
/// The resource version is store-assigned and must not be set on objects to
/// be created.
fn replicate(mut secret: Secret, namespace: &str) -> Secret {
    secret.metadata.namespace = Some(namespace.to_string());
    secret.metadata.resource_version = None;
    secret.metadata.uid = None;
    secret
}

//! Engine tests covering mutation decisions, provisioning, and races.

use std::sync::Arc;

use k8s_openapi::api::core::v1::{Container, LocalObjectReference, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use image_pull_secrets_injector::config::Config;
use image_pull_secrets_injector::injector::{Error, PodMutator};

use crate::mock_store::MockSecretStore;

const SECRET_NAME: &str = "regcred";
const SOURCE_NAMESPACE: &str = "kube-system";

fn test_config() -> Config {
    Config {
        registry_domain: "docker.io".to_string(),
        secret_name: SECRET_NAME.to_string(),
        secret_namespace: SOURCE_NAMESPACE.to_string(),
        cert_path: image_pull_secrets_injector::WEBHOOK_CERT_PATH.to_string(),
        key_path: image_pull_secrets_injector::WEBHOOK_KEY_PATH.to_string(),
    }
}

fn mutator(store: Arc<MockSecretStore>) -> PodMutator<Arc<MockSecretStore>> {
    PodMutator::new(store, test_config())
}

fn new_pod(namespace: &str, images: &[&str]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some("test-pod".to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: images
                .iter()
                .enumerate()
                .map(|(i, image)| Container {
                    name: format!("container-{i}"),
                    image: Some(image.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn pull_secret_names(pod: &Pod) -> Vec<String> {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.image_pull_secrets.as_ref())
        .map(|refs| refs.iter().map(|r| r.name.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_provisions_secret_and_injects_reference() {
    let store = Arc::new(MockSecretStore::new().with_secret(SOURCE_NAMESPACE, SECRET_NAME));
    let mutator = mutator(store.clone());

    let mut pod = new_pod("team-a", &["docker.io/nginx:latest"]);
    let changed = mutator.mutate(&mut pod).await.unwrap();

    assert!(changed);
    assert_eq!(pull_secret_names(&pod), vec![SECRET_NAME.to_string()]);
    assert_eq!(store.create_calls(), 1);

    // The replica carries the source payload but fresh store identity.
    let source = store.secret(SOURCE_NAMESPACE, SECRET_NAME).unwrap();
    let replica = store.secret("team-a", SECRET_NAME).unwrap();
    assert_eq!(replica.data, source.data);
    assert_eq!(replica.type_, source.type_);
    assert_ne!(replica.metadata.uid, source.metadata.uid);
    assert_ne!(replica.metadata.resource_version, source.metadata.resource_version);
}

#[tokio::test]
async fn test_unqualified_image_matches_default_domain() {
    let store = Arc::new(MockSecretStore::new().with_secret(SOURCE_NAMESPACE, SECRET_NAME));
    let mutator = mutator(store);

    let mut pod = new_pod("team-a", &["nginx"]);
    assert!(mutator.mutate(&mut pod).await.unwrap());
    assert_eq!(pull_secret_names(&pod), vec![SECRET_NAME.to_string()]);
}

#[tokio::test]
async fn test_any_matching_container_triggers_injection() {
    let store = Arc::new(MockSecretStore::new().with_secret(SOURCE_NAMESPACE, SECRET_NAME));
    let mutator = mutator(store);

    let mut pod = new_pod(
        "team-a",
        &[
            "k8s.gcr.io/autoscaling/cluster-autoscaler:v1.17.4",
            "docker.io/library/redis:7",
        ],
    );
    assert!(mutator.mutate(&mut pod).await.unwrap());
    assert_eq!(pull_secret_names(&pod), vec![SECRET_NAME.to_string()]);
}

#[tokio::test]
async fn test_unmatched_domain_leaves_pod_unchanged() {
    let store = Arc::new(MockSecretStore::new().with_secret(SOURCE_NAMESPACE, SECRET_NAME));
    let mutator = mutator(store.clone());

    let mut pod = new_pod("team-a", &["k8s.gcr.io/autoscaling/cluster-autoscaler:v1.17.4"]);
    let changed = mutator.mutate(&mut pod).await.unwrap();

    assert!(!changed);
    assert!(pull_secret_names(&pod).is_empty());
    assert_eq!(store.create_calls(), 0);
}

#[tokio::test]
async fn test_mutation_is_idempotent() {
    let store = Arc::new(MockSecretStore::new().with_secret(SOURCE_NAMESPACE, SECRET_NAME));
    let mutator = mutator(store);

    let mut pod = new_pod("team-a", &["docker.io/nginx:latest"]);
    assert!(mutator.mutate(&mut pod).await.unwrap());
    assert!(!mutator.mutate(&mut pod).await.unwrap());

    // The reference appears exactly once.
    assert_eq!(pull_secret_names(&pod), vec![SECRET_NAME.to_string()]);
}

#[tokio::test]
async fn test_existing_reference_short_circuits() {
    // No secrets seeded at all: a short-circuited mutation must not touch
    // the store.
    let store = Arc::new(MockSecretStore::new());
    let mutator = mutator(store.clone());

    let mut pod = new_pod("team-a", &["docker.io/nginx:latest"]);
    pod.spec.as_mut().unwrap().image_pull_secrets = Some(vec![LocalObjectReference {
        name: SECRET_NAME.to_string(),
    }]);

    assert!(!mutator.mutate(&mut pod).await.unwrap());
    assert_eq!(pull_secret_names(&pod), vec![SECRET_NAME.to_string()]);
    assert_eq!(store.create_calls(), 0);
}

#[tokio::test]
async fn test_existing_target_secret_is_reused() {
    let store = Arc::new(
        MockSecretStore::new()
            .with_secret(SOURCE_NAMESPACE, SECRET_NAME)
            .with_secret("team-a", SECRET_NAME),
    );
    let mutator = mutator(store.clone());

    let mut pod = new_pod("team-a", &["docker.io/nginx:latest"]);
    assert!(mutator.mutate(&mut pod).await.unwrap());

    assert_eq!(pull_secret_names(&pod), vec![SECRET_NAME.to_string()]);
    assert_eq!(store.create_calls(), 0);
    assert_eq!(store.secret_count(), 2);
}

#[tokio::test]
async fn test_missing_source_secret_is_fatal() {
    let store = Arc::new(MockSecretStore::new());
    let mutator = mutator(store);

    let mut pod = new_pod("team-a", &["docker.io/nginx:latest"]);
    let err = mutator.mutate(&mut pod).await.unwrap_err();

    assert!(matches!(
        err,
        Error::SourceSecretMissing { ref namespace, ref name }
            if namespace == SOURCE_NAMESPACE && name == SECRET_NAME
    ));
    // A failed mutation leaves the Pod unchanged.
    assert!(pull_secret_names(&pod).is_empty());
}

#[tokio::test]
async fn test_read_error_aborts_mutation() {
    let store = Arc::new(MockSecretStore::new().with_secret(SOURCE_NAMESPACE, SECRET_NAME));
    store.set_fail_reads(true);
    let mutator = mutator(store);

    let mut pod = new_pod("team-a", &["docker.io/nginx:latest"]);
    let err = mutator.mutate(&mut pod).await.unwrap_err();

    assert!(matches!(err, Error::StoreRead { .. }));
    assert!(pull_secret_names(&pod).is_empty());
}

#[tokio::test]
async fn test_create_error_aborts_mutation() {
    let store = Arc::new(MockSecretStore::new().with_secret(SOURCE_NAMESPACE, SECRET_NAME));
    store.set_fail_creates(true);
    let mutator = mutator(store);

    let mut pod = new_pod("team-a", &["docker.io/nginx:latest"]);
    let err = mutator.mutate(&mut pod).await.unwrap_err();

    assert!(matches!(
        err,
        Error::StoreWrite { ref namespace, .. } if namespace == "team-a"
    ));
    assert!(pull_secret_names(&pod).is_empty());
}

#[tokio::test]
async fn test_lost_create_race_is_absorbed() {
    // Simulate another admission request creating the replica between this
    // request's existence check and its create.
    let store = Arc::new(MockSecretStore::new().with_secret(SOURCE_NAMESPACE, SECRET_NAME));
    store.set_conflict_on_create(true);
    let mutator = mutator(store);

    let mut pod = new_pod("team-a", &["docker.io/nginx:latest"]);
    assert!(mutator.mutate(&mut pod).await.unwrap());
    assert_eq!(pull_secret_names(&pod), vec![SECRET_NAME.to_string()]);
}

#[tokio::test]
async fn test_concurrent_provisioning_in_new_namespace() {
    let store = Arc::new(MockSecretStore::new().with_secret(SOURCE_NAMESPACE, SECRET_NAME));
    let mutator = Arc::new(mutator(store.clone()));

    let a = {
        let mutator = mutator.clone();
        tokio::spawn(async move {
            let mut pod = new_pod("team-b", &["docker.io/nginx:latest"]);
            mutator.mutate(&mut pod).await.map(|_| pod)
        })
    };
    let b = {
        let mutator = mutator.clone();
        tokio::spawn(async move {
            let mut pod = new_pod("team-b", &["docker.io/library/redis:7"]);
            mutator.mutate(&mut pod).await.map(|_| pod)
        })
    };

    // Neither request surfaces an error, whichever one loses the create.
    let pod_a = a.await.unwrap().unwrap();
    let pod_b = b.await.unwrap().unwrap();

    assert_eq!(pull_secret_names(&pod_a), vec![SECRET_NAME.to_string()]);
    assert_eq!(pull_secret_names(&pod_b), vec![SECRET_NAME.to_string()]);

    // Exactly one replica exists: source plus one copy.
    assert_eq!(store.secret_count(), 2);
    assert!(store.secret("team-b", SECRET_NAME).is_some());
}

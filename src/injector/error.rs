//! Error types for the provisioning engine.

use thiserror::Error;

use crate::store::StoreError;

/// Error type for mutation operations.
///
/// Store failures abort the whole mutation; the engine never retries and a
/// failed call leaves the Pod unchanged. The transport maps these onto the
/// admission response.
#[derive(Debug, Error)]
pub enum Error {
    /// A Secret fetch failed for a reason other than not-found.
    #[error("failed to read secret {namespace}/{name}: {source}")]
    StoreRead {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },

    /// Replicating the Secret into the Pod's namespace failed.
    #[error("failed to create secret {namespace}/{name}: {source}")]
    StoreWrite {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },

    /// The source Secret itself is absent. This is a configuration fault
    /// and always fatal to the request.
    #[error("source image pull secret {namespace}/{name} does not exist")]
    SourceSecretMissing { namespace: String, name: String },
}

impl Error {
    pub(crate) fn store_read(namespace: &str, name: &str, source: StoreError) -> Self {
        Error::StoreRead {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        }
    }

    pub(crate) fn store_write(namespace: &str, name: &str, source: StoreError) -> Self {
        Error::StoreWrite {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

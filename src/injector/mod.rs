//! Mutation decision and Secret provisioning.
//!
//! The engine decides whether a Pod needs the configured image pull Secret,
//! replicates the Secret into the Pod's namespace on first use, and attaches
//! the reference to the Pod spec.

mod engine;
pub mod error;

pub use engine::PodMutator;
pub use error::{Error, Result};

//! Error types for the k3d provider
//!
//! Errors carry the node or cluster they concern so that a log line or a
//! returned error is enough to find the affected runtime resource.

use thiserror::Error;

use crate::runtime::RuntimeError;

/// Main error type for provider operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The k3d cluster could not be resolved when the provider was built
    #[error("cluster lookup failed for {cluster}: {message}")]
    ClusterLookup {
        /// Name of the k3d cluster
        cluster: String,
        /// Description of what failed
        message: String,
    },

    /// The runtime failed to add a node; nothing was registered with the API
    #[error("provisioning node {node} failed: {source}")]
    Provision {
        /// Generated name of the node that was being created
        node: String,
        /// The runtime failure
        #[source]
        source: RuntimeError,
    },

    /// The runtime failed to delete a node; the Node record was left in place
    #[error("runtime deletion of node {node} failed: {source}")]
    RuntimeDelete {
        /// Name of the node being deleted
        node: String,
        /// The runtime failure
        #[source]
        source: RuntimeError,
    },

    /// The runtime node is gone but its Node record could not be deleted
    ///
    /// Retry with [`crate::provider::K3dCloudProvider::delete_record`], which
    /// skips the runtime step.
    #[error("node {node} removed from runtime but record deletion failed: {message}")]
    RecordDelete {
        /// Name of the Node record still present in the API
        node: String,
        /// Description of what failed
        message: String,
    },

    /// Instance types could not be retrieved (distinct from an empty catalog)
    #[error("instance types unavailable: {message}")]
    CatalogUnavailable {
        /// Description of what failed
        message: String,
        /// Whether asking again may succeed
        retryable: bool,
    },

    /// Invalid input (empty node request, malformed provider ID, bad catalog)
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a cluster lookup error
    pub fn cluster_lookup(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ClusterLookup {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a record deletion error for a node whose runtime side is gone
    pub fn record_delete(node: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RecordDelete {
            node: node.into(),
            message: msg.into(),
        }
    }

    /// Create a catalog error
    pub fn catalog_unavailable(msg: impl Into<String>, retryable: bool) -> Self {
        Self::CatalogUnavailable {
            message: msg.into(),
            retryable,
        }
    }

    /// Whether the caller may retry the failed operation as-is
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube { .. } | Self::RecordDelete { .. } => true,
            Self::CatalogUnavailable { retryable, .. } => *retryable,
            Self::Provision { source, .. } | Self::RuntimeDelete { source, .. } => {
                source.is_transient()
            }
            Self::ClusterLookup { .. } | Self::Validation(_) => false,
        }
    }
}

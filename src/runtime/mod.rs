//! Container runtime abstraction
//!
//! The provider never talks to Docker or k3d directly. It needs three
//! primitives from whatever runs the cluster: resolve the cluster, add a node
//! and wait until it is ready, and delete a node. [`NodeRuntime`] is that
//! contract; [`K3dCli`] implements it by driving the `k3d` binary.

mod k3d;

pub use k3d::K3dCli;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The cluster or node does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A node with the requested name already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The runtime command ran and reported failure
    #[error("{command} failed: {message}")]
    CommandFailed {
        /// The command line that failed
        command: String,
        /// What the runtime reported
        message: String,
    },

    /// The runtime command could not be started
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The runtime answered with output that could not be understood
    #[error("unexpected runtime output: {0}")]
    Parse(String),
}

impl RuntimeError {
    /// Create a command failure
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Whether running the same operation again may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CommandFailed { .. } | Self::Io(_))
    }
}

/// Role a node plays in the k3s cluster
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Worker node running workloads
    #[default]
    Agent,
    /// Control plane node
    Server,
}

impl NodeRole {
    /// Role name as understood by k3d
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved runtime cluster
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterRef {
    /// Cluster name
    pub name: String,
    /// Names of the nodes the runtime currently runs for the cluster
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Everything the runtime needs to start one node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    /// Requested node name
    pub name: String,
    /// Cluster role
    pub role: NodeRole,
    /// Node image (e.g. "rancher/k3s:v1.23.8-k3s1")
    pub image: String,
    /// Memory limit in bytes or a binary unit (e.g. "128Mi"); `None` means unlimited
    pub memory: Option<String>,
    /// Labels the kubelet registers the node with
    pub labels: BTreeMap<String, String>,
    /// Block until the node reports ready
    pub wait: bool,
}

/// Primitives the provider requires from the runtime hosting the cluster
///
/// Every call completes only once the runtime has acknowledged it. Callers
/// bound calls by dropping the future; implementations must stop their work
/// when that happens.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeRuntime: Send + Sync {
    /// Resolve a cluster by name
    async fn get_cluster(&self, name: &str) -> Result<ClusterRef, RuntimeError>;

    /// Add a node to the cluster
    ///
    /// Returns the name the node registers with in the Kubernetes API, which
    /// is also the name [`NodeRuntime::delete_node`] accepts.
    async fn add_node(&self, cluster: &ClusterRef, spec: &NodeSpec)
        -> Result<String, RuntimeError>;

    /// Delete a node by its registered name
    ///
    /// Returns [`RuntimeError::NotFound`] when no such node exists.
    async fn delete_node(&self, name: &str) -> Result<(), RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(RuntimeError::command_failed("k3d node create", "docker hiccup").is_transient());
        assert!(RuntimeError::Io(std::io::Error::other("broken pipe")).is_transient());
        assert!(!RuntimeError::NotFound("node-a".into()).is_transient());
        assert!(!RuntimeError::AlreadyExists("node-a".into()).is_transient());
        assert!(!RuntimeError::Parse("garbage".into()).is_transient());
    }

    #[test]
    fn roles_render_as_k3d_names() {
        assert_eq!(NodeRole::Agent.to_string(), "agent");
        assert_eq!(NodeRole::Server.as_str(), "server");
        assert_eq!(NodeRole::default(), NodeRole::Agent);
    }

    #[test]
    fn command_failure_message_names_the_command() {
        let err = RuntimeError::command_failed("k3d node delete k3d-node-a-0", "exit status 1");
        assert_eq!(
            err.to_string(),
            "k3d node delete k3d-node-a-0 failed: exit status 1"
        );
    }
}

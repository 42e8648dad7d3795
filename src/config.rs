//! Provider configuration
//!
//! Settings are passed explicitly into [`crate::provider::K3dCloudProvider`]
//! at construction; nothing is read from ambient state once the provider runs.

use clap::Args;

use crate::runtime::NodeRole;

/// Default k3s image for new nodes
pub const DEFAULT_NODE_IMAGE: &str = "rancher/k3s:v1.23.8-k3s1";

/// Default k3d cluster name
pub const DEFAULT_CLUSTER_NAME: &str = "k3s-default";

/// Default prefix for generated node names
pub const DEFAULT_NAME_PREFIX: &str = "node";

/// Default number of names tried when the runtime reports a collision
pub const DEFAULT_MAX_NAME_ATTEMPTS: u32 = 3;

/// Configuration for the k3d provider
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Name of the k3d cluster nodes are added to
    #[arg(long = "cluster", env = "K3D_CLUSTER_NAME", default_value = DEFAULT_CLUSTER_NAME)]
    pub cluster_name: String,

    /// Image for new nodes
    #[arg(long, env = "K3D_NODE_IMAGE", default_value = DEFAULT_NODE_IMAGE)]
    pub node_image: String,

    /// Path to the k3d binary
    #[arg(long, env = "K3D_BINARY", default_value = "k3d")]
    pub k3d_binary: String,

    /// Prefix for generated node names (lowercase DNS label, at most 24 characters)
    #[arg(long, default_value = DEFAULT_NAME_PREFIX)]
    pub name_prefix: String,

    /// Names to try before giving up when the runtime reports a name collision
    #[arg(long, default_value_t = DEFAULT_MAX_NAME_ATTEMPTS)]
    pub max_name_attempts: u32,

    /// Role new nodes join the cluster with
    #[arg(skip)]
    pub node_role: NodeRole,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            node_image: DEFAULT_NODE_IMAGE.to_string(),
            k3d_binary: "k3d".to_string(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            max_name_attempts: DEFAULT_MAX_NAME_ATTEMPTS,
            node_role: NodeRole::Agent,
        }
    }
}

impl ProviderConfig {
    /// Configuration for the named cluster with all other settings defaulted
    pub fn for_cluster(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            ..Default::default()
        }
    }
}

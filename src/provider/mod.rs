//! Cloud provider contract for the autoscaler
//!
//! The autoscaler talks to exactly four operations: list instance types,
//! create a node, delete a node, and report the provider name. Backends are
//! chosen once, at construction; [`K3dCloudProvider`] is the only one and
//! takes its runtime as a [`NodeRuntime`](crate::runtime::NodeRuntime).
//!
//! # Example
//!
//! ```ignore
//! let provider = K3dCloudProvider::connect(config, runtime, records, catalog).await?;
//! let types = provider.instance_types(&WorkloadClass::new("default")).await?;
//! let node = provider.create(&NodeRequest::new(types)?).await?;
//! provider.delete(&node).await?;
//! ```

mod k3d;
mod naming;

pub use k3d::K3dCloudProvider;
pub use naming::NodeNamer;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;

use crate::catalog::WorkloadClass;
use crate::instance_type::InstanceType;
use crate::{Error, Result};

/// Name this provider reports to the autoscaler
pub const PROVIDER_NAME: &str = "k3d";

/// Scheme prefix of provider IDs
pub const PROVIDER_ID_SCHEME: &str = "k3d://";

/// The operations an autoscaler needs from a cloud provider
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Instance types that can be provisioned for the workload class
    async fn instance_types(&self, class: &WorkloadClass) -> Result<Vec<InstanceType>>;

    /// Provision a node for one of the request's candidates
    async fn create(&self, request: &NodeRequest) -> Result<Node>;

    /// Remove a node from the runtime and then from the API
    async fn delete(&self, node: &Node) -> Result<()>;

    /// Constant provider identifier
    fn name(&self) -> &'static str;
}

/// The instance types acceptable for one new node
///
/// Candidates keep the order they were given in; that order breaks ties
/// during selection.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRequest {
    instance_type_options: Vec<InstanceType>,
}

impl NodeRequest {
    /// Create a request; at least one candidate is required
    pub fn new(instance_type_options: Vec<InstanceType>) -> Result<Self> {
        if instance_type_options.is_empty() {
            return Err(Error::validation("node request has no instance type candidates"));
        }
        Ok(Self {
            instance_type_options,
        })
    }

    /// Candidates in request order
    pub fn instance_type_options(&self) -> &[InstanceType] {
        &self.instance_type_options
    }

    /// The candidate with the least memory
    ///
    /// Ties go to the earliest candidate. Candidates without a parseable
    /// memory quantity rank after all others.
    pub fn smallest_by_memory(&self) -> &InstanceType {
        self.instance_type_options
            .iter()
            .min_by_key(|it| it.memory_bytes().unwrap_or(i64::MAX))
            .unwrap_or(&self.instance_type_options[0])
    }
}

/// Provider ID for a node name
pub fn provider_id(node_name: &str) -> String {
    format!("{}{}", PROVIDER_ID_SCHEME, node_name)
}

/// Node name encoded in a provider ID
pub fn parse_provider_id(provider_id: &str) -> Result<&str> {
    match provider_id.strip_prefix(PROVIDER_ID_SCHEME) {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(name),
        _ => Err(Error::validation(format!(
            "invalid provider id {:?}, expected {}<node-name>",
            provider_id, PROVIDER_ID_SCHEME
        ))),
    }
}

/// Name of the runtime node behind a Node record
///
/// Prefers the provider ID; records without one fall back to their name.
pub fn runtime_node_name(node: &Node) -> Result<String> {
    let provider_id = node.spec.as_ref().and_then(|s| s.provider_id.as_deref());
    match (provider_id, node.metadata.name.as_deref()) {
        (Some(id), _) => parse_provider_id(id).map(str::to_string),
        (None, Some(name)) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(Error::validation("node has neither a provider id nor a name")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::NodeSpec;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use kube::core::ObjectMeta;

    use super::*;
    use crate::instance_type::RESOURCE_MEMORY;

    fn candidate(name: &str, memory: Option<&str>) -> InstanceType {
        InstanceType {
            name: name.to_string(),
            resources: memory
                .map(|m| BTreeMap::from([(RESOURCE_MEMORY.to_string(), Quantity(m.to_string()))]))
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    mod node_request {
        use super::*;

        #[test]
        fn empty_request_is_rejected() {
            let err = NodeRequest::new(vec![]).unwrap_err();
            assert!(err.to_string().contains("no instance type candidates"));
        }

        #[test]
        fn picks_minimum_memory() {
            let request = NodeRequest::new(vec![
                candidate("big", Some("256Mi")),
                candidate("small", Some("128Mi")),
                candidate("huge", Some("1Gi")),
            ])
            .unwrap();
            assert_eq!(request.smallest_by_memory().name, "small");
        }

        #[test]
        fn compares_across_units() {
            let request = NodeRequest::new(vec![
                candidate("binary", Some("128Mi")),
                candidate("decimal", Some("130M")),
            ])
            .unwrap();
            // 130M = 130_000_000 < 128Mi = 134_217_728
            assert_eq!(request.smallest_by_memory().name, "decimal");
        }

        #[test]
        fn ties_go_to_the_first_candidate() {
            let request = NodeRequest::new(vec![
                candidate("first", Some("128Mi")),
                candidate("second", Some("128Mi")),
                candidate("third", Some("134217728")),
            ])
            .unwrap();
            assert_eq!(request.smallest_by_memory().name, "first");
        }

        #[test]
        fn candidates_without_memory_rank_last() {
            let request = NodeRequest::new(vec![
                candidate("unknown", None),
                candidate("junk", Some("lots")),
                candidate("sized", Some("4Gi")),
            ])
            .unwrap();
            assert_eq!(request.smallest_by_memory().name, "sized");
        }

        #[test]
        fn only_unsized_candidates_falls_back_to_first() {
            let request =
                NodeRequest::new(vec![candidate("a", None), candidate("b", None)]).unwrap();
            assert_eq!(request.smallest_by_memory().name, "a");
        }
    }

    mod provider_ids {
        use super::*;

        fn node(name: Option<&str>, provider_id: Option<&str>) -> Node {
            Node {
                metadata: ObjectMeta {
                    name: name.map(String::from),
                    ..Default::default()
                },
                spec: Some(NodeSpec {
                    provider_id: provider_id.map(String::from),
                    ..Default::default()
                }),
                ..Default::default()
            }
        }

        #[test]
        fn round_trips_node_name() {
            let id = provider_id("k3d-node-abc-0");
            assert_eq!(id, "k3d://k3d-node-abc-0");
            assert_eq!(parse_provider_id(&id).unwrap(), "k3d-node-abc-0");
        }

        #[test]
        fn rejects_foreign_and_empty_ids() {
            assert!(parse_provider_id("aws:///us-east-1a/i-0123").is_err());
            assert!(parse_provider_id("k3d://").is_err());
            assert!(parse_provider_id("k3d://a/b").is_err());
            assert!(parse_provider_id("node-abc").is_err());
        }

        #[test]
        fn runtime_name_prefers_provider_id() {
            let n = node(Some("record-name"), Some("k3d://k3d-node-abc-0"));
            assert_eq!(runtime_node_name(&n).unwrap(), "k3d-node-abc-0");
        }

        #[test]
        fn runtime_name_falls_back_to_record_name() {
            let n = node(Some("k3d-node-abc-0"), None);
            assert_eq!(runtime_node_name(&n).unwrap(), "k3d-node-abc-0");
        }

        #[test]
        fn runtime_name_requires_some_identity() {
            assert!(runtime_node_name(&node(None, None)).is_err());
            assert!(runtime_node_name(&node(Some("x"), Some("gce://p/z/x"))).is_err());
        }
    }
}

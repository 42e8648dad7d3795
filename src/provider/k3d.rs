//! k3d-backed cloud provider
//!
//! # Create
//!
//! The smallest candidate by memory is launched as a k3d agent node sized to
//! that memory and labelled with its instance type. The call returns once the
//! runtime reports the node ready. A failed launch is logged and returned;
//! nothing is cleaned up and no Node record is produced.
//!
//! # Delete
//!
//! Deletion runs in two ordered phases:
//!
//! 1. **Runtime**: remove the k3d node. On failure the Node record is left
//!    alone, since the machine still exists.
//! 2. **Record**: remove the Node object from the API.
//!
//! If phase 2 fails the node is in the runtime-deleted, record-pending state
//! and [`K3dCloudProvider::delete_record`] finishes the job without touching
//! the runtime again.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, NodeSpec as KubeNodeSpec};
use kube::core::ObjectMeta;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument, Span};

use super::{provider_id, runtime_node_name, CloudProvider, NodeNamer, NodeRequest, PROVIDER_NAME};
use crate::catalog::{InstanceTypeCatalog, WorkloadClass};
use crate::config::ProviderConfig;
use crate::instance_type::requirements::LABEL_INSTANCE_TYPE;
use crate::instance_type::{quantity, InstanceType};
use crate::records::NodeRecords;
use crate::runtime::{ClusterRef, NodeRuntime, NodeSpec, RuntimeError};
use crate::{Error, Result};

/// Cloud provider that adds and removes k3s nodes in one k3d cluster
pub struct K3dCloudProvider {
    config: ProviderConfig,
    cluster: ClusterRef,
    runtime: Arc<dyn NodeRuntime>,
    records: Arc<dyn NodeRecords>,
    catalog: Arc<dyn InstanceTypeCatalog>,
    namer: NodeNamer,
    span: Span,
}

impl K3dCloudProvider {
    /// Resolve the configured cluster and build the provider
    ///
    /// Fails with [`Error::Validation`] for a bad name prefix and with
    /// [`Error::ClusterLookup`] when the cluster cannot be found.
    pub async fn connect(
        config: ProviderConfig,
        runtime: Arc<dyn NodeRuntime>,
        records: Arc<dyn NodeRecords>,
        catalog: Arc<dyn InstanceTypeCatalog>,
    ) -> Result<Self> {
        let span = info_span!("k3d", cluster = %config.cluster_name);
        let namer = NodeNamer::new(&config.name_prefix)?;

        let cluster = runtime
            .get_cluster(&config.cluster_name)
            .instrument(span.clone())
            .await
            .map_err(|e| {
                span.in_scope(|| {
                    error!(error = %e, "Failed to look up k3d cluster");
                });
                Error::cluster_lookup(&config.cluster_name, e.to_string())
            })?;

        span.in_scope(|| {
            info!(nodes = cluster.nodes.len(), "Connected to k3d cluster");
        });

        Ok(Self {
            namer,
            config,
            cluster,
            runtime,
            records,
            catalog,
            span,
        })
    }

    /// The resolved cluster
    pub fn cluster(&self) -> &ClusterRef {
        &self.cluster
    }

    /// Delete only the Node record, skipping the runtime
    ///
    /// This is the retry path after [`Error::RecordDelete`]. A record that
    /// is already gone counts as deleted, so repeating this is harmless.
    pub async fn delete_record(&self, node: &Node) -> Result<()> {
        self.remove_record(node).instrument(self.span.clone()).await
    }

    fn node_spec(&self, name: String, instance_type: &InstanceType) -> NodeSpec {
        NodeSpec {
            name,
            role: self.config.node_role,
            image: self.config.node_image.clone(),
            memory: instance_type.memory_bytes().map(quantity::format_bytes),
            labels: BTreeMap::from([(
                LABEL_INSTANCE_TYPE.to_string(),
                instance_type.name.clone(),
            )]),
            wait: true,
        }
    }

    #[instrument(skip_all, fields(candidates = request.instance_type_options().len()))]
    async fn provision(&self, request: &NodeRequest) -> Result<Node> {
        let instance_type = request.smallest_by_memory();
        let attempts = self.config.max_name_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let spec = self.node_spec(self.namer.generate(), instance_type);
            debug!(
                node = %spec.name,
                instance_type = %instance_type.name,
                memory = spec.memory.as_deref().unwrap_or("unlimited"),
                "Adding k3d node"
            );

            match self.runtime.add_node(&self.cluster, &spec).await {
                Ok(registered) => {
                    info!(
                        node = %registered,
                        instance_type = %instance_type.name,
                        "Created k3d node"
                    );
                    return Ok(node_record(&registered, &instance_type.name));
                }
                Err(RuntimeError::AlreadyExists(message)) if attempt < attempts => {
                    warn!(
                        node = %spec.name,
                        attempt,
                        error = %message,
                        "Node name taken, retrying with a new name"
                    );
                }
                Err(source) => {
                    error!(node = %spec.name, error = %source, "Failed to create k3d node");
                    return Err(Error::Provision {
                        node: spec.name,
                        source,
                    });
                }
            }
        }
    }

    #[instrument(skip_all, fields(node = node.metadata.name.as_deref().unwrap_or_default()))]
    async fn decommission(&self, node: &Node) -> Result<()> {
        let runtime_name = runtime_node_name(node)?;

        match self.runtime.delete_node(&runtime_name).await {
            Ok(()) => info!(node = %runtime_name, "Deleted k3d node"),
            Err(RuntimeError::NotFound(_)) => {
                debug!(node = %runtime_name, "k3d node already absent");
            }
            Err(source) => {
                error!(node = %runtime_name, error = %source, "Failed to delete k3d node");
                return Err(Error::RuntimeDelete {
                    node: runtime_name,
                    source,
                });
            }
        }

        self.remove_record(node).await
    }

    async fn remove_record(&self, node: &Node) -> Result<()> {
        let name = match node.metadata.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => runtime_node_name(node)?,
        };

        self.records.delete(&name).await.map_err(|e| {
            warn!(node = %name, error = %e, "Node record deletion failed, record is pending");
            Error::record_delete(&name, e.to_string())
        })?;

        info!(node = %name, "Deleted node record");
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for K3dCloudProvider {
    async fn instance_types(&self, class: &WorkloadClass) -> Result<Vec<InstanceType>> {
        self.catalog.list(class).instrument(self.span.clone()).await
    }

    async fn create(&self, request: &NodeRequest) -> Result<Node> {
        self.provision(request).instrument(self.span.clone()).await
    }

    async fn delete(&self, node: &Node) -> Result<()> {
        self.decommission(node).instrument(self.span.clone()).await
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// The Node record handed back to the autoscaler for a new node
fn node_record(name: &str, instance_type: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                LABEL_INSTANCE_TYPE.to_string(),
                instance_type.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(KubeNodeSpec {
            provider_id: Some(provider_id(name)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

//! Control-plane Node records
//!
//! After the runtime removes a node, its `Node` object must also go from the
//! Kubernetes API. The trait lets tests substitute the API.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, DeleteParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::Result;

/// Control-plane operations on Node records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeRecords: Send + Sync {
    /// Delete the Node record with the given name
    ///
    /// A record that is already gone counts as deleted.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Node records in a real cluster
pub struct KubeNodeRecords {
    client: Client,
}

impl KubeNodeRecords {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NodeRecords for KubeNodeRecords {
    async fn delete(&self, name: &str) -> Result<()> {
        let api: Api<Node> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(node = %name, "Node record already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

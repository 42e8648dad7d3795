//! Instance type catalog
//!
//! Answers "which instance types can be provisioned for this workload class".
//! The built-in catalog is static and ignores the class; the trait keeps the
//! class parameter so a catalog can vary by it without changing callers.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::instance_type::{
    InstanceType, Offering, RESOURCE_CPU, RESOURCE_EPHEMERAL_STORAGE, RESOURCE_MEMORY,
    RESOURCE_PODS,
};
use crate::{Error, Result};

/// Name of the built-in instance type
pub const K3S_INSTANCE_TYPE: &str = "k3s";

/// The class of workload instance types are requested for
///
/// Stands in for the autoscaler's provisioner object: a name plus the labels
/// it stamps on nodes.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadClass {
    /// Name of the class
    pub name: String,
    /// Labels applied to nodes launched for this class
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl WorkloadClass {
    /// Create a workload class with no labels
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }
}

/// Source of instance types
///
/// Listing must have no side effects. An empty list means nothing can be
/// provisioned; a catalog that cannot answer returns
/// [`Error::CatalogUnavailable`] instead.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InstanceTypeCatalog: Send + Sync {
    /// Instance types available for the given workload class
    async fn list(&self, class: &WorkloadClass) -> Result<Vec<InstanceType>>;
}

/// A fixed set of instance types, shared across all callers
#[derive(Clone, Debug)]
pub struct StaticCatalog {
    instance_types: Arc<[InstanceType]>,
}

impl StaticCatalog {
    /// Create a catalog from a list of instance types
    ///
    /// Names must be non-empty and unique.
    pub fn new(instance_types: Vec<InstanceType>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for it in &instance_types {
            if it.name.is_empty() {
                return Err(Error::validation("instance type name must not be empty"));
            }
            if !seen.insert(it.name.as_str()) {
                return Err(Error::validation(format!(
                    "duplicate instance type name: {}",
                    it.name
                )));
            }
        }
        Ok(Self {
            instance_types: instance_types.into(),
        })
    }

    /// The built-in catalog: a single small k3s node shape
    pub fn k3s() -> Self {
        Self {
            instance_types: vec![k3s_instance_type()].into(),
        }
    }

    /// Parse a YAML list of instance types
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let instance_types: Vec<InstanceType> = serde_yaml::from_str(yaml)
            .map_err(|e| Error::validation(format!("invalid catalog: {}", e)))?;
        Self::new(instance_types)
    }

    /// Load a YAML catalog file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::validation(format!("failed to read catalog {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    /// All instance types in catalog order
    pub fn instance_types(&self) -> &[InstanceType] {
        &self.instance_types
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::k3s()
    }
}

#[async_trait]
impl InstanceTypeCatalog for StaticCatalog {
    async fn list(&self, class: &WorkloadClass) -> Result<Vec<InstanceType>> {
        debug!(
            workload_class = %class.name,
            count = self.instance_types.len(),
            "Listing static instance types"
        );
        Ok(self.instance_types.to_vec())
    }
}

fn quantities(entries: &[(&str, &str)]) -> BTreeMap<String, Quantity> {
    entries
        .iter()
        .map(|(kind, amount)| (kind.to_string(), Quantity(amount.to_string())))
        .collect()
}

/// The single node shape offered by the built-in catalog
///
/// One CPU, 128Mi of memory, three pods, on-demand in three zones. No price
/// is set so the heuristic applies.
pub fn k3s_instance_type() -> InstanceType {
    InstanceType {
        name: K3S_INSTANCE_TYPE.to_string(),
        price: None,
        resources: quantities(&[
            (RESOURCE_CPU, "1"),
            (RESOURCE_MEMORY, "128Mi"),
            (RESOURCE_EPHEMERAL_STORAGE, "256Mi"),
            (RESOURCE_PODS, "3"),
        ]),
        overhead: quantities(&[
            (RESOURCE_CPU, "10m"),
            (RESOURCE_MEMORY, "10Mi"),
            (RESOURCE_EPHEMERAL_STORAGE, "128Mi"),
        ]),
        offerings: vec![
            Offering::on_demand("zone-1"),
            Offering::on_demand("zone-2"),
            Offering::on_demand("zone-3"),
        ],
        architecture: "arm64".to_string(),
        operating_system: "linux".to_string(),
    }
}

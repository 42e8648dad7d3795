//! Instance types: the node shapes the autoscaler can ask for
//!
//! An [`InstanceType`] is an immutable description of one provisionable node
//! shape: its capacity, the part of that capacity reserved by system
//! components, its price, and the `(capacity type, zone)` offerings under
//! which it can be obtained. Pricing and scheduling requirements are derived
//! from it in [`pricing`] and [`requirements`].

pub mod pricing;
pub mod quantity;
pub mod requirements;

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};

pub use requirements::{Requirement, Requirements};

/// Map from resource kind (e.g. `cpu`, `memory`) to quantity
pub type ResourceList = BTreeMap<String, Quantity>;

/// CPU resource kind
pub const RESOURCE_CPU: &str = "cpu";
/// Memory resource kind
pub const RESOURCE_MEMORY: &str = "memory";
/// Ephemeral storage resource kind
pub const RESOURCE_EPHEMERAL_STORAGE: &str = "ephemeral-storage";
/// Pod count resource kind
pub const RESOURCE_PODS: &str = "pods";
/// NVIDIA GPU resource kind
pub const RESOURCE_NVIDIA_GPU: &str = "nvidia.com/gpu";
/// AMD GPU resource kind
pub const RESOURCE_AMD_GPU: &str = "amd.com/gpu";

/// Capacity type for regular, non-interruptible capacity
pub const CAPACITY_TYPE_ON_DEMAND: &str = "on-demand";
/// Capacity type for interruptible capacity
pub const CAPACITY_TYPE_SPOT: &str = "spot";

/// Whether a resource kind is a GPU of any accelerator vendor
///
/// Covers `nvidia.com/gpu`, `amd.com/gpu`, Intel's `gpu.intel.com/<model>`
/// and any other `<vendor>/gpu` extended resource.
pub fn is_gpu_resource(kind: &str) -> bool {
    kind == RESOURCE_NVIDIA_GPU
        || kind == RESOURCE_AMD_GPU
        || kind.starts_with("gpu.intel.com/")
        || kind.ends_with("/gpu")
}

/// A `(capacity type, zone)` purchase option for an instance type
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    /// Purchasing model (e.g. "on-demand")
    pub capacity_type: String,
    /// Zone the capacity lives in
    pub zone: String,
}

impl Offering {
    /// Create an offering
    pub fn new(capacity_type: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            capacity_type: capacity_type.into(),
            zone: zone.into(),
        }
    }

    /// Create an on-demand offering in the given zone
    pub fn on_demand(zone: impl Into<String>) -> Self {
        Self::new(CAPACITY_TYPE_ON_DEMAND, zone)
    }
}

/// A provisionable node shape
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceType {
    /// Identifier, unique within a catalog
    pub name: String,
    /// Explicit price; `None` or zero means the heuristic in [`pricing`] applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Total capacity of the node
    #[serde(default)]
    pub resources: ResourceList,
    /// Capacity reserved by system components
    #[serde(default)]
    pub overhead: ResourceList,
    /// Purchase options, one per `(capacity type, zone)`
    #[serde(default)]
    pub offerings: Vec<Offering>,
    /// CPU architecture label value (e.g. "arm64")
    pub architecture: String,
    /// Operating system label value (e.g. "linux")
    pub operating_system: String,
}

impl InstanceType {
    /// Price of this instance type, explicit or estimated
    pub fn price(&self) -> f64 {
        pricing::price(self)
    }

    /// Scheduling requirements derived from this instance type
    pub fn requirements(&self) -> Requirements {
        requirements::derive(self)
    }

    /// The memory quantity, if declared
    pub fn memory(&self) -> Option<&Quantity> {
        self.resources.get(RESOURCE_MEMORY)
    }

    /// Memory in bytes, `None` when absent or malformed
    pub fn memory_bytes(&self) -> Option<i64> {
        self.memory().and_then(quantity::value)
    }

    /// Capacity left for workloads: `resources - overhead`, clamped at zero
    ///
    /// Values are approximate; kinds whose quantity does not parse are skipped.
    pub fn allocatable(&self) -> BTreeMap<String, f64> {
        self.resources
            .iter()
            .filter_map(|(kind, total)| {
                let total = quantity::approximate(total)?;
                let reserved = self
                    .overhead
                    .get(kind)
                    .and_then(quantity::approximate)
                    .unwrap_or(0.0);
                Some((kind.clone(), (total - reserved).max(0.0)))
            })
            .collect()
    }
}

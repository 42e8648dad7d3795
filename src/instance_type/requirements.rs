//! Scheduling requirements derived from an instance type
//!
//! Every instance type yields exactly five `In` requirements: its name,
//! architecture and OS (one value each), plus the distinct zones and
//! capacity types across its offerings. An empty value set is never
//! satisfiable, so an instance type with no offerings cannot be selected.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::NodeSelectorRequirement;
use serde::{Deserialize, Serialize};

use super::InstanceType;

/// Well-known instance type label
pub const LABEL_INSTANCE_TYPE: &str = "node.kubernetes.io/instance-type";
/// Well-known architecture label
pub const LABEL_ARCH: &str = "kubernetes.io/arch";
/// Well-known operating system label
pub const LABEL_OS: &str = "kubernetes.io/os";
/// Well-known topology zone label
pub const LABEL_ZONE: &str = "topology.kubernetes.io/zone";
/// Capacity type label used by the autoscaler
pub const LABEL_CAPACITY_TYPE: &str = "karpenter.sh/capacity-type";

/// Node selector operator for set membership
pub const OPERATOR_IN: &str = "In";

/// A label key and the set of values a node may carry for it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requirement {
    /// Label key
    pub key: String,
    /// Allowed values; empty means nothing satisfies the requirement
    pub values: BTreeSet<String>,
}

impl Requirement {
    /// Create an `In` requirement over the given values, collapsing duplicates
    pub fn new<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a label value satisfies this requirement
    pub fn allows(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    /// Convert to a node affinity term for pod specs
    pub fn to_node_selector_requirement(&self) -> NodeSelectorRequirement {
        NodeSelectorRequirement {
            key: self.key.clone(),
            operator: OPERATOR_IN.to_string(),
            values: Some(self.values.iter().cloned().collect()),
        }
    }
}

/// A set of requirements keyed by label
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requirements(BTreeMap<String, Requirement>);

impl Requirements {
    /// Build from requirements; a later requirement replaces an earlier one with the same key
    pub fn new(requirements: impl IntoIterator<Item = Requirement>) -> Self {
        Self(
            requirements
                .into_iter()
                .map(|r| (r.key.clone(), r))
                .collect(),
        )
    }

    /// Look up the requirement for a label key
    pub fn get(&self, key: &str) -> Option<&Requirement> {
        self.0.get(key)
    }

    /// Allowed values for a label key
    pub fn values(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.get(key).map(|r| &r.values)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no requirements at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over requirements in key order
    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.0.values()
    }

    /// Whether a value for `key` is allowed; keys without a requirement allow anything
    pub fn allows(&self, key: &str, value: &str) -> bool {
        self.get(key).map_or(true, |r| r.allows(value))
    }

    /// Whether a node carrying `labels` satisfies every requirement
    ///
    /// A missing label fails its requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.iter()
            .all(|r| labels.get(&r.key).is_some_and(|v| r.allows(v)))
    }

    /// Convert to node affinity terms, in key order
    pub fn to_node_selector_requirements(&self) -> Vec<NodeSelectorRequirement> {
        self.iter()
            .map(Requirement::to_node_selector_requirement)
            .collect()
    }
}

/// Derive the five scheduling requirements of an instance type
pub fn derive(instance_type: &InstanceType) -> Requirements {
    let zones = instance_type.offerings.iter().map(|o| o.zone.as_str());
    let capacity_types = instance_type
        .offerings
        .iter()
        .map(|o| o.capacity_type.as_str());

    Requirements::new([
        Requirement::new(LABEL_INSTANCE_TYPE, [instance_type.name.as_str()]),
        Requirement::new(LABEL_ARCH, [instance_type.architecture.as_str()]),
        Requirement::new(LABEL_OS, [instance_type.operating_system.as_str()]),
        Requirement::new(LABEL_ZONE, zones),
        Requirement::new(LABEL_CAPACITY_TYPE, capacity_types),
    ])
}

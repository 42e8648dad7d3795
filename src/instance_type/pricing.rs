//! Price estimation for instance types
//!
//! Local nodes have no market price. When a catalog entry does not set one,
//! the price is a heuristic derived from capacity so that the autoscaler still
//! prefers smaller shapes:
//!
//! - `0.1` per CPU core
//! - `0.1` per 10^9 bytes of memory
//! - a flat `1.0` when any GPU resource kind is present, whatever the
//!   count or number of kinds
//!
//! Other resource kinds are free, and quantities that fail to parse add
//! nothing. This is not a cost model of real hardware.

use super::{is_gpu_resource, quantity, InstanceType, RESOURCE_CPU, RESOURCE_MEMORY};

/// Price per CPU core
pub const CPU_CORE_PRICE: f64 = 0.1;
/// Price per 10^9 bytes of memory
pub const MEMORY_GB_PRICE: f64 = 0.1;
/// Flat price for the presence of any GPU
pub const GPU_PRICE: f64 = 1.0;

/// Price of an instance type: its explicit price when non-zero, else the estimate
pub fn price(instance_type: &InstanceType) -> f64 {
    match instance_type.price {
        Some(explicit) if explicit != 0.0 => explicit,
        _ => estimate(instance_type),
    }
}

/// Heuristic price computed from resources alone
pub fn estimate(instance_type: &InstanceType) -> f64 {
    let resources = &instance_type.resources;
    let amount = |kind: &str| {
        resources
            .get(kind)
            .and_then(quantity::approximate)
            .unwrap_or(0.0)
    };
    let gpu = if resources.keys().any(|kind| is_gpu_resource(kind)) {
        GPU_PRICE
    } else {
        0.0
    };

    CPU_CORE_PRICE * amount(RESOURCE_CPU)
        + MEMORY_GB_PRICE * amount(RESOURCE_MEMORY) / 1e9
        + gpu
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    use super::*;

    fn with_resources(resources: &[(&str, &str)]) -> InstanceType {
        InstanceType {
            name: "test".to_string(),
            resources: resources
                .iter()
                .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
                .collect::<BTreeMap<_, _>>(),
            ..Default::default()
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn one_core_and_128_megabytes() {
        let it = with_resources(&[("cpu", "1"), ("memory", "128000000")]);
        assert_close(price(&it), 0.1128);
    }

    #[test]
    fn explicit_price_wins() {
        let mut it = with_resources(&[("cpu", "8")]);
        it.price = Some(2.5);
        assert_eq!(price(&it), 2.5);
    }

    #[test]
    fn zero_explicit_price_falls_back_to_estimate() {
        let mut it = with_resources(&[("cpu", "2")]);
        it.price = Some(0.0);
        assert_close(price(&it), 0.2);
    }

    #[test]
    fn gpu_adds_flat_price_regardless_of_count() {
        let one = with_resources(&[("cpu", "1"), ("nvidia.com/gpu", "1")]);
        let eight = with_resources(&[("cpu", "1"), ("nvidia.com/gpu", "8")]);
        assert_close(price(&one), 1.1);
        assert_close(price(&eight), 1.1);

        let amd = with_resources(&[("amd.com/gpu", "2")]);
        assert_close(price(&amd), 1.0);
    }

    #[test]
    fn gpu_is_charged_once_across_kinds() {
        let intel = with_resources(&[("gpu.intel.com/i915", "1"), ("gpu.intel.com/xe", "1")]);
        assert_close(price(&intel), 1.0);

        let mixed = with_resources(&[
            ("cpu", "2"),
            ("nvidia.com/gpu", "1"),
            ("amd.com/gpu", "1"),
        ]);
        assert_close(price(&mixed), 1.2);
    }

    #[test]
    fn other_resources_are_free() {
        let it = with_resources(&[("pods", "110"), ("ephemeral-storage", "20Gi")]);
        assert_eq!(price(&it), 0.0);
    }

    #[test]
    fn malformed_quantities_contribute_nothing() {
        let it = with_resources(&[("cpu", "lots"), ("memory", "2000000000")]);
        assert_close(price(&it), 0.2);
    }

    #[test]
    fn catalog_k3s_shape() {
        let it = with_resources(&[
            ("cpu", "1"),
            ("memory", "128Mi"),
            ("ephemeral-storage", "256Mi"),
            ("pods", "3"),
        ]);
        assert_close(price(&it), 0.1 + 0.1 * 134_217_728.0 / 1e9);
    }
}

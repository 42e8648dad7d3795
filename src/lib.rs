//! k3d-provider - autoscaler cloud provider for local k3d clusters
//!
//! Gives a node autoscaler a catalog of node shapes and the ability to add
//! and remove k3s nodes in a local k3d cluster.
//!
//! # Modules
//!
//! - [`instance_type`] - Node shapes, pricing heuristic and scheduling requirements
//! - [`catalog`] - Instance types available per workload class
//! - [`provider`] - The [`provider::CloudProvider`] contract and its k3d implementation
//! - [`runtime`] - Container runtime abstraction and the `k3d` CLI adapter
//! - [`records`] - Node record deletion in the Kubernetes API
//! - [`config`] - Provider configuration
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod instance_type;
pub mod provider;
pub mod records;
pub mod runtime;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

//! k3d command-line runtime
//!
//! Drives the `k3d` binary. k3d names node containers `k3d-<name>-<index>`
//! and the kubelet registers under the container hostname, so a node created
//! as `node-abc` joins the cluster as `k3d-node-abc-0`. That registered name
//! is what [`K3dCli::add_node`](super::NodeRuntime::add_node) returns and
//! what deletion expects.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{ClusterRef, NodeRuntime, NodeSpec, RuntimeError};

/// Object name prefix k3d puts on every container it creates
const K3D_NAME_PREFIX: &str = "k3d";

/// Runtime backed by the `k3d` CLI
#[derive(Clone, Debug)]
pub struct K3dCli {
    binary: String,
}

impl K3dCli {
    /// Create a runtime that invokes the given k3d binary
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Name a node created as `name` registers under
    pub fn registered_name(name: &str) -> String {
        format!("{}-{}-0", K3D_NAME_PREFIX, name)
    }

    /// Run k3d and return stdout, mapping failures by their stderr
    async fn run(&self, args: &[String]) -> Result<String, RuntimeError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!(command = %command, "Running k3d");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&command, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for K3dCli {
    fn default() -> Self {
        Self::new("k3d")
    }
}

#[async_trait]
impl NodeRuntime for K3dCli {
    async fn get_cluster(&self, name: &str) -> Result<ClusterRef, RuntimeError> {
        let stdout = self.run(&cluster_get_args(name)).await?;
        parse_cluster(name, &stdout)
    }

    async fn add_node(
        &self,
        cluster: &ClusterRef,
        spec: &NodeSpec,
    ) -> Result<String, RuntimeError> {
        self.run(&node_create_args(cluster, spec)).await?;
        Ok(Self::registered_name(&spec.name))
    }

    async fn delete_node(&self, name: &str) -> Result<(), RuntimeError> {
        self.run(&["node".to_string(), "delete".to_string(), name.to_string()])
            .await
            .map(|_| ())
    }
}

fn cluster_get_args(name: &str) -> Vec<String> {
    ["cluster", "get", name, "--output", "json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn node_create_args(cluster: &ClusterRef, spec: &NodeSpec) -> Vec<String> {
    let mut args: Vec<String> = [
        "node",
        "create",
        spec.name.as_str(),
        "--cluster",
        cluster.name.as_str(),
        "--role",
        spec.role.as_str(),
        "--image",
        spec.image.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if let Some(memory) = &spec.memory {
        args.push("--memory".to_string());
        args.push(memory.clone());
    }
    for (key, value) in &spec.labels {
        args.push("--k3s-node-label".to_string());
        args.push(format!("{}={}", key, value));
    }
    if spec.wait {
        args.push("--wait".to_string());
    }
    args
}

fn classify_failure(command: &str, stderr: &str) -> RuntimeError {
    let lower = stderr.to_lowercase();
    if lower.contains("already exists") {
        RuntimeError::AlreadyExists(stderr.to_string())
    } else if lower.contains("not found") || lower.contains("no nodes found") {
        RuntimeError::NotFound(stderr.to_string())
    } else {
        RuntimeError::command_failed(command, stderr)
    }
}

#[derive(Deserialize)]
struct K3dCluster {
    name: String,
    #[serde(default)]
    nodes: Vec<K3dNode>,
}

#[derive(Deserialize)]
struct K3dNode {
    name: String,
}

fn parse_cluster(name: &str, stdout: &str) -> Result<ClusterRef, RuntimeError> {
    let clusters: Vec<K3dCluster> =
        serde_json::from_str(stdout).map_err(|e| RuntimeError::Parse(e.to_string()))?;

    clusters
        .into_iter()
        .find(|c| c.name == name)
        .map(|c| ClusterRef {
            name: c.name,
            nodes: c.nodes.into_iter().map(|n| n.name).collect(),
        })
        .ok_or_else(|| RuntimeError::NotFound(format!("cluster {}", name)))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::runtime::NodeRole;

    fn spec() -> NodeSpec {
        NodeSpec {
            name: "node-abc".to_string(),
            role: NodeRole::Agent,
            image: "rancher/k3s:v1.23.8-k3s1".to_string(),
            memory: Some("128Mi".to_string()),
            labels: BTreeMap::from([(
                "node.kubernetes.io/instance-type".to_string(),
                "k3s".to_string(),
            )]),
            wait: true,
        }
    }

    fn cluster() -> ClusterRef {
        ClusterRef {
            name: "dev".to_string(),
            nodes: vec![],
        }
    }

    #[test]
    fn registered_name_follows_k3d_container_naming() {
        assert_eq!(K3dCli::registered_name("node-abc"), "k3d-node-abc-0");
    }

    #[test]
    fn node_create_passes_role_image_memory_label_and_wait() {
        let args = node_create_args(&cluster(), &spec());
        assert_eq!(
            args,
            [
                "node",
                "create",
                "node-abc",
                "--cluster",
                "dev",
                "--role",
                "agent",
                "--image",
                "rancher/k3s:v1.23.8-k3s1",
                "--memory",
                "128Mi",
                "--k3s-node-label",
                "node.kubernetes.io/instance-type=k3s",
                "--wait",
            ]
        );
    }

    #[test]
    fn node_create_without_memory_or_wait() {
        let mut spec = spec();
        spec.memory = None;
        spec.wait = false;
        spec.labels.clear();
        let args = node_create_args(&cluster(), &spec);
        assert!(!args.contains(&"--memory".to_string()));
        assert!(!args.contains(&"--wait".to_string()));
        assert!(!args.contains(&"--k3s-node-label".to_string()));
    }

    #[test]
    fn cluster_get_requests_json() {
        assert_eq!(
            cluster_get_args("dev"),
            ["cluster", "get", "dev", "--output", "json"]
        );
    }

    #[test]
    fn parses_cluster_and_node_names() {
        let json = r#"[{"name":"dev","nodes":[{"name":"k3d-dev-server-0","role":"server"},{"name":"k3d-dev-serverlb","role":"loadbalancer"}],"network":{"name":"k3d-dev"}}]"#;
        let cluster = parse_cluster("dev", json).unwrap();
        assert_eq!(cluster.name, "dev");
        assert_eq!(cluster.nodes, ["k3d-dev-server-0", "k3d-dev-serverlb"]);
    }

    #[test]
    fn missing_cluster_is_not_found() {
        let err = parse_cluster("prod", r#"[{"name":"dev"}]"#).unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound(_)));
    }

    #[test]
    fn garbage_output_is_a_parse_error() {
        let err = parse_cluster("dev", "not json").unwrap_err();
        assert!(matches!(err, RuntimeError::Parse(_)));
    }

    #[test]
    fn failures_are_classified_from_stderr() {
        assert!(matches!(
            classify_failure("k3d node create", "Node k3d-node-a-0 already exists"),
            RuntimeError::AlreadyExists(_)
        ));
        assert!(matches!(
            classify_failure("k3d node delete", "No nodes found for given name"),
            RuntimeError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure("k3d cluster get", "cluster 'dev' not found"),
            RuntimeError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure("k3d node create", "out of resources"),
            RuntimeError::CommandFailed { .. }
        ));
    }

    #[tokio::test]
    async fn missing_binary_is_an_io_error() {
        let runtime = K3dCli::new("/nonexistent/k3d-binary");
        let err = runtime.get_cluster("dev").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Io(_)));
    }
}

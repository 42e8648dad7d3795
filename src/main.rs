//! k3d-provider - inspect the catalog and add or remove k3d nodes by hand

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use k8s_openapi::api::core::v1::{Node, NodeSelectorRequirement, NodeSpec};
use kube::core::ObjectMeta;
use kube::Client;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use k3d_provider::catalog::{InstanceTypeCatalog, StaticCatalog, WorkloadClass};
use k3d_provider::config::ProviderConfig;
use k3d_provider::instance_type::{InstanceType, Offering, ResourceList};
use k3d_provider::provider::{CloudProvider, K3dCloudProvider, NodeRequest};
use k3d_provider::records::KubeNodeRecords;
use k3d_provider::runtime::K3dCli;

/// k3d-provider - autoscaler cloud provider for local k3d clusters
#[derive(Parser, Debug)]
#[command(name = "k3d-provider", version, about, long_about = None)]
struct Cli {
    /// YAML file with a list of instance types replacing the built-in catalog
    #[arg(long, global = true, env = "K3D_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the instance types with their price and scheduling requirements
    InstanceTypes {
        /// Workload class to list instance types for
        #[arg(long, default_value = "default")]
        workload_class: String,
    },

    /// Provision one node and print its Node record
    Create {
        #[command(flatten)]
        config: ProviderConfig,

        /// Restrict candidates to these instance types (default: whole catalog)
        #[arg(long = "instance-type")]
        instance_types: Vec<String>,
    },

    /// Remove a node from the runtime and then from the API
    Delete {
        #[command(flatten)]
        config: ProviderConfig,

        /// Provider ID of the node (k3d://<name>)
        #[arg(long, conflicts_with = "node", required_unless_present = "node")]
        provider_id: Option<String>,

        /// Name of the Node record
        #[arg(long)]
        node: Option<String>,

        /// Only delete the Node record; use after the runtime node is already gone
        #[arg(long)]
        record_only: bool,
    },
}

/// Catalog entry as printed by `instance-types`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstanceTypeView {
    name: String,
    price: f64,
    resources: ResourceList,
    overhead: ResourceList,
    offerings: Vec<Offering>,
    requirements: Vec<NodeSelectorRequirement>,
}

impl From<InstanceType> for InstanceTypeView {
    fn from(it: InstanceType) -> Self {
        Self {
            price: it.price(),
            requirements: it.requirements().to_node_selector_requirements(),
            name: it.name,
            resources: it.resources,
            overhead: it.overhead,
            offerings: it.offerings,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let catalog = match &cli.catalog {
        Some(path) => StaticCatalog::from_file(path).await?,
        None => StaticCatalog::k3s(),
    };

    match cli.command {
        Commands::InstanceTypes { workload_class } => {
            let types = catalog.list(&WorkloadClass::new(workload_class)).await?;
            let views: Vec<InstanceTypeView> = types.into_iter().map(Into::into).collect();
            print!("{}", serde_yaml::to_string(&views)?);
            Ok(())
        }
        Commands::Create {
            config,
            instance_types,
        } => run_create(config, catalog, instance_types).await,
        Commands::Delete {
            config,
            provider_id,
            node,
            record_only,
        } => run_delete(config, catalog, provider_id, node, record_only).await,
    }
}

async fn connect(
    config: ProviderConfig,
    catalog: StaticCatalog,
) -> anyhow::Result<K3dCloudProvider> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;
    let runtime = K3dCli::new(&config.k3d_binary);

    let provider = K3dCloudProvider::connect(
        config,
        Arc::new(runtime),
        Arc::new(KubeNodeRecords::new(client)),
        Arc::new(catalog),
    )
    .await?;
    Ok(provider)
}

async fn run_create(
    config: ProviderConfig,
    catalog: StaticCatalog,
    wanted: Vec<String>,
) -> anyhow::Result<()> {
    let class = WorkloadClass::new("default");
    let provider = connect(config, catalog).await?;

    let candidates: Vec<InstanceType> = provider
        .instance_types(&class)
        .await?
        .into_iter()
        .filter(|it| wanted.is_empty() || wanted.contains(&it.name))
        .collect();
    let request = NodeRequest::new(candidates)?;

    let node = provider.create(&request).await?;
    print!("{}", serde_yaml::to_string(&node)?);
    Ok(())
}

async fn run_delete(
    config: ProviderConfig,
    catalog: StaticCatalog,
    provider_id: Option<String>,
    name: Option<String>,
    record_only: bool,
) -> anyhow::Result<()> {
    let node = Node {
        metadata: ObjectMeta {
            name: name.or_else(|| {
                provider_id
                    .as_deref()
                    .and_then(|id| k3d_provider::provider::parse_provider_id(id).ok())
                    .map(str::to_string)
            }),
            ..Default::default()
        },
        spec: Some(NodeSpec {
            provider_id,
            ..Default::default()
        }),
        ..Default::default()
    };

    let provider = connect(config, catalog).await?;
    if record_only {
        provider.delete_record(&node).await?;
    } else {
        provider.delete(&node).await?;
    }
    Ok(())
}

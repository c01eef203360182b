use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for the k8s-supportpkg tool.
///
/// A run needs at least one namespace and the product whose deployment is
/// being diagnosed. Cluster credentials are discovered the way kubectl does
/// unless given explicitly.
#[derive(Parser, Debug)]
#[clap(
    name = "k8s-supportpkg",
    version,
    about = "Collects a diagnostic support package from a Kubernetes cluster",
    subcommand_negates_reqs = true
)]
pub struct Args {
    /// Namespace to collect from (repeatable, or comma-separated)
    #[clap(short, long = "namespace", required = true, value_delimiter = ',')]
    pub namespaces: Vec<String>,

    /// Product deployed in the namespaces
    #[clap(short, long, value_enum, required = true)]
    pub product: Option<Product>,

    /// Path to a kubeconfig file
    #[clap(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[clap(long)]
    pub context: Option<String>,

    /// Directory receiving the archive (default: current directory)
    #[clap(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// NGINX products with a collection catalog
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum Product {
    /// NGINX Ingress Controller
    Nic,
    /// NGINX Gateway Fabric
    Ngf,
    /// NGINX running as a plain workload
    Ngx,
}

impl Product {
    /// Short name used in the workspace and archive names
    pub fn slug(&self) -> &'static str {
        match self {
            Product::Nic => "nic",
            Product::Ngf => "ngf",
            Product::Ngx => "ngx",
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Available subcommands for the collector.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a configuration file with the default settings
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "supportpkg.yaml")]
        path: PathBuf,
    },
}

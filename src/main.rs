use std::env;
use std::io;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};

use k8s_supportpkg::cli::{Args, Commands};
use k8s_supportpkg::cluster::ClusterHandles;
use k8s_supportpkg::collectors::CollectorContext;
use k8s_supportpkg::config::RunConfig;
use k8s_supportpkg::jobs::{build_catalog, JobEngine};
use k8s_supportpkg::utils::summary;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Handle subcommands
    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd);
    }

    let product = args
        .product
        .ok_or_else(|| anyhow!("A product must be selected with --product"))?;

    // Load configuration; flags win over file values
    let run_config = match &args.config {
        Some(path) => RunConfig::from_yaml_file(path)?,
        None => RunConfig::default(),
    };
    let settings = run_config.cluster_settings(args.kubeconfig.clone(), args.context.clone());
    let output_dir = match args.output_dir.clone().or_else(|| run_config.output_dir.clone()) {
        Some(dir) => dir,
        None => env::current_dir().context("Failed to determine current directory")?,
    };

    let cluster = ClusterHandles::connect(&settings)
        .await
        .context("Unable to start data collector")?;
    let ctx = Arc::new(CollectorContext::new(product.slug(), &args.namespaces, cluster)?);

    initialize_logging(args.verbose, &ctx)?;
    info!(
        "Starting k8s-supportpkg - version: {}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Input args are {:?}", env::args().collect::<Vec<_>>());
    info!("Cluster credentials from {}", settings.source());
    if let Some(context) = &settings.context {
        info!("Kubeconfig context: {}", context);
    }
    if let Some(server) = ctx.cluster().api_server() {
        info!("Using API server {}", server);
    }
    info!("Workspace: {}", ctx.workspace().display());

    // Every namespace must exist before anything is collected
    let missing = ctx.cluster().missing_namespaces(ctx.namespaces()).await?;
    if !missing.is_empty() {
        error!("Namespaces not found: {}", missing.join(", "));
        println!(" Error: Some namespaces do not exist: {}", missing.join(", "));
        bail!("Some namespaces do not exist");
    }

    let engine = JobEngine::with_overrides(run_config.timeout_overrides());
    let catalog = build_catalog(product);
    let records = engine
        .run_catalog(&catalog, &ctx, &mut io::stdout())
        .await;

    if let Err(e) = summary::write_run_summary(ctx.product(), ctx.namespaces(), &records, ctx.workspace()) {
        warn!("Failed to write run summary: {:#}", e);
    }

    match ctx.wrap_up(&output_dir) {
        Ok(archive) => {
            info!("Supportpkg generated at {}", archive.display());
            println!("Supportpkg successfully generated: {}", archive.display());
            Ok(())
        }
        Err(e) => {
            error!("Error when wrapping up: {:#}", e);
            println!("Error when wrapping up: {:#}", e);
            println!("Collected files remain in {}", ctx.workspace().display());
            Err(e)
        }
    }
}

/// Routes the `log` facade to the terminal and to the workspace log file
fn initialize_logging(verbose: bool, ctx: &CollectorContext) -> Result<()> {
    let (term_level, file_level) = if verbose {
        (LevelFilter::Debug, LevelFilter::Debug)
    } else {
        (LevelFilter::Error, LevelFilter::Info)
    };

    CombinedLogger::init(vec![
        TermLogger::new(
            term_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(file_level, Config::default(), ctx.log_sink()?),
    ])
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-config)
fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            RunConfig::template().save_to_yaml_file(path)?;
            println!("Configuration written to {}", path.display());
            Ok(())
        }
    }
}

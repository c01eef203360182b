//! # k8s-supportpkg
//!
//! Collects a diagnostic snapshot of a Kubernetes deployment of an NGINX
//! product and packs it into one gzip tar for offline analysis.
//!
//! ## Overview
//!
//! A run creates a private workspace, executes the product's catalog of task
//! units one after another (each under its own deadline), writes whatever
//! every unit produced into the workspace, and finally archives the
//! workspace as `<product>-supportpkg-<epoch>.tar.gz`.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use k8s_supportpkg::cli::Product;
//! use k8s_supportpkg::cluster::ClusterHandles;
//! use k8s_supportpkg::collectors::CollectorContext;
//! use k8s_supportpkg::config::ClusterSettings;
//! use k8s_supportpkg::jobs::{build_catalog, JobEngine};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cluster = ClusterHandles::connect(&ClusterSettings::default()).await?;
//! let ctx = Arc::new(CollectorContext::new("nic", &["nginx-ingress".to_string()], cluster)?);
//!
//! let records = JobEngine::new()
//!     .run_catalog(&build_catalog(Product::Nic), &ctx, &mut std::io::stdout())
//!     .await;
//! println!("Ran {} jobs", records.len());
//!
//! let archive = ctx.wrap_up(std::path::Path::new("."))?;
//! println!("Supportpkg successfully generated: {}", archive.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`cluster`]: Kubernetes client, remote exec, Helm and metrics access
//! - [`collectors`]: Collector context and deadline signal
//! - [`jobs`]: Task units, product catalogs and the job engine
//! - [`utils`]: Archive builder, hashing and the run summary
//! - [`config`]: Run configuration and kubeconfig discovery
//! - [`security`]: Path validation for files written to the workspace
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models and structures used throughout the application
pub mod models;

/// Cluster access: typed listings, custom resources, exec, Helm
pub mod cluster;

/// Collector context and deadline propagation
pub mod collectors;

/// Task units, catalogs and the execution engine
pub mod jobs;

/// Utility functions for archiving, hashing and summaries
pub mod utils;

/// Configuration management and credential discovery
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Security utilities for path validation
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;

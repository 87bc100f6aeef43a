/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for NuGallery-Core. Searches V2 package feeds,
    resolves single packages and their dependencies, and lists
    workspace projects with their effective package versions.

  Security / Safety Notes:
    Operates within user privileges. Performs HTTPS GET
    requests and may launch the credential provider, whose
    interactive login inherits the terminal.

  Dependencies:
    clap for CLI parsing, chrono for session stamps,
    serde_json for output documents.

  Operational Scope:
    Invoked by operators or wrapper scripts; every command
    emits a JSON document to stdout or `--output`.

  Revision History:
    2026-10-18 COD  Authored NuGallery-Core runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use nugallery_core::error::{GalleryError, Result};
use nugallery_core::{
    CredentialProvider, FileDiscovery, GalleryConfig, Logger, PackageFeed, ProcessTaskRunner,
    ProjectAggregator, ProviderCommand, SourceRegistry, WorkspaceDiscovery,
};

/// Command-line arguments for NuGallery-Core.
#[derive(Debug, Parser)]
#[command(
    name = "NuGallery-Core",
    version,
    author = "Synavera Systems",
    about = "Package feed and workspace inspector for NuGet V2 sources"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Package source URL; defaults to the first configured source.
    #[arg(long, value_name = "URL", global = true)]
    source: Option<String>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH", global = true)]
    log: Option<PathBuf>,
    /// Write the JSON result here instead of stdout.
    #[arg(long, value_name = "PATH", global = true)]
    output: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search the source; each result carries its known versions.
    Search {
        filter: String,
        /// Include prerelease versions.
        #[arg(long, action = ArgAction::SetTrue)]
        prerelease: bool,
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 20)]
        take: u32,
    },
    /// List published versions of a package.
    Versions { id: String },
    /// Fetch a package, trying fallback sources first.
    Package {
        id: String,
        #[arg(long = "fallback", value_name = "URL", action = ArgAction::Append)]
        fallback: Vec<String>,
    },
    /// Show dependency groups for a package version URL.
    Details { url: String },
    /// List workspace projects with resolved package versions.
    Projects {
        /// Workspace root; defaults to the current directory.
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[NuGallery-Core] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = GalleryConfig::load_from_optional_path(cli.config.as_deref())?;

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| config.log_dir().join(format!("core_{session_stamp}.log")));
    let logger = Arc::new(Logger::new(Some(log_path), cli.verbose)?);
    logger.info("INIT", "NuGallery Core awakening.");

    let code = match cli.command {
        Command::Projects { ref root } => {
            let root = match root {
                Some(root) => root.clone(),
                None => std::env::current_dir()?,
            };
            list_projects(&config, &root, cli.output.as_deref(), &logger).await?
        }
        ref command => {
            let registry = build_registry(&config, logger.clone());
            let source = match cli.source.as_deref() {
                Some(source) => source,
                None => config.default_source()?,
            };
            query_source(command, &registry, source, cli.output.as_deref(), &logger).await?
        }
    };

    logger.info("COMPLETE", "Session complete.");
    logger.finalize()?;
    Ok(code)
}

fn build_registry(config: &GalleryConfig, logger: Arc<Logger>) -> SourceRegistry {
    let command = ProviderCommand::resolve(
        &config.credentials.provider_folder,
        &config.credentials.runtime,
        cfg!(windows),
    );
    let provider = CredentialProvider::new(command, Arc::new(ProcessTaskRunner), logger.clone())
        .with_timeout(Duration::from_secs(config.credentials.timeout));
    SourceRegistry::new(config.feed.clone(), Arc::new(provider), logger)
}

async fn query_source(
    command: &Command,
    registry: &SourceRegistry,
    source: &str,
    output: Option<&Path>,
    logger: &Logger,
) -> Result<ExitCode> {
    match command {
        Command::Search {
            filter,
            prerelease,
            skip,
            take,
        } => {
            let packages = registry
                .source(source)?
                .search(filter, *prerelease, *skip, *take)
                .await?;
            logger.info(
                "SEARCH",
                format!("`{filter}` returned {} packages", packages.len()),
            );
            emit(&packages, output)?;
        }
        Command::Versions { id } => {
            let versions = registry.source(source)?.get_versions(id).await?;
            emit(&versions, output)?;
        }
        Command::Package { id, fallback } => {
            let response = registry.fetch_package(source, id, fallback).await;
            emit(&response, output)?;
            if response.is_failure {
                return Ok(GalleryError::PackageFetch { id: id.clone() }.exit_code());
            }
        }
        Command::Details { url } => {
            let details = registry.source(source)?.get_package_details(url).await;
            emit(&details, output)?;
        }
        Command::Projects { .. } => {
            return Err(GalleryError::Runtime(
                "Projects listing does not query a source".into(),
            ))
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn list_projects(
    config: &GalleryConfig,
    root: &Path,
    output: Option<&Path>,
    logger: &Logger,
) -> Result<ExitCode> {
    let discovery = WorkspaceDiscovery::new(root, config.workspace.exclude.as_deref())?;
    let project_paths = discovery.find(&config.workspace.project_pattern).await?;
    logger.info(
        "PROJECTS",
        format!(
            "Discovered {} project files under {}",
            project_paths.len(),
            discovery.root().display()
        ),
    );

    let projects = ProjectAggregator::new(&discovery, logger)
        .with_props_pattern(config.workspace.props_pattern.as_str())
        .aggregate(&project_paths)
        .await;
    emit(&projects, output)?;
    Ok(ExitCode::SUCCESS)
}

/// Print `value` as pretty JSON, or persist it to `output`.
fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let Some(path) = output else {
        let rendered = serde_json::to_string_pretty(value).map_err(|err| {
            GalleryError::Serialization(format!("Failed to render output: {err}"))
        })?;
        println!("{rendered}");
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            GalleryError::Filesystem(format!(
                "Failed to create output directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(path).map_err(|err| {
        GalleryError::Filesystem(format!(
            "Failed to create output file {}: {err}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, value).map_err(|err| {
        GalleryError::Filesystem(format!("Failed to write output {}: {err}", path.display()))
    })?;
    Ok(())
}

/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::host
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Define the host capabilities the core depends on (file
    discovery and interactive task execution) together with
    the standalone implementations used by the binary.

  Security / Safety Notes:
    Tasks run with user privileges and inherit the terminal so
    an operator can complete a login flow; nothing is elevated.

  Dependencies:
    async-trait for object-safe async capabilities, walkdir and
    globset for workspace discovery, tokio::process for tasks.

  Operational Scope:
    Injected into the project aggregator and the credential
    provider; editor integrations supply their own variants.

  Revision History:
    2026-10-18 COD  Introduced host capability seams.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Side effects isolated behind explicit capabilities
    - Deterministic discovery order for reproducible output
============================================================*/

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use tokio::process::Command;
use walkdir::WalkDir;

use crate::error::{GalleryError, Result};

/// Locates files matching a glob pattern on behalf of the core.
#[async_trait]
pub trait FileDiscovery: Send + Sync {
    async fn find(&self, pattern: &str) -> Result<Vec<PathBuf>>;
}

/// Runs a host-managed task and resolves once it has finished.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<()>;
}

/// Discovers files beneath a workspace root, skipping an exclusion glob.
#[derive(Debug, Clone)]
pub struct WorkspaceDiscovery {
    root: PathBuf,
    exclude: Option<GlobMatcher>,
}

impl WorkspaceDiscovery {
    pub fn new(root: impl Into<PathBuf>, exclude: Option<&str>) -> Result<Self> {
        let exclude = exclude.map(compile_glob).transpose()?;
        Ok(Self {
            root: root.into(),
            exclude,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self, matcher: &GlobMatcher) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                let excluded = self
                    .exclude
                    .as_ref()
                    .is_some_and(|exclude| exclude.is_match(relative));
                (!excluded && matcher.is_match(relative)).then(|| entry.into_path())
            })
            .collect();
        found.sort();
        found
    }
}

#[async_trait]
impl FileDiscovery for WorkspaceDiscovery {
    async fn find(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let matcher = compile_glob(pattern)?;
        let discovery = self.clone();
        tokio::task::spawn_blocking(move || discovery.walk(&matcher))
            .await
            .map_err(|err| GalleryError::Runtime(format!("File discovery task failed: {err}")))
    }
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|err| GalleryError::Config(format!("Invalid glob `{pattern}`: {err}")))
}

/// Runs tasks as child processes attached to the current terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTaskRunner;

#[async_trait]
impl TaskRunner for ProcessTaskRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<()> {
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|err| map_spawn_error(err, program))?;

        if !status.success() {
            return Err(GalleryError::CommandFailure {
                command: format!("{program} {}", args.join(" ")),
                status: status.code().unwrap_or(-1),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}

pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> GalleryError {
    if err.kind() == io::ErrorKind::NotFound {
        GalleryError::CommandMissing {
            command: command.into(),
        }
    } else {
        GalleryError::Runtime(format!("Failed to spawn {command}: {err}"))
    }
}

/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise NuGallery-Core error types so feed, credential,
    and project failures share one taxonomy and exit semantics.

  Security / Safety Notes:
    Credential failures carry a fixed message only; provider
    output and tokens never reach an error value.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for the binary entry point.

  Revision History:
    2026-10-18 COD  Reworked taxonomy for feed and project errors.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths outside best-effort enrichment
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

/// Message surfaced whenever a single package cannot be fetched.
pub const PACKAGE_FETCH_MESSAGE: &str = "Failed to fetch package";

/// Message surfaced whenever the credential provider cannot deliver.
pub const CREDENTIAL_MESSAGE: &str =
    "Failed to fetch credentials. See the NuGallery log for more details";

/// Result alias for NuGallery-Core operations.
pub type Result<T> = std::result::Result<T, GalleryError>;

/// Enumerates high-level error domains surfaced by NuGallery-Core.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Transport: {0}")]
    Transport(String),
    #[error("{0}")]
    Credential(String),
    #[error("Failed to parse {}: {reason}", .path.display())]
    ProjectParse { path: PathBuf, reason: String },
    #[error("Feed: {0}")]
    Feed(String),
    #[error("Failed to fetch package")]
    PackageFetch { id: String },
    #[error("Source `{url}` uses the V3 JSON protocol, which is not supported")]
    UnsupportedSource { url: String },
    #[error("Required command `{command}` not found in PATH")]
    CommandMissing { command: String },
    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailure {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl GalleryError {
    /// Build the fatal parse error for a project or props file.
    pub fn project_parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GalleryError::ProjectParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Credential error carrying only the user-facing message.
    pub fn credential() -> Self {
        GalleryError::Credential(CREDENTIAL_MESSAGE.to_string())
    }

    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            GalleryError::CommandMissing { .. } => ExitCode::from(10),
            GalleryError::CommandFailure { .. } => ExitCode::from(11),
            GalleryError::Config(_) => ExitCode::from(20),
            GalleryError::UnsupportedSource { .. } => ExitCode::from(21),
            GalleryError::Transport(_) => ExitCode::from(30),
            GalleryError::Serialization(_) => ExitCode::from(31),
            GalleryError::Feed(_) => ExitCode::from(32),
            GalleryError::PackageFetch { .. } => ExitCode::from(33),
            GalleryError::Credential(_) => ExitCode::from(34),
            GalleryError::Filesystem(_) => ExitCode::from(40),
            GalleryError::Io(_) => ExitCode::from(41),
            GalleryError::ProjectParse { .. } => ExitCode::from(42),
            GalleryError::Runtime(_) => ExitCode::from(50),
        }
    }
}

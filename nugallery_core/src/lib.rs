/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Library root for NuGallery-Core: V2 package feed client,
    credential acquisition, and workspace project aggregation.

  Security / Safety Notes:
    Credentials are held in memory only, per feed client.

  Dependencies:
    See individual modules.

  Operational Scope:
    Linked by the `nugallery` binary and by host integrations
    that supply their own discovery and task capabilities.

  Revision History:
    2026-10-18 COD  Split library from binary entry point.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Capabilities injected, never reached for globally
    - Result-first error handling across the public surface
============================================================*/

pub mod aggregate;
pub mod config;
pub mod credentials;
pub mod decoder;
pub mod error;
pub mod feed;
pub mod host;
pub mod logger;
pub mod model;
pub mod project;
pub mod registry;

pub use aggregate::ProjectAggregator;
pub use config::GalleryConfig;
pub use credentials::{CredentialProvider, CredentialSource, ProviderCommand};
pub use error::{GalleryError, Result};
pub use feed::{PackageFeed, V2Feed};
pub use host::{FileDiscovery, ProcessTaskRunner, TaskRunner, WorkspaceDiscovery};
pub use logger::Logger;
pub use model::{Credentials, Dependency, Package, PackageDetails, Project, ProjectPackage, VersionRef};
pub use registry::{PackageResponse, SourceRegistry};

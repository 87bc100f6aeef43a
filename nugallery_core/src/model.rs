/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::model
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Shared structures describing feed packages, dependency
    groups, credentials, and aggregated project references.

  Security / Safety Notes:
    Pure data containers; no I/O performed in this module.
    Credentials never implement Serialize.

  Dependencies:
    serde for JSON output of packages and projects.

  Operational Scope:
    Produced by the feed decoder and project aggregator and
    emitted by the binary as JSON.

  Revision History:
    2026-10-18 COD  Introduced shared feed and project types.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Serializable structures for downstream consumers
============================================================*/

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// Package record decoded from a feed entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Package {
    /// Feed-relative URL when the entry exposes links, raw entry id otherwise.
    pub id: String,
    pub name: String,
    pub authors: Vec<String>,
    pub description: String,
    pub icon_url: String,
    pub license_url: String,
    pub project_url: String,
    pub total_downloads: u64,
    pub verified: bool,
    pub version: String,
    /// Empty until a versions lookup populates it.
    pub versions: Vec<VersionRef>,
    pub tags: Vec<String>,
}

/// One known version of a package and the identifier it resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionRef {
    pub version: String,
    pub id: String,
}

/// Single dependency edge inside a framework group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub package: String,
    pub version_range: String,
}

/// Dependencies grouped by target-framework moniker.
///
/// A framework key only exists while it holds at least one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageDetails {
    pub frameworks: BTreeMap<String, Vec<Dependency>>,
}

impl PackageDetails {
    /// Attach a dependency to its framework group, creating the group on demand.
    pub fn push(&mut self, framework: String, dependency: Dependency) {
        self.frameworks.entry(framework).or_default().push(dependency);
    }

    /// Drop framework groups left without dependencies.
    pub fn prune(&mut self) {
        self.frameworks.retain(|_, deps| !deps.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty()
    }
}

/// Username/password pair returned by the credential provider.
#[derive(Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Credentials {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A project file and the package references it resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Project {
    pub path: PathBuf,
    /// Base name of the file, extension included.
    pub name: String,
    pub packages: Vec<ProjectPackage>,
}

/// Package reference with its effective version; empty means unresolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectPackage {
    pub id: String,
    pub version: String,
}

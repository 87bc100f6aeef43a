/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::project
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Parse MSBuild project files and centrally managed props
    files into package references and version declarations.

  Security / Safety Notes:
    Reads operator-owned files only; nothing is evaluated or
    imported beyond the literal XML content.

  Dependencies:
    roxmltree for XML trees, tokio::fs for async reads.

  Operational Scope:
    Called by the project aggregator for each discovered
    props and project file.

  Revision History:
    2026-10-18 COD  Authored project and props parsers.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Fatal, file-scoped errors for malformed documents
    - Fill-if-missing version merge, never an override
    - Document order preserved for every reference
============================================================*/

use std::collections::HashMap;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::decoder::{child_named, is_named, text_of};
use crate::error::{GalleryError, Result};
use crate::model::{Project, ProjectPackage};

const ITEM_GROUP: &str = "ItemGroup";
const PACKAGE_REFERENCE: &str = "PackageReference";
const PACKAGE_VERSION: &str = "PackageVersion";

/// Package id with the version written in the file, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredPackage {
    pub id: String,
    pub version: Option<String>,
}

/// One package element of a props file, tagged by element kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropsEntry {
    /// `PackageReference`: a package added to every project.
    Reference(DeclaredPackage),
    /// `PackageVersion`: a centrally managed version.
    Version(DeclaredPackage),
}

impl PropsEntry {
    /// Numeric element kind: 1 for references, 2 for version declarations.
    pub fn kind(&self) -> u8 {
        match self {
            PropsEntry::Reference(_) => 1,
            PropsEntry::Version(_) => 2,
        }
    }

    pub fn package(&self) -> &DeclaredPackage {
        match self {
            PropsEntry::Reference(package) | PropsEntry::Version(package) => package,
        }
    }
}

/// Centrally declared versions keyed by package id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionTable {
    versions: HashMap<String, String>,
}

impl VersionTable {
    /// Collect every version declaration; later declarations for an id win.
    pub fn from_props<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a PropsEntry>,
    {
        let mut table = Self::default();
        for entry in entries {
            if let PropsEntry::Version(package) = entry {
                table.insert(
                    package.id.clone(),
                    package.version.clone().unwrap_or_default(),
                );
            }
        }
        table
    }

    pub fn insert(&mut self, id: String, version: String) {
        self.versions.insert(id, version);
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.versions.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Keep a non-empty declared version, otherwise take the table's entry
    /// (or the empty string when the id is unknown).
    pub fn resolve(&self, package: DeclaredPackage) -> ProjectPackage {
        let version = match package.version {
            Some(version) if !version.is_empty() => version,
            _ => self.get(&package.id).unwrap_or_default().to_string(),
        };
        ProjectPackage {
            id: package.id,
            version,
        }
    }
}

/// Read and parse a project file, filling versions from `versions`.
pub async fn parse_project(path: &Path, versions: &VersionTable) -> Result<Project> {
    let content = read_document(path).await?;
    parse_project_str(path, &content, versions)
}

/// Parse project file content already in memory.
pub fn parse_project_str(path: &Path, content: &str, versions: &VersionTable) -> Result<Project> {
    let document = parse_xml(path, content)?;
    let packages = package_elements(&document, &[PACKAGE_REFERENCE])
        .map(|node| declared_package(path, node).map(|package| versions.resolve(package)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Project {
        path: path.to_path_buf(),
        name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        packages,
    })
}

/// Read and parse a props file into reference and version entries.
pub async fn parse_props(path: &Path) -> Result<Vec<PropsEntry>> {
    let content = read_document(path).await?;
    parse_props_str(path, &content)
}

/// Parse props file content already in memory.
pub fn parse_props_str(path: &Path, content: &str) -> Result<Vec<PropsEntry>> {
    let document = parse_xml(path, content)?;
    package_elements(&document, &[PACKAGE_REFERENCE, PACKAGE_VERSION])
        .map(|node| -> Result<PropsEntry> {
            let package = declared_package(path, node)?;
            Ok(if is_named(node, PACKAGE_REFERENCE) {
                PropsEntry::Reference(package)
            } else {
                PropsEntry::Version(package)
            })
        })
        .collect()
}

async fn read_document(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|err| {
        GalleryError::Filesystem(format!("Failed to read {}: {err}", path.display()))
    })
}

fn parse_xml<'input>(path: &Path, content: &'input str) -> Result<Document<'input>> {
    Document::parse(content).map_err(|err| GalleryError::project_parse(path, err.to_string()))
}

/// Elements of the given kinds that sit directly under an `ItemGroup`, in
/// document order.
fn package_elements<'a, 'input>(
    document: &'a Document<'input>,
    kinds: &'a [&'a str],
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    document
        .descendants()
        .filter(|node| is_named(*node, ITEM_GROUP))
        .flat_map(|group| group.children())
        .filter(move |node| kinds.iter().any(|kind| is_named(*node, kind)))
}

fn declared_package(path: &Path, node: Node<'_, '_>) -> Result<DeclaredPackage> {
    let id = node.attribute("Include").ok_or_else(|| {
        GalleryError::project_parse(
            path,
            format!(
                "{} on line {} has no Include attribute",
                node.tag_name().name(),
                node.document().text_pos_at(node.range().start).row
            ),
        )
    })?;

    // The attribute wins even when empty; the child element only counts
    // when it has text.
    let version = match node.attribute("Version") {
        Some(version) => Some(version.to_string()),
        None => child_named(node, "Version")
            .map(|child| text_of(child).trim().to_string())
            .filter(|version| !version.is_empty()),
    };

    Ok(DeclaredPackage {
        id: id.to_string(),
        version,
    })
}

/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::decoder
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Decode Atom/OData feed documents returned by V2 package
    sources into package, version, and dependency records.

  Security / Safety Notes:
    Pure transformation over untrusted text; DTDs are refused
    by the XML parser and no I/O is performed.

  Dependencies:
    roxmltree for read-only XML trees.

  Operational Scope:
    Used by the V2 feed client for search, by-id, and package
    details responses.

  Revision History:
    2026-10-18 COD  Authored schema-driven feed decoder.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Defaults declared once per field, not per call site
    - Best-effort decoding for enrichment payloads
    - Deterministic ordering mirroring the document
============================================================*/

use roxmltree::{Document, Node};

use crate::error::{GalleryError, Result};
use crate::model::{Dependency, Package, PackageDetails};

/// Decode a feed document into packages, one per `entry`, in document order.
///
/// Fails only when the payload is not XML at all; missing fields fall back
/// to their defaults.
pub fn decode_feed(xml: &str, source_url: &str) -> Result<Vec<Package>> {
    let document = Document::parse(xml)
        .map_err(|err| GalleryError::Feed(format!("Malformed feed document: {err}")))?;
    let root = document.root_element();
    if !is_named(root, "feed") {
        return Ok(Vec::new());
    }

    Ok(children_named(root, "entry")
        .map(|entry| FeedEntry::read(entry).into_package(source_url))
        .collect())
}

/// Decode the dependency groups of a single-entry payload.
///
/// Never fails: malformed XML or an absent `Dependencies` property yields an
/// empty record.
pub fn decode_details(xml: &str) -> PackageDetails {
    let Ok(document) = Document::parse(xml) else {
        return PackageDetails::default();
    };
    let root = document.root_element();
    let entry = if is_named(root, "entry") {
        Some(root)
    } else if is_named(root, "feed") {
        children_named(root, "entry").next()
    } else {
        None
    };

    entry
        .and_then(|entry| child_named(entry, "properties"))
        .and_then(|properties| child_named(properties, "Dependencies"))
        .map(|node| decode_dependencies(&text_of(node)))
        .unwrap_or_default()
}

/// Decode a `id:range:framework|...` dependency string.
///
/// Missing segments become empty strings; empty framework groups are pruned.
pub fn decode_dependencies(raw: &str) -> PackageDetails {
    let mut details = PackageDetails::default();
    for triple in raw.split('|').filter(|triple| !triple.is_empty()) {
        let mut segments = triple.split(':');
        let package = segments.next().unwrap_or_default().to_string();
        let version_range = segments.next().unwrap_or_default().to_string();
        let framework = segments.next().unwrap_or_default().to_string();
        details.push(
            framework,
            Dependency {
                package,
                version_range,
            },
        );
    }
    details.prune();
    details
}

/// Fields read from one `entry`, before defaults are applied.
#[derive(Debug, Default)]
struct FeedEntry {
    id: Option<String>,
    title: Option<String>,
    authors: Vec<String>,
    first_link: Option<String>,
    verified: Option<bool>,
    description: Option<String>,
    icon_url: Option<String>,
    license_url: Option<String>,
    project_url: Option<String>,
    download_count: Option<u64>,
    version: Option<String>,
    tags: Option<String>,
}

impl FeedEntry {
    fn read(entry: Node<'_, '_>) -> Self {
        let mut fields = FeedEntry {
            id: child_text(entry, "id"),
            title: child_text(entry, "title"),
            authors: children_named(entry, "author")
                .filter_map(|author| child_text(author, "name"))
                .filter(|name| !name.is_empty())
                .collect(),
            first_link: children_named(entry, "link")
                .find_map(|link| link.attribute("href"))
                .map(str::to_string),
            verified: child_text(entry, "verified")
                .map(|value| value.trim().eq_ignore_ascii_case("true")),
            ..FeedEntry::default()
        };

        if let Some(properties) = child_named(entry, "properties") {
            fields.description = child_text(properties, "Description");
            fields.icon_url = child_text(properties, "IconUrl");
            fields.license_url = child_text(properties, "LicenseUrl");
            fields.project_url = child_text(properties, "ProjectUrl");
            fields.download_count = child_text(properties, "DownloadCount")
                .and_then(|count| count.trim().parse::<u64>().ok());
            fields.version = child_text(properties, "Version");
            fields.tags = child_text(properties, "Tags");
        }
        fields
    }

    fn into_package(self, source_url: &str) -> Package {
        let id = match self.first_link {
            Some(href) => format!("{source_url}/{href}"),
            None => self.id.unwrap_or_default(),
        };

        Package {
            id,
            name: self.title.unwrap_or_default(),
            authors: self.authors,
            description: self.description.unwrap_or_default(),
            icon_url: self.icon_url.unwrap_or_default(),
            license_url: self.license_url.unwrap_or_default(),
            project_url: self.project_url.unwrap_or_default(),
            total_downloads: self.download_count.unwrap_or(0),
            verified: self.verified.unwrap_or(false),
            version: self.version.unwrap_or_default(),
            versions: Vec::new(),
            tags: self
                .tags
                .map(|tags| tags.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

// Element names are compared by local name so `m:`/`d:` prefixes and default
// Atom namespaces resolve the same way.
pub(crate) fn is_named(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn children_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |child| is_named(*child, name))
}

pub(crate) fn child_named<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| is_named(*child, name))
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child_named(node, name).map(text_of)
}

pub(crate) fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|descendant| descendant.is_text())
        .filter_map(|descendant| descendant.text())
        .collect()
}

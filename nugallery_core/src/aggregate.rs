/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::aggregate
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Build the project model for a workspace by merging
    centrally managed versions and package references into
    every discovered project.

  Security / Safety Notes:
    Read-only over workspace files; unparsable files are
    logged and skipped, never rewritten.

  Dependencies:
    host::FileDiscovery for props discovery, project parsers.

  Operational Scope:
    Backs the projects listing of the binary and any host
    integration that renders installed packages.

  Revision History:
    2026-10-18 COD  Authored project aggregation.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Props fully read before any project is parsed
    - Partial-failure tolerance at file granularity
    - Deterministic, case-insensitive project ordering
============================================================*/

use std::path::PathBuf;

use crate::host::FileDiscovery;
use crate::logger::Logger;
use crate::model::{Project, ProjectPackage};
use crate::project::{parse_project, parse_props, PropsEntry, VersionTable};

/// Pattern naming the centrally managed props files.
pub const CENTRAL_PROPS_PATTERN: &str = "**/Directory.*.props";

/// Aggregates projects against the props files its discovery finds.
pub struct ProjectAggregator<'a> {
    discovery: &'a dyn FileDiscovery,
    logger: &'a Logger,
    props_pattern: String,
}

impl<'a> ProjectAggregator<'a> {
    pub fn new(discovery: &'a dyn FileDiscovery, logger: &'a Logger) -> Self {
        Self {
            discovery,
            logger,
            props_pattern: CENTRAL_PROPS_PATTERN.to_string(),
        }
    }

    pub fn with_props_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.props_pattern = pattern.into();
        self
    }

    /// Parse `project_paths` into projects sorted by lower-cased name.
    ///
    /// Files that fail to parse are logged and left out.
    pub async fn aggregate(&self, project_paths: &[PathBuf]) -> Vec<Project> {
        let props = self.collect_props().await;
        let versions = VersionTable::from_props(&props);
        let central: Vec<ProjectPackage> = props
            .into_iter()
            .filter_map(|entry| match entry {
                PropsEntry::Reference(package) => Some(versions.resolve(package)),
                PropsEntry::Version(_) => None,
            })
            .collect();
        self.logger.info(
            "PROPS",
            format!(
                "Central versions={} central references={}",
                versions.len(),
                central.len()
            ),
        );

        let mut projects = Vec::with_capacity(project_paths.len());
        for path in project_paths {
            match parse_project(path, &versions).await {
                Ok(mut project) => {
                    project.packages.extend(central.iter().cloned());
                    projects.push(project);
                }
                Err(err) => self.logger.error("PROJECT", format!("Skipping project: {err}")),
            }
        }

        projects.sort_by_cached_key(|project| project.name.to_lowercase());
        projects
    }

    async fn collect_props(&self) -> Vec<PropsEntry> {
        let files = match self.discovery.find(&self.props_pattern).await {
            Ok(files) => files,
            Err(err) => {
                self.logger
                    .error("PROPS", format!("Props discovery failed: {err}"));
                Vec::new()
            }
        };

        let mut entries = Vec::new();
        for file in files {
            match parse_props(&file).await {
                Ok(parsed) => {
                    self.logger.debug(
                        "PROPS",
                        format!("{} declares {} entries", file.display(), parsed.len()),
                    );
                    entries.extend(parsed);
                }
                Err(err) => self.logger.error("PROPS", format!("Skipping props file: {err}")),
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{GalleryError, Result};

    /// Returns a fixed list of files for any pattern.
    struct FixedDiscovery(Vec<PathBuf>);

    #[async_trait]
    impl FileDiscovery for FixedDiscovery {
        async fn find(&self, _pattern: &str) -> Result<Vec<PathBuf>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDiscovery;

    #[async_trait]
    impl FileDiscovery for FailingDiscovery {
        async fn find(&self, pattern: &str) -> Result<Vec<PathBuf>> {
            Err(GalleryError::Config(format!("cannot search {pattern}")))
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn versions_of(project: &Project) -> Vec<(&str, &str)> {
        project
            .packages
            .iter()
            .map(|p| (p.id.as_str(), p.version.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn central_versions_fill_missing_and_never_override() {
        let dir = tempfile::tempdir().unwrap();
        let props = write(
            dir.path(),
            "Directory.Packages.props",
            r#"<Project><ItemGroup>
                <PackageVersion Include="Foo" Version="1.2.3" />
                <PackageVersion Include="Analyzers" Version="0.5.0" />
                <PackageReference Include="Analyzers" />
            </ItemGroup></Project>"#,
        );
        let implicit = write(
            dir.path(),
            "Implicit.csproj",
            r#"<Project><ItemGroup><PackageReference Include="Foo" /></ItemGroup></Project>"#,
        );
        let explicit = write(
            dir.path(),
            "Explicit.csproj",
            r#"<Project><ItemGroup><PackageReference Include="Foo" Version="9.9.9" /></ItemGroup></Project>"#,
        );

        let discovery = FixedDiscovery(vec![props]);
        let logger = Logger::quiet();
        let projects = ProjectAggregator::new(&discovery, &logger)
            .aggregate(&[implicit, explicit])
            .await;

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name, "Explicit.csproj");
        assert_eq!(
            versions_of(&projects[0]),
            vec![("Foo", "9.9.9"), ("Analyzers", "0.5.0")]
        );
        assert_eq!(projects[1].name, "Implicit.csproj");
        assert_eq!(
            versions_of(&projects[1]),
            vec![("Foo", "1.2.3"), ("Analyzers", "0.5.0")]
        );
    }

    #[tokio::test]
    async fn later_props_files_win() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(
            dir.path(),
            "Directory.Packages.props",
            r#"<Project><ItemGroup><PackageVersion Include="Bar" Version="1.0.0" /></ItemGroup></Project>"#,
        );
        let second = write(
            dir.path(),
            "Directory.Build.props",
            r#"<Project><ItemGroup><PackageVersion Include="Bar" Version="2.0.0" /></ItemGroup></Project>"#,
        );
        let project = write(
            dir.path(),
            "App.csproj",
            r#"<Project><ItemGroup><PackageReference Include="Bar" /></ItemGroup></Project>"#,
        );

        let discovery = FixedDiscovery(vec![first, second]);
        let logger = Logger::quiet();
        let projects = ProjectAggregator::new(&discovery, &logger)
            .aggregate(&[project])
            .await;
        assert_eq!(versions_of(&projects[0]), vec![("Bar", "2.0.0")]);
    }

    #[tokio::test]
    async fn broken_files_are_skipped_and_order_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let broken_props = write(dir.path(), "Directory.Broken.props", "<Project><ItemGroup>");
        let good_props = write(
            dir.path(),
            "Directory.Packages.props",
            r#"<Project><ItemGroup><PackageVersion Include="Foo" Version="1.0.0" /></ItemGroup></Project>"#,
        );
        let zeta = write(
            dir.path(),
            "Zeta.csproj",
            r#"<Project><ItemGroup><PackageReference Include="Foo" /></ItemGroup></Project>"#,
        );
        let broken = write(
            dir.path(),
            "Broken.csproj",
            r#"<Project><ItemGroup><PackageReference Version="1.0.0" /></ItemGroup></Project>"#,
        );
        let alpha = write(
            dir.path(),
            "alpha.csproj",
            r#"<Project><ItemGroup><PackageReference Include="Foo" /></ItemGroup></Project>"#,
        );
        let missing = dir.path().join("Missing.csproj");

        let discovery = FixedDiscovery(vec![broken_props, good_props]);
        let logger = Logger::quiet();
        let projects = ProjectAggregator::new(&discovery, &logger)
            .aggregate(&[zeta, broken, missing, alpha])
            .await;

        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha.csproj", "Zeta.csproj"]);
        assert_eq!(versions_of(&projects[0]), vec![("Foo", "1.0.0")]);
    }

    #[tokio::test]
    async fn equal_names_keep_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        let body = r#"<Project><ItemGroup /></Project>"#;
        let second = write(&dir.path().join("b"), "App.csproj", body);
        let first = write(&dir.path().join("a"), "app.csproj", body);

        let discovery = FixedDiscovery(Vec::new());
        let logger = Logger::quiet();
        let projects = ProjectAggregator::new(&discovery, &logger)
            .aggregate(&[second.clone(), first.clone()])
            .await;
        let paths: Vec<&PathBuf> = projects.iter().map(|p| &p.path).collect();
        assert_eq!(paths, vec![&second, &first]);
    }

    #[tokio::test]
    async fn discovery_failure_still_parses_projects() {
        let dir = tempfile::tempdir().unwrap();
        let project = write(
            dir.path(),
            "App.csproj",
            r#"<Project><ItemGroup><PackageReference Include="Foo" /></ItemGroup></Project>"#,
        );
        let logger = Logger::quiet();
        let projects = ProjectAggregator::new(&FailingDiscovery, &logger)
            .aggregate(&[project])
            .await;
        assert_eq!(versions_of(&projects[0]), vec![("Foo", "")]);
    }
}

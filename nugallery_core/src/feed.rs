/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::feed
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Query NuGet V2 (OData/XML) package sources for search
    results, version listings, and dependency details.

  Security / Safety Notes:
    Performs HTTPS GET requests only. A Basic token is attached
    once credentials have been acquired after a 401 and lives
    in memory for the lifetime of the client.

  Dependencies:
    reqwest for HTTP, base64 for the Basic token, urlencoding
    for query terms, tokio for task fan-out and token locking.

  Operational Scope:
    One client per source URL, handed out by the source
    registry to search and package handlers.

  Revision History:
    2026-10-18 COD  Implemented V2 feed client with auth retry.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Single retry after credential refresh, never a loop
    - Best-effort enrichment that cannot fail a search
    - Proxy fixed at construction for predictable routing
============================================================*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::AUTHORIZATION;
use reqwest::{Response, StatusCode};
use tokio::sync::Mutex;
use urlencoding::encode;

use crate::config::FeedConfig;
use crate::credentials::CredentialSource;
use crate::decoder::{decode_details, decode_feed};
use crate::error::{GalleryError, Result};
use crate::logger::Logger;
use crate::model::{Credentials, Package, PackageDetails, VersionRef};

/// Environment variables consulted for a proxy, in precedence order.
pub const PROXY_ENV_VARS: [&str; 4] = ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"];

const SEM_VER_LEVEL: &str = "semVerLevel=2.0.0";

/// Package source capability; one implementation per protocol generation.
#[async_trait]
pub trait PackageFeed: Send + Sync {
    fn source_url(&self) -> &str;

    /// Search the source and attach every result's known versions.
    async fn search(
        &self,
        filter: &str,
        include_prerelease: bool,
        skip: u32,
        take: u32,
    ) -> Result<Vec<Package>>;

    /// Every non-empty version published for `id`.
    async fn get_versions(&self, id: &str) -> Result<Vec<String>>;

    /// First entry for `id` with all versions attached, newest first.
    async fn get_package(&self, id: &str) -> Result<Package>;

    /// Dependency groups for a package version URL; empty on any failure.
    async fn get_package_details(&self, url: &str) -> PackageDetails;
}

/// Client for NuGet V2 OData feeds.
#[derive(Clone)]
pub struct V2Feed {
    client: reqwest::Client,
    source_url: String,
    token: Arc<Mutex<Option<String>>>,
    credentials: Arc<dyn CredentialSource>,
    logger: Arc<Logger>,
}

impl V2Feed {
    /// Construct a client bound to `source_url`.
    ///
    /// The proxy is resolved once here from the configured value and the
    /// process environment.
    pub fn new(
        source_url: &str,
        config: &FeedConfig,
        credentials: Arc<dyn CredentialSource>,
        logger: Arc<Logger>,
    ) -> Result<Self> {
        let proxy = resolve_proxy(config.proxy.as_deref(), |key| std::env::var(key).ok());
        Self::with_proxy(source_url, config, proxy.as_deref(), credentials, logger)
    }

    /// Construct a client routed through an already resolved proxy, or none.
    pub fn with_proxy(
        source_url: &str,
        config: &FeedConfig,
        proxy: Option<&str>,
        credentials: Arc<dyn CredentialSource>,
        logger: Arc<Logger>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.as_str());

        builder = match proxy {
            Some(proxy) => {
                logger.info("PROXY", format!("Found proxy: {proxy}"));
                let proxy = reqwest::Proxy::all(proxy).map_err(|err| {
                    GalleryError::Config(format!("Invalid proxy URL `{proxy}`: {err}"))
                })?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|err| GalleryError::Transport(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            source_url: source_url.trim_end_matches('/').to_string(),
            token: Arc::new(Mutex::new(None)),
            credentials,
            logger,
        })
    }

    fn search_url(&self, filter: &str, include_prerelease: bool, skip: u32, take: u32) -> String {
        format!(
            "{}/Search()?$filter=IsAbsoluteLatestVersion&searchTerm='{}'&includePrerelease={}&$skip={}&$top={}&{SEM_VER_LEVEL}",
            self.source_url,
            encode(filter),
            include_prerelease,
            skip,
            take
        )
    }

    fn find_by_id_url(&self, id: &str) -> String {
        format!(
            "{}/FindPackagesById()?id='{}'&{SEM_VER_LEVEL}",
            self.source_url,
            encode(id)
        )
    }

    async fn find_by_id(&self, id: &str) -> Result<Vec<Package>> {
        let body = self.execute_get(&self.find_by_id_url(id)).await?;
        decode_feed(&body, &self.source_url)
    }

    async fn lookup_package(&self, id: &str) -> Result<Package> {
        let entries = self.find_by_id(id).await.map_err(|err| {
            self.logger
                .warn("PKGFETCH", format!("Lookup of {id} on {} failed: {err}", self.source_url));
            GalleryError::PackageFetch { id: id.to_string() }
        })?;

        let versions: Vec<VersionRef> = entries
            .iter()
            .rev()
            .map(|entry| VersionRef {
                version: entry.version.clone(),
                id: entry.id.clone(),
            })
            .collect();
        let mut package = entries
            .into_iter()
            .next()
            .ok_or_else(|| GalleryError::PackageFetch { id: id.to_string() })?;
        package.versions = versions;
        Ok(package)
    }

    /// GET `url`, refreshing credentials and retrying once on 401.
    async fn execute_get(&self, url: &str) -> Result<String> {
        let sent = self.token.lock().await.clone();
        let mut response = self.send(url, sent.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.logger
                .info("AUTH", format!("{url} requires authentication; refreshing credentials"));
            let token = self.refresh_token(sent).await?;
            response = self.send(url, Some(&token)).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(GalleryError::Transport(format!(
                "Request to {url} failed with status {status}"
            )));
        }

        response
            .text()
            .await
            .map_err(|err| GalleryError::Transport(format!("Failed to read body of {url}: {err}")))
    }

    async fn send(&self, url: &str, token: Option<&str>) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Basic {token}"));
        }
        request
            .send()
            .await
            .map_err(|err| GalleryError::Transport(format!("Request to {url} failed: {err}")))
    }

    /// Replace the token that was rejected, unless a concurrent refresh
    /// already has.
    async fn refresh_token(&self, rejected: Option<String>) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(current) = guard.as_ref() {
            if rejected.as_ref() != Some(current) {
                return Ok(current.clone());
            }
        }

        let credentials = self.credentials.acquire(&self.source_url).await?;
        let token = basic_token(&credentials);
        *guard = Some(token.clone());
        Ok(token)
    }
}

#[async_trait]
impl PackageFeed for V2Feed {
    fn source_url(&self) -> &str {
        &self.source_url
    }

    async fn search(
        &self,
        filter: &str,
        include_prerelease: bool,
        skip: u32,
        take: u32,
    ) -> Result<Vec<Package>> {
        let url = self.search_url(filter, include_prerelease, skip, take);
        let body = self.execute_get(&url).await?;
        let mut packages = decode_feed(&body, &self.source_url)?;
        self.logger.debug(
            "SEARCH",
            format!("`{filter}` matched {} packages on {}", packages.len(), self.source_url),
        );

        // Decoded ids may be feed URLs, so lookups go by the package name.
        let tasks: Vec<_> = packages
            .iter()
            .map(|package| {
                let client = self.clone();
                let name = package.name.clone();
                tokio::spawn(async move { client.lookup_package(&name).await })
            })
            .collect();

        for (package, task) in packages.iter_mut().zip(tasks) {
            match task.await {
                Ok(Ok(found)) => package.versions = found.versions,
                Ok(Err(_)) => {}
                Err(err) => self.logger.warn(
                    "VERSIONS",
                    format!("Version lookup task for {} failed: {err}", package.name),
                ),
            }
        }

        Ok(packages)
    }

    async fn get_versions(&self, id: &str) -> Result<Vec<String>> {
        let entries = self.find_by_id(id).await?;
        Ok(entries
            .into_iter()
            .map(|entry| entry.version)
            .filter(|version| !version.is_empty())
            .collect())
    }

    async fn get_package(&self, id: &str) -> Result<Package> {
        self.lookup_package(id).await
    }

    async fn get_package_details(&self, url: &str) -> PackageDetails {
        match self.execute_get(url).await {
            Ok(body) => decode_details(&body),
            Err(err) => {
                self.logger
                    .debug("DETAILS", format!("Details for {url} unavailable: {err}"));
                PackageDetails::default()
            }
        }
    }
}

/// Base64 of `username:password`, the payload of a Basic authorization header.
pub fn basic_token(credentials: &Credentials) -> String {
    STANDARD.encode(format!("{}:{}", credentials.username, credentials.password))
}

/// Pick the proxy URL: configured value first, then the environment.
pub fn resolve_proxy<F>(configured: Option<&str>, env: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    configured
        .filter(|proxy| !proxy.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            PROXY_ENV_VARS
                .iter()
                .find_map(|key| env(key).filter(|value| !value.trim().is_empty()))
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct StaticCredentials {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl StaticCredentials {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialSource for StaticCredentials {
        async fn acquire(&self, _source_url: &str) -> Result<Credentials> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(GalleryError::credential());
            }
            Ok(Credentials {
                username: "u".into(),
                password: "p".into(),
            })
        }
    }

    // base64("u:p")
    const BASIC_UP: &str = "Basic dTpw";

    fn feed_client(server: &MockServer, credentials: Arc<StaticCredentials>) -> V2Feed {
        V2Feed::with_proxy(
            &format!("{}/api/v2/", server.uri()),
            &FeedConfig::default(),
            None,
            credentials,
            Arc::new(Logger::quiet()),
        )
        .unwrap()
    }

    fn entry(name: &str, version: Option<&str>) -> String {
        let version = version
            .map(|v| format!("<d:Version>{v}</d:Version>"))
            .unwrap_or_default();
        format!(
            r#"<entry><id>urn:{name}</id><title type="text">{name}</title>
  <link rel="edit" href="Packages(Id='{name}')" />
  <m:properties>{version}</m:properties></entry>"#
        )
    }

    fn feed(entries: &[String]) -> String {
        format!(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:d="urn:d" xmlns:m="urn:m">{}</feed>"#,
            entries.concat()
        )
    }

    fn ok(body: String) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(body)
    }

    async fn mount_by_id(server: &MockServer, id: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/api/v2/FindPackagesById()"))
            .and(query_param("id", format!("'{id}'")))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn package_versions_are_reversed() {
        let server = MockServer::start().await;
        let body = feed(&[
            entry("Foo", Some("1.0.0")),
            entry("Foo", Some("1.1.0")),
            entry("Foo", Some("2.0.0")),
        ]);
        mount_by_id(&server, "Foo", ok(body)).await;

        let client = feed_client(&server, StaticCredentials::new());
        let package = client.get_package("Foo").await.unwrap();
        assert_eq!(package.version, "1.0.0");
        let versions: Vec<&str> = package.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, vec!["2.0.0", "1.1.0", "1.0.0"]);
        assert_eq!(
            package.versions[0].id,
            format!("{}/api/v2/Packages(Id='Foo')", server.uri())
        );
    }

    #[tokio::test]
    async fn package_fetch_failure_is_a_typed_result() {
        let server = MockServer::start().await;
        mount_by_id(&server, "Gone", ResponseTemplate::new(500)).await;
        mount_by_id(&server, "Empty", ok(feed(&[]))).await;

        let client = feed_client(&server, StaticCredentials::new());
        let err = client.get_package("Gone").await.unwrap_err();
        assert!(matches!(err, GalleryError::PackageFetch { ref id } if id == "Gone"));
        assert!(matches!(
            client.get_package("Empty").await,
            Err(GalleryError::PackageFetch { .. })
        ));
    }

    #[tokio::test]
    async fn versions_skip_entries_without_version() {
        let server = MockServer::start().await;
        let body = feed(&[
            entry("Foo", Some("1.0.0")),
            entry("Foo", None),
            entry("Foo", Some("1.2.0")),
        ]);
        mount_by_id(&server, "Foo", ok(body)).await;

        let client = feed_client(&server, StaticCredentials::new());
        assert_eq!(client.get_versions("Foo").await.unwrap(), vec!["1.0.0", "1.2.0"]);
    }

    #[tokio::test]
    async fn search_enrichment_failure_leaves_versions_empty() {
        let server = MockServer::start().await;
        let results = feed(&[
            entry("Alpha", Some("1.0.0")),
            entry("Broken", Some("0.1.0")),
            entry("Gamma", Some("3.0.0")),
        ]);
        Mock::given(method("GET"))
            .and(path("/api/v2/Search()"))
            .and(query_param("searchTerm", "'json tools'"))
            .and(query_param("$skip", "0"))
            .and(query_param("$top", "20"))
            .and(query_param("includePrerelease", "false"))
            .and(query_param("semVerLevel", "2.0.0"))
            .respond_with(ok(results))
            .mount(&server)
            .await;
        mount_by_id(
            &server,
            "Alpha",
            ok(feed(&[entry("Alpha", Some("0.9.0")), entry("Alpha", Some("1.0.0"))])),
        )
        .await;
        mount_by_id(&server, "Broken", ResponseTemplate::new(503)).await;
        mount_by_id(&server, "Gamma", ok(feed(&[entry("Gamma", Some("3.0.0"))]))).await;

        let client = feed_client(&server, StaticCredentials::new());
        let packages = client.search("json tools", false, 0, 20).await.unwrap();

        let names: Vec<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Broken", "Gamma"]);
        assert_eq!(packages[0].versions.len(), 2);
        assert_eq!(packages[0].versions[0].version, "1.0.0");
        assert!(packages[1].versions.is_empty());
        assert_eq!(packages[2].versions.len(), 1);
    }

    #[tokio::test]
    async fn unauthorized_request_acquires_and_retries_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/FindPackagesById()"))
            .and(header("Authorization", BASIC_UP))
            .respond_with(ok(feed(&[entry("Private", Some("1.0.0"))])))
            .with_priority(1)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/FindPackagesById()"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = StaticCredentials::new();
        let client = feed_client(&server, credentials.clone());
        assert_eq!(client.get_versions("Private").await.unwrap(), vec!["1.0.0"]);
        // The cached token is sent up front on the next request.
        assert_eq!(client.get_versions("Private").await.unwrap(), vec!["1.0.0"]);
        assert_eq!(credentials.calls(), 1);
    }

    #[tokio::test]
    async fn second_unauthorized_is_returned_to_caller() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let credentials = StaticCredentials::new();
        let client = feed_client(&server, credentials.clone());
        let err = client.get_versions("Private").await.unwrap_err();
        assert!(matches!(err, GalleryError::Transport(_)));
        assert_eq!(credentials.calls(), 1);
    }

    #[tokio::test]
    async fn credential_failure_aborts_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let credentials = Arc::new(StaticCredentials {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: true,
        });
        let client = feed_client(&server, credentials);
        assert!(matches!(
            client.get_versions("Private").await,
            Err(GalleryError::Credential(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_unauthorized_requests_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", BASIC_UP))
            .respond_with(ok(feed(&[entry("Private", Some("1.0.0"))])))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let credentials = Arc::new(StaticCredentials {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(100),
            fail: false,
        });
        let client = feed_client(&server, credentials.clone());
        let (a, b, c) = tokio::join!(
            client.get_versions("Private"),
            client.get_versions("Private"),
            client.get_versions("Private"),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(credentials.calls(), 1);
    }

    #[tokio::test]
    async fn details_are_best_effort() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/Packages(Id='Foo',Version='1.0.0')"))
            .respond_with(ok(r#"<entry xmlns:m="urn:m" xmlns:d="urn:d"><m:properties>
                <d:Dependencies>Bar:[1.0, ):net8.0</d:Dependencies></m:properties></entry>"#
                .to_string()))
            .mount(&server)
            .await;

        let client = feed_client(&server, StaticCredentials::new());
        let found = client
            .get_package_details(&format!(
                "{}/api/v2/Packages(Id='Foo',Version='1.0.0')",
                server.uri()
            ))
            .await;
        assert_eq!(found.frameworks["net8.0"][0].package, "Bar");

        let missing = client
            .get_package_details(&format!("{}/api/v2/nothing-here", server.uri()))
            .await;
        assert!(missing.is_empty());
    }

    #[test]
    fn basic_token_encodes_user_and_password() {
        let credentials = Credentials {
            username: "u".into(),
            password: "p".into(),
        };
        assert_eq!(format!("Basic {}", basic_token(&credentials)), BASIC_UP);
    }

    #[test]
    fn proxy_precedence() {
        let env: HashMap<&str, &str> = [
            ("https_proxy", "http://lower-https:3128"),
            ("HTTP_PROXY", "http://upper-http:3128"),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        assert_eq!(
            resolve_proxy(Some("http://editor:8080"), lookup),
            Some("http://editor:8080".to_string())
        );
        assert_eq!(
            resolve_proxy(Some(""), lookup),
            Some("http://lower-https:3128".to_string())
        );
        assert_eq!(
            resolve_proxy(None, |key: &str| (key == "http_proxy")
                .then(|| "http://lowest:1".to_string())),
            Some("http://lowest:1".to_string())
        );
        assert_eq!(resolve_proxy(None, |_: &str| None), None);
    }
}

/*============================================================
  Synavera Project: NuGallery
  Module: nugallery_core::registry
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Hand out one feed client per package source URL and
    resolve single packages across fallback sources.

  Security / Safety Notes:
    Clients and their cached tokens live inside the registry
    owned by the caller; nothing is process-global.

  Dependencies:
    feed::V2Feed, credentials::CredentialSource.

  Operational Scope:
    Constructed once by the binary (or host integration) and
    shared by reference with every request handler.

  Revision History:
    2026-10-18 COD  Authored source registry.
  ------------------------------------------------------------
  SSE Principles Observed:
    - One client per source URL for the registry lifetime
    - Fixed failure message for package lookups
============================================================*/

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::config::FeedConfig;
use crate::credentials::CredentialSource;
use crate::error::{GalleryError, Result, PACKAGE_FETCH_MESSAGE};
use crate::feed::{PackageFeed, V2Feed};
use crate::logger::Logger;
use crate::model::Package;

/// Suffix identifying V3 service indexes.
const V3_INDEX_SUFFIX: &str = "index.json";

type FeedFactory = dyn Fn(&str) -> Result<Arc<dyn PackageFeed>> + Send + Sync;

/// Caller-owned map of source URL to feed client.
pub struct SourceRegistry {
    factory: Box<FeedFactory>,
    sources: Mutex<HashMap<String, Arc<dyn PackageFeed>>>,
    logger: Arc<Logger>,
}

/// Outcome of a package lookup across sources.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageResponse {
    pub is_failure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<Package>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseError {
    pub message: String,
}

impl PackageResponse {
    fn success(package: Package) -> Self {
        Self {
            is_failure: false,
            package: Some(package),
            error: None,
        }
    }

    fn failure() -> Self {
        Self {
            is_failure: true,
            package: None,
            error: Some(ResponseError {
                message: PACKAGE_FETCH_MESSAGE.to_string(),
            }),
        }
    }
}

impl SourceRegistry {
    /// Registry creating V2 clients that share `credentials` and `config`.
    pub fn new(
        config: FeedConfig,
        credentials: Arc<dyn CredentialSource>,
        logger: Arc<Logger>,
    ) -> Self {
        let client_logger = logger.clone();
        Self::with_factory(
            move |url| {
                let feed = V2Feed::new(url, &config, credentials.clone(), client_logger.clone())?;
                Ok(Arc::new(feed) as Arc<dyn PackageFeed>)
            },
            logger,
        )
    }

    /// Registry creating clients with a custom factory.
    pub fn with_factory<F>(factory: F, logger: Arc<Logger>) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn PackageFeed>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            sources: Mutex::new(HashMap::new()),
            logger,
        }
    }

    /// Client for `url`, created on first use and reused afterwards.
    pub fn source(&self, url: &str) -> Result<Arc<dyn PackageFeed>> {
        if url.ends_with(V3_INDEX_SUFFIX) {
            return Err(GalleryError::UnsupportedSource {
                url: url.to_string(),
            });
        }

        let mut sources = self
            .sources
            .lock()
            .map_err(|_| GalleryError::Runtime("Source registry lock poisoned".into()))?;
        if let Some(feed) = sources.get(url) {
            return Ok(feed.clone());
        }

        self.logger
            .debug("REGISTRY", format!("Creating feed client for {url}"));
        let feed = (self.factory)(url)?;
        sources.insert(url.to_string(), feed.clone());
        Ok(feed)
    }

    /// Look `id` up on each of `other_urls` in order, then on `url`.
    ///
    /// The first success wins; failures collapse into the fixed
    /// "Failed to fetch package" response.
    pub async fn fetch_package(&self, url: &str, id: &str, other_urls: &[String]) -> PackageResponse {
        for other in other_urls {
            let response = self.fetch_from(other, id).await;
            if !response.is_failure {
                return response;
            }
        }
        self.fetch_from(url, id).await
    }

    async fn fetch_from(&self, url: &str, id: &str) -> PackageResponse {
        let feed = match self.source(url) {
            Ok(feed) => feed,
            Err(err) => {
                self.logger.error("PKGFETCH", format!("Failed to fetch packages: {err}"));
                return PackageResponse::failure();
            }
        };
        match feed.get_package(id).await {
            Ok(package) => PackageResponse::success(package),
            Err(_) => PackageResponse::failure(),
        }
    }
}

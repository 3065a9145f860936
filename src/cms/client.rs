//! HTTP client for the headless CMS API

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use std::future::Future;
use std::time::Duration;

use super::predicate::{query_string, Predicate};
use super::schema::{ApiRoot, SearchResponse};
use crate::config::{CmsConfig, RetryConfig};
use crate::content::{PageSource, PostDetail, PostPage};
use crate::error::{CmsError, CmsResult};
use crate::regenerate::ContentSource;

const USER_AGENT: &str = concat!("spacetraveling/", env!("CARGO_PKG_VERSION"));

/// Search options besides the predicates
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub page_size: Option<u32>,
    /// Field projection, e.g. `posts.title`
    pub fetch: Vec<String>,
}

/// A configured query handle on one CMS repository
#[derive(Debug, Clone)]
pub struct CmsClient {
    http: reqwest::Client,
    endpoint: Url,
    access_token: Option<String>,
    document_type: String,
    retry: RetryConfig,
}

impl CmsClient {
    /// Build a client from configuration
    pub fn from_config(config: &CmsConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            anyhow::bail!(
                "cms.endpoint is not configured (set it in _config.yml or {})",
                crate::config::ENDPOINT_ENV
            );
        }
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/'))
            .with_context(|| format!("Invalid cms.endpoint {:?}", config.endpoint))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            access_token: config.access_token.clone(),
            document_type: config.document_type.clone(),
            retry: config.retry.clone(),
        })
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    /// Whether a cursor URL points at this client's API host
    pub fn owns_cursor(&self, cursor: &str) -> bool {
        match Url::parse(cursor) {
            Ok(url) => {
                url.scheme() == self.endpoint.scheme()
                    && url.host_str() == self.endpoint.host_str()
                    && url.port_or_known_default() == self.endpoint.port_or_known_default()
            }
            Err(_) => false,
        }
    }

    /// Current master ref of the repository
    pub async fn master_ref(&self) -> CmsResult<String> {
        let mut url = self.endpoint.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }

        let body = self.get_text(url).await?;
        let root: ApiRoot = serde_json::from_str(&body)
            .map_err(|e| CmsError::malformed(self.endpoint.as_str(), e))?;
        root.master_ref()
            .map(str::to_string)
            .ok_or_else(|| CmsError::malformed(self.endpoint.as_str(), "no master ref"))
    }

    /// Search documents matching every predicate
    pub async fn query(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> CmsResult<PostPage> {
        let url = self.search_url(predicates, options).await?;
        let body = self.get_text(url.clone()).await?;
        SearchResponse::parse(url.as_str(), &body)?.into_page(url.as_str())
    }

    /// Look a post up by its UID; `None` if it does not exist
    pub async fn get_by_uid(&self, uid: &str) -> CmsResult<Option<PostDetail>> {
        let predicates = [
            Predicate::document_type(&self.document_type),
            Predicate::uid(&self.document_type, uid),
        ];
        let options = QueryOptions {
            page_size: Some(1),
            fetch: Vec::new(),
        };
        let url = self.search_url(&predicates, &options).await?;
        let body = self.get_text(url.clone()).await?;

        let response = SearchResponse::parse(url.as_str(), &body)?;
        match response.results.into_iter().next() {
            Some(doc) => doc.into_detail(url.as_str()).map(Some),
            None => Ok(None),
        }
    }

    /// Like `get_by_uid`, but an unknown slug is an error
    pub async fn require_by_uid(&self, uid: &str) -> CmsResult<PostDetail> {
        self.get_by_uid(uid).await?.ok_or_else(|| CmsError::NotFound {
            slug: uid.to_string(),
        })
    }

    /// Follow an opaque next-page cursor
    pub async fn fetch_cursor(&self, cursor: &str) -> CmsResult<PostPage> {
        let url = Url::parse(cursor).map_err(|e| CmsError::malformed(cursor, e))?;
        let body = self.get_text(url).await?;
        SearchResponse::parse(cursor, &body)?.into_page(cursor)
    }

    /// Run `op`, retrying upstream failures with exponential backoff
    pub async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> CmsResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CmsResult<T>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        what,
                        attempt,
                        attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn search_url(&self, predicates: &[Predicate], options: &QueryOptions) -> CmsResult<Url> {
        let reference = self.master_ref().await?;

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CmsError::malformed(self.endpoint.as_str(), "endpoint cannot be a base"))?
            .extend(["documents", "search"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", &reference);
            pairs.append_pair("q", &query_string(predicates));
            if let Some(size) = options.page_size {
                pairs.append_pair("pageSize", &size.to_string());
            }
            if !options.fetch.is_empty() {
                pairs.append_pair("fetch", &options.fetch.join(","));
            }
            if let Some(token) = &self.access_token {
                pairs.append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    async fn get_text(&self, url: Url) -> CmsResult<String> {
        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| CmsError::unavailable(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CmsError::unavailable(
                url.as_str(),
                format!("HTTP {}", status),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| CmsError::unavailable(url.as_str(), e))
    }
}

#[async_trait]
impl PageSource for CmsClient {
    async fn fetch_page(&self, cursor: &str) -> CmsResult<PostPage> {
        self.fetch_cursor(cursor).await
    }
}

#[async_trait]
impl ContentSource for CmsClient {
    async fn fetch_post(&self, slug: &str) -> CmsResult<Option<PostDetail>> {
        self.with_retry(&format!("Fetching post {}", slug), || self.get_by_uid(slug))
            .await
    }
}

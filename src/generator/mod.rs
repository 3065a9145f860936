//! Generator module - renders the listing page and prerendered post pages

use anyhow::{Context, Result};
use std::fs;
use std::sync::Arc;

use crate::cms::{CmsClient, Predicate, QueryOptions};
use crate::content::PaginationState;
use crate::error::CmsResult;
use crate::regenerate::{Generated, Regenerator};
use crate::templates::TemplateRenderer;
use crate::Site;

/// What a full generation produced
#[derive(Debug, Default)]
pub struct GenerateReport {
    /// Summaries on the first listing page
    pub listed: usize,
    /// Whether the listing offers "load more"
    pub has_more: bool,
    /// Slugs whose pages were written
    pub generated: Vec<String>,
    /// Slugs the CMS listed but could not resolve
    pub missing: Vec<String>,
    /// Slugs whose generation failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Build-time generator
pub struct Generator {
    site: Site,
    client: Arc<CmsClient>,
    renderer: Arc<TemplateRenderer>,
    pages: Regenerator<CmsClient>,
}

impl Generator {
    /// Create a new generator
    pub fn new(site: &Site, client: Arc<CmsClient>) -> Result<Self> {
        let renderer = Arc::new(TemplateRenderer::new(&site.config)?);
        let pages = Regenerator::new(
            Arc::clone(&client),
            Arc::clone(&renderer),
            site.public_dir.clone(),
            site.config.revalidate(),
        );

        Ok(Self {
            site: site.clone(),
            client,
            renderer,
            pages,
        })
    }

    /// Generate the listing page and every prerendered post page
    ///
    /// A listing failure aborts the build. A post failure only skips that
    /// post; it is generated on demand later.
    pub async fn generate(&self) -> Result<GenerateReport> {
        fs::create_dir_all(&self.site.public_dir)
            .with_context(|| format!("Failed to create {:?}", self.site.public_dir))?;

        let mut report = GenerateReport::default();

        let listing = self
            .initial_listing()
            .await
            .context("Failed to fetch the listing page")?;
        report.listed = listing.results.len();
        report.has_more = listing.can_load_more();
        self.write_listing(&listing)?;

        let slugs = self
            .prerender_slugs()
            .await
            .context("Failed to fetch the posts to prerender")?;

        for slug in slugs {
            if !crate::helpers::is_valid_slug(&slug) {
                tracing::warn!("Skipping post with unusable slug {:?}", slug);
                report.failed.push((slug, "invalid slug".to_string()));
                continue;
            }
            match self.pages.generate(&slug).await {
                Ok(Generated::Written(_)) => report.generated.push(slug),
                Ok(Generated::Missing) => {
                    tracing::warn!("Post {} disappeared while generating", slug);
                    report.missing.push(slug);
                }
                Err(e) => {
                    tracing::error!("Failed to generate post {}: {:#}", slug, e);
                    report.failed.push((slug, format!("{:#}", e)));
                }
            }
        }

        tracing::info!(
            "Generated listing ({} posts) and {} post pages",
            report.listed,
            report.generated.len()
        );
        Ok(report)
    }

    /// First page of summaries shown on the listing
    pub async fn initial_listing(&self) -> CmsResult<PaginationState> {
        let predicates = [Predicate::document_type(self.client.document_type())];
        let options = QueryOptions {
            page_size: Some(self.site.config.listing.page_size),
            fetch: self
                .site
                .config
                .listing
                .fields
                .iter()
                .map(|field| format!("{}.{}", self.client.document_type(), field))
                .collect(),
        };

        let page = self
            .client
            .with_retry("Fetching listing", || {
                self.client.query(&predicates, &options)
            })
            .await?;
        Ok(PaginationState::from(page))
    }

    /// Slugs of the posts rendered ahead of time
    pub async fn prerender_slugs(&self) -> CmsResult<Vec<String>> {
        if self.site.config.prerender_count == 0 {
            return Ok(Vec::new());
        }
        let predicates = [Predicate::document_type(self.client.document_type())];
        let options = QueryOptions {
            page_size: Some(self.site.config.prerender_count as u32),
            fetch: Vec::new(),
        };

        let page = self
            .client
            .with_retry("Fetching post paths", || {
                self.client.query(&predicates, &options)
            })
            .await?;
        Ok(page.results.into_iter().map(|p| p.slug).collect())
    }

    fn write_listing(&self, listing: &PaginationState) -> Result<()> {
        let html = self.renderer.render_listing(listing)?;
        let output_path = self.site.public_dir.join("index.html");
        fs::write(&output_path, html)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        tracing::info!("Generated index.html");
        Ok(())
    }
}

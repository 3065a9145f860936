//! Built-in theme templates using the Tera template engine
//!
//! Templates are embedded in the binary. Autoescaping stays on; the only
//! values marked `safe` are paths built by `helpers::post_path` and rich
//! text markup produced under the configured `MarkupPolicy`.

use anyhow::Result;
use chrono::Locale;
use serde::Serialize;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{
    estimate_reading_time, MarkupPolicy, PaginationState, PostDetail, PostSummary,
};
use crate::helpers::{date_xml, format_publication_date, locale_from_name, post_path};

/// Endpoint the listing page calls to load the next page
pub const LOAD_MORE_ENDPOINT: &str = "/api/posts";

/// Seconds before the placeholder page reloads itself
const PLACEHOLDER_REFRESH_SECS: u32 = 2;

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
    site: SiteData,
    date_format: String,
    locale: Locale,
    policy: MarkupPolicy,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("theme/layout.html")),
            ("index.html", include_str!("theme/index.html")),
            ("post.html", include_str!("theme/post.html")),
            ("placeholder.html", include_str!("theme/placeholder.html")),
            ("not_found.html", include_str!("theme/not_found.html")),
            ("unavailable.html", include_str!("theme/unavailable.html")),
            // Partials
            (
                "partials/post_list.html",
                include_str!("theme/partials/post_list.html"),
            ),
        ])?;

        let site = SiteData {
            title: config.title.clone(),
            language: config.language.replace('_', "-"),
            favicon: format!("/{}", config.favicon.trim_start_matches('/')),
            generator: format!("spacetraveling {}", env!("CARGO_PKG_VERSION")),
        };

        Ok(Self {
            tera,
            site,
            date_format: config.date_format.clone(),
            locale: locale_from_name(&config.language),
            policy: config.markup_policy,
        })
    }

    /// Render the listing page for an initial pagination state
    pub fn render_listing(&self, state: &PaginationState) -> Result<String> {
        let mut context = self.base_context();
        context.insert("posts", &self.summaries(&state.results));
        context.insert(
            "listing",
            &ListingData {
                next_page: state.next_page.clone(),
                endpoint: LOAD_MORE_ENDPOINT.to_string(),
            },
        );
        self.render("index.html", &context)
    }

    /// Render summaries as a fragment to append to the listing
    pub fn render_summaries(&self, posts: &[PostSummary]) -> Result<String> {
        let mut context = self.base_context();
        context.insert("posts", &self.summaries(posts));
        self.render("partials/post_list.html", &context)
    }

    /// Render a post's page, including its reading time
    pub fn render_post(&self, post: &PostDetail) -> Result<String> {
        let date = post.summary.first_publication_date.as_ref();
        let data = PostData {
            title: post.summary.title.clone(),
            author: post.summary.author.clone(),
            banner_url: post.banner_url.clone(),
            date: format_publication_date(date, &self.date_format, self.locale),
            datetime: date.map(date_xml),
            reading_time: estimate_reading_time(&post.content),
            sections: post
                .content
                .iter()
                .map(|section| SectionData {
                    heading: section.heading.clone(),
                    body_html: section.body.as_html(self.policy),
                })
                .collect(),
        };

        let mut context = self.base_context();
        context.insert("post", &data);
        self.render("post.html", &context)
    }

    /// Page shown while a post is generated on demand
    pub fn render_placeholder(&self) -> Result<String> {
        let mut context = self.base_context();
        context.insert("refresh_secs", &PLACEHOLDER_REFRESH_SECS);
        self.render("placeholder.html", &context)
    }

    /// Page shown for a slug the CMS does not know
    pub fn render_not_found(&self, path: &str) -> Result<String> {
        let mut context = self.base_context();
        context.insert("path", path);
        self.render("not_found.html", &context)
    }

    /// Page shown while the CMS cannot deliver a post
    pub fn render_unavailable(&self, retry_secs: u64) -> Result<String> {
        let mut context = self.base_context();
        context.insert("retry_secs", &retry_secs.max(1));
        self.render("unavailable.html", &context)
    }

    fn base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("site", &self.site);
        context
    }

    fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }

    fn summaries(&self, posts: &[PostSummary]) -> Vec<SummaryData> {
        posts
            .iter()
            .map(|p| {
                let date = p.first_publication_date.as_ref();
                SummaryData {
                    path: post_path(&p.slug),
                    title: p.title.clone(),
                    subtitle: p.subtitle.clone(),
                    author: p.author.clone(),
                    date: format_publication_date(date, &self.date_format, self.locale),
                    datetime: date.map(date_xml),
                }
            })
            .collect()
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub language: String,
    pub favicon: String,
    pub generator: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryData {
    pub path: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: String,
    pub datetime: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingData {
    pub next_page: Option<String>,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub title: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub date: String,
    pub datetime: Option<String>,
    pub reading_time: u32,
    pub sections: Vec<SectionData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionData {
    pub heading: String,
    pub body_html: String,
}

//! Wire schemas of the content API and their validation into domain types
//!
//! Every field the site relies on is required here. A response missing one
//! is rejected as a whole instead of being rendered with holes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::content::{ContentSection, PostDetail, PostPage, PostSummary, RichText};
use crate::error::{CmsError, CmsResult};

/// Accept `null` but not a missing key
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

/// Optional text: missing, `null` and `""` all read as empty
fn optional_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Repository description returned by the API entry point
#[derive(Debug, Deserialize)]
pub(crate) struct ApiRoot {
    pub refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiRef {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "isMasterRef", default)]
    pub is_master_ref: bool,
}

impl ApiRoot {
    pub fn master_ref(&self) -> Option<&str> {
        self.refs
            .iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference.as_str())
    }
}

/// A page of search results
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(deserialize_with = "nullable")]
    pub next_page: Option<String>,
    pub results: Vec<RawDocument>,
}

/// A document before its `data` has been checked
#[derive(Debug, Deserialize)]
pub(crate) struct RawDocument {
    #[serde(deserialize_with = "nullable")]
    pub uid: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub first_publication_date: Option<String>,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SummaryData {
    title: String,
    #[serde(default, deserialize_with = "optional_text")]
    subtitle: String,
    author: String,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    title: String,
    #[serde(default, deserialize_with = "optional_text")]
    subtitle: String,
    author: String,
    banner: ImageField,
    content: Vec<SectionData>,
}

#[derive(Debug, Deserialize)]
struct ImageField {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SectionData {
    heading: String,
    body: RichText,
}

impl SearchResponse {
    /// Parse a response body, mapping schema errors to `MalformedResponse`
    pub fn parse(url: &str, body: &str) -> CmsResult<Self> {
        serde_json::from_str(body).map_err(|e| CmsError::malformed(url, e))
    }

    /// Validate every result as a post summary
    pub fn into_page(self, url: &str) -> CmsResult<PostPage> {
        let results = self
            .results
            .into_iter()
            .map(|doc| doc.into_summary(url))
            .collect::<CmsResult<Vec<_>>>()?;
        Ok(PostPage {
            next_page: self.next_page,
            results,
        })
    }
}

impl RawDocument {
    fn slug(&self, url: &str) -> CmsResult<String> {
        match self.uid.as_deref().map(str::trim) {
            Some(uid) if !uid.is_empty() => Ok(uid.to_string()),
            _ => Err(CmsError::malformed(url, "document without uid")),
        }
    }

    fn publication_date(&self, url: &str) -> CmsResult<Option<DateTime<Utc>>> {
        self.first_publication_date
            .as_deref()
            .map(|raw| parse_timestamp(raw).map_err(|reason| CmsError::malformed(url, reason)))
            .transpose()
    }

    pub fn into_summary(self, url: &str) -> CmsResult<PostSummary> {
        let slug = self.slug(url)?;
        let first_publication_date = self.publication_date(url)?;
        let data: SummaryData = serde_json::from_value(self.data)
            .map_err(|e| CmsError::malformed(url, format!("document {}: {}", slug, e)))?;

        Ok(PostSummary {
            slug,
            first_publication_date,
            title: data.title,
            subtitle: data.subtitle,
            author: data.author,
        })
    }

    pub fn into_detail(self, url: &str) -> CmsResult<PostDetail> {
        let slug = self.slug(url)?;
        let first_publication_date = self.publication_date(url)?;
        let data: DetailData = serde_json::from_value(self.data)
            .map_err(|e| CmsError::malformed(url, format!("document {}: {}", slug, e)))?;

        Ok(PostDetail {
            summary: PostSummary {
                slug,
                first_publication_date,
                title: data.title,
                subtitle: data.subtitle,
                author: data.author,
            },
            banner_url: data.banner.url.filter(|u| !u.trim().is_empty()),
            content: data
                .content
                .into_iter()
                .map(|section| ContentSection {
                    heading: section.heading,
                    body: section.body,
                })
                .collect(),
        })
    }
}

/// Timestamps arrive as `2021-03-25T19:25:28+0000`, or RFC 3339
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
}

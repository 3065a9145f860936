//! Post models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RichText;

/// A post as it appears on the listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    /// CMS unique identifier, used in `/post/{slug}`
    pub slug: String,

    /// First publication date, `None` for documents never published
    pub first_publication_date: Option<DateTime<Utc>>,

    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// A full post, as rendered on its own page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub summary: PostSummary,

    /// Banner image; the CMS sends an empty image object when unset
    pub banner_url: Option<String>,

    /// Ordered content sections
    pub content: Vec<ContentSection>,
}

impl PostDetail {
    pub fn slug(&self) -> &str {
        &self.summary.slug
    }

    pub fn title(&self) -> &str {
        &self.summary.title
    }
}

/// A headed block of rich text inside a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    pub heading: String,
    pub body: RichText,
}

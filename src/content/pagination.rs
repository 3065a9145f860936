//! Listing pagination: cursor-following accumulation of post summaries

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PostSummary;
use crate::error::CmsResult;

/// One page of summaries as returned by the content API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    /// Opaque URL of the following page, `None` on the last page
    pub next_page: Option<String>,
    pub results: Vec<PostSummary>,
}

/// Everything loaded so far on the listing page
///
/// Only ever grows by appending pages in arrival order. Summaries are
/// neither reordered nor deduplicated; the content API does not promise
/// uniqueness across pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationState {
    pub next_page: Option<String>,
    pub results: Vec<PostSummary>,
}

impl PaginationState {
    /// Append a fetched page and adopt its cursor
    pub fn apply(mut self, page: PostPage) -> PaginationState {
        self.results.extend(page.results);
        self.next_page = page.next_page;
        self
    }

    /// Whether the "load more" control should be offered
    pub fn can_load_more(&self) -> bool {
        self.next_page.is_some()
    }
}

impl From<PostPage> for PaginationState {
    fn from(page: PostPage) -> Self {
        Self {
            next_page: page.next_page,
            results: page.results,
        }
    }
}

/// Anything able to resolve a next-page cursor
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, cursor: &str) -> CmsResult<PostPage>;
}

/// Outcome of a "load more" request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    /// A page was fetched and `count` summaries appended
    Appended { count: usize },
    /// There is no cursor; nothing was fetched
    Exhausted,
}

/// Client-side view state of the listing page
///
/// Loads go through `&mut self`, so one session never has two fetches in
/// flight.
#[derive(Debug, Clone, Default)]
pub struct ListingSession {
    state: PaginationState,
}

impl ListingSession {
    pub fn new(initial: PaginationState) -> Self {
        Self { state: initial }
    }

    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    pub fn into_state(self) -> PaginationState {
        self.state
    }

    /// Follow the cursor once. On error the state is left as it was.
    pub async fn load_more<S>(&mut self, source: &S) -> CmsResult<LoadMore>
    where
        S: PageSource + ?Sized,
    {
        let Some(cursor) = self.state.next_page.clone() else {
            return Ok(LoadMore::Exhausted);
        };

        let page = match source.fetch_page(&cursor).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Load more failed for {}: {}", cursor, e);
                return Err(e);
            }
        };

        let count = page.results.len();
        self.state = std::mem::take(&mut self.state).apply(page);
        tracing::debug!(
            "Appended {} posts ({} total, more: {})",
            count,
            self.state.results.len(),
            self.state.can_load_more()
        );

        Ok(LoadMore::Appended { count })
    }

    /// Keep loading until the cursor runs out
    pub async fn load_all<S>(&mut self, source: &S) -> CmsResult<usize>
    where
        S: PageSource + ?Sized,
    {
        let mut pages = 0;
        while let LoadMore::Appended { .. } = self.load_more(source).await? {
            pages += 1;
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CmsError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn summary(slug: &str) -> PostSummary {
        PostSummary {
            slug: slug.to_string(),
            first_publication_date: None,
            title: slug.to_uppercase(),
            subtitle: String::new(),
            author: "Ana".to_string(),
        }
    }

    /// Serves canned pages keyed by cursor and records requested cursors
    #[derive(Default)]
    struct CannedPages {
        pages: HashMap<String, CmsResult<PostPage>>,
        requested: Mutex<Vec<String>>,
    }

    impl CannedPages {
        fn with(mut self, cursor: &str, page: CmsResult<PostPage>) -> Self {
            self.pages.insert(cursor.to_string(), page);
            self
        }
    }

    #[async_trait]
    impl PageSource for CannedPages {
        async fn fetch_page(&self, cursor: &str) -> CmsResult<PostPage> {
            self.requested.lock().unwrap().push(cursor.to_string());
            match self.pages.get(cursor) {
                Some(Ok(page)) => Ok(page.clone()),
                Some(Err(CmsError::MalformedResponse { url, reason })) => {
                    Err(CmsError::MalformedResponse {
                        url: url.clone(),
                        reason: reason.clone(),
                    })
                }
                _ => Err(CmsError::UpstreamUnavailable {
                    url: cursor.to_string(),
                    reason: "connection refused".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_apply_appends_and_replaces_cursor() {
        let state = PaginationState {
            next_page: Some("page2url".to_string()),
            results: vec![summary("a")],
        };
        let next = state.apply(PostPage {
            next_page: None,
            results: vec![summary("b")],
        });
        assert_eq!(next.next_page, None);
        assert_eq!(next.results, vec![summary("a"), summary("b")]);
        assert!(!next.can_load_more());
    }

    #[test]
    fn test_apply_keeps_duplicates_in_order() {
        let state = PaginationState {
            next_page: Some("p2".to_string()),
            results: vec![summary("a"), summary("b")],
        };
        let next = state.apply(PostPage {
            next_page: Some("p3".to_string()),
            results: vec![summary("b"), summary("c")],
        });
        let slugs: Vec<_> = next.results.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b", "b", "c"]);
        assert_eq!(next.next_page.as_deref(), Some("p3"));
    }

    #[tokio::test]
    async fn test_load_more_follows_cursor() {
        let source = CannedPages::default().with(
            "page2url",
            Ok(PostPage {
                next_page: None,
                results: vec![summary("b")],
            }),
        );
        let mut session = ListingSession::new(PaginationState {
            next_page: Some("page2url".to_string()),
            results: vec![summary("a")],
        });

        let outcome = session.load_more(&source).await.unwrap();
        assert_eq!(outcome, LoadMore::Appended { count: 1 });
        assert_eq!(
            session.state(),
            &PaginationState {
                next_page: None,
                results: vec![summary("a"), summary("b")],
            }
        );
        assert!(!session.state().can_load_more());
    }

    #[tokio::test]
    async fn test_load_more_without_cursor_does_not_fetch() {
        let source = CannedPages::default();
        let mut session = ListingSession::new(PaginationState {
            next_page: None,
            results: vec![summary("a")],
        });

        assert_eq!(session.load_more(&source).await.unwrap(), LoadMore::Exhausted);
        assert!(source.requested.lock().unwrap().is_empty());
        assert_eq!(session.state().results.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_state_untouched() {
        let source = CannedPages::default().with(
            "bad",
            Err(CmsError::MalformedResponse {
                url: "bad".to_string(),
                reason: "missing field `results`".to_string(),
            }),
        );
        let initial = PaginationState {
            next_page: Some("bad".to_string()),
            results: vec![summary("a")],
        };
        let mut session = ListingSession::new(initial.clone());

        let err = session.load_more(&source).await.unwrap_err();
        assert!(matches!(err, CmsError::MalformedResponse { .. }));
        assert_eq!(session.state(), &initial);

        session.state.next_page = Some("offline".to_string());
        let err = session.load_more(&source).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.state().results, initial.results);
    }

    #[tokio::test]
    async fn test_load_all_walks_every_page() {
        let source = CannedPages::default()
            .with(
                "p2",
                Ok(PostPage {
                    next_page: Some("p3".to_string()),
                    results: vec![summary("b")],
                }),
            )
            .with(
                "p3",
                Ok(PostPage {
                    next_page: None,
                    results: vec![summary("c"), summary("d")],
                }),
            );
        let mut session = ListingSession::new(PaginationState {
            next_page: Some("p2".to_string()),
            results: vec![summary("a")],
        });

        assert_eq!(session.load_all(&source).await.unwrap(), 2);
        let slugs: Vec<_> = session
            .into_state()
            .results
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(slugs, vec!["a", "b", "c", "d"]);
        assert_eq!(*source.requested.lock().unwrap(), vec!["p2", "p3"]);
    }
}

//! Incremental regeneration of post pages
//!
//! Post pages are plain files under `public/post/{slug}/index.html`. A page
//! is fresh for the revalidation window after it was written. Requests for
//! stale pages get the stale copy while a background task rewrites it.
//! Slugs without a page get a placeholder while the page is generated on
//! demand, then either the page or a not-found verdict. When the CMS cannot
//! be reached the slug gets an "unavailable" verdict for a short pause
//! instead of a new generation on every request.
//!
//! Pages are replaced by renaming a finished file over the old one, so a
//! reader always gets one whole version of a page.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;

use crate::content::PostDetail;
use crate::error::CmsResult;
use crate::templates::TemplateRenderer;

/// Verdicts remembered per kind; the oldest goes first past this
const MAX_VERDICTS: usize = 10_000;

const DEFAULT_UNAVAILABLE_RETRY: Duration = Duration::from_secs(30);

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Where full posts come from
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// The post with this slug, `None` if the CMS does not know it
    async fn fetch_post(&self, slug: &str) -> CmsResult<Option<PostDetail>>;
}

/// What a request for `/post/{slug}` should get
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A generated page; `stale` pages are being regenerated in the background
    Ready { html: String, stale: bool },
    /// No page yet; generation is running
    Pending,
    /// The CMS has no such post
    NotFound,
    /// The CMS failed; the next attempt starts after `retry_after`
    Unavailable { retry_after: Duration },
}

/// Result of one generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    Written(PathBuf),
    Missing,
}

#[derive(Default)]
struct Tracker {
    in_flight: HashSet<String>,
    /// Slugs the CMS did not know, with when that was established
    missing: HashMap<String, Instant>,
    /// Slugs whose last fetch hit an upstream failure
    unavailable: HashMap<String, Instant>,
}

/// Remember a verdict, forgetting expired ones first
fn record_verdict(verdicts: &mut HashMap<String, Instant>, slug: &str, ttl: Duration) {
    verdicts.retain(|_, at| at.elapsed() < ttl);
    if verdicts.len() >= MAX_VERDICTS {
        let oldest = verdicts
            .iter()
            .min_by_key(|(_, at)| **at)
            .map(|(slug, _)| slug.clone());
        if let Some(oldest) = oldest {
            verdicts.remove(&oldest);
        }
    }
    verdicts.insert(slug.to_string(), Instant::now());
}

/// Time left on a verdict; expired verdicts are dropped
fn verdict_remaining(
    verdicts: &mut HashMap<String, Instant>,
    slug: &str,
    ttl: Duration,
) -> Option<Duration> {
    let age = verdicts.get(slug)?.elapsed();
    if age < ttl {
        Some(ttl - age)
    } else {
        verdicts.remove(slug);
        None
    }
}

/// Output path of a post page
pub fn post_output_path(public_dir: &Path, slug: &str) -> PathBuf {
    public_dir.join("post").join(slug).join("index.html")
}

/// Read a page and its age through one handle; `None` when there is no page
async fn read_page(path: &Path) -> std::io::Result<Option<(String, Duration)>> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let age = file
        .metadata()
        .await?
        .modified()
        .ok()
        .and_then(|m| m.elapsed().ok())
        .unwrap_or_default();
    let mut html = String::new();
    file.read_to_string(&mut html).await?;
    Ok(Some((html, age)))
}

/// Write next to the page, then rename over it
async fn replace_page(path: &Path, html: String) -> Result<()> {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("html.{}-{}.tmp", std::process::id(), seq));
    tokio::fs::write(&tmp, html)
        .await
        .with_context(|| format!("Failed to write {:?}", tmp))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to replace {:?}", path));
    }
    Ok(())
}

/// Resolves and (re)generates post pages
pub struct Regenerator<S: ?Sized> {
    source: Arc<S>,
    renderer: Arc<TemplateRenderer>,
    public_dir: PathBuf,
    revalidate: Duration,
    unavailable_retry: Duration,
    tracker: Arc<Mutex<Tracker>>,
}

impl<S: ?Sized> Clone for Regenerator<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            renderer: Arc::clone(&self.renderer),
            public_dir: self.public_dir.clone(),
            revalidate: self.revalidate,
            unavailable_retry: self.unavailable_retry,
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<S> Regenerator<S>
where
    S: ContentSource + ?Sized + 'static,
{
    pub fn new(
        source: Arc<S>,
        renderer: Arc<TemplateRenderer>,
        public_dir: impl Into<PathBuf>,
        revalidate: Duration,
    ) -> Self {
        Self {
            source,
            renderer,
            public_dir: public_dir.into(),
            revalidate,
            unavailable_retry: DEFAULT_UNAVAILABLE_RETRY,
            tracker: Arc::new(Mutex::new(Tracker::default())),
        }
    }

    /// Pause between generations of a slug the CMS failed to deliver
    pub fn with_unavailable_retry(mut self, pause: Duration) -> Self {
        self.unavailable_retry = pause;
        self
    }

    /// Decide what to serve for a slug, starting generation when needed
    pub async fn resolve(&self, slug: &str) -> Result<Resolution> {
        let path = post_output_path(&self.public_dir, slug);

        let page = read_page(&path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        if let Some((html, age)) = page {
            let stale = age >= self.revalidate;
            if stale {
                tracing::debug!("Page for {} is stale ({:?} old)", slug, age);
                self.spawn_generation(slug);
            }
            return Ok(Resolution::Ready { html, stale });
        }

        if self.known_missing(slug) {
            return Ok(Resolution::NotFound);
        }
        if let Some(retry_after) = self.unavailable_for(slug) {
            return Ok(Resolution::Unavailable { retry_after });
        }
        self.spawn_generation(slug);
        Ok(Resolution::Pending)
    }

    /// Start a background generation unless one is already running
    pub fn spawn_generation(&self, slug: &str) -> bool {
        {
            let mut tracker = self.lock();
            if !tracker.in_flight.insert(slug.to_string()) {
                return false;
            }
        }

        let this = self.clone();
        let slug = slug.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.generate(&slug).await {
                tracing::error!("Generation of {} failed: {:#}", slug, e);
            }
            this.lock().in_flight.remove(&slug);
        });
        true
    }

    /// Fetch, render and write one post page
    pub async fn generate(&self, slug: &str) -> Result<Generated> {
        let path = post_output_path(&self.public_dir, slug);

        let fetched = match self.source.fetch_post(slug).await {
            Ok(fetched) => fetched,
            Err(e) => {
                if e.is_retryable() {
                    let mut tracker = self.lock();
                    record_verdict(&mut tracker.unavailable, slug, self.unavailable_retry);
                }
                return Err(e.into());
            }
        };

        match fetched {
            Some(post) => {
                let html = self.renderer.render_post(&post)?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create dir {:?}", parent))?;
                }
                replace_page(&path, html).await?;
                {
                    let mut tracker = self.lock();
                    tracker.missing.remove(slug);
                    tracker.unavailable.remove(slug);
                }
                tracing::debug!("Generated post: {:?}", path);
                Ok(Generated::Written(path))
            }
            None => {
                // Unpublished since the last generation
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(e).with_context(|| format!("Failed to remove {:?}", path));
                    }
                }
                {
                    let mut tracker = self.lock();
                    tracker.unavailable.remove(slug);
                    record_verdict(&mut tracker.missing, slug, self.revalidate);
                }
                tracing::info!("Post {} not found upstream", slug);
                Ok(Generated::Missing)
            }
        }
    }

    /// Whether a generation for this slug is running
    pub fn is_generating(&self, slug: &str) -> bool {
        self.lock().in_flight.contains(slug)
    }

    fn known_missing(&self, slug: &str) -> bool {
        let mut tracker = self.lock();
        verdict_remaining(&mut tracker.missing, slug, self.revalidate).is_some()
    }

    fn unavailable_for(&self, slug: &str) -> Option<Duration> {
        let mut tracker = self.lock();
        verdict_remaining(&mut tracker.unavailable, slug, self.unavailable_retry)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tracker> {
        // Every update is a single insert, remove or retain, so poisoning is harmless
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

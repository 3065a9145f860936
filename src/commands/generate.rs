//! Generate static files

use anyhow::Result;
use std::sync::Arc;

use crate::generator::{GenerateReport, Generator};
use crate::Site;

/// Generate the listing page and prerendered posts
pub async fn run(site: &Site) -> Result<GenerateReport> {
    let start = std::time::Instant::now();

    let client = Arc::new(site.cms_client()?);
    let generator = Generator::new(site, client)?;
    let report = generator.generate().await?;

    for (slug, reason) in &report.failed {
        tracing::warn!("Post {} will be generated on first request: {}", slug, reason);
    }

    let duration = start.elapsed();
    tracing::info!("Generated in {:.2}s", duration.as_secs_f64());

    Ok(report)
}

//! List posts from the CMS

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::content::{ListingSession, PostSummary};
use crate::generator::Generator;
use crate::helpers::{date_xml, post_path};
use crate::Site;

/// Walk the listing through every "load more" page and print each post
pub async fn run(site: &Site) -> Result<()> {
    let client = Arc::new(site.cms_client()?);
    let generator = Generator::new(site, Arc::clone(&client))?;

    let initial = generator
        .initial_listing()
        .await
        .context("Failed to fetch the listing page")?;
    let mut session = ListingSession::new(initial);
    let pages = session
        .load_all(client.as_ref())
        .await
        .context("Failed to load more posts")?;

    let posts = &session.state().results;
    println!("Posts ({}, {} pages):", posts.len(), pages + 1);
    for post in posts {
        println!("{}", format_line(post));
    }

    Ok(())
}

fn format_line(post: &PostSummary) -> String {
    let date = post
        .first_publication_date
        .as_ref()
        .map(date_xml)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "  {} - {} by {} [{}]",
        date,
        post.title,
        post.author,
        post_path(&post.slug)
    )
}

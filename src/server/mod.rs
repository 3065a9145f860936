//! Site server: static pages, on-demand post generation and load-more API

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cms::CmsClient;
use crate::content::{ListingSession, PaginationState};
use crate::error::CmsError;
use crate::helpers::{is_valid_slug, post_path};
use crate::regenerate::{Regenerator, Resolution};
use crate::templates::{TemplateRenderer, LOAD_MORE_ENDPOINT};
use crate::Site;

/// Shared handler state
#[derive(Clone)]
pub struct ServerState {
    renderer: Arc<TemplateRenderer>,
    client: Arc<CmsClient>,
    pages: Regenerator<CmsClient>,
}

impl ServerState {
    pub fn new(site: &Site, client: Arc<CmsClient>) -> Result<Self> {
        let renderer = Arc::new(TemplateRenderer::new(&site.config)?);
        let pages = Regenerator::new(
            Arc::clone(&client),
            Arc::clone(&renderer),
            site.public_dir.clone(),
            site.config.revalidate(),
        )
        .with_unavailable_retry(site.config.unavailable_retry());
        Ok(Self {
            renderer,
            client,
            pages,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoadMoreQuery {
    cursor: String,
}

/// Body of a successful load-more call
#[derive(Debug, Serialize, Deserialize)]
pub struct LoadMoreResponse {
    pub next_page: Option<String>,
    /// Rendered summaries to append to the listing
    pub html: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the application router
pub fn router(state: ServerState, public_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/post/:slug", get(post_handler))
        .route("/post/:slug/", get(post_handler))
        .route(LOAD_MORE_ENDPOINT, get(load_more_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(site: &Site, ip: &str, port: u16, open: bool) -> Result<()> {
    let client = Arc::new(site.cms_client()?);
    let state = ServerState::new(site, client)?;
    let app = router(state, &site.public_dir);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port)
        .parse()
        .with_context(|| format!("Invalid address {}:{}", ip, port))?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    println!(
        "Post pages revalidate every {}s. Press Ctrl+C to stop.",
        site.config.revalidate_secs
    );

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn post_handler(State(state): State<ServerState>, Path(slug): Path<String>) -> Response {
    let path = post_path(&slug);
    if !is_valid_slug(&slug) {
        return not_found(&state, &path);
    }

    match state.pages.resolve(&slug).await {
        Ok(Resolution::Ready { html, .. }) => Html(html).into_response(),
        Ok(Resolution::Pending) => match state.renderer.render_placeholder() {
            Ok(html) => Html(html).into_response(),
            Err(e) => internal_error(e),
        },
        Ok(Resolution::NotFound) => not_found(&state, &path),
        Ok(Resolution::Unavailable { retry_after }) => {
            let retry_secs = retry_after.as_secs().max(1);
            match state.renderer.render_unavailable(retry_secs) {
                Ok(html) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::RETRY_AFTER, retry_secs.to_string())],
                    Html(html),
                )
                    .into_response(),
                Err(e) => internal_error(e),
            }
        }
        Err(e) => internal_error(e),
    }
}

async fn load_more_handler(
    State(state): State<ServerState>,
    Query(query): Query<LoadMoreQuery>,
) -> Response {
    if !state.client.owns_cursor(&query.cursor) {
        tracing::warn!("Rejected foreign cursor {:?}", query.cursor);
        return error_response(StatusCode::BAD_REQUEST, "invalid cursor".to_string());
    }

    let mut session = ListingSession::new(PaginationState {
        next_page: Some(query.cursor),
        results: Vec::new(),
    });
    if let Err(e) = session.load_more(state.client.as_ref()).await {
        if matches!(e, CmsError::MalformedResponse { .. }) {
            tracing::error!("CMS returned an unusable page: {}", e);
        }
        return error_response(StatusCode::BAD_GATEWAY, e.to_string());
    }

    let state_after = session.into_state();
    match state.renderer.render_summaries(&state_after.results) {
        Ok(html) => Json(LoadMoreResponse {
            next_page: state_after.next_page,
            html,
            count: state_after.results.len(),
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

fn not_found(state: &ServerState, path: &str) -> Response {
    match state.renderer.render_not_found(path) {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: anyhow::Error) -> Response {
    tracing::error!("Request failed: {:#}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}

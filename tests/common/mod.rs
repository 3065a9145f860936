//! Shared fixtures: a mocked content API and site setup

#![allow(dead_code)]

use serde_json::{json, Value};
use spacetraveling::config::{CmsConfig, RetryConfig, SiteConfig};
use spacetraveling::Site;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_PATH: &str = "/api/v2";
pub const SEARCH_PATH: &str = "/api/v2/documents/search";
pub const LISTING_FETCH: &str = "posts.title,posts.subtitle,posts.author";

pub fn endpoint(server: &MockServer) -> String {
    format!("{}{}", server.uri(), API_PATH)
}

/// Cursor of the given listing page on the mock server
pub fn cursor(server: &MockServer, page: u32) -> String {
    format!(
        "{}{}?ref=master-ref&page={}&pageSize=1",
        server.uri(),
        SEARCH_PATH,
        page
    )
}

pub fn cms_config(server: &MockServer) -> CmsConfig {
    CmsConfig {
        endpoint: endpoint(server),
        retry: RetryConfig {
            attempts: 2,
            base_delay_ms: 1,
        },
        ..CmsConfig::default()
    }
}

/// A site in a temp dir pointed at the mock server
pub fn test_site(server: &MockServer) -> (Site, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = SiteConfig {
        cms: cms_config(server),
        ..SiteConfig::default()
    };
    (Site::with_config(dir.path(), config), dir)
}

pub fn summary_doc(uid: &str, title: &str) -> Value {
    json!({
        "id": format!("id-{}", uid),
        "uid": uid,
        "type": "posts",
        "first_publication_date": "2021-03-15T19:25:28+0000",
        "data": {
            "title": title,
            "subtitle": format!("Subtitle of {}", title),
            "author": "Joseph Oliveira"
        }
    })
}

pub fn detail_doc(uid: &str, title: &str, body_words: usize) -> Value {
    json!({
        "id": format!("id-{}", uid),
        "uid": uid,
        "type": "posts",
        "first_publication_date": "2021-03-15T19:25:28+0000",
        "data": {
            "title": title,
            "subtitle": format!("Subtitle of {}", title),
            "author": "Joseph Oliveira",
            "banner": {"url": "https://images.cms.test/banner.png", "alt": null},
            "content": [{
                "heading": "Proin et varius",
                "body": [{
                    "type": "paragraph",
                    "text": vec!["lorem"; body_words].join(" "),
                    "spans": []
                }]
            }]
        }
    })
}

pub fn search_body(next_page: Option<String>, results: Vec<Value>) -> Value {
    json!({
        "page": 1,
        "results_per_page": results.len(),
        "next_page": next_page,
        "prev_page": null,
        "results": results
    })
}

/// Answer the API entry point with a master ref
pub async fn mount_master_ref(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "refs": [
                {"id": "preview", "ref": "preview-ref", "isMasterRef": false},
                {"id": "master", "ref": "master-ref", "isMasterRef": true}
            ]
        })))
        .mount(server)
        .await;
}

/// First listing page, the projected query
pub async fn mount_listing(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("ref", "master-ref"))
        .and(query_param("fetch", LISTING_FETCH))
        .and(query_param("pageSize", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// A page reached through a cursor
pub async fn mount_cursor_page(server: &MockServer, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// The query listing the slugs to prerender
pub async fn mount_prerender(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("pageSize", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// By-UID lookup of one post; `doc` of `None` means the CMS does not know it
pub async fn mount_post(server: &MockServer, uid: &str, doc: Option<Value>) {
    let q = format!(
        r#"[[at(document.type,"posts")][at(my.posts.uid,"{}")]]"#,
        uid
    );
    let results = doc.into_iter().collect();
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("q", q.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(None, results)))
        .mount(server)
        .await;
}

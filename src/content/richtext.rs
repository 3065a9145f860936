//! Structured rich text as delivered by the CMS
//!
//! A rich text field is an ordered list of blocks. Text blocks carry inline
//! spans whose offsets count UTF-16 code units, as the CMS computes them in
//! the browser editor.

use serde::{Deserialize, Serialize};

use crate::helpers::{html_escape, post_path};

/// How much the markup path trusts the content source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupPolicy {
    /// Emit embed HTML and link targets exactly as the CMS sent them
    #[default]
    TrustUpstream,
    /// Drop embed HTML and links or images with unexpected URL schemes
    Sanitize,
}

/// A rich text field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RichText(pub Vec<Block>);

/// One block of a rich text field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    #[serde(rename = "paragraph")]
    Paragraph(TextBlock),
    #[serde(rename = "heading1")]
    Heading1(TextBlock),
    #[serde(rename = "heading2")]
    Heading2(TextBlock),
    #[serde(rename = "heading3")]
    Heading3(TextBlock),
    #[serde(rename = "heading4")]
    Heading4(TextBlock),
    #[serde(rename = "heading5")]
    Heading5(TextBlock),
    #[serde(rename = "heading6")]
    Heading6(TextBlock),
    #[serde(rename = "preformatted")]
    Preformatted(TextBlock),
    #[serde(rename = "list-item")]
    ListItem(TextBlock),
    #[serde(rename = "o-list-item")]
    OrderedListItem(TextBlock),
    #[serde(rename = "image")]
    Image(ImageBlock),
    #[serde(rename = "embed")]
    Embed(EmbedBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

/// Inline formatting over `[start, end)` of a text block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    /// Web and media links
    #[serde(default)]
    pub url: Option<String>,
    /// Links to other documents
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedBlock {
    pub oembed: OEmbed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OEmbed {
    pub embed_url: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl Block {
    /// The text payload of text-carrying blocks
    pub fn text_block(&self) -> Option<&TextBlock> {
        match self {
            Block::Paragraph(t)
            | Block::Heading1(t)
            | Block::Heading2(t)
            | Block::Heading3(t)
            | Block::Heading4(t)
            | Block::Heading5(t)
            | Block::Heading6(t)
            | Block::Preformatted(t)
            | Block::ListItem(t)
            | Block::OrderedListItem(t) => Some(t),
            Block::Image(_) | Block::Embed(_) => None,
        }
    }

    fn list_tag(&self) -> Option<&'static str> {
        match self {
            Block::ListItem(_) => Some("ul"),
            Block::OrderedListItem(_) => Some("ol"),
            _ => None,
        }
    }
}

impl RichText {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self(blocks)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Plain text of every text block, joined with `join`
    pub fn as_text(&self, join: &str) -> String {
        self.0
            .iter()
            .filter_map(Block::text_block)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(join)
    }

    /// Serialize to HTML under the given trust policy
    pub fn as_html(&self, policy: MarkupPolicy) -> String {
        let mut html = String::new();
        let mut open_list: Option<&'static str> = None;

        for block in &self.0 {
            let list_tag = block.list_tag();
            if open_list != list_tag {
                if let Some(tag) = open_list {
                    html.push_str(&format!("</{}>", tag));
                }
                if let Some(tag) = list_tag {
                    html.push_str(&format!("<{}>", tag));
                }
                open_list = list_tag;
            }

            match block {
                Block::Paragraph(t) => push_element(&mut html, "p", t, policy),
                Block::Heading1(t) => push_element(&mut html, "h1", t, policy),
                Block::Heading2(t) => push_element(&mut html, "h2", t, policy),
                Block::Heading3(t) => push_element(&mut html, "h3", t, policy),
                Block::Heading4(t) => push_element(&mut html, "h4", t, policy),
                Block::Heading5(t) => push_element(&mut html, "h5", t, policy),
                Block::Heading6(t) => push_element(&mut html, "h6", t, policy),
                Block::ListItem(t) | Block::OrderedListItem(t) => {
                    push_element(&mut html, "li", t, policy)
                }
                Block::Preformatted(t) => {
                    html.push_str("<pre>");
                    html.push_str(&serialize_spans(t, policy, false));
                    html.push_str("</pre>");
                }
                Block::Image(image) => push_image(&mut html, image, policy),
                Block::Embed(embed) => push_embed(&mut html, &embed.oembed, policy),
            }
        }

        if let Some(tag) = open_list {
            html.push_str(&format!("</{}>", tag));
        }

        html
    }
}

fn push_element(html: &mut String, tag: &str, block: &TextBlock, policy: MarkupPolicy) {
    html.push_str(&format!(
        "<{tag}>{}</{tag}>",
        serialize_spans(block, policy, true)
    ));
}

fn push_image(html: &mut String, image: &ImageBlock, policy: MarkupPolicy) {
    if policy == MarkupPolicy::Sanitize && !is_safe_url(&image.url) {
        tracing::warn!("Dropped image with unsafe url: {}", image.url);
        return;
    }
    html.push_str(&format!(
        r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
        html_escape(&image.url),
        html_escape(image.alt.as_deref().unwrap_or(""))
    ));
}

fn push_embed(html: &mut String, oembed: &OEmbed, policy: MarkupPolicy) {
    match policy {
        MarkupPolicy::TrustUpstream => {
            html.push_str(&format!(
                r#"<div data-oembed="{}" data-oembed-type="{}">{}</div>"#,
                html_escape(&oembed.embed_url),
                html_escape(oembed.kind.as_deref().unwrap_or("")),
                oembed.html.as_deref().unwrap_or("")
            ));
        }
        MarkupPolicy::Sanitize => {
            if !is_safe_url(&oembed.embed_url) {
                tracing::warn!("Dropped embed with unsafe url: {}", oembed.embed_url);
                return;
            }
            let url = html_escape(&oembed.embed_url);
            html.push_str(&format!(
                r#"<div data-oembed="{url}"><a href="{url}">{url}</a></div>"#
            ));
        }
    }
}

/// Opening markup and closing tag name for a span, `None` to render it as plain text
fn span_markup(span: &Span, policy: MarkupPolicy) -> Option<(String, &'static str)> {
    match span.kind.as_str() {
        "strong" => Some(("<strong>".to_string(), "strong")),
        "em" => Some(("<em>".to_string(), "em")),
        "label" => {
            let label = span.data.as_ref().and_then(|d| d.label.as_deref())?;
            Some((
                format!(r#"<span class="{}">"#, html_escape(label)),
                "span",
            ))
        }
        "hyperlink" => {
            let data = span.data.as_ref()?;
            let href = match (&data.url, &data.uid) {
                (Some(url), _) => url.clone(),
                (None, Some(uid)) => post_path(uid),
                (None, None) => return None,
            };
            if policy == MarkupPolicy::Sanitize && !is_safe_url(&href) {
                tracing::warn!("Dropped link with unsafe url: {}", href);
                return None;
            }
            let target = match data.target.as_deref() {
                Some(target) => format!(
                    r#" target="{}" rel="noopener noreferrer""#,
                    html_escape(target)
                ),
                None => String::new(),
            };
            Some((format!(r#"<a href="{}"{}>"#, html_escape(&href), target), "a"))
        }
        _ => None,
    }
}

/// Render a text block with its spans nested as elements
fn serialize_spans(block: &TextBlock, policy: MarkupPolicy, line_breaks: bool) -> String {
    let text = block.text.as_str();

    // (start byte, end byte, open markup, close tag)
    let mut spans: Vec<(usize, usize, String, &'static str)> = block
        .spans
        .iter()
        .filter_map(|span| {
            let start = utf16_to_byte(text, span.start);
            let end = utf16_to_byte(text, span.end);
            if start >= end {
                return None;
            }
            let (open, close) = span_markup(span, policy)?;
            Some((start, end, open, close))
        })
        .collect();
    // Outer spans open first
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut points: Vec<usize> = spans
        .iter()
        .flat_map(|(start, end, _, _)| [*start, *end])
        .chain([0, text.len()])
        .collect();
    points.sort_unstable();
    points.dedup();

    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<usize> = Vec::new();
    let mut next = 0;

    for (i, &point) in points.iter().enumerate() {
        // Close spans ending here; spans opened after them are closed and reopened
        if let Some(first) = stack.iter().position(|&s| spans[s].1 <= point) {
            for &s in stack[first..].iter().rev() {
                out.push_str(&format!("</{}>", spans[s].3));
            }
            let reopen: Vec<usize> = stack[first..]
                .iter()
                .copied()
                .filter(|&s| spans[s].1 > point)
                .collect();
            stack.truncate(first);
            for s in reopen {
                out.push_str(&spans[s].2);
                stack.push(s);
            }
        }

        while next < spans.len() && spans[next].0 == point {
            out.push_str(&spans[next].2);
            stack.push(next);
            next += 1;
        }

        if let Some(&until) = points.get(i + 1) {
            let escaped = html_escape(&text[point..until]);
            if line_breaks {
                out.push_str(&escaped.replace('\n', "<br />"));
            } else {
                out.push_str(&escaped);
            }
        }
    }

    out
}

/// Byte index of a UTF-16 offset, clamped to the end of `text`
fn utf16_to_byte(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (byte, ch) in text.char_indices() {
        if units >= offset {
            return byte;
        }
        units += ch.len_utf16();
    }
    text.len()
}

/// Relative URLs and http(s)/mailto only
fn is_safe_url(url: &str) -> bool {
    let url = url.trim();
    let scheme_end = url.find(|c: char| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(idx) if url[idx..].starts_with(':') => {
            let scheme = url[..idx].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str, spans: Vec<Span>) -> Block {
        Block::Paragraph(TextBlock {
            text: text.to_string(),
            spans,
        })
    }

    fn span(start: usize, end: usize, kind: &str) -> Span {
        Span {
            start,
            end,
            kind: kind.to_string(),
            data: None,
        }
    }

    fn link(start: usize, end: usize, url: &str) -> Span {
        Span {
            start,
            end,
            kind: "hyperlink".to_string(),
            data: Some(SpanData {
                url: Some(url.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_deserialize_cms_rich_text() {
        let json = r#"[
            {"type": "heading2", "text": "Intro", "spans": []},
            {"type": "paragraph", "text": "Hello world", "spans": [
                {"start": 0, "end": 5, "type": "strong"},
                {"start": 6, "end": 11, "type": "hyperlink",
                 "data": {"link_type": "Web", "url": "https://example.com"}}
            ]},
            {"type": "image", "url": "https://images.example/a.png", "alt": null,
             "dimensions": {"width": 10, "height": 10}},
            {"type": "list-item", "text": "one", "spans": []}
        ]"#;
        let rich: RichText = serde_json::from_str(json).unwrap();
        assert_eq!(rich.blocks().len(), 4);
        assert!(matches!(rich.blocks()[0], Block::Heading2(_)));
        assert!(matches!(rich.blocks()[2], Block::Image(_)));
    }

    #[test]
    fn test_unknown_block_type_is_rejected() {
        let json = r#"[{"type": "hologram", "text": "?"}]"#;
        assert!(serde_json::from_str::<RichText>(json).is_err());
    }

    #[test]
    fn test_as_text_skips_non_text_blocks() {
        let rich = RichText::new(vec![
            paragraph("first block", vec![]),
            Block::Image(ImageBlock {
                url: "https://img/a.png".to_string(),
                alt: None,
            }),
            paragraph("second", vec![]),
        ]);
        assert_eq!(rich.as_text(" "), "first block second");
        assert_eq!(RichText::default().as_text(" "), "");
    }

    #[test]
    fn test_as_html_escapes_text() {
        let rich = RichText::new(vec![paragraph("a < b & \"c\"", vec![])]);
        assert_eq!(
            rich.as_html(MarkupPolicy::TrustUpstream),
            "<p>a &lt; b &amp; &quot;c&quot;</p>"
        );
    }

    #[test]
    fn test_as_html_nested_spans() {
        let rich = RichText::new(vec![paragraph(
            "Hello brave world",
            vec![span(0, 11, "strong"), span(6, 11, "em")],
        )]);
        assert_eq!(
            rich.as_html(MarkupPolicy::TrustUpstream),
            "<p><strong>Hello <em>brave</em></strong> world</p>"
        );
    }

    #[test]
    fn test_as_html_overlapping_spans_stay_well_formed() {
        let rich = RichText::new(vec![paragraph(
            "abcdef",
            vec![span(0, 4, "strong"), span(2, 6, "em")],
        )]);
        assert_eq!(
            rich.as_html(MarkupPolicy::TrustUpstream),
            "<p><strong>ab<em>cd</em></strong><em>ef</em></p>"
        );
    }

    #[test]
    fn test_span_offsets_count_utf16_units() {
        // The rocket takes two UTF-16 units
        let rich = RichText::new(vec![paragraph("🚀 go", vec![span(3, 5, "em")])]);
        assert_eq!(
            rich.as_html(MarkupPolicy::TrustUpstream),
            "<p>🚀 <em>go</em></p>"
        );
    }

    #[test]
    fn test_list_items_are_grouped() {
        let item = |text: &str| {
            Block::ListItem(TextBlock {
                text: text.to_string(),
                spans: vec![],
            })
        };
        let rich = RichText::new(vec![
            item("a"),
            item("b"),
            Block::OrderedListItem(TextBlock {
                text: "c".to_string(),
                spans: vec![],
            }),
            paragraph("end", vec![]),
        ]);
        assert_eq!(
            rich.as_html(MarkupPolicy::TrustUpstream),
            "<ul><li>a</li><li>b</li></ul><ol><li>c</li></ol><p>end</p>"
        );
    }

    #[test]
    fn test_line_breaks_outside_preformatted() {
        let rich = RichText::new(vec![
            paragraph("one\ntwo", vec![]),
            Block::Preformatted(TextBlock {
                text: "let x\nlet y".to_string(),
                spans: vec![],
            }),
        ]);
        assert_eq!(
            rich.as_html(MarkupPolicy::TrustUpstream),
            "<p>one<br />two</p><pre>let x\nlet y</pre>"
        );
    }

    #[test]
    fn test_document_link_resolves_to_post_route() {
        let rich = RichText::new(vec![paragraph(
            "see other",
            vec![Span {
                start: 4,
                end: 9,
                kind: "hyperlink".to_string(),
                data: Some(SpanData {
                    uid: Some("other-post".to_string()),
                    ..Default::default()
                }),
            }],
        )]);
        assert_eq!(
            rich.as_html(MarkupPolicy::TrustUpstream),
            r#"<p>see <a href="/post/other-post">other</a></p>"#
        );
    }

    #[test]
    fn test_trust_upstream_keeps_embed_html() {
        let rich = RichText::new(vec![Block::Embed(EmbedBlock {
            oembed: OEmbed {
                embed_url: "https://video.example/1".to_string(),
                kind: Some("video".to_string()),
                html: Some("<iframe src=\"https://video.example/e/1\"></iframe>".to_string()),
            },
        })]);
        let html = rich.as_html(MarkupPolicy::TrustUpstream);
        assert!(html.contains("<iframe src=\"https://video.example/e/1\"></iframe>"));

        let html = rich.as_html(MarkupPolicy::Sanitize);
        assert!(!html.contains("<iframe"));
        assert!(html.contains(r#"<a href="https://video.example/1">"#));
    }

    #[test]
    fn test_sanitize_drops_script_links() {
        let rich = RichText::new(vec![paragraph(
            "click me",
            vec![link(0, 5, "javascript:alert(1)")],
        )]);
        assert_eq!(
            rich.as_html(MarkupPolicy::TrustUpstream),
            r#"<p><a href="javascript:alert(1)">click</a> me</p>"#
        );
        assert_eq!(rich.as_html(MarkupPolicy::Sanitize), "<p>click me</p>");
    }

    #[test]
    fn test_is_safe_url() {
        assert!(is_safe_url("https://example.com"));
        assert!(is_safe_url("mailto:me@example.com"));
        assert!(is_safe_url("/post/a"));
        assert!(is_safe_url("relative/path?x=1:2"));
        assert!(!is_safe_url("javascript:alert(1)"));
        assert!(!is_safe_url(" JavaScript:alert(1)"));
        assert!(!is_safe_url("data:text/html,hi"));
    }
}

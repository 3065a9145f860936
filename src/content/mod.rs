//! Content module - posts, rich text, reading time and listing pagination

pub mod pagination;
mod post;
pub mod reading_time;
mod richtext;

pub use pagination::{ListingSession, LoadMore, PageSource, PaginationState, PostPage};
pub use post::{ContentSection, PostDetail, PostSummary};
pub use reading_time::estimate_reading_time;
pub use richtext::{
    Block, EmbedBlock, ImageBlock, MarkupPolicy, OEmbed, RichText, Span, SpanData, TextBlock,
};

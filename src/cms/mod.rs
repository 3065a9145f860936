//! Headless CMS access: client, predicates and response schemas

mod client;
pub mod predicate;
mod schema;

pub use client::{CmsClient, QueryOptions};
pub use predicate::Predicate;

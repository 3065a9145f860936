//! Query predicates understood by the content API

use std::fmt;

/// A single search predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Exact match on a field path, e.g. `document.type` or `my.posts.uid`
    At { path: String, value: String },
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::At {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Filter on the document's custom type
    pub fn document_type(document_type: &str) -> Self {
        Self::at("document.type", document_type)
    }

    /// Filter on the UID field of a custom type
    pub fn uid(document_type: &str, uid: &str) -> Self {
        Self::at(format!("my.{}.uid", document_type), uid)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::At { path, value } => {
                let value = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "[at({},\"{}\")]", path, value)
            }
        }
    }
}

/// The `q` parameter for a set of predicates, all of which must hold
pub fn query_string(predicates: &[Predicate]) -> String {
    let inner: String = predicates.iter().map(Predicate::to_string).collect();
    format!("[{}]", inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_predicate() {
        assert_eq!(
            Predicate::document_type("posts").to_string(),
            r#"[at(document.type,"posts")]"#
        );
        assert_eq!(
            Predicate::uid("posts", "hello").to_string(),
            r#"[at(my.posts.uid,"hello")]"#
        );
    }

    #[test]
    fn test_values_are_quoted() {
        assert_eq!(
            Predicate::at("my.posts.uid", r#"a"b"#).to_string(),
            r#"[at(my.posts.uid,"a\"b")]"#
        );
    }

    #[test]
    fn test_query_string() {
        let q = query_string(&[
            Predicate::document_type("posts"),
            Predicate::uid("posts", "x"),
        ]);
        assert_eq!(q, r#"[[at(document.type,"posts")][at(my.posts.uid,"x")]]"#);
        assert_eq!(query_string(&[]), "[]");
    }
}

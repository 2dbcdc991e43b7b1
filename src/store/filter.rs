use serde_json::Value;

/// A predicate over the records of a collection.
///
/// Field paths use `.` to reach into nested objects. Equality against an array
/// field matches when any element equals the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// Full-text match against the collection's text index.
    Text(String),
}

impl Filter {
    /// Matches every record.
    #[must_use]
    pub fn all() -> Self {
        Filter::And(Vec::new())
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    #[must_use]
    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn text(query: impl Into<String>) -> Self {
        Filter::Text(query.into())
    }

    #[must_use]
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    #[must_use]
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Collects the query strings of every `Text` leaf in the tree.
    pub(crate) fn text_queries(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Text(q) => out.push(q),
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_text(out);
                }
            }
            Filter::Eq(..) | Filter::Ne(..) | Filter::In(..) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sort {
    Asc(String),
    Desc(String),
    /// Full-text relevance, best match first. Requires a `Text` filter.
    TextScore,
}

impl Sort {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Sort::Asc(field.into())
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Sort::Desc(field.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Ascending,
    Descending,
    Text,
}

impl IndexKind {
    fn suffix(self) -> &'static str {
        match self {
            IndexKind::Ascending => "1",
            IndexKind::Descending => "-1",
            IndexKind::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub kind: IndexKind,
}

impl IndexKey {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IndexKind::Ascending,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IndexKind::Descending,
        }
    }

    #[must_use]
    pub fn text(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IndexKind::Text,
        }
    }
}

/// Derives the conventional index name, e.g. `owner_id_1_name_1`.
#[must_use]
pub fn index_name(keys: &[IndexKey]) -> String {
    keys.iter()
        .map(|k| format!("{}_{}", k.field, k.kind.suffix()))
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name() {
        assert_eq!(index_name(&[IndexKey::asc("username")]), "username_1");
        assert_eq!(
            index_name(&[IndexKey::asc("index_id"), IndexKey::desc("created_at")]),
            "index_id_1_created_at_-1"
        );
        assert_eq!(
            index_name(&[IndexKey::text("content"), IndexKey::text("keywords")]),
            "content_text_keywords_text"
        );
    }

    #[test]
    fn test_text_queries_found_in_nested_tree() {
        let filter = Filter::and([
            Filter::eq("index_id", "i-1"),
            Filter::or([
                Filter::text("meeting notes"),
                Filter::is_in("keywords", ["meeting"]),
            ]),
        ]);
        assert_eq!(filter.text_queries(), vec!["meeting notes"]);
        assert!(Filter::all().text_queries().is_empty());
    }
}

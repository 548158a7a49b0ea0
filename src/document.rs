use std::{fmt, sync::Arc};

use serde_json::{Map, Value};

/// Variables supplied alongside a query document.
pub type Variables = Map<String, Value>;

/// A query document as written by the caller.
///
/// No parsing of the document happens here; the source is only
/// normalized by collapsing whitespace so that two documents that differ
/// in formatting alone resolve to the same [`QueryKey`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct QueryDocument {
    source: Arc<str>,
    normalized: Arc<str>,
}

/// Build a [`QueryDocument`] from its source text.
pub fn gql(source: &str) -> QueryDocument {
    QueryDocument::new(source)
}

impl QueryDocument {
    pub fn new(source: &str) -> Self {
        let normalized = source.split_whitespace().collect::<Vec<_>>().join(" ");
        Self {
            source: source.into(),
            normalized: normalized.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl fmt::Debug for QueryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QueryDocument").field(&self.normalized).finish()
    }
}

/// Identifies one query document with one set of variables.
///
/// Cache entries, in-flight requests and the observables shared during a
/// prerender are all keyed by this.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Arc<str>);

impl QueryKey {
    pub fn new(document: &QueryDocument, variables: &Variables) -> Self {
        // serde_json's default map is ordered, so this form is canonical.
        let variables = Value::Object(variables.clone()).to_string();
        Self(format!("{}{}", document.normalized(), variables).into())
    }

    pub(crate) fn from_raw(raw: String) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document paired with the variables it should be executed with, as
/// handed to a [`Link`](crate::link::Link).
#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub document: QueryDocument,
    pub variables: Variables,
}

impl Operation {
    pub fn new(document: QueryDocument, variables: Variables) -> Self {
        Self {
            document,
            variables,
        }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::new(&self.document, &self.variables)
    }
}

use serde::{Serialize, Serializer};
use thiserror::Error;

/// The error delivered to an observation when its request fails.
///
/// This is cloned into every snapshot that reports it, so it only carries
/// rendered messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("GraphQL errors: {}", .0.join("; "))]
    GraphQL(Vec<String>),

    #[error("No more mocked responses for the query: {0}")]
    NoMockedResponse(String),

    #[error("Request task ended before delivering a response")]
    Cancelled,
}

impl Serialize for QueryError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Errors surfaced to the caller of a prerender.
#[cfg(feature = "ssr")]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrerenderError {
    #[error(
        "Exceeded the maximum of {max_rerenders} re-renders with {pending} queries still \
         pending; this usually means queries keep registering new queries"
    )]
    MaxRerendersExceeded { max_rerenders: usize, pending: usize },
}

/// Crate level errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("No QueryClient was provided as a context")]
    MissingClient,
}

pub type Result<T> = std::result::Result<T, Error>;

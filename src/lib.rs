//! This crate provides a query observation client for the Leptos framework
//! whose results stay identical between server-side rendering (SSR) and
//! the hydrating client render.  This is achieved by deciding, on every
//! render, whether a query should execute at all, and separately whether
//! an ongoing prerender should wait for it, such that the snapshot a
//! component renders on the server is the very same one it renders on the
//! client when hydration happens.
//!
//! ## Use case
//!
//! A component reading a query renders its `loading`, `data` and
//! `networkStatus`.  On the server, the prerender renders the view tree,
//! waits for the queries that were started, and renders again with their
//! results, so that the markup sent out contains the data.  Queries may
//! however opt out: `ssr: false` keeps a query off the server entirely and
//! `skip: true` prevents it from executing anywhere.  Should either of
//! those produce a snapshot on the server that differs from the one the
//! client computes during hydration, even for a single render, the
//! rendered markup will not match and hydration fails.
//!
//! The rules here are that `skip` dominates `ssr`: a skipped query is
//! always ready without having fetched, no matter the value of `ssr`, and
//! is never waited for.  A query that only has `ssr: false` is left idle
//! on the server, reporting the same loading snapshot that the client will
//! report on the render where it starts its request.
//!
//! Within a component, [`use_query`] keeps the observation for as long as
//! the component's reactive owner lives and hands back its snapshot as a
//! signal, which the view tracks to follow responses as they arrive.
//!
//! # Example
//!
//! ```
//! use leptos_query_ssr::{
//!     gql, prerender_static, MockLink, MockedResponse, PrerenderOptions, QueryClient,
//!     QueryHook, QueryOptions,
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let query = gql("{ hello }");
//! let client = QueryClient::new(MockLink::new([MockedResponse::new(
//!     query.clone(),
//!     serde_json::json!({ "hello": "world" }),
//! )]));
//!
//! let options = QueryOptions::new(query).ssr(false).skip(true);
//! let result = prerender_static(&client, PrerenderOptions::default(), || {
//!     // This would be the component; it is rebuilt on every pass.
//!     let mut hook = QueryHook::from_context().expect("client is provided");
//!     let result = hook.observe(&options);
//!     format!("loading={} status={}", result.loading, result.network_status.code())
//! })
//! .await
//! .expect("prerender settles");
//!
//! assert_eq!(result.markup, "loading=false status=7");
//! assert_eq!(result.render_count, 1);
//! assert!(client.extract().is_empty());
//! # });
//! ```
//!
//! # Feature Flags
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]

mod cache;
mod client;
mod document;
mod error;
mod hook;
pub mod link;
pub mod observable;
mod options;
#[cfg(feature = "ssr")]
pub mod prerender;
mod result;
mod status;

#[cfg(test)]
mod tests;

pub use cache::InMemoryCache;
pub use client::QueryClient;
pub use document::{gql, Operation, QueryDocument, QueryKey, Variables};
#[cfg(feature = "ssr")]
pub use error::PrerenderError;
pub use error::{Error, QueryError, Result};
pub use hook::{use_query, QueryHook};
pub use link::{Link, MockLink, MockedResponse};
pub use observable::{ObservableQuery, ObservableState, ReadyOrigin};
pub use options::{normalize, FetchPolicy, NormalizedOptions, QueryOptions};
#[cfg(feature = "ssr")]
pub use prerender::{prerender_static, PrerenderDriver, PrerenderOptions, PrerenderResult};
pub use result::QueryResult;
pub use status::NetworkStatus;

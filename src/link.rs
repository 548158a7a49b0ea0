//! The transport used by a [`QueryClient`](crate::QueryClient) to resolve
//! operations, plus a mocked implementation for tests and demos.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::{
    document::{Operation, QueryDocument, Variables},
    error::QueryError,
};

/// Resolves an operation to the `data` of its response.
///
/// Retrying, batching and the like are the business of the implementor;
/// whatever is returned is delivered to the observers as-is.
pub trait Link: Send + Sync + 'static {
    fn request(&self, operation: Operation) -> BoxFuture<'static, Result<Value, QueryError>>;
}

impl<L: Link> Link for Arc<L> {
    fn request(&self, operation: Operation) -> BoxFuture<'static, Result<Value, QueryError>> {
        (**self).request(operation)
    }
}

/// A canned response for [`MockLink`].
///
/// A `delay` is only honoured with the `ssr` feature enabled.
#[derive(Clone, Debug)]
pub struct MockedResponse {
    pub request: Operation,
    pub result: Result<Value, QueryError>,
    pub delay: Option<Duration>,
}

impl MockedResponse {
    pub fn new(query: QueryDocument, data: Value) -> Self {
        Self {
            request: Operation::new(query, Variables::new()),
            result: Ok(data),
            delay: None,
        }
    }

    pub fn error(query: QueryDocument, error: QueryError) -> Self {
        Self {
            request: Operation::new(query, Variables::new()),
            result: Err(error),
            delay: None,
        }
    }

    pub fn variables(mut self, variables: Variables) -> Self {
        self.request.variables = variables;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A [`Link`] answering from a list of [`MockedResponse`]s.
///
/// Every mocked response is consumed by the first request matching its
/// document and variables; a request with no remaining match fails with
/// [`QueryError::NoMockedResponse`].
#[derive(Debug, Default)]
pub struct MockLink {
    mocks: Mutex<Vec<MockedResponse>>,
    requests: AtomicUsize,
}

impl MockLink {
    pub fn new(mocks: impl IntoIterator<Item = MockedResponse>) -> Self {
        Self {
            mocks: Mutex::new(mocks.into_iter().collect()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of requests received so far, matched or not.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of mocked responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.mocks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Link for MockLink {
    fn request(&self, operation: Operation) -> BoxFuture<'static, Result<Value, QueryError>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let key = operation.key();
        let mocked = {
            let mut mocks = self.mocks.lock().unwrap_or_else(PoisonError::into_inner);
            mocks
                .iter()
                .position(|mock| mock.request.key() == key)
                .map(|index| mocks.remove(index))
        };
        async move {
            let Some(mocked) = mocked else {
                tracing::warn!(%key, "no mocked response left");
                return Err(QueryError::NoMockedResponse(key.to_string()));
            };
            // delays need the timer that comes with the `ssr` feature
            #[cfg(feature = "ssr")]
            if let Some(delay) = mocked.delay {
                tokio::time::sleep(delay).await;
            }
            mocked.result
        }
        .boxed()
    }
}

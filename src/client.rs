use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use futures::{
    channel::oneshot,
    future::{BoxFuture, FutureExt, Shared},
};
use leptos::{
    prelude::{provide_context, use_context},
    task::spawn,
};
use serde_json::{Map, Value};

use crate::{
    cache::InMemoryCache,
    document::{Operation, QueryKey},
    error::QueryError,
    link::Link,
    options::FetchPolicy,
};

pub(crate) type Outcome = Result<Value, QueryError>;

/// Resolves to the outcome of one request, for as many observers as have
/// joined it.
pub(crate) type Delivery = Shared<BoxFuture<'static, Outcome>>;

/// Owns the cache and the link shared by every observation made through
/// it.
///
/// Typically a client is made available to the view tree with
/// [`QueryClient::provide`], which is what
/// [`QueryHook::from_context`](crate::QueryHook::from_context) and the
/// prerender driver look up.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<QueryClientInner>,
}

struct QueryClientInner {
    cache: InMemoryCache,
    link: Arc<dyn Link>,
    in_flight: Mutex<HashMap<QueryKey, Delivery>>,
}

impl QueryClient {
    pub fn new(link: impl Link) -> Self {
        Self::with_cache(InMemoryCache::new(), link)
    }

    pub fn with_cache(cache: InMemoryCache, link: impl Link) -> Self {
        Self {
            inner: Arc::new(QueryClientInner {
                cache,
                link: Arc::new(link),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Provide this client as a context to the current reactive owner.
    pub fn provide(&self) {
        provide_context(self.clone());
    }

    /// Acquire the client provided as a context, if any.
    pub fn from_context() -> Option<Self> {
        use_context::<Self>()
    }

    pub fn cache(&self) -> &InMemoryCache {
        &self.inner.cache
    }

    /// Serialize the cache, e.g. to embed the server state in a response.
    pub fn extract(&self) -> Map<String, Value> {
        self.inner.cache.extract()
    }

    /// Seed the cache with state extracted from another client.
    pub fn restore(&self, state: Map<String, Value>) {
        self.inner.cache.restore(state)
    }

    /// Number of requests currently in flight through this client.
    pub fn in_flight(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(feature = "ssr")]
    pub(crate) fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Dispatch `operation`, joining an identical request already in
    /// flight when the response would be cached anyway.
    ///
    /// The request runs as its own task and writes the cache on success
    /// whether or not anyone is still listening for its outcome.
    pub(crate) fn request(&self, operation: Operation, fetch_policy: FetchPolicy) -> Delivery {
        let key = operation.key();
        let writes_cache = fetch_policy.writes_cache();
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if writes_cache {
            if let Some(delivery) = in_flight.get(&key) {
                tracing::debug!(%key, "joining request already in flight");
                return delivery.clone();
            }
        }

        let (sender, receiver) = oneshot::channel();
        let delivery = receiver
            .map(|outcome| outcome.unwrap_or(Err(QueryError::Cancelled)))
            .boxed()
            .shared();
        let joinable = writes_cache.then(|| {
            in_flight.insert(key.clone(), delivery.clone());
            InFlight {
                client: self.clone(),
                key: key.clone(),
            }
        });
        drop(in_flight);

        tracing::debug!(%key, ?fetch_policy, "dispatching request");
        let request = self.inner.link.request(operation);
        let cache = self.clone();
        spawn(async move {
            let outcome = request.await;
            if writes_cache {
                if let Ok(data) = &outcome {
                    cache.inner.cache.write(key.clone(), data.clone());
                }
            }
            drop(joinable);
            if let Err(error) = &outcome {
                tracing::debug!(%key, %error, "request failed");
            }
            let _ = sender.send(outcome);
        });
        delivery
    }
}

/// Keeps a request joinable for as long as its task is alive, including
/// when the task ends by unwinding.
struct InFlight {
    client: QueryClient,
    key: QueryKey,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.client
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("cache", &self.inner.cache)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

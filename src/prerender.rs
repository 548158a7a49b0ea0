//! Server-side prerendering that waits for the queries a view tree needs.
//!
//! The tree is rendered repeatedly.  Every pass collects the observations
//! that started a request during it, waits for all of them to settle, and
//! renders again, until a pass completes without registering anything.
//! The markup from that final pass is then the result.
//!
//! Observations marked `skip` or `ssr: false` never register, so a tree
//! made up only of those completes in a single pass and produces the same
//! snapshot that the client computes on its first render.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::future::{join_all, BoxFuture};
use leptos::prelude::{provide_context, use_context, Owner};

use crate::{
    client::QueryClient,
    document::QueryKey,
    error::PrerenderError,
    observable::{ObservableQuery, ObservableState, QueryId},
    options::QueryOptions,
};

/// Configuration for [`prerender_static`].
#[derive(Clone, Debug)]
pub struct PrerenderOptions {
    /// How many passes may follow the first one before giving up.
    pub max_rerenders: usize,
}

impl Default for PrerenderOptions {
    fn default() -> Self {
        Self { max_rerenders: 50 }
    }
}

impl PrerenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_rerenders(mut self, max_rerenders: usize) -> Self {
        self.max_rerenders = max_rerenders;
        self
    }
}

/// The outcome of a completed prerender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrerenderResult {
    /// Markup produced by the final pass.
    pub markup: String,
    /// Registered queries that were waited on across all passes.
    pub resolved_query_count: usize,
    /// Failed queries among those; these render as errored.
    pub failed_query_count: usize,
    pub render_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverPhase {
    Rendering,
    Awaiting,
    Done,
}

/// An observation an ongoing prerender has to wait for.
pub struct PrerenderRegistration {
    pub query_id: QueryId,
    pub key: QueryKey,
    pub pending: BoxFuture<'static, ObservableState>,
}

impl fmt::Debug for PrerenderRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrerenderRegistration")
            .field("query_id", &self.query_id)
            .field("key", &self.key)
            .finish()
    }
}

/// Coordinates the passes of one prerender.
///
/// Provided as a context for the duration of [`prerender_static`], which
/// is how a [`QueryHook`](crate::QueryHook) knows it is rendering on the
/// server.  The driver also keeps the observations that take part in the
/// prerender, as the components holding them are rebuilt on every pass.
#[derive(Clone)]
pub struct PrerenderDriver {
    inner: Arc<DriverInner>,
}

struct DriverInner {
    phase: Mutex<DriverPhase>,
    observables: Mutex<HashMap<QueryKey, ObservableQuery>>,
    registrations: Mutex<Vec<PrerenderRegistration>>,
    registered: Mutex<HashSet<QueryId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PrerenderDriver {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(DriverInner {
                phase: Mutex::new(DriverPhase::Rendering),
                observables: Mutex::new(HashMap::new()),
                registrations: Mutex::new(Vec::new()),
                registered: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Acquire the driver of the prerender currently in progress, if any.
    pub fn handle() -> Option<Self> {
        use_context::<Self>()
    }

    pub fn phase(&self) -> DriverPhase {
        *lock(&self.inner.phase)
    }

    fn set_phase(&self, phase: DriverPhase) {
        *lock(&self.inner.phase) = phase;
    }

    /// The observation shared by every component observing `options` over
    /// the course of this prerender.
    pub(crate) fn observable_for(
        &self,
        client: &QueryClient,
        options: &QueryOptions,
    ) -> ObservableQuery {
        lock(&self.inner.observables)
            .entry(options.key())
            .and_modify(|observable| {
                if !observable.client().is_same(client) {
                    *observable = ObservableQuery::new(client.clone(), options.clone());
                }
            })
            .or_insert_with(|| ObservableQuery::new(client.clone(), options.clone()))
            .clone()
    }

    /// Have the current pass wait for `observable` to settle.
    ///
    /// Registering the same observation more than once in a pass has no
    /// further effect.
    pub fn register(&self, observable: &ObservableQuery) {
        if !lock(&self.inner.registered).insert(observable.id()) {
            return;
        }
        tracing::trace!(id = observable.id(), key = %observable.key(), "registered with prerender");
        lock(&self.inner.registrations).push(PrerenderRegistration {
            query_id: observable.id(),
            key: observable.key().clone(),
            pending: observable.pending(),
        });
    }

    pub(crate) fn take_registrations(&self) -> Vec<PrerenderRegistration> {
        lock(&self.inner.registered).clear();
        std::mem::take(&mut *lock(&self.inner.registrations))
    }
}

impl fmt::Debug for PrerenderDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrerenderDriver")
            .field("phase", &self.phase())
            .field("observables", &lock(&self.inner.observables).len())
            .field("registrations", &lock(&self.inner.registrations).len())
            .finish()
    }
}

/// Render `render` until every query it observes has settled.
///
/// `render` is called within a reactive owner that has `client` and a
/// fresh [`PrerenderDriver`] provided as contexts; it is expected to build
/// the view tree anew and return its markup, e.g. through
/// `view! { <App/> }.to_html()`.  A panic raised by it is not
/// caught.
pub async fn prerender_static<F>(
    client: &QueryClient,
    options: PrerenderOptions,
    mut render: F,
) -> Result<PrerenderResult, PrerenderError>
where
    F: FnMut() -> String,
{
    let driver = PrerenderDriver::new();
    let owner = Owner::new();
    owner.with(|| {
        client.provide();
        provide_context(driver.clone());
    });

    let mut render_count = 0;
    let mut resolved_query_count = 0;
    let mut failed_query_count = 0;
    loop {
        driver.set_phase(DriverPhase::Rendering);
        // every pass mounts a fresh tree; the previous one is unmounted
        let pass = owner.child();
        let markup = pass.with(&mut render);
        pass.cleanup();
        render_count += 1;

        let registrations = driver.take_registrations();
        tracing::debug!(
            render_count,
            registered = registrations.len(),
            "prerender pass complete"
        );
        if registrations.is_empty() {
            driver.set_phase(DriverPhase::Done);
            return Ok(PrerenderResult {
                markup,
                resolved_query_count,
                failed_query_count,
                render_count,
            });
        }
        if render_count > options.max_rerenders {
            driver.set_phase(DriverPhase::Done);
            tracing::warn!(
                max_rerenders = options.max_rerenders,
                pending = registrations.len(),
                "prerender did not settle"
            );
            return Err(PrerenderError::MaxRerendersExceeded {
                max_rerenders: options.max_rerenders,
                pending: registrations.len(),
            });
        }

        driver.set_phase(DriverPhase::Awaiting);
        let settled = join_all(registrations.into_iter().map(|registration| registration.pending)).await;
        for state in settled {
            resolved_query_count += 1;
            if let ObservableState::Errored { error, .. } = state {
                tracing::debug!(%error, "query failed during prerender");
                failed_query_count += 1;
            }
        }
    }
}

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use futures::{
    channel::oneshot,
    future::{ready, AbortHandle, Abortable, BoxFuture, FutureExt},
};
use leptos::{
    prelude::{ArcReadSignal, ArcRwSignal, Set},
    task::spawn,
};
use serde_json::Value;

use crate::{
    client::{Outcome, QueryClient},
    document::{Operation, QueryKey},
    error::QueryError,
    options::{normalize, FetchPolicy, QueryOptions},
    result::QueryResult,
    status::NetworkStatus,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one observation for the lifetime of the process.
pub type QueryId = u64;

/// Why an observation is ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyOrigin {
    /// No request was made, either because the query is skipped or because
    /// the fetch policy forbids it.
    NoFetch,
    /// Served from the cache.
    Cache,
    /// Delivered by a request made by this observation.
    Network,
}

/// The state of one query observation.
#[derive(Clone, Debug, PartialEq)]
pub enum ObservableState {
    /// Nothing has been decided yet.
    Idle,
    Loading {
        data: Option<Value>,
        network_status: NetworkStatus,
    },
    Ready {
        data: Option<Value>,
        origin: ReadyOrigin,
    },
    Errored {
        error: QueryError,
        data: Option<Value>,
    },
    /// The owner of the observation went away.
    Terminated,
}

impl ObservableState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Loading { data, .. } | Self::Ready { data, .. } | Self::Errored { data, .. } => {
                data.as_ref()
            }
            Self::Idle | Self::Terminated => None,
        }
    }

    pub fn to_result(&self) -> QueryResult {
        match self {
            // An idle observation is one that is about to fetch, so it
            // reports exactly what the first fetching render will.
            Self::Idle => QueryResult::fetching(None, NetworkStatus::Loading),
            Self::Loading {
                data,
                network_status,
            } => QueryResult::fetching(data.clone(), *network_status),
            Self::Ready { data, .. } => QueryResult::ready(data.clone()),
            Self::Errored { error, data } => QueryResult::errored(error.clone(), data.clone()),
            Self::Terminated => QueryResult::ready(None),
        }
    }
}

/// Where the observation is being made from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExecutionMode {
    Client,
    #[cfg_attr(not(feature = "ssr"), allow(dead_code))]
    Prerender,
}

/// Tracks the state of one query across renders.
///
/// The observation is the only party that changes its own state; it does
/// so when options are reconciled on a render and when the response to
/// its request is delivered.  Every change is published as a
/// [`QueryResult`] through a reactive signal, see [`signal`](Self::signal),
/// and settles the [`pending`](Self::pending) futures handed out while it
/// was loading.
#[derive(Clone)]
pub struct ObservableQuery {
    inner: Arc<ObservableInner>,
}

struct ObservableInner {
    id: QueryId,
    key: QueryKey,
    client: QueryClient,
    initial_status: NetworkStatus,
    snapshot: ArcRwSignal<QueryResult>,
    control: Mutex<Control>,
}

struct Control {
    options: QueryOptions,
    state: ObservableState,
    skipped: bool,
    listener: Option<AbortHandle>,
    // bumped per request so a superseded listener cannot deliver
    generation: u64,
    waiters: Vec<oneshot::Sender<ObservableState>>,
}

impl ObservableQuery {
    pub fn new(client: QueryClient, options: QueryOptions) -> Self {
        Self::with_initial_status(client, options, NetworkStatus::Loading)
    }

    /// An observation replacing another one whose variables changed.
    pub(crate) fn for_new_variables(client: QueryClient, options: QueryOptions) -> Self {
        Self::with_initial_status(client, options, NetworkStatus::SetVariables)
    }

    fn with_initial_status(
        client: QueryClient,
        options: QueryOptions,
        initial_status: NetworkStatus,
    ) -> Self {
        let state = ObservableState::Idle;
        Self {
            inner: Arc::new(ObservableInner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                key: options.key(),
                client,
                initial_status,
                snapshot: ArcRwSignal::new(state.to_result()),
                control: Mutex::new(Control {
                    options,
                    state,
                    skipped: false,
                    listener: None,
                    generation: 0,
                    waiters: Vec::new(),
                }),
            }),
        }
    }

    pub fn id(&self) -> QueryId {
        self.inner.id
    }

    pub fn key(&self) -> &QueryKey {
        &self.inner.key
    }

    pub fn client(&self) -> &QueryClient {
        &self.inner.client
    }

    pub fn state(&self) -> ObservableState {
        self.control().state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.control().state.is_loading()
    }

    /// The snapshot of the current state.
    pub fn result(&self) -> QueryResult {
        self.control().state.to_result()
    }

    /// The snapshot as a signal, for views that track it.
    pub fn signal(&self) -> ArcReadSignal<QueryResult> {
        self.inner.snapshot.read_only()
    }

    /// A future resolving to the first state that is not loading.
    ///
    /// Should every handle to the observation be dropped before that, the
    /// future resolves to [`ObservableState::Terminated`].
    pub fn pending(&self) -> BoxFuture<'static, ObservableState> {
        let mut control = self.control();
        if !control.state.is_loading() {
            return ready(control.state.clone()).boxed();
        }
        let (sender, receiver) = oneshot::channel();
        control.waiters.push(sender);
        receiver
            .map(|settled| settled.unwrap_or(ObservableState::Terminated))
            .boxed()
    }

    /// Apply the options supplied by a render to this observation.
    pub fn reconcile(&self, options: &QueryOptions) {
        self.reconcile_in(options, ExecutionMode::Client)
    }

    pub(crate) fn reconcile_in(&self, options: &QueryOptions, mode: ExecutionMode) {
        let normalized = normalize(options);
        let mut control = self.control();
        control.options = options.clone();
        if matches!(control.state, ObservableState::Terminated) {
            return;
        }

        if normalized.is_skipped {
            if !control.skipped {
                self.skip(&mut control);
            }
            return;
        }
        if mode == ExecutionMode::Prerender && !normalized.participates_in_ssr {
            // Left idle; the client will execute it after hydration.
            return;
        }

        let resume = control.skipped;
        control.skipped = false;
        if resume || matches!(control.state, ObservableState::Idle) {
            self.start(&mut control, mode);
        }
    }

    /// Fetch again from the network, keeping the current data visible.
    pub fn refetch(&self) {
        let mut control = self.control();
        if control.skipped || matches!(control.state, ObservableState::Terminated) {
            return;
        }
        let data = control.state.data().cloned();
        self.fetch(&mut control, FetchPolicy::NetworkOnly, data, NetworkStatus::Refetch);
    }

    /// Stop observing.  The request in flight, if any, is left to complete
    /// for the benefit of other observers but no longer affects this one.
    pub fn terminate(&self) {
        let mut control = self.control();
        if let Some(listener) = control.listener.take() {
            listener.abort();
        }
        tracing::debug!(id = self.inner.id, key = %self.inner.key, "observation terminated");
        self.transition(&mut control, ObservableState::Terminated);
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.inner
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, control: &mut Control, next: ObservableState) {
        self.inner.snapshot.set(next.to_result());
        if !next.is_loading() {
            for waiter in control.waiters.drain(..) {
                let _ = waiter.send(next.clone());
            }
        }
        control.state = next;
    }

    fn skip(&self, control: &mut Control) {
        if let Some(listener) = control.listener.take() {
            listener.abort();
        }
        control.skipped = true;
        let data = control.state.data().cloned();
        tracing::debug!(id = self.inner.id, key = %self.inner.key, "observation skipped");
        self.transition(
            control,
            ObservableState::Ready {
                data,
                origin: ReadyOrigin::NoFetch,
            },
        );
    }

    fn start(&self, control: &mut Control, mode: ExecutionMode) {
        let fetch_policy = match mode {
            ExecutionMode::Client => control.options.fetch_policy,
            ExecutionMode::Prerender => control.options.fetch_policy.for_prerender(),
        };
        let cached = match fetch_policy {
            FetchPolicy::NetworkOnly | FetchPolicy::NoCache => None,
            _ => self.inner.client.cache().read(&self.inner.key),
        };
        let previous = control.state.data().cloned();
        let status = if previous.is_some() {
            NetworkStatus::Refetch
        } else {
            self.inner.initial_status
        };

        match (fetch_policy, cached) {
            (FetchPolicy::CacheFirst | FetchPolicy::CacheOnly, Some(data)) => {
                tracing::debug!(id = self.inner.id, key = %self.inner.key, "served from cache");
                self.transition(
                    control,
                    ObservableState::Ready {
                        data: Some(data),
                        origin: ReadyOrigin::Cache,
                    },
                );
            }
            (FetchPolicy::CacheOnly, None) => {
                self.transition(
                    control,
                    ObservableState::Ready {
                        data: previous,
                        origin: ReadyOrigin::NoFetch,
                    },
                );
            }
            (FetchPolicy::CacheAndNetwork, Some(data)) => {
                self.fetch(control, fetch_policy, Some(data), status);
            }
            (fetch_policy, _) => {
                self.fetch(control, fetch_policy, previous, status);
            }
        }
    }

    fn fetch(
        &self,
        control: &mut Control,
        fetch_policy: FetchPolicy,
        data: Option<Value>,
        network_status: NetworkStatus,
    ) {
        if let Some(listener) = control.listener.take() {
            listener.abort();
        }
        self.transition(
            control,
            ObservableState::Loading {
                data,
                network_status,
            },
        );

        let operation = Operation::new(
            control.options.query.clone(),
            control.options.variables.clone(),
        );
        let delivery = self.inner.client.request(operation, fetch_policy);
        control.generation += 1;
        let generation = control.generation;
        let (listener, registration) = AbortHandle::new_pair();
        control.listener = Some(listener);
        let this = self.clone();
        let listen = async move {
            let outcome = delivery.await;
            this.deliver(generation, outcome);
        };
        spawn(Abortable::new(listen, registration).map(|_| ()));
    }

    fn deliver(&self, generation: u64, outcome: Outcome) {
        let mut control = self.control();
        if control.generation != generation {
            return;
        }
        control.listener = None;
        if control.skipped || !control.state.is_loading() {
            return;
        }
        let next = match outcome {
            Ok(data) => ObservableState::Ready {
                data: Some(data),
                origin: ReadyOrigin::Network,
            },
            Err(error) => {
                tracing::debug!(id = self.inner.id, key = %self.inner.key, %error, "observation errored");
                ObservableState::Errored {
                    error,
                    data: control.state.data().cloned(),
                }
            }
        };
        self.transition(&mut control, next);
    }
}

impl fmt::Debug for ObservableQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableQuery")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("state", &self.control().state)
            .finish()
    }
}

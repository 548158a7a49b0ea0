use leptos::prelude::{on_cleanup, ArcReadSignal};

use crate::{
    client::QueryClient,
    error::{Error, Result},
    observable::ObservableQuery,
    options::QueryOptions,
    result::QueryResult,
};

#[cfg(feature = "ssr")]
use crate::{
    observable::ExecutionMode,
    options::{normalize, NormalizedOptions},
    prerender::PrerenderDriver,
};

/// The per-component entry point for observing a query.
///
/// A component keeps one `QueryHook` for as long as it is mounted and
/// calls [`observe`](Self::observe) on every render.  Dropping the hook is
/// what unmounting the component means to the observation it holds.
///
/// Under SSR, when a [`PrerenderDriver`] is provided as a context, the
/// observation is instead shared through the driver so that it survives
/// the component being rebuilt on every prerender pass.
pub struct QueryHook {
    client: QueryClient,
    observable: Option<Held>,
}

struct Held {
    observable: ObservableQuery,
    // observations shared through a prerender outlive the hook
    owned: bool,
}

impl QueryHook {
    pub fn new(client: QueryClient) -> Self {
        Self {
            client,
            observable: None,
        }
    }

    /// Create a hook for the [`QueryClient`] provided as a context.
    ///
    /// This makes use of [`use_context`](leptos::prelude::use_context)
    /// underneath the hood, so this should be called at the component's
    /// top level.
    pub fn from_context() -> Result<Self> {
        QueryClient::from_context()
            .map(Self::new)
            .ok_or(Error::MissingClient)
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    /// The observation made by the most recent [`observe`](Self::observe).
    pub fn observable(&self) -> Option<&ObservableQuery> {
        self.observable.as_ref().map(|held| &held.observable)
    }

    /// The snapshot of the most recent observation as a signal, for the
    /// view to track.  `None` until [`observe`](Self::observe) is called.
    pub fn signal(&self) -> Option<ArcReadSignal<QueryResult>> {
        self.observable
            .as_ref()
            .map(|held| held.observable.signal())
    }

    /// Observe the query described by `options` and return its snapshot.
    ///
    /// A snapshot is always returned; registering the observation with an
    /// ongoing prerender is only ever a side effect.
    pub fn observe(&mut self, options: &QueryOptions) -> QueryResult {
        self.attach(options).result()
    }

    fn attach(&mut self, options: &QueryOptions) -> &ObservableQuery {
        #[cfg(feature = "ssr")]
        if let Some(driver) = PrerenderDriver::handle() {
            return self.observe_prerender(&driver, options, normalize(options));
        }
        self.observe_client(options)
    }

    fn observe_client(&mut self, options: &QueryOptions) -> &ObservableQuery {
        let key = options.key();
        let observable = match self.observable.take() {
            Some(held) if held.owned && held.observable.key() == &key => held.observable,
            Some(previous) => {
                previous.release();
                ObservableQuery::for_new_variables(self.client.clone(), options.clone())
            }
            None => ObservableQuery::new(self.client.clone(), options.clone()),
        };
        observable.reconcile(options);
        self.hold(observable, true)
    }

    fn hold(&mut self, observable: ObservableQuery, owned: bool) -> &ObservableQuery {
        if let Some(previous) = self.observable.take() {
            previous.release();
        }
        &self.observable.insert(Held { observable, owned }).observable
    }

    #[cfg(feature = "ssr")]
    fn observe_prerender(
        &mut self,
        driver: &PrerenderDriver,
        options: &QueryOptions,
        normalized: NormalizedOptions,
    ) -> &ObservableQuery {
        if !normalized.participates_in_ssr {
            // Skipped and `ssr: false` observations never block the
            // prerender, and each pass computes them afresh.
            let observable = ObservableQuery::new(self.client.clone(), options.clone());
            observable.reconcile_in(options, ExecutionMode::Prerender);
            return self.hold(observable, true);
        }

        let observable = driver.observable_for(&self.client, options);
        observable.reconcile_in(options, ExecutionMode::Prerender);
        if observable.is_loading() {
            driver.register(&observable);
        }
        self.hold(observable, false)
    }
}

impl Held {
    fn release(self) {
        if self.owned {
            self.observable.terminate();
        }
    }
}

impl Drop for QueryHook {
    fn drop(&mut self) {
        if let Some(held) = self.observable.take() {
            held.release();
        }
    }
}

/// Observe the query described by `options` from within a component.
///
/// The hook is kept for as long as the current reactive owner lives and
/// is dropped, which unmounts the observation, when the owner is cleaned
/// up.  The returned signal follows the snapshot as responses arrive.
pub fn use_query(options: &QueryOptions) -> Result<ArcReadSignal<QueryResult>> {
    let mut hook = QueryHook::from_context()?;
    let signal = hook.attach(options).signal();
    on_cleanup(move || drop(hook));
    Ok(signal)
}

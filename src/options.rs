use crate::document::{QueryDocument, QueryKey, Variables};

/// How an observation consults the cache before (or instead of) the
/// network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FetchPolicy {
    /// Use cached data when present, otherwise fetch.
    #[default]
    CacheFirst,
    /// Show cached data when present and fetch regardless.
    CacheAndNetwork,
    /// Always fetch, writing the response to the cache.
    NetworkOnly,
    /// Never fetch.
    CacheOnly,
    /// Always fetch, never touching the cache.
    NoCache,
}

impl FetchPolicy {
    /// The policy used while prerendering.
    ///
    /// Policies that always go to the network would make every prerender
    /// pass issue a new request, so they fall back to reading the cache
    /// that the previous pass populated.
    pub fn for_prerender(self) -> Self {
        match self {
            Self::NetworkOnly | Self::CacheAndNetwork => Self::CacheFirst,
            other => other,
        }
    }

    pub(crate) fn writes_cache(self) -> bool {
        !matches!(self, Self::NoCache)
    }
}

/// Options for one query observation, supplied anew on every render.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOptions {
    pub query: QueryDocument,
    pub variables: Variables,
    /// Whether the query takes part in server-side rendering.
    pub ssr: bool,
    /// Whether the query should not be executed at all.
    pub skip: bool,
    pub fetch_policy: FetchPolicy,
}

impl QueryOptions {
    pub fn new(query: QueryDocument) -> Self {
        Self {
            query,
            variables: Variables::new(),
            ssr: true,
            skip: false,
            fetch_policy: FetchPolicy::default(),
        }
    }

    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn ssr(mut self, ssr: bool) -> Self {
        self.ssr = ssr;
        self
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn fetch_policy(mut self, fetch_policy: FetchPolicy) -> Self {
        self.fetch_policy = fetch_policy;
        self
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::new(&self.query, &self.variables)
    }
}

/// The two decisions derived from [`QueryOptions`] on every render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizedOptions {
    /// Whether an ongoing prerender waits for this query.
    pub participates_in_ssr: bool,
    /// Whether this query performs no execution at all.
    pub is_skipped: bool,
}

/// Resolve the effective SSR participation and skip state.
///
/// `skip` dominates `ssr`: a skipped query never participates in SSR, and
/// setting `ssr: false` on top of `skip: true` yields exactly the same
/// result as `skip: true` alone.
///
/// ```
/// use leptos_query_ssr::{gql, normalize, QueryOptions};
///
/// let query = gql("{ hello }");
/// let both = normalize(&QueryOptions::new(query.clone()).ssr(false).skip(true));
/// let skip = normalize(&QueryOptions::new(query).skip(true));
/// assert_eq!(both, skip);
/// assert!(!both.participates_in_ssr);
/// ```
pub fn normalize(options: &QueryOptions) -> NormalizedOptions {
    NormalizedOptions {
        participates_in_ssr: options.ssr && !options.skip,
        is_skipped: options.skip,
    }
}

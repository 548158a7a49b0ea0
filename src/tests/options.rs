use serde_json::json;

use super::hello;
use crate::{gql, normalize, FetchPolicy, NormalizedOptions, QueryKey, QueryOptions, Variables};

fn normalized(ssr: bool, skip: bool) -> NormalizedOptions {
    normalize(&QueryOptions::new(hello()).ssr(ssr).skip(skip))
}

#[test]
fn defaults_participate() {
    let options = QueryOptions::new(hello());
    assert!(options.ssr);
    assert!(!options.skip);
    assert_eq!(options.fetch_policy, FetchPolicy::CacheFirst);
    assert_eq!(
        normalize(&options),
        NormalizedOptions {
            participates_in_ssr: true,
            is_skipped: false,
        }
    );
}

#[test]
fn truth_table() {
    assert_eq!(normalized(true, false), NormalizedOptions { participates_in_ssr: true, is_skipped: false });
    assert_eq!(normalized(false, false), NormalizedOptions { participates_in_ssr: false, is_skipped: false });
    assert_eq!(normalized(true, true), NormalizedOptions { participates_in_ssr: false, is_skipped: true });
    assert_eq!(normalized(false, true), NormalizedOptions { participates_in_ssr: false, is_skipped: true });
}

#[test]
fn ssr_false_adds_nothing_to_skip() {
    let skip_only = normalize(&QueryOptions::new(hello()).skip(true));
    let both = normalize(&QueryOptions::new(hello()).ssr(false).skip(true));
    assert_eq!(skip_only, both);
}

#[test]
fn prerender_fetch_policy() {
    assert_eq!(FetchPolicy::NetworkOnly.for_prerender(), FetchPolicy::CacheFirst);
    assert_eq!(FetchPolicy::CacheAndNetwork.for_prerender(), FetchPolicy::CacheFirst);
    assert_eq!(FetchPolicy::CacheFirst.for_prerender(), FetchPolicy::CacheFirst);
    assert_eq!(FetchPolicy::CacheOnly.for_prerender(), FetchPolicy::CacheOnly);
    assert_eq!(FetchPolicy::NoCache.for_prerender(), FetchPolicy::NoCache);
}

#[test]
fn key_ignores_formatting() {
    let compact = gql("{ hello }");
    let spread = gql("{\n    hello\n}\n");
    assert_eq!(
        QueryKey::new(&compact, &Variables::new()),
        QueryKey::new(&spread, &Variables::new()),
    );
}

#[test]
fn key_distinguishes_variables() {
    let query = gql("query Greet($name: String) { greet(name: $name) }");
    let first = QueryOptions::new(query.clone())
        .variables(json!({ "name": "a" }).as_object().cloned().unwrap_or_default());
    let second = QueryOptions::new(query)
        .variables(json!({ "name": "b" }).as_object().cloned().unwrap_or_default());
    assert_ne!(first.key(), second.key());
    assert_eq!(first.key(), first.clone().skip(true).ssr(false).key());
}

use std::time::Duration;

use leptos::prelude::provide_context;
use serde_json::json;
use tokio::time::timeout;

use super::{hello, hello_world, mocked_client, set_reactive_owner, slow_hello_world};
use crate::{
    prerender::DriverPhase, Error, ObservableState, PrerenderDriver, QueryHook, QueryOptions,
};

#[test]
fn without_context_no_driver() {
    assert!(PrerenderDriver::handle().is_none());
}

#[test]
fn hook_requires_client() {
    let _owner = set_reactive_owner();
    assert_eq!(QueryHook::from_context().err(), Some(Error::MissingClient));
}

#[tokio::test]
async fn driver_shares_observables_by_key() {
    let (client, _link) = mocked_client([slow_hello_world()]);
    let driver = PrerenderDriver::new();
    let options = QueryOptions::new(hello());

    let first = driver.observable_for(&client, &options);
    let second = driver.observable_for(&client, &options.clone().ssr(false));
    assert_eq!(first.id(), second.id());

    let (other_client, _link) = mocked_client([]);
    let third = driver.observable_for(&other_client, &options);
    assert_ne!(first.id(), third.id());
}

#[tokio::test]
async fn registration_once_per_pass() -> anyhow::Result<()> {
    let (client, _link) = mocked_client([slow_hello_world()]);
    let driver = PrerenderDriver::new();
    let options = QueryOptions::new(hello());
    let observable = driver.observable_for(&client, &options);
    observable.reconcile(&options);

    driver.register(&observable);
    driver.register(&observable);
    let registrations = driver.take_registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].query_id, observable.id());
    assert!(driver.take_registrations().is_empty());

    let settled = timeout(
        Duration::from_millis(500),
        registrations
            .into_iter()
            .next()
            .map(|registration| registration.pending)
            .ok_or_else(|| anyhow::anyhow!("registration missing"))?,
    )
    .await?;
    assert_eq!(settled.data(), Some(&json!({ "hello": "world" })));
    Ok(())
}

#[tokio::test]
async fn hook_registers_participating_queries_only() {
    let (client, link) = mocked_client([hello_world()]);
    let _owner = set_reactive_owner();
    let driver = PrerenderDriver::new();
    provide_context(driver.clone());
    client.provide();
    assert_eq!(driver.phase(), DriverPhase::Rendering);

    let mut hook = QueryHook::from_context().expect("client was provided");
    let skipped = hook.observe(&QueryOptions::new(hello()).skip(true));
    assert!(!skipped.loading);
    let disabled = hook.observe(&QueryOptions::new(hello()).ssr(false));
    assert!(disabled.loading);
    assert!(driver.take_registrations().is_empty());
    assert_eq!(link.request_count(), 0);

    let participating = hook.observe(&QueryOptions::new(hello()));
    assert!(participating.loading);
    let registrations = driver.take_registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(link.request_count(), 1);
    for registration in registrations {
        assert!(matches!(
            registration.pending.await,
            ObservableState::Ready { .. }
        ));
    }
}

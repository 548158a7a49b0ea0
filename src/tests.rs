use std::{sync::Arc, time::Duration};

use reactive_graph::owner::Owner;
use serde_json::json;

use crate::{gql, MockLink, MockedResponse, QueryClient, QueryDocument};

pub(crate) fn set_reactive_owner() -> Owner {
    let owner = Owner::new();
    owner.set();
    owner
}

pub(crate) fn hello() -> QueryDocument {
    gql("{ hello }")
}

pub(crate) fn mocked_client(
    mocks: impl IntoIterator<Item = MockedResponse>,
) -> (QueryClient, Arc<MockLink>) {
    let _ = any_spawner::Executor::init_tokio();
    let link = Arc::new(MockLink::new(mocks));
    (QueryClient::new(link.clone()), link)
}

pub(crate) fn hello_world() -> MockedResponse {
    MockedResponse::new(hello(), json!({ "hello": "world" }))
}

pub(crate) fn slow_hello_world() -> MockedResponse {
    hello_world().delay(Duration::from_millis(50))
}

pub(crate) async fn settle_requests(client: &QueryClient) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while client.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("requests should have settled");
}

mod options;
#[cfg(feature = "ssr")]
mod prerender;

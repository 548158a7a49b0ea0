use serde::Serialize;
use serde_json::Value;

use crate::{error::QueryError, status::NetworkStatus};

/// The snapshot of a query observation handed back to a render.
///
/// Its field set is the same on the server and on the client; only the
/// values differ between the two.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,
    pub network_status: NetworkStatus,
}

impl QueryResult {
    pub(crate) fn fetching(data: Option<Value>, network_status: NetworkStatus) -> Self {
        Self {
            loading: true,
            data,
            error: None,
            network_status,
        }
    }

    pub(crate) fn ready(data: Option<Value>) -> Self {
        Self {
            loading: false,
            data,
            error: None,
            network_status: NetworkStatus::Ready,
        }
    }

    pub(crate) fn errored(error: QueryError, data: Option<Value>) -> Self {
        Self {
            loading: false,
            data,
            error: Some(error),
            network_status: NetworkStatus::Error,
        }
    }
}

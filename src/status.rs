use serde::{Serialize, Serializer};

/// Summarizes the lifecycle phase of a query observation.
///
/// The numeric codes are stable and are what ends up in serialized
/// snapshots (and therefore in server rendered markup), so they must never
/// be renumbered.  [`NetworkStatus::Ready`] doubles as the "ready, and no
/// fetch was ever initiated" code reported for skipped queries; whether a
/// ready observation did fetch is tracked by the observable itself through
/// [`ReadyOrigin`](crate::observable::ReadyOrigin).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NetworkStatus {
    /// The first request for this observation is in flight.
    Loading = 1,
    /// The variables changed and the request for the new ones is in flight.
    SetVariables = 2,
    /// A request is in flight while previously delivered data is shown.
    Refetch = 4,
    /// No request is in flight.
    Ready = 7,
    /// The last request failed.
    Error = 8,
}

impl NetworkStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether a request is in flight.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Loading | Self::SetVariables | Self::Refetch)
    }
}

impl Serialize for NetworkStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

//! Traits describing provider capabilities and shared error types.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{AddressMatch, AddressQuery, CollectionSchedule, LocationId};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to provider backends.
pub enum PortError {
    /// Network layer failed, or the server answered with a non-success status.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Response body was not the JSON shape the provider expects.
    #[error("Malformed response: {0}")]
    Decode(String),
    /// Upstream answered but reported that it has no schedule for the id.
    #[error("Upstream reported no schedule for this location")]
    UpstreamRejected,
    /// Successful envelope without the schedule fragment.
    #[error("Schedule response carried no content")]
    MissingContent,
}

#[async_trait]
/// Resolves free-text addresses to a location the council knows.
pub trait AddressPort: Send + Sync {
    /// Resolve `query` to the top-ranked match.
    ///
    /// `Ok(None)` means the search succeeded but matched nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or the response is malformed.
    async fn resolve(&self, query: &AddressQuery) -> Result<Option<AddressMatch>, PortError>;
}

#[async_trait]
/// Fetches and extracts the collection schedule for a resolved location.
pub trait SchedulePort: Send + Sync {
    /// Fetch the next collection for every category offered at `location`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails, the response is malformed,
    /// or the council reports no schedule for the location.
    async fn schedule(&self, location: &LocationId) -> Result<CollectionSchedule, PortError>;
}

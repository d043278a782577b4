//! High-level service facade running the address-to-schedule pipeline.

use std::sync::Arc;

use crate::dates::{Clock, SystemClock};
use crate::model::{AddressMatch, AddressQuery, CouncilMeta, ScheduleSnapshot};
use crate::plugin::CouncilPlugin;
use crate::ports::PortError;
use crate::session::AddressSession;

#[derive(thiserror::Error, Debug)]
/// Failures of a whole pipeline run.
pub enum PipelineError {
    /// The search succeeded but nothing matched the address.
    #[error("No such address: {query}")]
    AddressNotFound {
        /// Address text that was searched for.
        query: String,
    },
    /// Talking to the address search failed.
    #[error("Address search failed: {0}")]
    Resolution(#[source] PortError),
    /// Fetching or decoding the schedule failed.
    #[error("Schedule lookup failed: {0}")]
    Extraction(#[source] PortError),
}

/// Public entry point for resolving addresses and loading their schedules.
pub struct BindayService {
    plugin: CouncilPlugin,
    clock: Arc<dyn Clock>,
}

impl BindayService {
    /// Create a service bound to `plugin`, reading time from the system clock.
    #[must_use]
    pub fn new(plugin: CouncilPlugin) -> Self {
        Self::with_clock(plugin, Arc::new(SystemClock))
    }

    /// Create a service with an explicit clock.
    #[must_use]
    pub fn with_clock(plugin: CouncilPlugin, clock: Arc<dyn Clock>) -> Self {
        Self { plugin, clock }
    }

    /// Council served by this service.
    #[must_use]
    pub fn council(&self) -> &CouncilMeta {
        &self.plugin.meta
    }

    /// Clock used for timestamps and day counts.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Resolve an address to its top-ranked match.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AddressNotFound`] when nothing matches and
    /// [`PipelineError::Resolution`] when the search itself fails.
    pub async fn resolve(&self, query: &AddressQuery) -> Result<AddressMatch, PipelineError> {
        let resolved = self
            .plugin
            .address_port
            .resolve(query)
            .await
            .map_err(PipelineError::Resolution)?;

        let Some(address) = resolved else {
            return Err(PipelineError::AddressNotFound {
                query: query.as_str().to_owned(),
            });
        };

        tracing::info!(
            address = %address.canonical_address,
            location_id = %address.location_id,
            "resolved address"
        );
        Ok(address)
    }

    /// Fetch the schedule for an already resolved address.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Extraction`] when the schedule request fails or
    /// the council has no schedule for the location.
    pub async fn fetch_schedule(
        &self,
        address: AddressMatch,
    ) -> Result<ScheduleSnapshot, PipelineError> {
        let schedule = self
            .plugin
            .schedule_port
            .schedule(&address.location_id)
            .await
            .map_err(PipelineError::Extraction)?;

        for category in schedule.missing() {
            tracing::debug!(%category, location_id = %address.location_id, "category not offered");
        }

        Ok(ScheduleSnapshot {
            address,
            schedule,
            retrieved_at: self.clock.now(),
        })
    }

    /// Resolve `query` and fetch its schedule in a single attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] when either stage fails.
    pub async fn waste_collection_info(
        &self,
        query: &AddressQuery,
    ) -> Result<ScheduleSnapshot, PipelineError> {
        let address = self.resolve(query).await?;
        self.fetch_schedule(address).await
    }

    /// Fetch a fresh snapshot for a session, resolving only when its policy asks.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] when either stage fails. A failed address
    /// search falls back to the cached match when there is one; an address that
    /// no longer exists drops the cache.
    pub async fn refresh(
        &self,
        session: &mut AddressSession,
    ) -> Result<ScheduleSnapshot, PipelineError> {
        let address = match session.reusable_match() {
            Some(address) => address.clone(),
            None => match self.resolve(session.query()).await {
                Ok(address) => {
                    session.record_resolution(address.clone());
                    address
                }
                Err(PipelineError::Resolution(err)) if session.resolved().is_some() => {
                    tracing::warn!(
                        query = %session.query(),
                        error = %err,
                        "address search failed, reusing cached location"
                    );
                    session.resolved().cloned().ok_or(PipelineError::Resolution(err))?
                }
                Err(err) => {
                    if matches!(err, PipelineError::AddressNotFound { .. }) {
                        session.invalidate();
                    }
                    return Err(err);
                }
            },
        };

        session.record_poll();
        self.fetch_schedule(address).await
    }
}

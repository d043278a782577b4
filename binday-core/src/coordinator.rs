//! Polling coordinator exposing one sensor per waste category.
//!
//! The coordinator owns an [`AddressSession`], runs the pipeline on a fixed
//! interval and maps the latest snapshot onto sensor states. A failed run
//! discards the previous snapshot, so every sensor reports unavailable until
//! the next successful tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};

use crate::model::{Category, ScheduleSnapshot};
use crate::service::{BindayService, PipelineError};
use crate::session::AddressSession;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Shortest allowed polling interval, in hours.
pub const MIN_SCAN_INTERVAL_HOURS: f64 = 1.0;
/// Longest allowed polling interval, in hours.
pub const MAX_SCAN_INTERVAL_HOURS: f64 = 24.0;
/// Polling interval used when none is configured, in hours.
pub const DEFAULT_SCAN_INTERVAL_HOURS: f64 = 12.0;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
#[error(
    "scan interval must be between {} and {} hours, got {}",
    MIN_SCAN_INTERVAL_HOURS,
    MAX_SCAN_INTERVAL_HOURS,
    .0
)]
/// Requested interval lies outside the accepted range.
pub struct ScanIntervalError(pub f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Time between two polls.
pub struct ScanInterval(Duration);

impl ScanInterval {
    /// Interval of `hours`, which may be fractional.
    ///
    /// # Errors
    ///
    /// Returns [`ScanIntervalError`] unless `hours` lies within 1 to 24 inclusive.
    pub fn from_hours(hours: f64) -> Result<Self, ScanIntervalError> {
        if !(MIN_SCAN_INTERVAL_HOURS..=MAX_SCAN_INTERVAL_HOURS).contains(&hours) {
            return Err(ScanIntervalError(hours));
        }
        Ok(Self(Duration::from_secs_f64(hours * SECONDS_PER_HOUR)))
    }

    /// Interval as a [`Duration`].
    #[must_use]
    pub fn as_duration(self) -> Duration {
        self.0
    }
}

impl Default for ScanInterval {
    fn default() -> Self {
        Self(Duration::from_secs_f64(
            DEFAULT_SCAN_INTERVAL_HOURS * SECONDS_PER_HOUR,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Attributes attached to every sensor.
pub struct SensorAttributes {
    /// Canonical address once resolved, otherwise the configured text.
    pub address: String,
    /// Location identifier once resolved.
    pub geolocation_id: Option<String>,
    /// When these attributes were produced.
    pub last_updated: DateTime<Utc>,
    /// Published collection label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_date: Option<String>,
    /// Same as `collection_date`, kept for dashboards keyed on it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_collection: Option<String>,
    /// Whole days until the collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Readable value for one category.
pub struct SensorState {
    /// Category the sensor tracks.
    pub category: Category,
    /// Identifier stable across restarts for the same address.
    pub unique_id: String,
    /// Display name.
    pub name: &'static str,
    /// Frontend icon.
    pub icon: &'static str,
    /// Whether the last refresh succeeded and listed this category.
    pub available: bool,
    /// Collection label, when available.
    pub state: Option<String>,
    /// Extra attributes.
    pub attributes: SensorAttributes,
}

/// Drives periodic refreshes for a single address.
pub struct Coordinator {
    service: Arc<BindayService>,
    session: AddressSession,
    interval: ScanInterval,
    data: Option<ScheduleSnapshot>,
    last_update_success: bool,
}

impl Coordinator {
    /// Coordinator for `session`, polling every `interval`.
    #[must_use]
    pub fn new(service: Arc<BindayService>, session: AddressSession, interval: ScanInterval) -> Self {
        Self {
            service,
            session,
            interval,
            data: None,
            last_update_success: false,
        }
    }

    /// Configured polling interval.
    #[must_use]
    pub fn interval(&self) -> ScanInterval {
        self.interval
    }

    /// Whether the most recent refresh succeeded.
    #[must_use]
    pub fn last_update_success(&self) -> bool {
        self.last_update_success
    }

    /// Latest snapshot, absent before the first success and after a failure.
    #[must_use]
    pub fn data(&self) -> Option<&ScheduleSnapshot> {
        self.data.as_ref()
    }

    /// Title for the watched address: canonical once resolved.
    #[must_use]
    pub fn title(&self) -> &str {
        self.session
            .resolved()
            .map_or(self.session.query().as_str(), |address| {
                address.canonical_address.as_str()
            })
    }

    /// Run the pipeline once, replacing the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns the [`PipelineError`] of a failed run after marking all sensors
    /// unavailable.
    pub async fn refresh(&mut self) -> Result<(), PipelineError> {
        match self.service.refresh(&mut self.session).await {
            Ok(snapshot) => {
                self.data = Some(snapshot);
                self.last_update_success = true;
                Ok(())
            }
            Err(err) => {
                self.data = None;
                self.last_update_success = false;
                Err(err)
            }
        }
    }

    /// Current state of every category sensor.
    #[must_use]
    pub fn sensors(&self) -> Vec<SensorState> {
        let today = self.service.clock().today();
        let last_updated = self.service.clock().now();
        let resolved = self.session.resolved();
        let entry_id = resolved.map_or_else(
            || self.session.query().as_str().to_owned(),
            |address| address.location_id.0.clone(),
        );

        Category::ALL
            .into_iter()
            .map(|category| {
                let entry = self
                    .data
                    .as_ref()
                    .and_then(|snapshot| snapshot.entry(category));
                let state = entry.map(|entry| entry.raw_date_label.clone());

                SensorState {
                    category,
                    unique_id: format!("{}_{entry_id}", category.key()),
                    name: category.label(),
                    icon: category.icon(),
                    available: self.last_update_success && entry.is_some(),
                    attributes: SensorAttributes {
                        address: self.title().to_owned(),
                        geolocation_id: resolved.map(|address| address.location_id.0.clone()),
                        last_updated,
                        collection_date: state.clone(),
                        next_collection: state.clone(),
                        days_until: entry.map(|entry| entry.days_until(today)),
                    },
                    state,
                }
            })
            .collect()
    }

    /// Refresh immediately and then on every interval tick until `shutdown`
    /// completes, handing the sensor states to `publish` after each attempt.
    ///
    /// Failed refreshes are logged and retried on the next tick.
    pub async fn run_until<F, P>(&mut self, shutdown: F, mut publish: P)
    where
        F: Future<Output = ()>,
        P: FnMut(&[SensorState]),
    {
        let mut ticker = time::interval(self.interval.as_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.refresh().await {
                        tracing::warn!(address = %self.session.query(), error = %err, "refresh failed");
                    }
                    publish(&self.sensors());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::dates::FixedClock;
    use crate::model::{
        AddressMatch, AddressQuery, CollectionSchedule, CouncilMeta, LocationId, ScheduleEntry,
    };
    use crate::plugin::CouncilPlugin;
    use crate::ports::{AddressPort, PortError, SchedulePort};
    use crate::session::ResolvePolicy;

    fn council() -> CouncilMeta {
        CouncilMeta {
            name: "Test Council".to_owned(),
        }
    }

    struct OneAddress;

    #[async_trait]
    impl AddressPort for OneAddress {
        async fn resolve(&self, _query: &AddressQuery) -> Result<Option<AddressMatch>, PortError> {
            Ok(Some(AddressMatch {
                location_id: LocationId("4711".to_owned()),
                canonical_address: "54 North Road, RYDE NSW 2112".to_owned(),
                zone_label: None,
                match_score: 3.0,
            }))
        }
    }

    /// Serves queued outcomes in order; `None` stands for a rejected schedule.
    struct ScriptedSchedule {
        script: Mutex<Vec<Option<Vec<(Category, &'static str)>>>>,
    }

    #[async_trait]
    impl SchedulePort for ScriptedSchedule {
        async fn schedule(&self, _location: &LocationId) -> Result<CollectionSchedule, PortError> {
            let next = self.script.lock().expect("script lock").remove(0);
            let labels = next.ok_or(PortError::UpstreamRejected)?;
            let mut schedule = CollectionSchedule::new();
            for (category, label) in labels {
                schedule.insert(ScheduleEntry::from_label(category, label));
            }
            Ok(schedule)
        }
    }

    fn coordinator(script: Vec<Option<Vec<(Category, &'static str)>>>) -> Coordinator {
        let plugin = CouncilPlugin {
            meta: council(),
            address_port: Arc::new(OneAddress),
            schedule_port: Arc::new(ScriptedSchedule {
                script: Mutex::new(script),
            }),
        };
        let today = NaiveDate::from_ymd_opt(2026, 1, 20).expect("valid test date");
        let service = BindayService::with_clock(plugin, Arc::new(FixedClock::on(today)));
        let query = AddressQuery::new("54 North Road, Ryde").expect("non-empty query");
        Coordinator::new(
            Arc::new(service),
            AddressSession::new(query, ResolvePolicy::CacheForever),
            ScanInterval::default(),
        )
    }

    fn sensor(sensors: &[SensorState], category: Category) -> &SensorState {
        sensors
            .iter()
            .find(|sensor| sensor.category == category)
            .expect("sensor for every category")
    }

    #[test]
    fn scan_interval_is_bounded() {
        assert!(ScanInterval::from_hours(0.5).is_err(), "below one hour");
        assert!(ScanInterval::from_hours(24.5).is_err(), "above a day");
        assert!(ScanInterval::from_hours(f64::NAN).is_err(), "not a number");
        let interval = ScanInterval::from_hours(1.5).expect("in range");
        assert_eq!(interval.as_duration(), Duration::from_secs(5400));
        assert_eq!(ScanInterval::default().as_duration(), Duration::from_secs(43_200));
    }

    #[tokio::test]
    async fn sensors_reflect_latest_snapshot() {
        let mut coordinator = coordinator(vec![Some(vec![
            (Category::GeneralWaste, "Tue 27/1/2026"),
            (Category::Recycling, "Wed 21/1/2026"),
        ])]);
        coordinator.refresh().await.expect("refresh succeeds");

        let sensors = coordinator.sensors();
        assert_eq!(sensors.len(), 3);

        let general = sensor(&sensors, Category::GeneralWaste);
        assert!(general.available, "general waste is listed");
        assert_eq!(general.state.as_deref(), Some("Tue 27/1/2026"));
        assert_eq!(general.attributes.days_until, Some(7));
        assert_eq!(general.attributes.address, "54 North Road, RYDE NSW 2112");
        assert_eq!(general.attributes.geolocation_id.as_deref(), Some("4711"));
        assert_eq!(general.unique_id, "general_waste_4711");

        let garden = sensor(&sensors, Category::GardenOrganics);
        assert!(!garden.available, "garden organics is not offered");
        assert_eq!(garden.state, None);
        assert_eq!(garden.attributes.days_until, None);
    }

    #[tokio::test]
    async fn failure_marks_all_sensors_unavailable() {
        let mut coordinator = coordinator(vec![
            Some(vec![(Category::GeneralWaste, "Tue 27/1/2026")]),
            None,
        ]);
        coordinator.refresh().await.expect("first refresh succeeds");
        coordinator.refresh().await.expect_err("second refresh fails");

        assert!(!coordinator.last_update_success(), "failure recorded");
        assert!(coordinator.data().is_none(), "stale snapshot discarded");
        assert!(
            coordinator.sensors().iter().all(|sensor| !sensor.available),
            "no sensor may stay available"
        );
    }

    #[tokio::test]
    async fn new_snapshot_replaces_old_entries() {
        let mut coordinator = coordinator(vec![
            Some(vec![
                (Category::GeneralWaste, "Tue 27/1/2026"),
                (Category::GardenOrganics, "Thu 22/1/2026"),
            ]),
            Some(vec![(Category::GeneralWaste, "Tue 3/2/2026")]),
        ]);
        coordinator.refresh().await.expect("first refresh");
        coordinator.refresh().await.expect("second refresh");

        let sensors = coordinator.sensors();
        assert_eq!(
            sensor(&sensors, Category::GeneralWaste).state.as_deref(),
            Some("Tue 3/2/2026")
        );
        assert!(
            !sensor(&sensors, Category::GardenOrganics).available,
            "garden entry from the earlier snapshot must not linger"
        );
    }

    #[tokio::test]
    async fn run_until_stops_on_shutdown() {
        let mut coordinator = coordinator(vec![Some(vec![(
            Category::Recycling,
            "Wed 21/1/2026",
        )])]);
        let mut published = Vec::new();

        // The first tick fires immediately; the shutdown future resolves on the
        // following poll, so exactly one refresh runs.
        let shutdown = async {
            tokio::task::yield_now().await;
        };
        coordinator
            .run_until(shutdown, |sensors| published.push(sensors.to_vec()))
            .await;

        assert_eq!(published.len(), 1);
        assert!(
            sensor(published.first().expect("one batch"), Category::Recycling).available,
            "recycling published as available"
        );
    }
}

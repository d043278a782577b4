//! Topic layout and JSON payloads for discovery, state, and attributes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use binday_core::model::{Category, CouncilMeta, ScheduleEntry};

/// Topic prefix used when none is configured.
pub const DEFAULT_TOPIC_PREFIX: &str = "ryde_waste";
/// Discovery prefix home-automation hosts listen on by default.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

const ENTITY_PREFIX: &str = "ryde_waste";
const DEVICE_ID: &str = "ryde_waste_collection";
const UPCOMING_WINDOW_DAYS: i64 = 7;
const DEVICE_MODEL: &str = "Waste Collection Monitor";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where sensors are announced and updated.
pub struct TopicLayout {
    topic_prefix: String,
    discovery_prefix: String,
}

impl TopicLayout {
    /// Layout under `topic_prefix`, announced under `discovery_prefix`.
    #[must_use]
    pub fn new<T: Into<String>, D: Into<String>>(topic_prefix: T, discovery_prefix: D) -> Self {
        Self {
            topic_prefix: topic_prefix.into().trim_matches('/').to_owned(),
            discovery_prefix: discovery_prefix.into().trim_matches('/').to_owned(),
        }
    }

    /// Entity id of a category's sensor, e.g. `ryde_waste_general`.
    ///
    /// Ids stay the same under any topic prefix, so existing entities keep
    /// their history when the prefix changes.
    #[must_use]
    pub fn entity_id(&self, category: Category) -> String {
        format!("{ENTITY_PREFIX}_{}", entity_suffix(category))
    }

    /// Retained discovery descriptor topic.
    #[must_use]
    pub fn discovery_topic(&self, category: Category) -> String {
        format!(
            "{}/sensor/{}/config",
            self.discovery_prefix,
            self.entity_id(category)
        )
    }

    /// Retained state topic carrying the raw label.
    #[must_use]
    pub fn state_topic(&self, category: Category) -> String {
        format!("{}/{}/state", self.topic_prefix, self.entity_id(category))
    }

    /// Retained JSON attributes topic.
    #[must_use]
    pub fn attributes_topic(&self, category: Category) -> String {
        format!("{}/{}/attributes", self.topic_prefix, self.entity_id(category))
    }
}

impl Default for TopicLayout {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_PREFIX, DEFAULT_DISCOVERY_PREFIX)
    }
}

fn entity_suffix(category: Category) -> &'static str {
    match category {
        Category::GeneralWaste => "general",
        Category::Recycling => "recycling",
        Category::GardenOrganics => "garden",
    }
}

/// Display name of a category's sensor.
#[must_use]
pub fn sensor_name(category: Category) -> &'static str {
    match category {
        Category::GeneralWaste => "General Waste Collection",
        Category::Recycling => "Recycling Collection",
        Category::GardenOrganics => "Garden Organics Collection",
    }
}

/// Lid colour of a category's bin.
#[must_use]
pub fn lid_color(category: Category) -> &'static str {
    match category {
        Category::GeneralWaste => "red",
        Category::Recycling => "yellow",
        Category::GardenOrganics => "green",
    }
}

#[derive(Debug, Serialize)]
/// Device grouping all sensors of one publisher.
pub struct DeviceInfo {
    /// Stable device identifiers.
    pub identifiers: Vec<String>,
    /// Device name.
    pub name: String,
    /// Device model.
    pub model: &'static str,
    /// Device manufacturer.
    pub manufacturer: String,
}

#[derive(Debug, Serialize)]
/// Discovery descriptor announcing one sensor.
pub struct DiscoveryConfig {
    /// Display name.
    pub name: &'static str,
    /// Unique id, equal to the entity id.
    pub unique_id: String,
    /// Topic carrying the state.
    pub state_topic: String,
    /// Topic carrying the attributes.
    pub json_attributes_topic: String,
    /// Frontend icon.
    pub icon: &'static str,
    /// Owning device.
    pub device: DeviceInfo,
}

/// Build the discovery descriptor for `category`.
#[must_use]
pub fn discovery_config(
    layout: &TopicLayout,
    council: &CouncilMeta,
    category: Category,
) -> DiscoveryConfig {
    DiscoveryConfig {
        name: sensor_name(category),
        unique_id: layout.entity_id(category),
        state_topic: layout.state_topic(category),
        json_attributes_topic: layout.attributes_topic(category),
        icon: category.icon(),
        device: DeviceInfo {
            identifiers: vec![DEVICE_ID.to_owned()],
            name: format!("{} Waste Collection", council.name),
            model: DEVICE_MODEL,
            manufacturer: council.name.clone(),
        },
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
/// Attribute payload published next to the state.
pub struct SensorAttributes<'a> {
    /// Display name.
    pub friendly_name: &'static str,
    /// Frontend icon.
    pub icon: &'static str,
    /// ISO date, `None` when the label could not be parsed.
    pub date: Option<NaiveDate>,
    /// Label as published by the council.
    pub date_formatted: &'a str,
    /// Whole days until collection, zero for unparseable labels.
    pub days_until: i64,
    /// Category heading.
    pub collection_type: &'static str,
    /// Lid colour.
    pub color: &'static str,
    /// Whether the collection falls within the coming week.
    pub upcoming: bool,
    /// When the payload was built.
    pub last_updated: DateTime<Utc>,
}

/// Build the attribute payload for `entry`, counting days from `today`.
#[must_use]
pub fn sensor_attributes(
    entry: &ScheduleEntry,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> SensorAttributes<'_> {
    let days_until = entry.days_until(today);
    SensorAttributes {
        friendly_name: sensor_name(entry.category),
        icon: entry.category.icon(),
        date: entry.collection_date,
        date_formatted: &entry.raw_date_label,
        days_until,
        collection_type: entry.category.label(),
        color: lid_color(entry.category),
        upcoming: entry.collection_date.is_some()
            && (0..=UPCOMING_WINDOW_DAYS).contains(&days_until),
        last_updated: now,
    }
}

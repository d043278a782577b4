//! Domain data structures for councils, addresses, and collection schedules.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates;

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a council and its human-friendly name.
pub struct CouncilMeta {
    /// Display name, also used as the device manufacturer by publishers.
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Waste streams tracked per address.
pub enum Category {
    /// General (red lid) waste.
    GeneralWaste,
    /// Co-mingled (yellow lid) recycling.
    Recycling,
    /// Garden organics (green lid).
    GardenOrganics,
}

impl Category {
    /// Every category, in the order they are presented.
    pub const ALL: [Self; 3] = [Self::GeneralWaste, Self::Recycling, Self::GardenOrganics];

    /// Heading text the council uses for this category.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::GeneralWaste => "General Waste",
            Self::Recycling => "Recycling",
            Self::GardenOrganics => "Garden Organics",
        }
    }

    /// Stable machine key, used for sensor ids and JSON output.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::GeneralWaste => "general_waste",
            Self::Recycling => "recycling",
            Self::GardenOrganics => "garden_organics",
        }
    }

    /// Material design icon shown by home-automation frontends.
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            Self::GeneralWaste => "mdi:trash-can",
            Self::Recycling => "mdi:recycle",
            Self::GardenOrganics => "mdi:leaf",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Opaque token identifying a property for schedule lookups.
pub struct LocationId(pub String);

impl fmt::Display for LocationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Free-text address as typed by the user.
pub struct AddressQuery(String);

impl AddressQuery {
    /// Build a query, rejecting blank input.
    #[must_use]
    pub fn new<S: Into<String>>(text: S) -> Option<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// The query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AddressQuery {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Top-ranked result of an address search.
pub struct AddressMatch {
    /// Identifier used when requesting the schedule.
    pub location_id: LocationId,
    /// Canonical single-line address.
    pub canonical_address: String,
    /// Ward or other administrative zone, when the council reports one.
    pub zone_label: Option<String>,
    /// Relevance score reported by the search service.
    pub match_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Next collection for one category.
///
/// Only the label and the date parsed from it are stored. The day count is
/// derived on every read so it cannot drift from the label.
pub struct ScheduleEntry {
    /// Category this entry belongs to.
    pub category: Category,
    /// Label exactly as published, e.g. `Tue 27/1/2026`.
    pub raw_date_label: String,
    /// Date parsed from the label, `None` when the label was malformed.
    pub collection_date: Option<NaiveDate>,
}

impl ScheduleEntry {
    /// Build an entry from a published label, parsing its date.
    ///
    /// A malformed label still produces an entry; the failure is logged and
    /// the entry reports zero days until collection.
    #[must_use]
    pub fn from_label<S: Into<String>>(category: Category, label: S) -> Self {
        let raw_date_label = label.into();
        let collection_date = match dates::parse_collection_label(&raw_date_label) {
            Ok(date) => Some(date),
            Err(err) => {
                tracing::warn!(%category, label = %raw_date_label, error = %err, "unparseable collection date");
                None
            }
        };
        Self {
            category,
            raw_date_label,
            collection_date,
        }
    }

    /// Whole days from `today` until the collection. Negative for past dates,
    /// zero when the label could not be parsed.
    #[must_use]
    pub fn days_until(&self, today: NaiveDate) -> i64 {
        self.collection_date
            .map_or(0, |date| dates::days_between(today, date))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Per-category entries extracted from one schedule response.
///
/// A category with no entry is not offered for the address.
pub struct CollectionSchedule {
    entries: BTreeMap<Category, ScheduleEntry>,
}

impl CollectionSchedule {
    /// Empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the entry for its category, replacing any earlier one.
    pub fn insert(&mut self, entry: ScheduleEntry) {
        self.entries.insert(entry.category, entry);
    }

    /// Entry for `category`, if the council lists one.
    #[must_use]
    pub fn get(&self, category: Category) -> Option<&ScheduleEntry> {
        self.entries.get(&category)
    }

    /// Present entries in category order.
    pub fn entries(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.values()
    }

    /// Number of categories present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no category is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Categories known to binday but missing from this schedule.
    pub fn missing(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL
            .into_iter()
            .filter(|category| !self.entries.contains_key(category))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Complete result of one pipeline run.
pub struct ScheduleSnapshot {
    /// Address the schedule was fetched for.
    pub address: AddressMatch,
    /// Extracted entries.
    pub schedule: CollectionSchedule,
    /// When the schedule was retrieved.
    pub retrieved_at: DateTime<Utc>,
}

impl ScheduleSnapshot {
    /// Entry for `category`, if present.
    #[must_use]
    pub fn entry(&self, category: Category) -> Option<&ScheduleEntry> {
        self.schedule.get(category)
    }
}

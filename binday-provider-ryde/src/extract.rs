//! Extraction of per-category dates from the schedule fragment.
//!
//! The fragment lists one widget per waste stream: an `<h3>` naming the
//! stream, followed somewhere later by a `<div class="next-service">` holding
//! the next collection label. Each category is looked up on its own; a
//! heading that cannot be found, or that is never followed by a container,
//! leaves that category out.

use std::sync::LazyLock;

use binday_core::model::{Category, CollectionSchedule, ScheduleEntry};
use scraper::{ElementRef, Html, Selector};

const HEADING_TAG: &str = "h3";

/// Headings and date containers, matched in document order.
static SECTION_MARKERS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h3, div.next-service").expect("section marker selector is valid")
});

/// Decode the entity-escaped fragment and extract every category it lists.
#[must_use]
pub fn extract_schedule(escaped_fragment: &str) -> CollectionSchedule {
    let markup = html_escape::decode_html_entities(escaped_fragment);
    let document = Html::parse_fragment(&markup);

    let mut schedule = CollectionSchedule::new();
    for category in Category::ALL {
        match next_service_after(&document, category.label()) {
            Some(label) => schedule.insert(ScheduleEntry::from_label(category, label)),
            None => tracing::debug!(%category, "no collection listed"),
        }
    }
    schedule
}

/// Text of the first date container following the heading titled `heading`.
fn next_service_after(document: &Html, heading: &str) -> Option<String> {
    let mut markers = document.select(&SECTION_MARKERS);

    markers.find(|marker| is_heading(marker) && collapsed_text(marker) == heading)?;

    let container = markers.find(|marker| !is_heading(marker))?;
    let label = collapsed_text(&container);
    (!label.is_empty()).then_some(label)
}

fn is_heading(element: &ElementRef<'_>) -> bool {
    element.value().name() == HEADING_TAG
}

/// Element text with runs of whitespace, including line breaks, collapsed.
fn collapsed_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

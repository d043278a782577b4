use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::NaiveDate;
use serde::Serialize;

use binday_core::coordinator::SensorState;
use binday_core::model::ScheduleSnapshot;
use binday_mqtt::PublishReport;

const LABEL_WIDTH: usize = 20;
const RULE_WIDTH: usize = 40;

#[derive(Debug, Serialize)]
struct CollectionJson<'a> {
    label: &'a str,
    date: Option<NaiveDate>,
    days_until: i64,
}

#[derive(Debug, Serialize)]
struct LookupJson<'a> {
    address: &'a str,
    location_id: &'a str,
    zone: Option<&'a str>,
    collections: BTreeMap<&'static str, CollectionJson<'a>>,
}

pub(crate) fn write_snapshot_json<W: Write>(
    out: &mut W,
    snapshot: &ScheduleSnapshot,
    today: NaiveDate,
) -> io::Result<()> {
    let collections = snapshot
        .schedule
        .entries()
        .map(|entry| {
            (
                entry.category.key(),
                CollectionJson {
                    label: &entry.raw_date_label,
                    date: entry.collection_date,
                    days_until: entry.days_until(today),
                },
            )
        })
        .collect();

    let report = LookupJson {
        address: &snapshot.address.canonical_address,
        location_id: &snapshot.address.location_id.0,
        zone: snapshot.address.zone_label.as_deref(),
        collections,
    };

    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)
}

pub(crate) fn write_snapshot_table<W: Write>(
    out: &mut W,
    snapshot: &ScheduleSnapshot,
    today: NaiveDate,
) -> io::Result<()> {
    let address = &snapshot.address;
    match address.zone_label.as_deref() {
        Some(zone) => writeln!(out, "Found: {} ({zone})", address.canonical_address)?,
        None => writeln!(out, "Found: {}", address.canonical_address)?,
    }
    writeln!(out, "Geolocation ID: {}", address.location_id)?;
    writeln!(out)?;
    writeln!(out, "Waste Collection Schedule:")?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;

    if snapshot.schedule.is_empty() {
        writeln!(out, "No collections listed for this address.")?;
        return Ok(());
    }

    for entry in snapshot.schedule.entries() {
        let relative = match entry.collection_date {
            Some(date) => relative_day_label(date, today),
            None => "date unknown".to_owned(),
        };
        writeln!(
            out,
            "{:LABEL_WIDTH$}: {} ({relative})",
            entry.category.label(),
            entry.raw_date_label
        )?;
    }
    Ok(())
}

pub(crate) fn write_publish_report<W: Write>(out: &mut W, report: &PublishReport) -> io::Result<()> {
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(()) => writeln!(
                out,
                "  published {}: {} (in {} days)",
                outcome.category, outcome.label, outcome.days_until
            )?,
            Err(err) => writeln!(out, "  failed {}: {err}", outcome.category)?,
        }
    }
    writeln!(
        out,
        "{} of {} sensors published",
        report.published_count(),
        report.outcomes.len()
    )
}

pub(crate) fn write_sensors<W: Write>(
    out: &mut W,
    sensors: &[SensorState],
    json: bool,
) -> io::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, sensors)?;
        return writeln!(out);
    }

    for sensor in sensors {
        let value = match (&sensor.state, sensor.available) {
            (Some(state), true) => state.as_str(),
            _ => "unavailable",
        };
        let days = sensor
            .attributes
            .days_until
            .map(|days| format!(" [{days} days]"))
            .unwrap_or_default();
        writeln!(out, "{:LABEL_WIDTH$}: {value}{days}", sensor.name)?;
    }
    Ok(())
}

fn relative_day_label(date: NaiveDate, today: NaiveDate) -> String {
    let delta = (date - today).num_days();
    match delta {
        0 => "today".to_owned(),
        1 => "tomorrow".to_owned(),
        days if days > 1 => format!("in {days} days"),
        -1 => "yesterday".to_owned(),
        days => format!("{} days ago", days.abs()),
    }
}

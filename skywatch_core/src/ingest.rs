//! Loader stage: turns decoded feed records into a store and hazard points.
//!
//! Ingestion is forgiving by construction. A record that cannot be read is
//! counted and dropped; it never stops the rest of the refresh from being
//! built. Balloon rows keep their position, so dropping row `i` leaves a
//! gap at entity `i` instead of shifting every later id.

use crate::geodesy::normalize_lon;
use crate::skywatch_space::{HazardId, HazardPoint};
use crate::skywatch_store::{Snapshot, SnapshotStore, HOURS_PER_DAY, MAX_ENTITIES};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skywatch_env::{FireRecord, RawBalloonFeed, RawHazardFeed};
use tracing::{debug, warn};

/// Outcome of ingesting one feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Records that made it into the output
    pub accepted: usize,

    /// Records dropped as malformed (bad row, bad hour key, bad date, ...)
    pub skipped: usize,

    /// Hours whose array was present but empty
    pub empty_hours: Vec<u8>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.accepted + self.skipped
    }
}

/// Builds a [`SnapshotStore`] from one balloon feed refresh.
pub fn ingest_snapshots(feed: &RawBalloonFeed) -> (SnapshotStore, IngestReport) {
    let mut report = IngestReport::default();
    let mut snapshots = Vec::new();

    for (key, value) in &feed.hours {
        let Some(hour) = parse_hour_key(key) else {
            warn!("ingest: ignoring unknown hour key {:?}", key);
            report.skipped += 1;
            continue;
        };

        let Some(rows) = value.as_array() else {
            warn!("ingest: hour {:02} is not an array", hour);
            report.skipped += 1;
            continue;
        };

        if rows.is_empty() {
            report.empty_hours.push(hour);
            continue;
        }

        if rows.len() > MAX_ENTITIES {
            warn!("ingest: hour {:02} has {} rows, keeping the first {}", hour, rows.len(), MAX_ENTITIES);
            report.skipped += rows.len() - MAX_ENTITIES;
        }

        for (entity_id, row) in rows.iter().take(MAX_ENTITIES).enumerate() {
            match parse_row(row) {
                Some((lat, lon, alt)) => {
                    snapshots.push(Snapshot::new(entity_id, hour, lat, lon, alt));
                    report.accepted += 1;
                }
                None => {
                    debug!("ingest: hour {:02} row {} malformed: {}", hour, entity_id, row);
                    report.skipped += 1;
                }
            }
        }
    }

    if report.skipped > 0 {
        warn!(
            "ingest: {} snapshot records skipped, {} accepted",
            report.skipped, report.accepted
        );
    }

    // Hours were range-checked above, so construction cannot fail
    let store = SnapshotStore::new(snapshots).unwrap_or_default();
    (store, report)
}

/// Converts hazard feed records into [`HazardPoint`]s (id = feed position).
///
/// Each record is decoded on its own; one that does not fit [`FireRecord`]
/// (string coordinate, missing date, ...) is skipped like any other bad record.
pub fn ingest_hazards(feed: &RawHazardFeed) -> (Vec<HazardPoint>, IngestReport) {
    let mut report = IngestReport::default();
    let mut points = Vec::with_capacity(feed.len());

    for (position, value) in feed.records.iter().enumerate() {
        let parsed = FireRecord::deserialize(value)
            .map_err(|e| e.to_string())
            .and_then(|record| {
                parse_fire(position as HazardId, &record).ok_or_else(|| {
                    format!(
                        "rejected ({}, {}, {}, {:?})",
                        record.latitude, record.longitude, record.acq_date, record.acq_time
                    )
                })
            });

        match parsed {
            Ok(point) => {
                points.push(point);
                report.accepted += 1;
            }
            Err(reason) => {
                debug!("ingest: hazard {} malformed: {}", position, reason);
                report.skipped += 1;
            }
        }
    }

    if report.skipped > 0 {
        warn!(
            "ingest: {} hazard records skipped, {} accepted",
            report.skipped, report.accepted
        );
    }

    (points, report)
}

/// Combines `YYYY-MM-DD` and `HHMM` (UTC) into Unix seconds.
pub fn acquisition_epoch_seconds(acq_date: &str, acq_hhmm: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(acq_date.trim(), "%Y-%m-%d").ok()?;
    if acq_hhmm.len() != 4 || !acq_hhmm.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = acq_hhmm[..2].parse().ok()?;
    let minute: u32 = acq_hhmm[2..].parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

    Some(date.and_time(time).and_utc().timestamp())
}

fn parse_hour_key(key: &str) -> Option<u8> {
    let hour: u8 = key.trim().parse().ok()?;
    ((hour as usize) < HOURS_PER_DAY).then_some(hour)
}

fn parse_row(row: &Value) -> Option<(f64, f64, f64)> {
    let values = row.as_array()?;
    if values.len() < 3 {
        return None;
    }
    let lat = values[0].as_f64()?;
    let lon = values[1].as_f64()?;
    let alt = values[2].as_f64()?;

    let valid = lat.is_finite()
        && lon.is_finite()
        && alt.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && alt >= 0.0;
    valid.then(|| (lat, normalize_lon(lon), alt))
}

fn parse_fire(id: HazardId, record: &FireRecord) -> Option<HazardPoint> {
    let (lat, lon) = (record.latitude, record.longitude);
    if !((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)) {
        return None;
    }
    let detected_at = acquisition_epoch_seconds(&record.acq_date, &record.acq_time.as_hhmm())?;

    Some(HazardPoint {
        id,
        lat,
        lon: normalize_lon(lon),
        detected_at,
        confidence: record.confidence.clone(),
        power: if record.frp.is_finite() { record.frp } else { 0.0 },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skywatch_env::AcqTime;

    fn fire(lat: f64, lon: f64, date: &str, time: AcqTime) -> FireRecord {
        FireRecord {
            latitude: lat,
            longitude: lon,
            acq_date: date.to_string(),
            acq_time: time,
            confidence: "n".to_string(),
            frp: 2.5,
        }
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(acquisition_epoch_seconds("1970-01-01", "0000"), Some(0));
        assert_eq!(acquisition_epoch_seconds("1970-01-02", "0130"), Some(86_400 + 5_400));
        assert_eq!(
            acquisition_epoch_seconds("2025-01-01", "1200"),
            Some(1_735_732_800)
        );
        assert_eq!(acquisition_epoch_seconds("2025-13-01", "1200"), None);
        assert_eq!(acquisition_epoch_seconds("2025-01-01", "2460"), None);
        assert_eq!(acquisition_epoch_seconds("2025-01-01", "12:0"), None);
    }

    #[test]
    fn test_snapshots_keep_row_positions() {
        let feed: RawBalloonFeed = serde_json::from_value(json!({
            "00": [[1.0, 2.0, 3.0], [null, 2.0, 3.0], [4.0, 5.0, 6.0]],
            "01": [[1.5, 2.5, 3.5], [1.0, 1.0], [4.5, 185.0, 6.5]],
        }))
        .unwrap();

        let (store, report) = ingest_snapshots(&feed);

        assert_eq!(report.accepted, 4);
        assert_eq!(report.skipped, 2);
        assert!(store.get(0, 1).is_none());
        assert_eq!(store.get(0, 2).unwrap().lat, 4.0);
        assert_eq!(store.get(1, 2).unwrap().lon, -175.0);
        assert_eq!(store.entity_count(), 3);
    }

    #[test]
    fn test_snapshot_range_checks() {
        let feed: RawBalloonFeed = serde_json::from_value(json!({
            "05": [[91.0, 0.0, 1.0], [0.0, 0.0, -1.0], ["a", 0.0, 1.0], [0.0, 0.0, 1.0]],
        }))
        .unwrap();

        let (store, report) = ingest_snapshots(&feed);

        assert_eq!(report.skipped, 3);
        assert_eq!(report.accepted, 1);
        assert!(store.get(5, 3).is_some());
    }

    #[test]
    fn test_bad_hour_keys_and_empty_hours() {
        let feed: RawBalloonFeed = serde_json::from_value(json!({
            "24": [[0.0, 0.0, 1.0]],
            "xx": [[0.0, 0.0, 1.0]],
            "03": {"not": "an array"},
            "07": [],
            "08": [[0.0, 0.0, 1.0]],
        }))
        .unwrap();

        let (store, report) = ingest_snapshots(&feed);

        assert_eq!(report.skipped, 3);
        assert_eq!(report.empty_hours, vec![7]);
        assert_eq!(store.hours_present(), vec![8]);
    }

    #[test]
    fn test_hazards_drop_malformed() {
        let records = vec![
            fire(10.0, 20.0, "2025-01-01", AcqTime::Number(5)),
            fire(f64::NAN, 20.0, "2025-01-01", AcqTime::Number(5)),
            fire(10.0, 20.0, "01/01/2025", AcqTime::Number(5)),
            fire(-10.0, 180.0, "2025-01-01", AcqTime::Text("2359".to_string())),
        ];

        let (points, report) = ingest_hazards(&RawHazardFeed::from(records));

        assert_eq!(report.accepted, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.total(), 4);
        // ids are feed positions, so they are stable across drops
        assert_eq!(points[0].id, 0);
        assert_eq!(points[1].id, 3);
        assert_eq!(points[1].lon, -180.0);
        assert_eq!(points[0].detected_at, 1_735_689_600 + 300);
    }

    #[test]
    fn test_hazards_skip_undecodable_records() {
        let feed: RawHazardFeed = serde_json::from_value(json!([
            {"latitude": "n/a", "longitude": 2.0, "acq_date": "2025-01-01", "acq_time": 5},
            {"latitude": 1.0, "longitude": 2.0, "acq_time": 5},
            {"latitude": 1.0, "longitude": 2.0, "acq_date": "2025-01-01", "acq_time": 5.5},
            null,
            {"latitude": 1.0, "longitude": 2.0, "acq_date": "2025-01-01", "acq_time": "0005"},
        ]))
        .unwrap();

        let (points, report) = ingest_hazards(&feed);

        assert_eq!(report.accepted, 1);
        assert_eq!(report.skipped, 4);
        assert_eq!(points[0].id, 4);
        assert_eq!(points[0].detected_at, 1_735_689_600 + 300);
    }

    #[test]
    fn test_hazard_longitude_out_of_range_dropped() {
        let records = vec![
            fire(0.0, 180.5, "2025-01-01", AcqTime::Number(0)),
            fire(0.0, -181.0, "2025-01-01", AcqTime::Number(0)),
            fire(0.0, -180.0, "2025-01-01", AcqTime::Number(0)),
        ];

        let (points, report) = ingest_hazards(&RawHazardFeed::from(records));

        assert_eq!(report.skipped, 2);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, 2);
    }
}

//! Decoded upstream records handed to the SkyWatch loader.
//!
//! These types describe the feeds *as they arrive*: nothing here is
//! validated beyond JSON shape. Range checks and date parsing happen in
//! `skywatch_core::ingest`, which drops bad records instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One refresh of the balloon feed.
///
/// Keys are two-digit hour strings (`"00"` .. `"23"`); each value is
/// expected to be an array of `[lat, lon, alt]` rows where the row index
/// is the entity id. Values are kept as raw JSON so a single corrupt row
/// cannot reject the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawBalloonFeed {
    pub hours: BTreeMap<String, Value>,
}

impl RawBalloonFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the rows for one hour, keyed as a zero-padded hour string.
    pub fn insert_hour(&mut self, hour: u8, rows: Vec<[f64; 3]>) {
        let rows = rows
            .into_iter()
            .map(|row| Value::from(row.to_vec()))
            .collect::<Vec<_>>();
        self.hours.insert(format!("{:02}", hour), Value::Array(rows));
    }

    /// Inserts an arbitrary JSON value for an hour key (used by fixtures
    /// that need to model corrupt upstream data).
    pub fn insert_raw(&mut self, key: impl Into<String>, value: Value) {
        self.hours.insert(key.into(), value);
    }

    /// Number of hour keys in the document.
    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }
}

/// One refresh of the hazard feed: a JSON array of detection records.
///
/// Like [`RawBalloonFeed`], records stay raw JSON until ingestion, so a
/// record with a string coordinate or a missing date is skipped on its
/// own instead of rejecting the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawHazardFeed {
    pub records: Vec<Value>,
}

impl RawHazardFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a well-formed record.
    pub fn push_record(&mut self, record: &FireRecord) {
        // Non-finite floats have no JSON form; the record then ingests as malformed
        let value = serde_json::to_value(record).unwrap_or(Value::Null);
        self.records.push(value);
    }

    /// Appends an arbitrary JSON value (fixtures modelling corrupt upstream data).
    pub fn push_raw(&mut self, value: Value) {
        self.records.push(value);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<FireRecord>> for RawHazardFeed {
    fn from(records: Vec<FireRecord>) -> Self {
        let mut feed = Self::new();
        for record in &records {
            feed.push_record(record);
        }
        feed
    }
}

/// Acquisition time as published upstream: `HHMM`, sometimes as a string
/// (`"0042"`), sometimes as a bare integer (`42`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AcqTime {
    Number(u32),
    Text(String),
}

impl AcqTime {
    /// Returns the time left-padded to four digits (`42` -> `"0042"`).
    pub fn as_hhmm(&self) -> String {
        match self {
            AcqTime::Number(n) => format!("{:04}", n),
            AcqTime::Text(s) => format!("{:0>4}", s.trim()),
        }
    }
}

/// A single hotspot detection from the hazard feed.
///
/// Only the fields SkyWatch consumes are modelled; the remaining upstream
/// columns (brightness, scan, track, satellite, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireRecord {
    pub latitude: f64,
    pub longitude: f64,

    /// Acquisition date, `YYYY-MM-DD` (UTC)
    pub acq_date: String,

    /// Acquisition time, `HHMM` (UTC)
    pub acq_time: AcqTime,

    /// Detection confidence label (e.g. "n", "l", "h")
    #[serde(default)]
    pub confidence: String,

    /// Fire radiative power (MW)
    #[serde(default)]
    pub frp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acq_time_padding() {
        assert_eq!(AcqTime::Number(42).as_hhmm(), "0042");
        assert_eq!(AcqTime::Text("915".to_string()).as_hhmm(), "0915");
        assert_eq!(AcqTime::Text("1230".to_string()).as_hhmm(), "1230");
    }

    #[test]
    fn test_fire_record_ignores_extra_columns() {
        let json = r#"{
            "latitude": -12.5,
            "longitude": 130.25,
            "acq_date": "2025-01-04",
            "acq_time": 517,
            "confidence": "n",
            "frp": 3.4,
            "satellite": "N",
            "bright_ti4": "330.1"
        }"#;

        let record: FireRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.acq_time, AcqTime::Number(517));
        assert_eq!(record.confidence, "n");
    }

    #[test]
    fn test_balloon_feed_keeps_raw_rows() {
        let json = r#"{ "00": [[1.0, 2.0, 3.0], [null, 4.0, 5.0]], "01": "oops" }"#;
        let feed: RawBalloonFeed = serde_json::from_str(json).unwrap();

        assert_eq!(feed.len(), 2);
        assert!(feed.hours["00"].is_array());
        assert!(feed.hours["01"].is_string());
    }

    #[test]
    fn test_hazard_feed_keeps_raw_records() {
        let json = r#"[
            {"latitude": 1.0, "longitude": 2.0, "acq_date": "2025-01-01", "acq_time": 5},
            {"latitude": "n/a", "longitude": 2.0, "acq_date": "2025-01-01", "acq_time": 5},
            null
        ]"#;
        let feed: RawHazardFeed = serde_json::from_str(json).unwrap();

        assert_eq!(feed.len(), 3);
        assert!(feed.records[1]["latitude"].is_string());
        assert!(serde_json::from_str::<RawHazardFeed>(r#"{"not": "a list"}"#).is_err());
    }

    #[test]
    fn test_hazard_feed_from_records() {
        let record = FireRecord {
            latitude: -3.5,
            longitude: 100.0,
            acq_date: "2025-02-02".to_string(),
            acq_time: AcqTime::Text("0815".to_string()),
            confidence: "h".to_string(),
            frp: 12.0,
        };
        let feed = RawHazardFeed::from(vec![record.clone()]);

        let back: FireRecord = serde_json::from_value(feed.records[0].clone()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_insert_hour_pads_key() {
        let mut feed = RawBalloonFeed::new();
        feed.insert_hour(7, vec![[10.0, 20.0, 15.0]]);

        assert!(feed.hours.contains_key("07"));
    }
}

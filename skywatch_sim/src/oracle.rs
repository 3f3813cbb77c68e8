//! Ground truth oracle for simulation.
//!
//! The FeedOracle owns the "true" hourly tracks of every synthetic balloon
//! and every hazard it placed, and renders both into upstream-shaped feed
//! documents (including the gaps and garbage real feeds contain).
//! Scenario checks compare engine output against what the oracle knows.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde_json::{json, Value};
use skywatch_core::geodesy::{haversine_km, haversine_m, normalize_lon, KM_PER_DEGREE_ARC};
use skywatch_core::skywatch_store::HOURS_PER_DAY;
use skywatch_env::{AcqTime, FireRecord, RawBalloonFeed, RawHazardFeed};
use std::collections::HashSet;

/// Date stamped on every synthetic hazard.
pub const SIM_ACQ_DATE: &str = "2025-01-01";

/// A synthetic balloon: one true `[lat, lon, alt]` per hour.
#[derive(Debug, Clone)]
pub struct GroundTruthBalloon {
    /// Row index in the emitted feed
    pub id: usize,

    /// True positions for hours 0..23
    pub track: Vec<[f64; 3]>,
}

/// Hourly drift of a balloon (degrees per hour).
#[derive(Debug, Clone, Copy)]
pub struct Drift {
    pub lat_per_hour: f64,
    pub lon_per_hour: f64,
}

/// The Oracle - maintains ground truth and renders feeds.
pub struct FeedOracle {
    /// Master seed
    seed: u64,

    /// RNG for motion noise, placement and corruption
    rng: ChaCha8Rng,

    balloons: Vec<GroundTruthBalloon>,
    hazards: RawHazardFeed,

    /// (hour, balloon) slots emitted as `null`
    gaps: HashSet<(usize, usize)>,

    /// (hour, balloon) slots emitted as garbage rows
    corrupt: HashSet<(usize, usize)>,

    /// Hazard records deliberately made unreadable
    bad_hazards: usize,

    lat_noise: Normal<f64>,
    lon_noise: Normal<f64>,
    alt_noise: Normal<f64>,
}

impl FeedOracle {
    /// Creates a new oracle with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            balloons: Vec::new(),
            hazards: RawHazardFeed::new(),
            gaps: HashSet::new(),
            corrupt: HashSet::new(),
            bad_hazards: 0,
            lat_noise: Normal::new(0.0, 0.08).unwrap(),
            lon_noise: Normal::new(0.0, 0.15).unwrap(),
            alt_noise: Normal::new(0.0, 0.4).unwrap(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Spawns a balloon at `(lat, lon, alt)` drifting by `drift` each hour.
    pub fn spawn_balloon(&mut self, lat: f64, lon: f64, alt: f64, drift: Drift) -> usize {
        let id = self.balloons.len();
        let mut track = Vec::with_capacity(HOURS_PER_DAY);
        let (mut lat, mut lon, mut alt) = (lat, normalize_lon(lon), alt.max(0.5));

        for _ in 0..HOURS_PER_DAY {
            track.push([lat, lon, alt]);
            lat = (lat + drift.lat_per_hour + self.lat_noise.sample(&mut self.rng)).clamp(-89.9, 89.9);
            lon = normalize_lon(lon + drift.lon_per_hour + self.lon_noise.sample(&mut self.rng));
            alt = (alt + self.alt_noise.sample(&mut self.rng)).max(0.5);
        }

        self.balloons.push(GroundTruthBalloon { id, track });
        id
    }

    /// Spawns `n` balloons with random start points in `lat_band` and random drift.
    pub fn spawn_random_balloons(&mut self, n: usize, lat_band: (f64, f64)) -> Vec<usize> {
        (0..n)
            .map(|_| {
                let lat = self.rng.gen_range(lat_band.0..lat_band.1);
                let lon = self.rng.gen_range(-180.0..180.0);
                let alt = self.rng.gen_range(2.0..25.0);
                let drift = Drift {
                    lat_per_hour: self.rng.gen_range(-0.3..0.3),
                    lon_per_hour: self.rng.gen_range(-1.5..1.5),
                };
                self.spawn_balloon(lat, lon, alt, drift)
            })
            .collect()
    }

    /// Knocks out each hour of each listed balloon with probability `p`.
    pub fn add_gaps(&mut self, ids: &[usize], p: f64) {
        for &id in ids {
            for hour in 0..HOURS_PER_DAY {
                if self.rng.gen_bool(p) {
                    self.gaps.insert((hour, id));
                }
            }
        }
    }

    /// Replaces `n` random present rows of the listed balloons with garbage.
    pub fn corrupt_rows(&mut self, ids: &[usize], n: usize) {
        let mut slots: Vec<(usize, usize)> = ids
            .iter()
            .flat_map(|&id| (0..HOURS_PER_DAY).map(move |h| (h, id)))
            .filter(|slot| !self.gaps.contains(slot))
            .collect();
        slots.shuffle(&mut self.rng);
        self.corrupt.extend(slots.into_iter().take(n));
    }

    /// Places a hazard `offset_km` from balloon `id`'s true position at `hour`.
    ///
    /// Returns the hazard's feed position (= its id after ingestion).
    pub fn place_hazard_near(&mut self, id: usize, hour: usize, offset_km: f64) -> usize {
        let [lat, lon, _] = self.balloons[id].track[hour];
        let bearing = self.rng.gen_range(0.0..std::f64::consts::TAU);
        let d_lat = offset_km / KM_PER_DEGREE_ARC * bearing.cos();
        let cos_lat = lat.to_radians().cos().max(1e-6);
        let d_lon = offset_km / (KM_PER_DEGREE_ARC * cos_lat) * bearing.sin();

        self.push_hazard((lat + d_lat).clamp(-90.0, 90.0), normalize_lon(lon + d_lon))
    }

    /// Scatters up to `n` hazards that stay at least `clearance_km` from every
    /// hourly position of the `avoid` balloons. Returns how many were placed.
    pub fn scatter_hazards(&mut self, n: usize, avoid: &[usize], clearance_km: f64) -> usize {
        let mut placed = 0;
        let mut attempts = 0;

        while placed < n && attempts < n * 100 {
            attempts += 1;
            let lat = self.rng.gen_range(-70.0..70.0);
            let lon = self.rng.gen_range(-180.0..180.0);

            let clear = avoid.iter().all(|&id| {
                self.balloons[id]
                    .track
                    .iter()
                    .all(|p| haversine_km(lat, lon, p[0], p[1]) >= clearance_km)
            });
            if clear {
                self.push_hazard(lat, lon);
                placed += 1;
            }
        }

        placed
    }

    /// Appends `n` hazard records that ingestion must reject.
    ///
    /// Cycles through records that do not decode at all (string or missing
    /// fields, fractional time, `null`) and records that decode but fail
    /// validation (bad date format, latitude out of range).
    pub fn inject_bad_hazards(&mut self, n: usize) {
        for i in 0..n {
            let record = match i % 6 {
                0 => json!({"latitude": "n/a", "longitude": 10.0, "acq_date": SIM_ACQ_DATE, "acq_time": 1200}),
                1 => json!({"latitude": 10.0, "longitude": 10.0, "acq_time": 1200}),
                2 => json!({"latitude": 10.0, "longitude": 10.0, "acq_date": SIM_ACQ_DATE, "acq_time": 12.5}),
                3 => Value::Null,
                4 => json!({"latitude": 10.0, "longitude": 10.0, "acq_date": "01/02/2025", "acq_time": 1200}),
                _ => json!({"latitude": 123.0, "longitude": 10.0, "acq_date": SIM_ACQ_DATE, "acq_time": "9999"}),
            };
            self.hazards.push_raw(record);
            self.bad_hazards += 1;
        }
    }

    /// Renders the balloon feed as the upstream would publish it.
    pub fn balloon_feed(&self) -> RawBalloonFeed {
        let mut feed = RawBalloonFeed::new();

        for hour in 0..HOURS_PER_DAY {
            let rows: Vec<Value> = self
                .balloons
                .iter()
                .map(|b| {
                    let [lat, lon, alt] = b.track[hour];
                    if self.gaps.contains(&(hour, b.id)) {
                        Value::Null
                    } else if self.corrupt.contains(&(hour, b.id)) {
                        json!(["NaN", lon, alt])
                    } else {
                        json!([lat, lon, alt])
                    }
                })
                .collect();
            feed.insert_raw(format!("{:02}", hour), Value::Array(rows));
        }

        feed
    }

    /// Renders the hazard feed.
    pub fn hazard_feed(&self) -> RawHazardFeed {
        self.hazards.clone()
    }

    /// `(lat, lon)` of the hazard at feed position `index`, if it is readable.
    pub fn hazard_position(&self, index: usize) -> Option<(f64, f64)> {
        let record = self.hazards.records.get(index)?;
        Some((record["latitude"].as_f64()?, record["longitude"].as_f64()?))
    }

    /// The balloon's observable snapshots (gaps and corrupt rows removed).
    pub fn observed_track(&self, id: usize) -> Vec<(usize, [f64; 3])> {
        (0..HOURS_PER_DAY)
            .filter(|&h| self.is_observed(h, id))
            .map(|h| (h, self.balloons[id].track[h]))
            .collect()
    }

    /// Whether `(hour, id)` survives ingestion.
    pub fn is_observed(&self, hour: usize, id: usize) -> bool {
        !self.gaps.contains(&(hour, id)) && !self.corrupt.contains(&(hour, id))
    }

    /// Reference total distance over observed hours (raw coordinates, meters).
    pub fn reference_distance_m(&self, id: usize) -> f64 {
        self.observed_track(id)
            .windows(2)
            .map(|w| haversine_m(w[0].1[0], w[0].1[1], w[1].1[0], w[1].1[1]))
            .sum()
    }

    /// Rows ingestion should skip (gaps are `null`, so they count too).
    pub fn expected_skipped_snapshots(&self) -> usize {
        self.gaps.len() + self.corrupt.len()
    }

    pub fn expected_skipped_hazards(&self) -> usize {
        self.bad_hazards
    }

    pub fn balloons(&self) -> &[GroundTruthBalloon] {
        &self.balloons
    }

    pub fn hazard_count(&self) -> usize {
        self.hazards.len()
    }

    fn push_hazard(&mut self, lat: f64, lon: f64) -> usize {
        let hour: u32 = self.rng.gen_range(0..24);
        let minute: u32 = self.rng.gen_range(0..60);
        let confidence = ["l", "n", "h"][self.rng.gen_range(0..3)];

        self.hazards.push_record(&FireRecord {
            latitude: lat,
            longitude: lon,
            acq_date: SIM_ACQ_DATE.to_string(),
            acq_time: AcqTime::Number(hour * 100 + minute),
            confidence: confidence.to_string(),
            frp: self.rng.gen_range(1.0..60.0),
        });
        self.hazards.len() - 1
    }
}

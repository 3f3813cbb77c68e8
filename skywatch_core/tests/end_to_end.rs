//! Whole-pipeline checks: feed records in, stats / playback / hazard classes out.

use skywatch_core::skywatch_stats::{compute_all, rank};
use skywatch_core::{
    ClassifierConfig, Engine, EngineHandle, HazardBucket, Playback, PlaybackConfig, RankMetric,
    Selection, SelectionTracker,
};
use skywatch_env::{AcqTime, FireRecord, JsonFileFeed, RawBalloonFeed, StaticFeed};

/// Three balloons, two hours, one fire ~1 km off balloon 1's path.
fn three_balloon_feed() -> StaticFeed {
    let mut balloons = RawBalloonFeed::new();
    balloons.insert_hour(0, vec![
        [40.0, -100.0, 12.0],
        [-20.0, 30.0, 15.0],
        [60.0, 150.0, 9.0],
    ]);
    balloons.insert_hour(1, vec![
        [40.5, -99.5, 13.0],
        [-20.0, 30.8, 16.0],
        [60.2, 151.0, 10.0],
    ]);

    let fires = vec![FireRecord {
        latitude: -20.01,
        longitude: 30.4,
        acq_date: "2025-02-14".to_string(),
        acq_time: AcqTime::Number(1315),
        confidence: "n".to_string(),
        frp: 8.2,
    }];

    StaticFeed::new(balloons, fires)
}

#[tokio::test]
async fn test_three_entities_one_hazard() {
    let feed = three_balloon_feed();
    let (engine, report) = Engine::load(&feed, &feed, ClassifierConfig::default())
        .await
        .unwrap();

    assert_eq!(report.snapshots.skipped, 0);
    assert_eq!(engine.stats().len(), 3);

    let near = engine.classify(1);
    assert!(near
        .segments
        .iter()
        .any(|s| matches!(s.bucket, HazardBucket::Red | HazardBucket::Orange | HazardBucket::Yellow)));
    assert_eq!(near.unique_hazard_count, 1);

    let far = engine.classify(2);
    assert!(!far.segments.is_empty());
    assert!(far.segments.iter().all(|s| s.bucket == HazardBucket::None));
    assert_eq!(far.unique_hazard_count, 0);
}

#[tokio::test]
async fn test_file_feed_skips_bad_hazard_record() {
    let dir = tempfile::tempdir().unwrap();
    let balloons = dir.path().join("balloons.json");
    let fires = dir.path().join("fires.json");

    tokio::fs::write(&balloons, r#"{"00": [[-20.0, 30.0, 15.0]], "01": [[-20.0, 30.8, 16.0]]}"#)
        .await
        .unwrap();
    tokio::fs::write(
        &fires,
        r#"[
            {"latitude": -20.01, "longitude": 30.4, "acq_date": "2025-02-14", "acq_time": 1315},
            {"latitude": "n/a", "longitude": 30.4, "acq_date": "2025-02-14", "acq_time": 1315}
        ]"#,
    )
    .await
    .unwrap();

    let feed = JsonFileFeed::new(&balloons, &fires);
    let (engine, report) = Engine::load(&feed, &feed, ClassifierConfig::default())
        .await
        .unwrap();

    assert_eq!(report.hazards.accepted, 1);
    assert_eq!(report.hazards.skipped, 1);
    assert_eq!(engine.index().len(), 1);
    assert_eq!(engine.classify(0).unique_hazard_count, 1);
}

#[tokio::test]
async fn test_playback_drives_positions() {
    let feed = three_balloon_feed();
    let handle = EngineHandle::default();
    handle.refresh(&feed, &feed).await.unwrap();

    let mut clock = Playback::new(PlaybackConfig {
        speed_hours_per_sec: 1.0,
        start_hour: 0.0,
    });
    clock.play();
    let t = clock.tick(0.5);

    let engine = handle.current();
    let frame = engine.positions_at(t);
    assert_eq!(frame.len(), 3);
    assert!((frame[1].lon - 30.4).abs() < 1e-9);

    // Hour 1 -> hour 2 has no data: nothing to draw
    assert!(engine.positions_at(1.5).is_empty());
    // ...but hour 1 itself is exact
    assert_eq!(engine.position_at(0, 1.0), engine.store().get(1, 0));
}

#[tokio::test]
async fn test_selection_change_discards_old_result() {
    let feed = three_balloon_feed();
    let (engine, _) = Engine::load(&feed, &feed, ClassifierConfig::default())
        .await
        .unwrap();
    let tracker = SelectionTracker::new();

    let slow = tracker.select(Selection::Entity(1));
    let result = engine.classify_selection(&slow);
    tracker.select(Selection::Entity(2));

    assert!(tracker.accept(&slow, result).is_none());
}

#[tokio::test]
async fn test_leaderboard_from_generation() {
    let feed = three_balloon_feed();
    let (engine, _) = Engine::load(&feed, &feed, ClassifierConfig::default())
        .await
        .unwrap();

    let stats = compute_all(engine.store());
    let top = rank(&stats, RankMetric::MaxAltitude, 1);
    assert_eq!(top, vec![(1, 16.0)]);
}

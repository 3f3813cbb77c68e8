//! Pull-based playback clock.
//!
//! The host's render loop owns the timing and calls [`Playback::tick`] with
//! the real elapsed seconds; the clock only converts that into a wrapped
//! fractional hour for `Engine::positions_at`.

use crate::skywatch_store::HOURS_PER_DAY;
use serde::{Deserialize, Serialize};

const DAY: f64 = HOURS_PER_DAY as f64;

/// Configuration for the playback clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Simulated hours per real second (default: 2.0). Negative plays backwards.
    pub speed_hours_per_sec: f64,

    /// Where the clock starts (default: 23.0, the most recent hour)
    pub start_hour: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed_hours_per_sec: 2.0,
            start_hour: 23.0,
        }
    }
}

/// A wrapping 24-hour clock advanced by explicit ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    time_hours: f64,
    playing: bool,
    config: PlaybackConfig,
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(PlaybackConfig::default())
    }
}

impl Playback {
    /// Creates a paused clock at `config.start_hour`.
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            time_hours: wrap_hour(config.start_hour),
            playing: false,
            config,
        }
    }

    /// Advances the clock by `delta_seconds` of wall time if playing.
    ///
    /// Returns the (possibly unchanged) fractional hour.
    pub fn tick(&mut self, delta_seconds: f64) -> f64 {
        if self.playing && delta_seconds.is_finite() {
            self.time_hours =
                wrap_hour(self.time_hours + delta_seconds * self.config.speed_hours_per_sec);
        }
        self.time_hours
    }

    /// Jumps to `hour` (wrapped into `[0, 24)`).
    pub fn seek(&mut self, hour: f64) {
        if hour.is_finite() {
            self.time_hours = wrap_hour(hour);
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn time(&self) -> f64 {
        self.time_hours
    }

    pub fn set_speed(&mut self, hours_per_sec: f64) {
        self.config.speed_hours_per_sec = hours_per_sec;
    }
}

fn wrap_hour(hour: f64) -> f64 {
    if !hour.is_finite() {
        return 0.0;
    }
    let wrapped = hour.rem_euclid(DAY);
    // rem_euclid rounds tiny negatives up to exactly 24
    if wrapped >= DAY {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_paused_clock_does_not_move() {
        let mut clock = Playback::default();
        assert_eq!(clock.tick(1.0), 23.0);
    }

    #[test]
    fn test_tick_wraps_forward() {
        let mut clock = Playback::default();
        clock.play();

        // 23h + 1s * 2h/s = 25h -> 1h
        assert_relative_eq!(clock.tick(1.0), 1.0);
        assert_relative_eq!(clock.tick(0.25), 1.5);
    }

    #[test]
    fn test_reverse_playback_wraps() {
        let mut clock = Playback::new(PlaybackConfig {
            speed_hours_per_sec: -2.0,
            start_hour: 0.5,
        });
        clock.play();

        assert_relative_eq!(clock.tick(0.5), 23.5);
    }

    #[test]
    fn test_seek_and_toggle() {
        let mut clock = Playback::default();
        clock.seek(-1.0);
        assert_eq!(clock.time(), 23.0);

        clock.seek(f64::NAN);
        assert_eq!(clock.time(), 23.0);

        assert!(clock.toggle());
        assert!(!clock.toggle());
    }

    #[test]
    fn test_tiny_negative_stays_in_range() {
        assert_eq!(wrap_hour(-1e-18), 0.0);
        assert!(wrap_hour(-1e-9) < 24.0);
    }
}

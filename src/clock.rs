//! Estimated playback clock.
//!
//! The engine reports time at a low refresh rate, so between its ticks the
//! controller extrapolates from the wall clock scaled by the playback rate.
//! All times are integer milliseconds. The estimate never runs past the
//! media length and never moves backwards except through an explicit seek.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the epoch. Only deltas are ever used.
pub(crate) fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Frame-accurate time estimate layered over the engine's coarse reports.
///
/// `last_engine_time` tracks the most recent engine report so a repeat
/// (engine has not ticked yet) switches the clock into extrapolation;
/// `last_wall_time` is the extrapolation baseline. Both are `None` right
/// after a seek so the next update re-synchronizes instead of extrapolating
/// across the discontinuity.
#[derive(Clone, Debug, Default)]
pub struct PlaybackClock {
    current_time: i64,
    last_engine_time: Option<i64>,
    last_wall_time: Option<i64>,
}

impl PlaybackClock {
    /// Current estimated playback time in milliseconds.
    pub fn time(&self) -> i64 {
        self.current_time
    }

    /// Advance the estimate for one accepted frame while playing forward.
    ///
    /// `engine_time` is the engine's latest report, `length` the media
    /// length (0 while unknown), `rate` the playback rate multiplier.
    pub fn advance(&mut self, engine_time: i64, length: i64, rate: f64, now_ms: i64) {
        if self.last_engine_time == Some(engine_time) {
            // Engine has not ticked; extrapolate from the wall clock.
            if let Some(last_wall) = self.last_wall_time {
                self.current_time += ((now_ms - last_wall) as f64 * rate) as i64;
                if length > 0 {
                    self.current_time = self.current_time.min(length);
                }
            }
        } else {
            self.last_engine_time = Some(engine_time);
            if engine_time > self.current_time {
                self.current_time = if length > 0 {
                    engine_time.min(length)
                } else {
                    engine_time
                };
            }
        }
        self.last_wall_time = Some(now_ms);
    }

    /// Refresh the wall-clock baseline without advancing the estimate
    /// (paused and reverse-playback paths).
    pub fn touch(&mut self, now_ms: i64) {
        self.last_wall_time = Some(now_ms);
    }

    /// Jump the clock for an explicit seek. Clamps to `[0, length]` (or
    /// `[0, inf)` while the length is unknown), invalidates both tracking
    /// baselines, and returns the clamped time.
    pub fn seek_to(&mut self, time: i64, length: i64) -> i64 {
        self.current_time = if length > 0 {
            time.clamp(0, length)
        } else {
            time.max(0)
        };
        self.last_engine_time = None;
        self.last_wall_time = None;
        self.current_time
    }
}

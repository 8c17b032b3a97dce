//! Media engine boundary - the capability set the controller drives.
//!
//! The engine is opaque: it decodes and renders on its own worker threads and
//! reports back through [`EngineSink`] (events, log lines) and a
//! [`VideoSink`](crate::video::VideoSink) (decoded frames). Everything the
//! controller needs from it is captured by the [`MediaEngine`] trait, so a
//! real engine binding and the scripted [`SimEngine`](crate::sim::SimEngine)
//! are interchangeable.

use std::sync::Arc;

use thiserror::Error;

use crate::queue::{AsyncRecord, EventQueue};
use crate::video::VideoSink;

/// Transport state as reported by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    NothingSpecial,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

/// Verbosity of an engine log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Notice,
    Warning,
    Error,
}

/// Events an engine may emit, possibly from any of its worker threads.
///
/// Marked non-exhaustive so an engine binding can grow new kinds without
/// breaking the controller; kinds the controller does not know are ignored.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    MediaChanged,
    NothingSpecial,
    Opening,
    /// Buffering progress, 0.0 - 100.0.
    Buffering(f32),
    Playing,
    Paused,
    Stopped,
    Forward,
    Backward,
    EndReached,
    EncounteredError,
    /// New playback time in milliseconds.
    TimeChanged(i64),
    /// New fractional position in `[0, 1]`.
    PositionChanged(f64),
    SeekableChanged(bool),
    PausableChanged(bool),
    /// New media length in milliseconds.
    LengthChanged(i64),
}

/// Failures an engine can surface synchronously.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine failed to open: {0}")]
    Open(String),
    #[error("cannot open media: {0}")]
    Media(String),
}

/// Handle an engine implementation uses to report events and log lines.
///
/// Cheap to clone; safe to call from any engine worker thread. Records are
/// queued and handled later on the consumer thread - nothing here ever calls
/// back into host-visible code.
#[derive(Clone)]
pub struct EngineSink {
    queue: Arc<EventQueue>,
}

impl EngineSink {
    pub(crate) fn new(queue: Arc<EventQueue>) -> Self {
        Self { queue }
    }

    /// Report an engine event.
    pub fn event(&self, event: EngineEvent) {
        self.queue.push(AsyncRecord::Event(event));
    }

    /// Report a formatted log line together with its raw format string.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, format: impl Into<String>) {
        self.queue.push(AsyncRecord::Log {
            level,
            message: message.into(),
            format: format.into(),
        });
    }
}

/// The capability set the controller drives.
///
/// Implementations must be callable from the consumer thread and the reverse
/// driver thread concurrently. Transport calls (`play`, `seek_time`, ...)
/// must not synchronously invoke the registered [`VideoSink`] on the calling
/// thread; decoded-frame callbacks belong on the engine's own threads.
pub trait MediaEngine: Send + Sync {
    /// Wire up the reporting sinks. Called once, before any other method.
    fn open(&self, events: EngineSink, video: Arc<dyn VideoSink>) -> Result<(), EngineError>;

    /// Release engine resources. Further calls are no-ops.
    fn close(&self);

    /// Select the media to play. Does not start playback by itself.
    fn load_media(&self, mrl: &str) -> Result<(), EngineError>;

    fn play(&self);
    fn pause(&self);
    fn toggle_pause(&self);
    fn stop(&self);

    /// Seek to an absolute time in milliseconds.
    fn seek_time(&self, ms: i64);
    /// Seek to a fractional position in `[0, 1]`.
    fn seek_position(&self, position: f64);

    fn rate(&self) -> f64;
    fn set_rate(&self, rate: f64);

    /// Last reported playback time in milliseconds. Coarse; may lag reality.
    fn time(&self) -> i64;
    /// Media length in milliseconds, 0 while unknown.
    fn length(&self) -> i64;
    /// Average frame rate, 0.0 while unknown.
    fn fps(&self) -> f64;
    fn state(&self) -> EngineState;

    fn volume(&self) -> u32;
    fn set_volume(&self, volume: u32);
    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);
    fn toggle_mute(&self);
}

//! Deterministic scripted engine.
//!
//! Stands in for a real engine binding in tests and the demo binary: every
//! transport call is recorded, reported time/state/length are plain fields
//! the driving code sets, and events/frames are emitted on demand - from
//! the test thread or from spawned "worker" threads to exercise the
//! cross-thread paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::engine::{EngineError, EngineEvent, EngineSink, EngineState, LogLevel, MediaEngine};
use crate::video::{FrameBuffer, VideoGeometry, VideoSink};

/// Transport call recorded by the engine, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum SimCommand {
    LoadMedia(String),
    Play,
    Pause,
    TogglePause,
    Stop,
    SeekTime(i64),
    SeekPosition(f64),
    SetRate(f64),
    SetVolume(u32),
    SetMuted(bool),
    ToggleMute,
    Close,
}

struct SimState {
    state: EngineState,
    time: i64,
    length: i64,
    fps: f64,
    rate: f64,
    volume: u32,
    muted: bool,
}

pub struct SimEngine {
    inner: Mutex<SimState>,
    events: Mutex<Option<EngineSink>>,
    video: Mutex<Option<Arc<dyn VideoSink>>>,
    commands: Mutex<Vec<SimCommand>>,
    /// When set, `seek_time`/`seek_position` immediately update the reported
    /// time, like an engine that honors seeks instantly. Turn off to script
    /// an engine that lags behind its seeks.
    apply_seeks: AtomicBool,
    fail_open: AtomicBool,
    fail_media: AtomicBool,
}

impl SimEngine {
    pub fn new(length: i64, fps: f64) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SimState {
                state: EngineState::NothingSpecial,
                time: 0,
                length,
                fps,
                rate: 1.0,
                volume: 100,
                muted: false,
            }),
            events: Mutex::new(None),
            video: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            apply_seeks: AtomicBool::new(true),
            fail_open: AtomicBool::new(false),
            fail_media: AtomicBool::new(false),
        })
    }

    // --- scripting knobs --------------------------------------------------

    pub fn set_apply_seeks(&self, apply: bool) {
        self.apply_seeks.store(apply, Ordering::Relaxed);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_media(&self, fail: bool) {
        self.fail_media.store(fail, Ordering::Relaxed);
    }

    /// Set the reported playback time without going through a seek.
    pub fn report_time(&self, ms: i64) {
        self.inner.lock().expect("lock").time = ms;
    }

    /// Set the reported transport state without emitting an event.
    pub fn report_state(&self, state: EngineState) {
        self.inner.lock().expect("lock").state = state;
    }

    pub fn report_length(&self, ms: i64) {
        self.inner.lock().expect("lock").length = ms;
    }

    // --- driving the bridge ----------------------------------------------

    /// Emit an event as an engine worker would.
    pub fn emit(&self, event: EngineEvent) {
        if let Some(sink) = self.events.lock().expect("lock").as_ref() {
            sink.event(event);
        }
    }

    /// Emit a log record as an engine worker would.
    pub fn emit_log(&self, level: LogLevel, message: &str, format: &str) {
        if let Some(sink) = self.events.lock().expect("lock").as_ref() {
            sink.log(level, message, format);
        }
    }

    /// Announce a frame geometry to the video sink. Blocks until the
    /// consumer thread services the setup, so call it from a worker thread
    /// while the consumer pumps.
    pub fn setup_video(&self, geometry: VideoGeometry) -> Option<Arc<FrameBuffer>> {
        let sink = self.video.lock().expect("lock").clone();
        sink.and_then(|sink| sink.frame_setup(geometry))
    }

    /// Flag one decoded frame as ready.
    pub fn deliver_frame(&self) {
        if let Some(sink) = self.video.lock().expect("lock").clone() {
            sink.frame_ready();
        }
    }

    pub fn cleanup_video(&self) {
        if let Some(sink) = self.video.lock().expect("lock").clone() {
            sink.frame_cleanup();
        }
    }

    // --- assertions -------------------------------------------------------

    pub fn commands(&self) -> Vec<SimCommand> {
        self.commands.lock().expect("lock").clone()
    }

    pub fn take_commands(&self) -> Vec<SimCommand> {
        std::mem::take(&mut *self.commands.lock().expect("lock"))
    }

    pub fn command_count(&self, command: &SimCommand) -> usize {
        self.commands
            .lock()
            .expect("lock")
            .iter()
            .filter(|c| *c == command)
            .count()
    }

    fn record(&self, command: SimCommand) {
        debug!("sim engine: {command:?}");
        self.commands.lock().expect("lock").push(command);
    }
}

impl MediaEngine for SimEngine {
    fn open(&self, events: EngineSink, video: Arc<dyn VideoSink>) -> Result<(), EngineError> {
        if self.fail_open.load(Ordering::Relaxed) {
            return Err(EngineError::Open("scripted open failure".into()));
        }
        *self.events.lock().expect("lock") = Some(events);
        *self.video.lock().expect("lock") = Some(video);
        Ok(())
    }

    fn close(&self) {
        self.record(SimCommand::Close);
        *self.events.lock().expect("lock") = None;
        *self.video.lock().expect("lock") = None;
    }

    fn load_media(&self, mrl: &str) -> Result<(), EngineError> {
        if self.fail_media.load(Ordering::Relaxed) {
            return Err(EngineError::Media(format!("scripted failure for {mrl}")));
        }
        self.record(SimCommand::LoadMedia(mrl.into()));
        let mut inner = self.inner.lock().expect("lock");
        inner.state = EngineState::Opening;
        inner.time = 0;
        Ok(())
    }

    fn play(&self) {
        self.record(SimCommand::Play);
        self.inner.lock().expect("lock").state = EngineState::Playing;
    }

    fn pause(&self) {
        self.record(SimCommand::Pause);
        self.inner.lock().expect("lock").state = EngineState::Paused;
    }

    fn toggle_pause(&self) {
        self.record(SimCommand::TogglePause);
        let mut inner = self.inner.lock().expect("lock");
        inner.state = match inner.state {
            EngineState::Playing => EngineState::Paused,
            _ => EngineState::Playing,
        };
    }

    fn stop(&self) {
        self.record(SimCommand::Stop);
        let mut inner = self.inner.lock().expect("lock");
        inner.state = EngineState::Stopped;
        inner.time = 0;
    }

    fn seek_time(&self, ms: i64) {
        self.record(SimCommand::SeekTime(ms));
        if self.apply_seeks.load(Ordering::Relaxed) {
            let mut inner = self.inner.lock().expect("lock");
            inner.time = if inner.length > 0 {
                ms.clamp(0, inner.length)
            } else {
                ms.max(0)
            };
        }
    }

    fn seek_position(&self, position: f64) {
        self.record(SimCommand::SeekPosition(position));
        if self.apply_seeks.load(Ordering::Relaxed) {
            let mut inner = self.inner.lock().expect("lock");
            inner.time = (position.clamp(0.0, 1.0) * inner.length as f64) as i64;
        }
    }

    fn rate(&self) -> f64 {
        self.inner.lock().expect("lock").rate
    }

    fn set_rate(&self, rate: f64) {
        self.record(SimCommand::SetRate(rate));
        self.inner.lock().expect("lock").rate = rate;
    }

    fn time(&self) -> i64 {
        self.inner.lock().expect("lock").time
    }

    fn length(&self) -> i64 {
        self.inner.lock().expect("lock").length
    }

    fn fps(&self) -> f64 {
        self.inner.lock().expect("lock").fps
    }

    fn state(&self) -> EngineState {
        self.inner.lock().expect("lock").state
    }

    fn volume(&self) -> u32 {
        self.inner.lock().expect("lock").volume
    }

    fn set_volume(&self, volume: u32) {
        self.record(SimCommand::SetVolume(volume));
        self.inner.lock().expect("lock").volume = volume;
    }

    fn muted(&self) -> bool {
        self.inner.lock().expect("lock").muted
    }

    fn set_muted(&self, muted: bool) {
        self.record(SimCommand::SetMuted(muted));
        self.inner.lock().expect("lock").muted = muted;
    }

    fn toggle_mute(&self) {
        self.record(SimCommand::ToggleMute);
        let mut inner = self.inner.lock().expect("lock");
        inner.muted = !inner.muted;
    }
}

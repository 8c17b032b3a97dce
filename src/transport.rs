//! Shared transport state and the synchronized seek entry point.
//!
//! [`Transport`] is the one object both the consumer thread and the reverse
//! driver thread talk through. Every mutation of the playback clock and the
//! load/seek state goes through the single mutex inside it, so a driver-
//! issued seek and a user-issued seek can never interleave halfway.
//!
//! Lock discipline: seek paths keep the lock across the engine call so the
//! engine observes seeks in the same order the state recorded them; all
//! other paths update state first and call the engine after releasing the
//! lock. The engine must never call back into `Transport` synchronously.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::PlaybackClock;
use crate::engine::{EngineState, MediaEngine};

/// How many consecutive matching frame deliveries confirm a seek target.
/// The engine sometimes re-sends the frame preceding the one asked for, so
/// the first match is not trusted on its own.
pub(crate) const MAX_SANITY_CHECKS: u32 = 5;

/// Load progress of the current media.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    /// Media selected; still steering the engine onto the requested start
    /// time and a paused, stable state.
    Getting,
    Loaded,
}

/// Everything guarded by the transport mutex.
pub(crate) struct TransportState {
    pub clock: PlaybackClock,
    pub load_state: LoadState,
    pub is_playing: bool,
    pub reverse: bool,
    /// A seek is in flight; frame deliveries are checked against the clock
    /// until `sanity_checks` confirms the target stuck.
    pub perform_seek: bool,
    pub sanity_checks: u32,
    pub rate_reverse: f64,
    pub fps_override: Option<f64>,
    pub buffering: f32,
}

impl TransportState {
    fn new() -> Self {
        Self {
            clock: PlaybackClock::default(),
            load_state: LoadState::Unloaded,
            is_playing: false,
            reverse: false,
            perform_seek: false,
            sanity_checks: MAX_SANITY_CHECKS,
            rate_reverse: 1.0,
            fps_override: None,
            buffering: 0.0,
        }
    }

    /// Back to the unloaded baseline; used by `stop` and `close`.
    pub fn reset(&mut self) {
        self.load_state = LoadState::Unloaded;
        self.is_playing = false;
        self.reverse = false;
        self.perform_seek = false;
        self.sanity_checks = MAX_SANITY_CHECKS;
        self.rate_reverse = 1.0;
        self.clock.seek_to(0, 0);
    }
}

/// Cloneable, thread-safe handle over the transport state and the engine.
///
/// This is the surface the reverse driver uses, and the one host callbacks
/// may hold on to; the full consumer-side API lives on
/// [`Player`](crate::player::Player), which delegates here.
#[derive(Clone)]
pub struct Transport {
    state: Arc<Mutex<TransportState>>,
    engine: Arc<dyn MediaEngine>,
}

impl Transport {
    pub(crate) fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState::new())),
            engine,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TransportState> {
        self.state.lock().expect("lock")
    }

    pub(crate) fn engine(&self) -> &dyn MediaEngine {
        &*self.engine
    }

    pub(crate) fn engine_arc(&self) -> Arc<dyn MediaEngine> {
        self.engine.clone()
    }

    // --- flags and simple properties -------------------------------------

    pub fn playing(&self) -> bool {
        self.lock().is_playing
    }

    pub fn playing_reverse(&self) -> bool {
        self.lock().reverse
    }

    /// Media length in milliseconds (0 while unknown).
    pub fn length(&self) -> i64 {
        self.engine.length()
    }

    /// Frame rate used for time/frame conversion: the override when set,
    /// otherwise the engine's reported average rate.
    pub fn fps(&self) -> f64 {
        self.lock().fps_override.unwrap_or_else(|| self.engine.fps())
    }

    /// Override the fps used for time/frame conversion (e.g. the raw frame
    /// rate instead of the engine's average). `None` restores the engine's.
    pub fn set_fps_override(&self, fps: Option<f64>) {
        self.lock().fps_override = fps;
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    /// Latest buffering progress reported by the engine, 0.0 - 100.0.
    pub fn buffering(&self) -> f32 {
        self.lock().buffering
    }

    pub fn rate(&self) -> f64 {
        self.engine.rate()
    }

    pub fn set_rate(&self, rate: f64) {
        self.engine.set_rate(rate);
    }

    pub fn rate_reverse(&self) -> f64 {
        self.lock().rate_reverse
    }

    /// Backward step multiplier for emulated reverse playback.
    pub fn set_rate_reverse(&self, rate: f64) {
        self.lock().rate_reverse = rate;
    }

    pub fn volume(&self) -> u32 {
        self.engine.volume()
    }

    pub fn set_volume(&self, volume: u32) {
        self.engine.set_volume(volume);
    }

    pub fn muted(&self) -> bool {
        self.engine.muted()
    }

    pub fn set_muted(&self, muted: bool) {
        self.engine.set_muted(muted);
    }

    pub fn toggle_mute(&self) {
        self.engine.toggle_mute();
    }

    // --- time / position / frame -----------------------------------------

    /// Estimated playback time in milliseconds.
    pub fn time(&self) -> i64 {
        self.lock().clock.time()
    }

    /// Seek to an absolute time. The single entry point every seek funnels
    /// through, including the reverse driver's backward steps.
    pub fn set_time(&self, ms: i64) {
        let mut st = self.lock();
        st.perform_seek = true;
        let clamped = st.clock.seek_to(ms, self.engine.length());
        self.engine.seek_time(clamped);
    }

    /// Fractional position in `[0, 1]`. 0.0 while the length is unknown.
    pub fn position(&self) -> f64 {
        let length = self.engine.length();
        if length == 0 {
            return 0.0;
        }
        self.time() as f64 / length as f64
    }

    pub fn set_position(&self, position: f64) {
        let position = position.clamp(0.0, 1.0);
        let length = self.engine.length();
        let mut st = self.lock();
        st.perform_seek = true;
        st.clock.seek_to((position * length as f64) as i64, length);
        self.engine.seek_position(position);
    }

    /// Total frame count derived from length and fps.
    pub fn frames(&self) -> f64 {
        let length = self.engine.length() as f64;
        (length * self.fps() / 1000.0).ceil() + 1.0
    }

    fn decimal_frame(&self) -> f64 {
        self.time() as f64 / (1000.0 / self.fps())
    }

    /// Current frame number, rounded, clamped to [`Transport::frames`].
    pub fn frame(&self) -> f64 {
        self.decimal_frame().round().min(self.frames())
    }

    /// Seek to a frame number (clamped to the valid range).
    pub fn set_frame(&self, frame: f64) {
        let frame = frame.clamp(0.0, self.frames());
        let length = self.engine.length();
        let target = (frame * (1000.0 / self.fps())) as i64;
        self.set_time(if length > 0 { target.min(length) } else { target });
    }

    /// Pause, then step back exactly one frame.
    pub fn previous_frame(&self) {
        self.pause();
        let current = self.decimal_frame();
        if current > 0.0 {
            self.set_frame(current.ceil() - 1.0);
        }
    }

    /// Pause, then step forward exactly one frame.
    pub fn next_frame(&self) {
        self.pause();
        let length = self.engine.length();
        let total = length as f64 / (1000.0 / self.fps());
        let current = self.decimal_frame();
        if current < total - 1.0 {
            self.set_frame(current.floor() + 1.0);
        } else {
            self.set_time(length);
        }
    }

    // --- transport --------------------------------------------------------

    pub fn play(&self) {
        {
            let mut st = self.lock();
            st.is_playing = true;
            st.reverse = false;
        }
        self.engine.play();
    }

    pub fn pause(&self) {
        {
            let mut st = self.lock();
            st.is_playing = false;
            st.reverse = false;
        }
        self.engine.pause();
    }

    pub fn toggle_pause(&self) {
        {
            let mut st = self.lock();
            st.is_playing = !st.is_playing;
            st.reverse = false;
        }
        self.engine.toggle_pause();
    }

    /// Stop playback and reset all transient transport state.
    pub fn stop(&self) {
        self.lock().reset();
        self.engine.stop();
    }
}

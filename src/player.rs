//! The playback controller: event dispatch plus the load/seek state machine.
//!
//! [`Player`] is a consumer-thread object. Engine worker threads never touch
//! it; everything they produce arrives through the record queue and is
//! handled inside [`Player::pump`]. The host blocks on [`Player::waker`] and
//! calls `pump` once per wake.
//!
//! # Load/seek state machine
//!
//! The engine reports time coarsely and occasionally re-delivers a frame
//! that a rapid re-seek already superseded. The controller therefore owns
//! its own clock and gates every frame delivery:
//!
//! - `Unloaded`: nothing to do.
//! - `Getting`: steering onto the requested start time. The engine has no
//!   "open paused" primitive, so the media is opened playing and paused
//!   right away; every frame delivery re-issues the seek until the engine
//!   sits paused exactly on the target, which delivers the first frame and
//!   completes the load.
//! - `Loaded` while playing: each frame refreshes the clock estimate and is
//!   delivered; reverse playback ends here when the engine reports zero.
//! - `Loaded` with a seek in flight: deliveries matching the target count
//!   down the sanity counter (the engine may re-send the post-seek frame a
//!   few times; each is delivered to stay responsive, only the last is
//!   authoritative); a mismatch means another seek superseded this one and
//!   the counter starts over.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, trace, warn};
use thiserror::Error;

use crate::clock::wall_clock_ms;
use crate::engine::{EngineError, EngineEvent, EngineSink, EngineState, LogLevel, MediaEngine};
use crate::events::{Callbacks, EventArgs, EventKind};
use crate::playlist::{PlaybackMode, Playlist};
use crate::queue::{AsyncRecord, EventQueue};
use crate::registry::{self, ShutdownHandle};
use crate::reverse::ReverseDriver;
use crate::timer::GraceTimer;
use crate::transport::{LoadState, MAX_SANITY_CHECKS, Transport};
use crate::video::{FrameBuffer, PixelFormat, VideoBridge, VideoGeometry};

/// How long an engine error may wait for a genuine end-of-media before the
/// controller treats it as one.
const ERROR_GRACE: Duration = Duration::from_millis(1000);

/// Engine log records longer than this are garbage and dropped.
const MAX_LOG_RECORD_LEN: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The engine could not be brought up; the instance is unusable.
    #[error("engine failed to open")]
    EngineOpen(#[source] EngineError),
    /// The media could not be opened; the player stays unloaded.
    #[error("cannot open media {mrl}")]
    MediaOpen {
        mrl: String,
        #[source] source: EngineError,
    },
}

/// Frame-accurate playback controller around an opaque [`MediaEngine`].
///
/// Owns the consumer-side machinery: the record queue drain, the load/seek
/// state machine, the notification fan-out and the frame buffer handle.
/// Deliberately not `Send`; construct and use it on the consumer thread.
pub struct Player {
    transport: Transport,
    queue: Arc<EventQueue>,
    wake_rx: Receiver<()>,
    video: Arc<VideoBridge>,
    callbacks: Callbacks,
    playlist: Playlist,
    reverse: ReverseDriver,
    grace: GraceTimer,
    registry_id: u64,
    closed: bool,
}

impl Player {
    /// Bring the engine up and wire the reporting paths. An engine that
    /// fails to open is fatal to the instance.
    pub fn new(engine: Arc<dyn MediaEngine>) -> Result<Self, PlayerError> {
        let (queue, wake_rx) = EventQueue::new();
        let video = Arc::new(VideoBridge::new(queue.clone()));

        engine
            .open(EngineSink::new(queue.clone()), video.clone())
            .map_err(PlayerError::EngineOpen)?;

        let transport = Transport::new(engine);
        let registry_id = registry::register(ShutdownHandle::new(transport.clone()));
        info!("player ready");

        Ok(Self {
            transport,
            queue,
            wake_rx,
            video,
            callbacks: Callbacks::default(),
            playlist: Playlist::new(),
            reverse: ReverseDriver::new(),
            grace: GraceTimer::new(),
            registry_id,
            closed: false,
        })
    }

    // --- consumer loop ----------------------------------------------------

    /// Receiver the consumer loop blocks on; one signal may cover any number
    /// of queued records.
    pub fn waker(&self) -> Receiver<()> {
        self.wake_rx.clone()
    }

    /// Drain and handle everything pending. Consumer thread only.
    ///
    /// Loops until the queue is quiescent, because handling one record can
    /// queue more. After every record the frame flag is polled so a burst of
    /// state events cannot starve frame delivery.
    pub fn pump(&mut self) {
        loop {
            let batch = self.queue.drain_all();
            if batch.is_empty() {
                if self.video.take_frame_pending() {
                    self.handle_frame_ready();
                    continue;
                }
                break;
            }
            for record in batch {
                self.process_record(record);
                if self.video.take_frame_pending() {
                    self.handle_frame_ready();
                }
            }
        }
    }

    fn process_record(&mut self, record: AsyncRecord) {
        match record {
            AsyncRecord::Event(event) => self.handle_engine_event(event),
            AsyncRecord::Log {
                level,
                message,
                format,
            } => self.handle_log(level, message, format),
            AsyncRecord::FrameSetup { geometry, reply } => {
                self.handle_frame_setup(geometry, reply);
            }
            AsyncRecord::FrameCleanup => {
                self.emit(EventKind::FrameCleanup, &EventArgs::None);
            }
            AsyncRecord::EndOfItemGrace => {
                debug!("error grace elapsed without end-of-media; advancing");
                self.current_item_end_reached();
            }
        }
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::MediaChanged => self.emit(EventKind::MediaChanged, &EventArgs::None),
            EngineEvent::NothingSpecial => {
                self.emit(EventKind::NothingSpecial, &EventArgs::None);
            }
            EngineEvent::Opening => self.emit(EventKind::Opening, &EventArgs::None),
            EngineEvent::Buffering(progress) => {
                self.transport.lock().buffering = progress;
                self.emit(EventKind::Buffering, &EventArgs::Number(progress as f64));
            }
            EngineEvent::Playing => self.emit(EventKind::Playing, &EventArgs::None),
            EngineEvent::Paused => self.emit(EventKind::Paused, &EventArgs::None),
            EngineEvent::Stopped => self.emit(EventKind::Stopped, &EventArgs::None),
            EngineEvent::Forward => self.emit(EventKind::Forward, &EventArgs::None),
            EngineEvent::Backward => self.emit(EventKind::Backward, &EventArgs::None),
            EngineEvent::EndReached => {
                // A pending error grace is obsolete: the real thing arrived.
                self.grace.cancel();
                self.current_item_end_reached();
                self.emit(EventKind::EndReached, &EventArgs::None);
            }
            EngineEvent::EncounteredError => {
                // The engine may still recover and follow up with a genuine
                // end-of-media; defer instead of advancing immediately.
                self.grace.arm(self.queue.clone(), ERROR_GRACE);
                self.emit(EventKind::EncounteredError, &EventArgs::None);
            }
            EngineEvent::TimeChanged(time) => {
                self.emit(EventKind::TimeChanged, &EventArgs::Number(time as f64));
            }
            EngineEvent::PositionChanged(position) => {
                self.emit(EventKind::PositionChanged, &EventArgs::Number(position));
            }
            EngineEvent::SeekableChanged(seekable) => {
                self.emit(EventKind::SeekableChanged, &EventArgs::Flag(seekable));
            }
            EngineEvent::PausableChanged(pausable) => {
                self.emit(EventKind::PausableChanged, &EventArgs::Flag(pausable));
            }
            EngineEvent::LengthChanged(length) => {
                self.emit(EventKind::LengthChanged, &EventArgs::Number(length as f64));
            }
        }
    }

    fn handle_log(&mut self, level: LogLevel, message: String, format: String) {
        if message.is_empty() || message.len() > MAX_LOG_RECORD_LEN {
            return;
        }
        match level {
            LogLevel::Debug => trace!("engine: {message}"),
            LogLevel::Notice => debug!("engine: {message}"),
            LogLevel::Warning => warn!("engine: {message}"),
            LogLevel::Error => error!("engine: {message}"),
        }
        self.emit(
            EventKind::LogMessage,
            &EventArgs::Log {
                level,
                message,
                format,
            },
        );
    }

    fn handle_frame_setup(&mut self, geometry: VideoGeometry, reply: Sender<Arc<FrameBuffer>>) {
        debug!(
            "frame setup: {}x{} {:?}, {} bytes",
            geometry.width(),
            geometry.height(),
            geometry.format(),
            geometry.size()
        );
        let buffer = Arc::new(FrameBuffer::new(geometry));
        self.video.install(buffer.clone());
        self.emit(
            EventKind::FrameSetup,
            &EventArgs::FrameSetup {
                width: geometry.width(),
                height: geometry.height(),
                format: geometry.format(),
                buffer: buffer.clone(),
            },
        );
        // Unblocks the decode thread waiting in frame_setup.
        let _ = reply.send(buffer);
    }

    /// One frame became ready since the last check; run the state machine.
    fn handle_frame_ready(&mut self) {
        let engine = self.transport.engine_arc();
        let engine_time = engine.time();

        let mut deliver = false;
        let mut begin_reached = false;
        {
            let mut st = self.transport.lock();
            match st.load_state {
                LoadState::Loaded => {
                    let now = wall_clock_ms();
                    if st.is_playing && !st.reverse {
                        st.clock
                            .advance(engine_time, engine.length(), engine.rate(), now);
                    } else {
                        st.clock.touch(now);
                    }

                    if st.is_playing {
                        st.sanity_checks = MAX_SANITY_CHECKS;
                        st.perform_seek = false;
                        deliver = true;

                        // Emulated reverse playback ran out of media.
                        if st.reverse && engine_time == 0 {
                            begin_reached = true;
                            st.is_playing = false;
                            st.reverse = false;
                        }
                    } else if st.perform_seek {
                        if engine_time == st.clock.time() {
                            deliver = true;
                            st.sanity_checks = st.sanity_checks.saturating_sub(1);
                            if st.sanity_checks == 0 {
                                st.perform_seek = false;
                                st.sanity_checks = MAX_SANITY_CHECKS;
                            }
                        } else {
                            // Another seek superseded the one in flight.
                            st.sanity_checks = MAX_SANITY_CHECKS;
                        }
                    }
                }
                LoadState::Getting => {
                    if engine.state() == EngineState::Paused {
                        if engine_time == st.clock.time() {
                            deliver = true;
                            st.load_state = LoadState::Loaded;
                            debug!("load complete at {engine_time}ms");
                        } else {
                            engine.seek_time(st.clock.time());
                        }
                    } else {
                        engine.pause();
                    }
                }
                LoadState::Unloaded => {}
            }
        }

        if deliver {
            self.deliver_frame();
        }
        if begin_reached {
            self.emit(EventKind::BeginReached, &EventArgs::None);
        }
    }

    fn deliver_frame(&mut self) {
        let Some(buffer) = self.video.current_frame() else {
            warn!("frame ready before any frame buffer was set up");
            return;
        };
        let frame = self.transport.frame();
        let time = self.transport.time() as f64;
        self.emit(EventKind::FrameReady, &EventArgs::Frame { buffer, frame, time });
    }

    fn current_item_end_reached(&mut self) {
        if let Some(mrl) = self.playlist.advance().map(str::to_string) {
            info!("advancing to next item: {mrl}");
            let _ = self.load_item(&mrl, true, 0);
        }
    }

    fn emit(&mut self, kind: EventKind, args: &EventArgs) {
        self.callbacks.emit(kind, args);
    }

    // --- handler registration ---------------------------------------------

    /// Install the single handler for `kind`, replacing any previous one.
    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&EventArgs) + 'static) {
        self.callbacks.set(kind, handler);
    }

    pub fn clear_handler(&mut self, kind: EventKind) {
        self.callbacks.clear(kind);
    }

    /// Add a listener receiving every event, after the per-kind handler.
    pub fn add_listener(&mut self, listener: impl FnMut(EventKind, &EventArgs) + 'static) {
        self.callbacks.add_listener(listener);
    }

    // --- loading ----------------------------------------------------------

    /// Open `mrl` and land on `at_time_ms`. With `start_playing` the media
    /// keeps playing from there; otherwise it is opened playing, paused
    /// immediately and steered onto the exact time without visibly playing
    /// past it.
    pub fn load(&mut self, mrl: &str, start_playing: bool, at_time_ms: i64) -> Result<(), PlayerError> {
        self.stop();
        self.playlist.clear();
        self.playlist.add(mrl);
        self.load_item(mrl, start_playing, at_time_ms)
    }

    /// Append an item the playlist advances to after the current one ends.
    pub fn add_media(&mut self, mrl: &str) {
        self.playlist.add(mrl);
    }

    fn load_item(
        &mut self,
        mrl: &str,
        start_playing: bool,
        at_time_ms: i64,
    ) -> Result<(), PlayerError> {
        let engine = self.transport.engine_arc();
        {
            let mut st = self.transport.lock();
            st.rate_reverse = 1.0;
            st.reverse = false;
            st.fps_override = None;
            st.clock.seek_to(at_time_ms, engine.length());
        }

        if let Err(source) = engine.load_media(mrl) {
            self.transport.lock().is_playing = false;
            warn!("failed to open media {mrl}: {source}");
            return Err(PlayerError::MediaOpen {
                mrl: mrl.into(),
                source,
            });
        }

        self.transport.lock().is_playing = start_playing;
        engine.play();
        if start_playing {
            let mut st = self.transport.lock();
            st.load_state = LoadState::Loaded;
            let target = st.clock.time();
            engine.seek_time(target);
        } else {
            // No "open paused" primitive: open playing, pause right away,
            // then let the state machine settle onto the requested time.
            self.transport.lock().load_state = LoadState::Getting;
            engine.pause();
        }
        debug!("loading {mrl} at {at_time_ms}ms (start_playing: {start_playing})");
        Ok(())
    }

    // --- transport --------------------------------------------------------

    /// Cloneable, thread-safe transport handle (shared with the reverse
    /// driver). Host callbacks may hold one to drive seeks.
    pub fn transport(&self) -> Transport {
        self.transport.clone()
    }

    pub fn play(&self) {
        self.transport.play();
    }

    /// Start emulated reverse playback. A no-op while already reversing; at
    /// most one driver loop exists per player.
    pub fn play_reverse(&mut self) {
        {
            let mut st = self.transport.lock();
            if st.reverse {
                return;
            }
            st.is_playing = true;
            st.reverse = true;
        }
        self.transport.engine().pause();
        self.reverse.start(self.transport.clone());
    }

    pub fn pause(&self) {
        self.transport.pause();
    }

    pub fn toggle_pause(&self) {
        self.transport.toggle_pause();
    }

    pub fn stop(&self) {
        self.transport.stop();
    }

    /// Tear the instance down: stop the reverse driver and the grace timer,
    /// drop the frame buffer, close the engine. Idempotent; also runs on
    /// drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        {
            let mut st = self.transport.lock();
            st.is_playing = false;
            st.reverse = false;
            st.load_state = LoadState::Unloaded;
        }
        self.reverse.join();
        self.grace.cancel();
        self.video.clear();
        self.transport.engine().close();
        registry::unregister(self.registry_id);
        debug!("player closed");
    }

    // --- properties -------------------------------------------------------

    pub fn playing(&self) -> bool {
        self.transport.playing()
    }

    pub fn playing_reverse(&self) -> bool {
        self.transport.playing_reverse()
    }

    pub fn length(&self) -> i64 {
        self.transport.length()
    }

    pub fn fps(&self) -> f64 {
        self.transport.fps()
    }

    pub fn set_fps_override(&self, fps: Option<f64>) {
        self.transport.set_fps_override(fps);
    }

    pub fn frames(&self) -> f64 {
        self.transport.frames()
    }

    pub fn state(&self) -> EngineState {
        self.transport.state()
    }

    pub fn buffering(&self) -> f32 {
        self.transport.buffering()
    }

    pub fn time(&self) -> i64 {
        self.transport.time()
    }

    pub fn set_time(&self, ms: i64) {
        self.transport.set_time(ms);
    }

    pub fn position(&self) -> f64 {
        self.transport.position()
    }

    pub fn set_position(&self, position: f64) {
        self.transport.set_position(position);
    }

    pub fn frame(&self) -> f64 {
        self.transport.frame()
    }

    pub fn set_frame(&self, frame: f64) {
        self.transport.set_frame(frame);
    }

    pub fn previous_frame(&self) {
        self.transport.previous_frame();
    }

    pub fn next_frame(&self) {
        self.transport.next_frame();
    }

    pub fn rate(&self) -> f64 {
        self.transport.rate()
    }

    pub fn set_rate(&self, rate: f64) {
        self.transport.set_rate(rate);
    }

    pub fn rate_reverse(&self) -> f64 {
        self.transport.rate_reverse()
    }

    pub fn set_rate_reverse(&self, rate: f64) {
        self.transport.set_rate_reverse(rate);
    }

    pub fn volume(&self) -> u32 {
        self.transport.volume()
    }

    pub fn set_volume(&self, volume: u32) {
        self.transport.set_volume(volume);
    }

    pub fn muted(&self) -> bool {
        self.transport.muted()
    }

    pub fn set_muted(&self, muted: bool) {
        self.transport.set_muted(muted);
    }

    pub fn toggle_mute(&self) {
        self.transport.toggle_mute();
    }

    /// Handle to the buffer the current frame lives in, once set up.
    pub fn video_frame(&self) -> Option<Arc<FrameBuffer>> {
        self.video.current_frame()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.video.format()
    }

    /// Select the pixel format delivered by the engine. Takes effect at the
    /// next media load.
    pub fn set_pixel_format(&self, format: PixelFormat) {
        self.video.set_format(format);
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.playlist.mode()
    }

    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        self.playlist.set_mode(mode);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCommand, SimEngine};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::thread;
    use std::time::Instant;

    const RV32_16X16: VideoGeometry = VideoGeometry::Rv32 {
        width: 16,
        height: 16,
        size: 16 * 16 * 4,
    };

    /// Run the frame-setup rendezvous: a worker announces the geometry while
    /// the consumer pumps.
    fn install_video(player: &mut Player, engine: &Arc<SimEngine>) {
        let worker_engine = engine.clone();
        let worker = thread::spawn(move || worker_engine.setup_video(RV32_16X16));
        let deadline = Instant::now() + Duration::from_secs(5);
        while !worker.is_finished() {
            player.pump();
            assert!(Instant::now() < deadline, "frame setup never completed");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(worker.join().unwrap().is_some());
    }

    fn frame_counter(player: &mut Player) -> Rc<Cell<usize>> {
        let counter = Rc::new(Cell::new(0));
        let c = counter.clone();
        player.on(EventKind::FrameReady, move |_| c.set(c.get() + 1));
        counter
    }

    fn load_state(player: &Player) -> LoadState {
        player.transport.lock().load_state
    }

    #[test]
    fn engine_open_failure_is_fatal() {
        let engine = SimEngine::new(0, 0.0);
        engine.set_fail_open(true);
        assert!(matches!(
            Player::new(engine),
            Err(PlayerError::EngineOpen(_))
        ));
    }

    #[test]
    fn bad_media_leaves_player_unloaded() {
        let engine = SimEngine::new(0, 0.0);
        let mut player = Player::new(engine.clone()).unwrap();
        engine.set_fail_media(true);

        assert!(player.load("bad://mrl", true, 0).is_err());
        assert!(!player.playing());
        assert_eq!(load_state(&player), LoadState::Unloaded);
    }

    #[test]
    fn load_settles_through_getting_onto_the_requested_time() {
        let engine = SimEngine::new(10_000, 25.0);
        engine.set_apply_seeks(false);
        let mut player = Player::new(engine.clone()).unwrap();
        install_video(&mut player, &engine);
        let frames = frame_counter(&mut player);

        player.load("sim://clip", false, 2_000).unwrap();
        assert_eq!(load_state(&player), LoadState::Getting);
        assert_eq!(player.time(), 2_000);
        engine.take_commands();

        // Engine still reports 0ms: every delivery re-issues the seek and
        // the machine stays in Getting.
        for _ in 0..2 {
            engine.deliver_frame();
            player.pump();
        }
        assert_eq!(load_state(&player), LoadState::Getting);
        assert_eq!(engine.command_count(&SimCommand::SeekTime(2_000)), 2);
        assert_eq!(frames.get(), 0);

        // Engine finally sits paused on the target: first frame, Loaded.
        engine.report_time(2_000);
        engine.deliver_frame();
        player.pump();
        assert_eq!(load_state(&player), LoadState::Loaded);
        assert_eq!(frames.get(), 1);
    }

    #[test]
    fn getting_pauses_a_still_playing_engine() {
        let engine = SimEngine::new(10_000, 25.0);
        engine.set_apply_seeks(false);
        let mut player = Player::new(engine.clone()).unwrap();
        install_video(&mut player, &engine);

        player.load("sim://clip", false, 0).unwrap();
        engine.report_state(EngineState::Playing);
        engine.take_commands();

        engine.deliver_frame();
        player.pump();
        assert_eq!(engine.command_count(&SimCommand::Pause), 1);
        assert_eq!(load_state(&player), LoadState::Getting);
    }

    #[test]
    fn pending_seek_confirms_after_five_matching_deliveries() {
        let engine = SimEngine::new(10_000, 25.0);
        engine.set_apply_seeks(false);
        let mut player = Player::new(engine.clone()).unwrap();
        install_video(&mut player, &engine);
        let frames = frame_counter(&mut player);

        // Reach Loaded, paused, at 0ms.
        player.load("sim://clip", false, 0).unwrap();
        engine.deliver_frame();
        player.pump();
        assert_eq!(load_state(&player), LoadState::Loaded);
        frames.set(0);

        // Paused seek to 3000ms.
        player.set_time(3_000);
        assert!(player.transport.lock().perform_seek);
        engine.report_time(3_000);

        // Two matching deliveries: both forwarded, seek still pending.
        for _ in 0..2 {
            engine.deliver_frame();
            player.pump();
        }
        assert_eq!(frames.get(), 2);
        assert!(player.transport.lock().perform_seek);
        assert_eq!(player.transport.lock().sanity_checks, 3);

        // A stale frame shows up: not forwarded, counter starts over.
        engine.report_time(2_960);
        engine.deliver_frame();
        player.pump();
        assert_eq!(frames.get(), 2);
        assert_eq!(player.transport.lock().sanity_checks, MAX_SANITY_CHECKS);

        // Five consecutive matches confirm the target and clear the flag.
        engine.report_time(3_000);
        for _ in 0..5 {
            engine.deliver_frame();
            player.pump();
        }
        assert_eq!(frames.get(), 7);
        assert!(!player.transport.lock().perform_seek);

        // Further deliveries while paused with no seek pending are dropped.
        engine.deliver_frame();
        player.pump();
        assert_eq!(frames.get(), 7);
    }

    #[test]
    fn playing_deliveries_reset_seek_tracking() {
        let engine = SimEngine::new(10_000, 25.0);
        let mut player = Player::new(engine.clone()).unwrap();
        install_video(&mut player, &engine);
        let frames = frame_counter(&mut player);

        player.load("sim://clip", true, 0).unwrap();
        player.set_time(4_000);
        {
            let st = player.transport.lock();
            assert!(st.perform_seek);
        }

        engine.deliver_frame();
        player.pump();
        assert_eq!(frames.get(), 1);
        let st = player.transport.lock();
        assert!(!st.perform_seek);
        assert_eq!(st.sanity_checks, MAX_SANITY_CHECKS);
    }

    #[test]
    fn frame_round_trip_at_25fps() {
        let engine = SimEngine::new(10_000, 25.0);
        let player = Player::new(engine).unwrap();

        player.set_frame(50.0);
        assert_eq!(player.time(), 2_000);
        assert_eq!(player.frame(), 50.0);
        assert_eq!(player.frames(), 251.0);
        assert!((player.position() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn seek_accessors_clamp() {
        let engine = SimEngine::new(10_000, 25.0);
        let player = Player::new(engine).unwrap();

        player.set_time(-500);
        assert_eq!(player.time(), 0);
        player.set_time(99_999);
        assert_eq!(player.time(), 10_000);
        player.set_position(2.0);
        assert_eq!(player.time(), 10_000);
        assert_eq!(player.position(), 1.0);
    }

    #[test]
    fn frame_stepping_pauses_and_moves_one_frame() {
        let engine = SimEngine::new(10_000, 25.0);
        let player = Player::new(engine.clone()).unwrap();

        player.set_frame(50.0);
        player.next_frame();
        assert_eq!(player.frame(), 51.0);
        player.previous_frame();
        player.previous_frame();
        assert_eq!(player.frame(), 49.0);
        assert!(!player.playing());
        assert!(engine.command_count(&SimCommand::Pause) >= 3);
    }

    #[test]
    fn reverse_playback_stops_at_begin_of_media() {
        let engine = SimEngine::new(10_000, 25.0);
        let mut player = Player::new(engine.clone()).unwrap();
        install_video(&mut player, &engine);

        player.load("sim://clip", true, 0).unwrap();
        engine.report_time(0);

        player.play_reverse();
        assert!(player.playing_reverse());
        // Second call is a no-op while still reversing.
        player.play_reverse();

        let begin = Rc::new(Cell::new(0));
        let b = begin.clone();
        player.on(EventKind::BeginReached, move |_| b.set(b.get() + 1));

        engine.deliver_frame();
        player.pump();
        assert_eq!(begin.get(), 1);
        assert!(!player.playing());
        assert!(!player.playing_reverse());
        player.close();
    }

    #[test]
    fn error_grace_advances_playlist_once_after_a_second() {
        let engine = SimEngine::new(10_000, 25.0);
        let mut player = Player::new(engine.clone()).unwrap();

        player.load("sim://first", true, 0).unwrap();
        player.add_media("sim://second");
        engine.take_commands();

        engine.emit(EngineEvent::EncounteredError);
        player.pump();

        thread::sleep(Duration::from_millis(600));
        player.pump();
        assert_eq!(
            engine.command_count(&SimCommand::LoadMedia("sim://second".into())),
            0,
            "advanced before the grace window elapsed"
        );

        thread::sleep(Duration::from_millis(700));
        player.pump();
        assert_eq!(
            engine.command_count(&SimCommand::LoadMedia("sim://second".into())),
            1
        );

        // Nothing further happens.
        thread::sleep(Duration::from_millis(200));
        player.pump();
        assert_eq!(
            engine.command_count(&SimCommand::LoadMedia("sim://second".into())),
            1
        );
    }

    #[test]
    fn end_reached_within_grace_cancels_the_timer() {
        let engine = SimEngine::new(10_000, 25.0);
        let mut player = Player::new(engine.clone()).unwrap();

        player.load("sim://first", true, 0).unwrap();
        player.add_media("sim://second");
        engine.take_commands();

        engine.emit(EngineEvent::EncounteredError);
        player.pump();
        engine.emit(EngineEvent::EndReached);
        player.pump();
        assert_eq!(
            engine.command_count(&SimCommand::LoadMedia("sim://second".into())),
            1
        );

        // The grace timer was cancelled; no second advance.
        thread::sleep(Duration::from_millis(1_300));
        player.pump();
        assert_eq!(
            engine.command_count(&SimCommand::LoadMedia("sim://second".into())),
            1
        );
    }

    #[test]
    fn single_mode_never_advances_on_end() {
        let engine = SimEngine::new(10_000, 25.0);
        let mut player = Player::new(engine.clone()).unwrap();
        player.set_playback_mode(PlaybackMode::Single);

        player.load("sim://first", true, 0).unwrap();
        player.add_media("sim://second");
        engine.take_commands();

        engine.emit(EngineEvent::EndReached);
        player.pump();
        assert_eq!(engine.command_count(&SimCommand::LoadMedia("sim://second".into())), 0);
    }

    #[test]
    fn events_fan_out_in_processing_order() {
        let engine = SimEngine::new(10_000, 25.0);
        let mut player = Player::new(engine.clone()).unwrap();

        let order = Rc::new(RefCell::new(Vec::new()));
        let o = order.clone();
        player.add_listener(move |kind, _| o.borrow_mut().push(kind));

        engine.emit(EngineEvent::Opening);
        engine.emit(EngineEvent::Buffering(50.0));
        engine.emit(EngineEvent::Playing);
        engine.emit(EngineEvent::TimeChanged(123));
        player.pump();

        assert_eq!(
            *order.borrow(),
            vec![
                EventKind::Opening,
                EventKind::Buffering,
                EventKind::Playing,
                EventKind::TimeChanged,
            ]
        );
        assert_eq!(player.buffering(), 50.0);
    }

    #[test]
    fn malformed_log_records_are_dropped() {
        let engine = SimEngine::new(10_000, 25.0);
        let mut player = Player::new(engine.clone()).unwrap();

        let logs = Rc::new(RefCell::new(Vec::new()));
        let l = logs.clone();
        player.on(EventKind::LogMessage, move |args| {
            if let EventArgs::Log { message, .. } = args {
                l.borrow_mut().push(message.clone());
            }
        });

        engine.emit_log(LogLevel::Debug, "demux ok", "demux %s");
        engine.emit_log(LogLevel::Warning, "", "%s");
        let oversized = "x".repeat(MAX_LOG_RECORD_LEN + 1);
        engine.emit_log(LogLevel::Error, &oversized, "%s");
        player.pump();

        assert_eq!(*logs.borrow(), vec!["demux ok".to_string()]);
    }

    #[test]
    fn frame_setup_allocates_and_notifies() {
        let engine = SimEngine::new(10_000, 25.0);
        let mut player = Player::new(engine.clone()).unwrap();

        let setups = Rc::new(Cell::new(0));
        let s = setups.clone();
        player.on(EventKind::FrameSetup, move |args| {
            if let EventArgs::FrameSetup { width, height, .. } = args {
                assert_eq!((*width, *height), (16, 16));
                s.set(s.get() + 1);
            }
        });

        install_video(&mut player, &engine);
        assert_eq!(setups.get(), 1);
        let buffer = player.video_frame().expect("buffer installed");
        assert_eq!(buffer.data().len(), 16 * 16 * 4);
    }

    #[test]
    fn stop_resets_transport_state() {
        let engine = SimEngine::new(10_000, 25.0);
        let mut player = Player::new(engine.clone()).unwrap();

        player.load("sim://clip", true, 5_000).unwrap();
        player.set_rate_reverse(4.0);
        player.stop();

        assert!(!player.playing());
        assert_eq!(player.time(), 0);
        assert_eq!(player.rate_reverse(), 1.0);
        assert_eq!(load_state(&player), LoadState::Unloaded);
        assert!(engine.commands().contains(&SimCommand::Stop));
    }
}

//! framedeck - frame-accurate playback transport over an embeddable media
//! engine.
//!
//! The engine decodes and renders on its own worker threads and is only
//! specified at its boundary ([`engine::MediaEngine`]); this crate owns the
//! bridge between those threads and a single-threaded consumer: an ordered
//! cross-thread event queue, the load/seek state machine that compensates
//! for the engine's coarse and occasionally stale time reports, a
//! wall-clock time estimator, an emulated reverse-playback driver, and the
//! named-notification fan-out.
//!
//! ```no_run
//! use framedeck::{Player, sim::SimEngine};
//!
//! let engine = SimEngine::new(10_000, 25.0);
//! let mut player = Player::new(engine)?;
//! let waker = player.waker();
//!
//! player.load("file:///clip.mp4", false, 2_000)?;
//! while waker.recv().is_ok() {
//!     player.pump();
//! }
//! # Ok::<(), framedeck::PlayerError>(())
//! ```

// Engine-facing boundary
pub mod engine;
pub mod video;

// Cross-thread bridge and consumer-side machinery
pub mod clock;
pub mod events;
pub mod playlist;
pub mod queue;
pub mod player;
pub mod registry;
pub mod transport;
mod reverse;
mod timer;

// Scripted engine for tests and demos
pub mod sim;

// Re-export the common surface
pub use engine::{EngineError, EngineEvent, EngineSink, EngineState, LogLevel, MediaEngine};
pub use events::{EventArgs, EventKind};
pub use player::{Player, PlayerError};
pub use playlist::PlaybackMode;
pub use transport::{LoadState, Transport};
pub use video::{FrameBuffer, PixelFormat, VideoGeometry, VideoSink};

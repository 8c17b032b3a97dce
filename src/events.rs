//! Named notifications and their fan-out to registered handlers.
//!
//! Two delivery paths, always both, in this order: the single handler
//! registered for the kind (if any), then every general listener in
//! registration order. A listener registered late still sees every event
//! emitted afterwards. Emission happens only on the consumer thread, in the
//! same order records were processed - no reordering, no coalescing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::LogLevel;
use crate::video::{FrameBuffer, PixelFormat};

/// Every notification the controller can emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    FrameSetup,
    FrameReady,
    FrameCleanup,

    MediaChanged,
    NothingSpecial,
    Opening,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Forward,
    Backward,
    BeginReached,
    EndReached,
    EncounteredError,

    TimeChanged,
    PositionChanged,
    SeekableChanged,
    PausableChanged,
    LengthChanged,

    LogMessage,
}

impl EventKind {
    pub const ALL: [EventKind; 21] = [
        EventKind::FrameSetup,
        EventKind::FrameReady,
        EventKind::FrameCleanup,
        EventKind::MediaChanged,
        EventKind::NothingSpecial,
        EventKind::Opening,
        EventKind::Buffering,
        EventKind::Playing,
        EventKind::Paused,
        EventKind::Stopped,
        EventKind::Forward,
        EventKind::Backward,
        EventKind::BeginReached,
        EventKind::EndReached,
        EventKind::EncounteredError,
        EventKind::TimeChanged,
        EventKind::PositionChanged,
        EventKind::SeekableChanged,
        EventKind::PausableChanged,
        EventKind::LengthChanged,
        EventKind::LogMessage,
    ];

    /// Stable name, usable as an event key by the binding layer.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::FrameSetup => "FrameSetup",
            EventKind::FrameReady => "FrameReady",
            EventKind::FrameCleanup => "FrameCleanup",
            EventKind::MediaChanged => "MediaChanged",
            EventKind::NothingSpecial => "NothingSpecial",
            EventKind::Opening => "Opening",
            EventKind::Buffering => "Buffering",
            EventKind::Playing => "Playing",
            EventKind::Paused => "Paused",
            EventKind::Stopped => "Stopped",
            EventKind::Forward => "Forward",
            EventKind::Backward => "Backward",
            EventKind::BeginReached => "BeginReached",
            EventKind::EndReached => "EndReached",
            EventKind::EncounteredError => "EncounteredError",
            EventKind::TimeChanged => "TimeChanged",
            EventKind::PositionChanged => "PositionChanged",
            EventKind::SeekableChanged => "SeekableChanged",
            EventKind::PausableChanged => "PausableChanged",
            EventKind::LengthChanged => "LengthChanged",
            EventKind::LogMessage => "LogMessage",
        }
    }
}

/// Payload handed to handlers alongside the kind.
#[derive(Clone, Debug)]
pub enum EventArgs {
    None,
    /// Time, position, length or buffering payload.
    Number(f64),
    /// Seekable/pausable payload.
    Flag(bool),
    /// New frame geometry plus the freshly allocated shared buffer.
    FrameSetup {
        width: u32,
        height: u32,
        format: PixelFormat,
        buffer: Arc<FrameBuffer>,
    },
    /// A decoded frame is ready in `buffer`.
    Frame {
        buffer: Arc<FrameBuffer>,
        frame: f64,
        time: f64,
    },
    /// Forwarded engine log line.
    Log {
        level: LogLevel,
        message: String,
        format: String,
    },
}

type Handler = Box<dyn FnMut(&EventArgs)>;
type Listener = Box<dyn FnMut(EventKind, &EventArgs)>;

/// Per-kind single-slot handlers plus the general listener list.
///
/// Consumer thread only; deliberately not `Send`.
#[derive(Default)]
pub struct Callbacks {
    slots: HashMap<EventKind, Handler>,
    listeners: Vec<Listener>,
}

impl Callbacks {
    /// Install the handler for `kind`, replacing any previous one.
    pub fn set(&mut self, kind: EventKind, handler: impl FnMut(&EventArgs) + 'static) {
        self.slots.insert(kind, Box::new(handler));
    }

    pub fn clear(&mut self, kind: EventKind) {
        self.slots.remove(&kind);
    }

    /// Append a listener that receives every event. FIFO relative to other
    /// listeners.
    pub fn add_listener(&mut self, listener: impl FnMut(EventKind, &EventArgs) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, kind: EventKind, args: &EventArgs) {
        if let Some(handler) = self.slots.get_mut(&kind) {
            handler(args);
        }
        for listener in &mut self.listeners {
            listener(kind, args);
        }
    }
}

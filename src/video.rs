//! Decoded-frame plumbing between the engine's decode thread and the
//! consumer thread.
//!
//! The engine announces a frame geometry once per media (or geometry
//! change); the consumer thread allocates one reusable [`FrameBuffer`] for
//! it. The decode thread then fills that buffer and flags readiness; actual
//! delivery to handlers happens on the consumer thread during
//! [`Player::pump`](crate::player::Player::pump).
//!
//! The engine's decode/deliver contract guarantees a fill never overlaps a
//! geometry change, but the buffer still carries its own lock so both sides
//! stay safe against a misbehaving engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::bounded;
use log::warn;

use crate::queue::{AsyncRecord, EventQueue};

/// Frame pixel layouts the controller understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit RGB, one packed plane.
    Rv32,
    /// Planar YUV 4:2:0; U and V planes at fixed offsets into the buffer.
    I420,
}

/// Geometry of one decoded frame, tagged by pixel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoGeometry {
    Rv32 {
        width: u32,
        height: u32,
        size: usize,
    },
    I420 {
        width: u32,
        height: u32,
        size: usize,
        u_offset: usize,
        v_offset: usize,
    },
}

impl VideoGeometry {
    pub fn format(&self) -> PixelFormat {
        match self {
            VideoGeometry::Rv32 { .. } => PixelFormat::Rv32,
            VideoGeometry::I420 { .. } => PixelFormat::I420,
        }
    }

    pub fn width(&self) -> u32 {
        match *self {
            VideoGeometry::Rv32 { width, .. } | VideoGeometry::I420 { width, .. } => width,
        }
    }

    pub fn height(&self) -> u32 {
        match *self {
            VideoGeometry::Rv32 { height, .. } | VideoGeometry::I420 { height, .. } => height,
        }
    }

    pub fn size(&self) -> usize {
        match *self {
            VideoGeometry::Rv32 { size, .. } | VideoGeometry::I420 { size, .. } => size,
        }
    }

    /// A zero dimension, size or plane offset marks a broken report from the
    /// engine; such frames are rejected outright.
    pub fn is_valid(&self) -> bool {
        match *self {
            VideoGeometry::Rv32 {
                width,
                height,
                size,
            } => width != 0 && height != 0 && size != 0,
            VideoGeometry::I420 {
                width,
                height,
                size,
                u_offset,
                v_offset,
            } => width != 0 && height != 0 && size != 0 && u_offset != 0 && v_offset != 0,
        }
    }
}

/// The single reusable buffer decoded frames land in.
///
/// Allocated on the consumer thread when the engine reports a geometry;
/// lives until the next geometry change or close. The engine writes through
/// [`FrameBuffer::data`] from its decode thread; handlers read through the
/// same accessor on the consumer thread.
pub struct FrameBuffer {
    geometry: VideoGeometry,
    data: Mutex<Vec<u8>>,
}

impl FrameBuffer {
    pub(crate) fn new(geometry: VideoGeometry) -> Self {
        Self {
            geometry,
            data: Mutex::new(vec![0; geometry.size()]),
        }
    }

    pub fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    /// Lock the pixel data. Keep the guard short-lived.
    pub fn data(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock().expect("lock")
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("geometry", &self.geometry)
            .finish()
    }
}

/// What the engine's decode path calls into.
///
/// `frame_setup` and `frame_ready` run on decode worker threads; neither
/// touches host-visible state directly.
pub trait VideoSink: Send + Sync {
    /// Pixel format the host wants delivered.
    fn preferred_format(&self) -> PixelFormat;

    /// Announce a new frame geometry. Blocks until the consumer thread has
    /// allocated the shared buffer and returns it, or `None` when the
    /// geometry is rejected or the consumer is gone. Requires the consumer
    /// to be pumping.
    fn frame_setup(&self, geometry: VideoGeometry) -> Option<Arc<FrameBuffer>>;

    /// One decoded frame has been written into the shared buffer.
    fn frame_ready(&self);

    /// The decode pipeline released its output.
    fn frame_cleanup(&self);
}

/// Consumer-side half of the frame path, shared with the engine as its
/// [`VideoSink`].
pub(crate) struct VideoBridge {
    queue: Arc<EventQueue>,
    format: Mutex<PixelFormat>,
    current: Mutex<Option<Arc<FrameBuffer>>>,
    frame_pending: AtomicBool,
}

impl VideoBridge {
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self {
            queue,
            format: Mutex::new(PixelFormat::Rv32),
            current: Mutex::new(None),
            frame_pending: AtomicBool::new(false),
        }
    }

    pub fn format(&self) -> PixelFormat {
        *self.format.lock().expect("lock")
    }

    pub fn set_format(&self, format: PixelFormat) {
        *self.format.lock().expect("lock") = format;
    }

    pub fn current_frame(&self) -> Option<Arc<FrameBuffer>> {
        self.current.lock().expect("lock").clone()
    }

    /// Consumer thread installs the buffer it allocated for a setup request.
    pub fn install(&self, buffer: Arc<FrameBuffer>) {
        *self.current.lock().expect("lock") = Some(buffer);
    }

    pub fn clear(&self) {
        *self.current.lock().expect("lock") = None;
        self.frame_pending.store(false, Ordering::Release);
    }

    /// True exactly once per flagged frame; the dispatcher polls this after
    /// each processed record.
    pub fn take_frame_pending(&self) -> bool {
        self.frame_pending.swap(false, Ordering::AcqRel)
    }
}

impl VideoSink for VideoBridge {
    fn preferred_format(&self) -> PixelFormat {
        self.format()
    }

    fn frame_setup(&self, geometry: VideoGeometry) -> Option<Arc<FrameBuffer>> {
        if !geometry.is_valid() {
            warn!("rejecting frame setup with degenerate geometry {geometry:?}");
            return None;
        }
        let (reply_tx, reply_rx) = bounded(1);
        self.queue.push(AsyncRecord::FrameSetup {
            geometry,
            reply: reply_tx,
        });
        // Rendezvous with the consumer thread; a dropped sender means the
        // player went away while we waited.
        reply_rx.recv().ok()
    }

    fn frame_ready(&self) {
        self.frame_pending.store(true, Ordering::Release);
        self.queue.wake();
    }

    fn frame_cleanup(&self) {
        self.queue.push(AsyncRecord::FrameCleanup);
    }
}

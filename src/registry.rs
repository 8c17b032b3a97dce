//! Process-wide registry of live player instances.
//!
//! Hosts embedding several players need one switch that shuts every engine
//! down at process exit, even from a thread that owns none of them. Players
//! register a thread-safe shutdown handle on construction and unregister on
//! drop; [`close_all`] walks whatever is registered at that moment. The lock
//! makes shutdown safe against a racing construction.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use log::info;
use once_cell::sync::Lazy;

use crate::engine::MediaEngine;
use crate::transport::Transport;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static REGISTRY: Lazy<Mutex<HashMap<u64, ShutdownHandle>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Thread-safe handle that can wind a player's engine down from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    transport: Transport,
}

impl ShutdownHandle {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Stop playback (which also parks the reverse driver) and close the
    /// engine. Idempotent.
    pub fn close(&self) {
        self.transport.stop();
        self.transport.engine().close();
    }
}

pub(crate) fn register(handle: ShutdownHandle) -> u64 {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    REGISTRY.lock().expect("lock").insert(id, handle);
    id
}

pub(crate) fn unregister(id: u64) {
    REGISTRY.lock().expect("lock").remove(&id);
}

/// Number of players currently alive.
pub fn live_count() -> usize {
    REGISTRY.lock().expect("lock").len()
}

/// Close every live player's engine. Meant for process shutdown; individual
/// players remain registered until they are dropped.
pub fn close_all() {
    // Snapshot under the lock, close outside it: a handle's close may take
    // the transport mutex and must not do so while holding the registry.
    let handles: Vec<ShutdownHandle> = REGISTRY.lock().expect("lock").values().cloned().collect();
    if !handles.is_empty() {
        info!("closing {} live player(s)", handles.len());
    }
    for handle in handles {
        handle.close();
    }
}

//! Emulated reverse playback.
//!
//! The engine only plays forward, so reverse playback is a supervised
//! background loop that repeatedly seeks backwards by one frame period
//! (scaled by the reverse rate) through the shared transport seek entry
//! point. Clearing the playing or reversing flag is the only stop signal;
//! the loop observes it at the top of each iteration, so wind-down is
//! bounded by one sleep interval.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::engine::MediaEngine;
use crate::transport::Transport;

pub(crate) struct ReverseDriver {
    handle: Option<JoinHandle<()>>,
}

impl ReverseDriver {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Spawn the loop. The caller has already set the playing/reversing
    /// flags under the transport lock and verified no driver is live, so at
    /// most one loop runs per instance.
    pub fn start(&mut self, transport: Transport) {
        self.reap();
        let handle = thread::Builder::new()
            .name("framedeck-reverse".into())
            .spawn(move || reverse_loop(transport))
            .expect("failed to spawn reverse driver thread");
        self.handle = Some(handle);
    }

    /// Drop the handle of a loop that already exited on its own.
    fn reap(&mut self) {
        if self.handle.as_ref().is_some_and(|h| h.is_finished())
            && let Some(handle) = self.handle.take()
        {
            let _ = handle.join();
        }
    }

    /// Join the loop. The caller must have cleared the playing/reversing
    /// flags first; the join then completes within one frame period.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReverseDriver {
    fn drop(&mut self) {
        self.join();
    }
}

fn reverse_loop(transport: Transport) {
    debug!("reverse driver started");
    loop {
        let (playing, reversing, rate_reverse) = {
            let st = transport.lock();
            (st.is_playing, st.reverse, st.rate_reverse)
        };
        if !playing || !reversing {
            break;
        }

        let fps = transport.fps();
        if fps <= 0.0 {
            warn!("reverse playback without a known fps; stopping driver");
            break;
        }
        let ms_per_frame = 1000.0 / fps;
        let step_back = (ms_per_frame * rate_reverse) as i64;

        // The forward state machine detects reaching zero independently and
        // clears the flags; we just stop issuing seeks.
        if transport.engine().time() > 0 {
            transport.set_time(transport.time() - step_back);
            thread::sleep(Duration::from_millis(ms_per_frame as u64));
        } else {
            break;
        }
    }
    debug!("reverse driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCommand, SimEngine};
    use std::time::Instant;

    fn transport_with_engine(length: i64) -> (std::sync::Arc<SimEngine>, Transport) {
        let engine = SimEngine::new(length, 25.0);
        let transport = Transport::new(engine.clone());
        (engine, transport)
    }

    #[test]
    fn loop_steps_backwards_until_engine_reports_zero() {
        let (engine, transport) = transport_with_engine(400);
        engine.report_time(400);
        {
            let mut st = transport.lock();
            st.is_playing = true;
            st.reverse = true;
        }
        transport.set_time(400);

        let mut driver = ReverseDriver::new();
        driver.start(transport.clone());

        // 25 fps, 1x reverse: 40ms steps from 400 down to 0.
        let deadline = Instant::now() + Duration::from_secs(30);
        while transport.engine().time() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        driver.join();

        assert_eq!(engine.time(), 0);
        let seeks: Vec<i64> = engine
            .commands()
            .iter()
            .filter_map(|c| match c {
                SimCommand::SeekTime(t) => Some(*t),
                _ => None,
            })
            .collect();
        // Strictly descending towards zero, 40ms apart.
        assert!(seeks.len() >= 2);
        assert!(seeks.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(*seeks.last().unwrap(), 0);
    }

    #[test]
    fn clearing_playing_stops_within_one_sleep_interval() {
        let (engine, transport) = transport_with_engine(10_000);
        engine.report_time(10_000);
        {
            let mut st = transport.lock();
            st.is_playing = true;
            st.reverse = true;
        }
        transport.set_time(10_000);

        let mut driver = ReverseDriver::new();
        driver.start(transport.clone());
        thread::sleep(Duration::from_millis(100));

        transport.lock().is_playing = false;
        let t0 = Instant::now();
        driver.join();
        // One 40ms sleep plus scheduling slack.
        assert!(t0.elapsed() < Duration::from_millis(500));
    }
}

//! Headless demo: drives the controller against the scripted engine and
//! prints every notification, the way a host binding would see them.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;

use framedeck::sim::SimEngine;
use framedeck::{EngineEvent, EventArgs, EventKind, Player, VideoGeometry};

/// Frame-accurate transport demo (scripted engine)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Media length in milliseconds
    #[arg(long, default_value_t = 2_000)]
    length: i64,

    /// Frame rate of the scripted media
    #[arg(long, default_value_t = 25.0)]
    fps: f64,

    /// Frame width/height of the scripted video
    #[arg(long, default_value_t = 64)]
    edge: u32,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let engine = SimEngine::new(args.length, args.fps);
    let mut player = Player::new(engine.clone())?;
    let waker = player.waker();

    player.add_listener(|kind, _| {
        if kind != EventKind::FrameReady {
            println!("event: {}", kind.name());
        }
    });
    player.on(EventKind::FrameReady, |event| {
        if let EventArgs::Frame { frame, time, .. } = event {
            println!("frame {frame:>4} @ {time}ms");
        }
    });

    player.load("sim://demo", true, 0)?;

    // Scripted "engine worker": announce the geometry, then tick frames at
    // the configured rate until the media runs out.
    let worker = {
        let engine = engine.clone();
        let edge = args.edge;
        let length = args.length;
        let fps = args.fps;
        thread::spawn(move || {
            let geometry = VideoGeometry::Rv32 {
                width: edge,
                height: edge,
                size: (edge * edge * 4) as usize,
            };
            let Some(buffer) = engine.setup_video(geometry) else {
                return;
            };
            let frame_period = Duration::from_millis((1000.0 / fps) as u64);
            let mut time = 0i64;
            let mut shade = 0u8;
            while time <= length {
                buffer.data().fill(shade);
                shade = shade.wrapping_add(1);
                engine.report_time(time);
                engine.deliver_frame();
                time += frame_period.as_millis() as i64;
                thread::sleep(frame_period);
            }
            engine.emit(EngineEvent::EndReached);
        })
    };

    // Consumer loop: wake, pump, repeat until the scripted media runs out.
    loop {
        match waker.recv_timeout(Duration::from_secs(5)) {
            Ok(()) => player.pump(),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if worker.is_finished() {
            player.pump();
            break;
        }
    }
    let _ = worker.join();

    println!(
        "done: {} frames over {}ms at {} fps",
        player.frames(),
        player.length(),
        player.fps()
    );
    player.close();
    Ok(())
}

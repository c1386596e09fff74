use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::models::error::CaptureError;
use crate::session::capture::CaptureSession;
use crate::traits::audio_backend::AudioDevice;
use crate::traits::frame_sink::FrameSink;

/// Counters for one capture run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub polls: u64,
    pub empty_polls: u64,
    pub bytes_captured: u64,
    pub frames_captured: u64,
    pub failed_writes: u64,
}

/// Poll `session` and feed `sink` until `stop` is set.
///
/// Single-threaded: `stop` is the only thing shared, typically set from a
/// Ctrl-C handler. Empty polls sleep for `poll_interval`. A buffer the sink
/// rejects is logged and dropped; a poll failure ends the run with an error,
/// and a closed output ends it normally.
pub fn run_capture<D: AudioDevice>(
    session: &mut CaptureSession<D>,
    sink: &mut dyn FrameSink,
    stop: &AtomicBool,
    poll_interval: Duration,
) -> Result<CaptureStats, CaptureError> {
    let frame_size = session.frame_size();
    let data_type = session.data_type();
    let mut stats = CaptureStats::default();

    while !stop.load(Ordering::SeqCst) {
        let buffer = session.poll()?;
        stats.polls += 1;

        if buffer.is_empty() {
            stats.empty_polls += 1;
            thread::sleep(poll_interval);
            continue;
        }

        let frames = buffer.len() / frame_size;
        stats.bytes_captured += buffer.len() as u64;
        stats.frames_captured += frames as u64;

        match sink.write_frames(&buffer, frames, data_type) {
            Ok(()) => {}
            Err(CaptureError::SinkClosed(reason)) => {
                log::info!("Output closed, ending capture: {}", reason);
                stats.failed_writes += 1;
                break;
            }
            Err(e) => {
                log::warn!("Dropped {} frames: {}", frames, e);
                stats.failed_writes += 1;
            }
        }
    }

    log::debug!(
        "Capture loop finished: {} polls, {} frames",
        stats.polls,
        stats.frames_captured
    );
    Ok(stats)
}

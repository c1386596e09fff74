//! Scripted in-memory backend for testing.
//!
//! Stands in for the platform audio subsystem so the session state machine,
//! device matching and capture loop can be exercised without hardware.
//! Each device owns a [`MockFeed`] handle; tests keep a clone of it to queue
//! packets and inject failures after the session has taken the device.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::format::WaveFormatDescriptor;
use crate::traits::audio_backend::{AudioBackend, AudioClient, AudioDevice, CaptureClient, CapturedPacket};

#[derive(Debug, Clone)]
struct MockPacket {
    data: Vec<u8>,
    frames: u32,
    silent: bool,
}

#[derive(Debug, Default)]
struct FeedState {
    block_align: usize,
    packets: VecDeque<MockPacket>,
    released: Vec<u32>,
    outstanding: Option<u32>,
    initialize_calls: u32,
    last_buffer_duration_hns: Option<i64>,
    running: bool,
    capture_handles: u32,
    fail_activate: bool,
    fail_initialize: bool,
    fail_start: bool,
    fail_stop: bool,
    fail_next_poll: bool,
}

/// Shared handle onto one mock device's packet queue and counters.
#[derive(Debug, Clone)]
pub struct MockFeed {
    state: Arc<Mutex<FeedState>>,
}

impl MockFeed {
    fn new(block_align: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState {
                block_align: block_align.max(1),
                ..Default::default()
            })),
        }
    }

    /// Queue a packet of captured bytes; the frame count follows from the
    /// device's block align.
    pub fn push_packet(&self, data: Vec<u8>) {
        let mut s = self.state.lock();
        let frames = (data.len() / s.block_align) as u32;
        s.packets.push_back(MockPacket {
            data,
            frames,
            silent: false,
        });
    }

    /// Queue a packet the OS flags as silent. Its payload is garbage on
    /// purpose so tests can tell it was not copied.
    pub fn push_silent(&self, frames: u32) {
        let mut s = self.state.lock();
        let len = frames as usize * s.block_align;
        s.packets.push_back(MockPacket {
            data: vec![0xEE; len],
            frames,
            silent: true,
        });
    }

    /// Queue a packet whose payload is shorter than its frame count claims.
    pub fn push_truncated(&self, frames: u32, data: Vec<u8>) {
        self.state.lock().packets.push_back(MockPacket {
            data,
            frames,
            silent: false,
        });
    }

    pub fn pending_packets(&self) -> usize {
        self.state.lock().packets.len()
    }

    /// Frame counts passed to `release_buffer`, in order.
    pub fn released(&self) -> Vec<u32> {
        self.state.lock().released.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn initialize_calls(&self) -> u32 {
        self.state.lock().initialize_calls
    }

    pub fn last_buffer_duration_hns(&self) -> Option<i64> {
        self.state.lock().last_buffer_duration_hns
    }

    /// Buffer-access handles currently alive.
    pub fn capture_handles(&self) -> u32 {
        self.state.lock().capture_handles
    }

    pub fn fail_activate(&self, fail: bool) {
        self.state.lock().fail_activate = fail;
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.state.lock().fail_initialize = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        self.state.lock().fail_start = fail;
    }

    pub fn fail_stop(&self, fail: bool) {
        self.state.lock().fail_stop = fail;
    }

    /// Make the next packet-size query report a device error.
    pub fn fail_next_poll(&self) {
        self.state.lock().fail_next_poll = true;
    }
}

/// A scripted render endpoint.
#[derive(Debug, Clone)]
pub struct MockDevice {
    name: String,
    format: WaveFormatDescriptor,
    feed: MockFeed,
}

impl MockDevice {
    pub fn feed(&self) -> MockFeed {
        self.feed.clone()
    }
}

impl AudioDevice for MockDevice {
    type Client = MockClient;

    fn friendly_name(&self) -> Result<String, CaptureError> {
        Ok(self.name.clone())
    }

    fn activate(&self) -> Result<MockClient, CaptureError> {
        if self.feed.state.lock().fail_activate {
            return Err(CaptureError::AudioClient(format!("cannot activate {}", self.name)));
        }
        Ok(MockClient {
            format: self.format,
            feed: self.feed.clone(),
            buffer_frames: None,
        })
    }
}

/// Mock stream client.
#[derive(Debug)]
pub struct MockClient {
    format: WaveFormatDescriptor,
    feed: MockFeed,
    buffer_frames: Option<u32>,
}

impl AudioClient for MockClient {
    type Capture = MockCaptureClient;

    fn mix_format(&self) -> Result<WaveFormatDescriptor, CaptureError> {
        Ok(self.format)
    }

    fn initialize_loopback(&mut self, buffer_duration_hns: i64) -> Result<(), CaptureError> {
        let mut s = self.feed.state.lock();
        s.initialize_calls += 1;
        if s.fail_initialize {
            return Err(CaptureError::AudioClient("initialize rejected".into()));
        }
        if self.buffer_frames.is_some() {
            return Err(CaptureError::AudioClient("already initialized".into()));
        }
        s.last_buffer_duration_hns = Some(buffer_duration_hns);
        let frames = buffer_duration_hns * i64::from(self.format.sample_rate()) / 10_000_000;
        self.buffer_frames = Some(frames.clamp(0, i64::from(u32::MAX)) as u32);
        Ok(())
    }

    fn buffer_size(&self) -> Result<u32, CaptureError> {
        self.buffer_frames
            .ok_or_else(|| CaptureError::AudioClient("not initialized".into()))
    }

    fn capture_client(&self) -> Result<MockCaptureClient, CaptureError> {
        if self.buffer_frames.is_none() {
            return Err(CaptureError::AudioClient("not initialized".into()));
        }
        self.feed.state.lock().capture_handles += 1;
        Ok(MockCaptureClient {
            feed: self.feed.clone(),
            current: Vec::new(),
        })
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let mut s = self.feed.state.lock();
        if s.fail_start {
            return Err(CaptureError::AudioClient("start rejected".into()));
        }
        if self.buffer_frames.is_none() {
            return Err(CaptureError::AudioClient("not initialized".into()));
        }
        s.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let mut s = self.feed.state.lock();
        if s.fail_stop {
            return Err(CaptureError::Capture("stop rejected".into()));
        }
        s.running = false;
        Ok(())
    }
}

/// Mock buffer-access handle. Enforces the get/release pairing.
#[derive(Debug)]
pub struct MockCaptureClient {
    feed: MockFeed,
    current: Vec<u8>,
}

impl CaptureClient for MockCaptureClient {
    fn next_packet_size(&mut self) -> Result<u32, CaptureError> {
        let mut s = self.feed.state.lock();
        if std::mem::take(&mut s.fail_next_poll) {
            return Err(CaptureError::Capture("device invalidated".into()));
        }
        if s.outstanding.is_some() {
            return Err(CaptureError::Capture("previous packet was not released".into()));
        }
        Ok(s.packets.front().map(|p| p.frames).unwrap_or(0))
    }

    fn get_buffer(&mut self) -> Result<CapturedPacket<'_>, CaptureError> {
        let (frames, silent) = {
            let mut s = self.feed.state.lock();
            if s.outstanding.is_some() {
                return Err(CaptureError::Capture("previous packet was not released".into()));
            }
            let packet = s
                .packets
                .pop_front()
                .ok_or_else(|| CaptureError::Capture("no packet available".into()))?;
            s.outstanding = Some(packet.frames);
            self.current = packet.data;
            (packet.frames, packet.silent)
        };
        Ok(CapturedPacket {
            data: &self.current,
            frames,
            silent,
        })
    }

    fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError> {
        let mut s = self.feed.state.lock();
        match s.outstanding.take() {
            Some(expected) if expected == frames => {
                s.released.push(frames);
                Ok(())
            }
            Some(expected) => Err(CaptureError::Capture(format!(
                "released {} frames, packet had {}",
                frames, expected
            ))),
            None => Err(CaptureError::Capture("no packet outstanding".into())),
        }
    }
}

impl Drop for MockCaptureClient {
    fn drop(&mut self) {
        let mut s = self.feed.state.lock();
        s.capture_handles = s.capture_handles.saturating_sub(1);
    }
}

/// Scripted set of render endpoints.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    devices: Vec<MockDevice>,
    default_index: Option<usize>,
    unreachable: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device; the first one added becomes the default.
    pub fn with_device(mut self, name: &str, format: WaveFormatDescriptor) -> Self {
        let feed = MockFeed::new(format.block_align() as usize);
        self.devices.push(MockDevice {
            name: name.to_string(),
            format,
            feed,
        });
        if self.default_index.is_none() {
            self.default_index = Some(0);
        }
        self
    }

    pub fn with_default(mut self, index: usize) -> Self {
        self.default_index = Some(index);
        self
    }

    /// Simulate an audio service that cannot be reached.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Feed handle of the device at `index`.
    pub fn feed(&self, index: usize) -> MockFeed {
        self.devices[index].feed()
    }
}

impl AudioBackend for MockBackend {
    type Device = MockDevice;

    fn render_devices(&self) -> Result<Vec<MockDevice>, CaptureError> {
        if self.unreachable {
            return Err(CaptureError::DeviceEnumeration("audio service not running".into()));
        }
        Ok(self.devices.clone())
    }

    fn default_render_device(&self) -> Result<MockDevice, CaptureError> {
        if self.unreachable {
            return Err(CaptureError::DeviceEnumeration("audio service not running".into()));
        }
        self.default_index
            .and_then(|i| self.devices.get(i).cloned())
            .ok_or_else(|| CaptureError::DeviceNotFound("no default render device".into()))
    }
}

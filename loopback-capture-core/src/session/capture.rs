use crate::models::audio_models::{DeviceInfo, NameMatch};
use crate::models::error::CaptureError;
use crate::models::format::{SampleFormat, WaveFormatDescriptor};
use crate::models::state::SessionState;
use crate::session::device_directory::DeviceDirectory;
use crate::traits::audio_backend::{AudioBackend, AudioClient, AudioDevice, CaptureClient};

/// 100-nanosecond units per second, the unit of stream buffer durations.
pub const HNS_PER_SEC: i64 = 10_000_000;

type CaptureOf<D> = <<D as AudioDevice>::Client as AudioClient>::Capture;

/// Buffer duration covering `ring_capacity_frames` at `sample_rate`.
pub fn buffer_duration_hns(ring_capacity_frames: usize, sample_rate: u32) -> i64 {
    if sample_rate == 0 {
        return 0;
    }
    let frames = i64::try_from(ring_capacity_frames).unwrap_or(i64::MAX);
    frames.saturating_mul(HNS_PER_SEC) / i64::from(sample_rate)
}

/// A loopback capture session bound to one render device.
///
/// Owns the device, client and buffer-access handles exclusively; they are
/// released on `close` or when the session is dropped. The negotiated mix
/// format is read once at construction and never changes.
///
/// Polling is non-blocking and the session never signals new data, so the
/// owner drives it from a loop (see [`crate::session::recorder`]).
pub struct CaptureSession<D: AudioDevice> {
    // Field order is release order: buffer access, then client, then device.
    capture: Option<CaptureOf<D>>,
    client: Option<D::Client>,
    device: Option<D>,
    name: String,
    format: WaveFormatDescriptor,
    state: SessionState,
    ring_capacity_frames: usize,
    buffer_frames: u32,
    initialized: bool,
}

impl<D: AudioDevice> CaptureSession<D> {
    /// Resolve a device, activate a client and read its mix format.
    ///
    /// All-or-nothing: on failure every handle acquired so far is dropped.
    pub fn open<B>(backend: &B, selector: &str, mode: NameMatch) -> Result<Self, CaptureError>
    where
        B: AudioBackend<Device = D>,
    {
        let device = DeviceDirectory::new(backend).find_device(selector, mode)?;
        Self::with_device(device)
    }

    /// Open a session on an already resolved device.
    pub fn with_device(device: D) -> Result<Self, CaptureError> {
        let name = device.friendly_name().map_err(CaptureError::into_audio_client)?;
        let client = device.activate().map_err(CaptureError::into_audio_client)?;
        let format = client.mix_format().map_err(CaptureError::into_audio_client)?;

        if format.sample_rate() == 0 || format.channels() == 0 {
            return Err(CaptureError::AudioClient(format!(
                "device \"{}\" reports an empty mix format",
                name
            )));
        }

        log::debug!(
            "Opened \"{}\": {} Hz, {} ch, {} bits ({})",
            name,
            format.sample_rate(),
            format.channels(),
            format.bits_per_sample(),
            format.classify()
        );

        Ok(Self {
            capture: None,
            client: Some(client),
            device: Some(device),
            name,
            format,
            state: SessionState::Opened,
            ring_capacity_frames: 0,
            buffer_frames: 0,
            initialized: false,
        })
    }

    /// Start the loopback stream with a ring buffer of `ring_capacity_frames`.
    ///
    /// Failures are logged and reported as `false`; the session stays in
    /// its previous state so the caller can retry or give up.
    pub fn start(&mut self, ring_capacity_frames: usize) -> bool {
        if !self.state.can_start() {
            log::warn!("Cannot start capture in state {:?}", self.state);
            return false;
        }

        match self.try_start(ring_capacity_frames) {
            Ok(()) => {
                self.state = SessionState::Started;
                log::debug!(
                    "Capture started on \"{}\" ({} frame buffer)",
                    self.name,
                    self.buffer_frames
                );
                true
            }
            Err(e) => {
                log::error!("Failed to start capture: {}", e);
                false
            }
        }
    }

    fn try_start(&mut self, ring_capacity_frames: usize) -> Result<(), CaptureError> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| CaptureError::InvalidState("no audio client".into()))?;

        // A stream can only be initialized once per client.
        if !self.initialized {
            let duration = buffer_duration_hns(ring_capacity_frames, self.format.sample_rate());
            client.initialize_loopback(duration)?;
            self.buffer_frames = client.buffer_size()?;
            self.ring_capacity_frames = ring_capacity_frames;
            self.initialized = true;
        } else if ring_capacity_frames != self.ring_capacity_frames {
            log::debug!(
                "Stream already initialized for {} frames; ignoring {}",
                self.ring_capacity_frames,
                ring_capacity_frames
            );
        }

        let capture = client.capture_client()?;
        client.start()?;
        self.capture = Some(capture);
        Ok(())
    }

    /// Drain every packet currently queued, in arrival order.
    ///
    /// Returns an empty buffer when nothing is available. Silent packets
    /// contribute zeros. Each packet is released before the next is
    /// requested, including when its contents could not be copied.
    pub fn poll(&mut self) -> Result<Vec<u8>, CaptureError> {
        if !self.state.is_started() {
            return Err(CaptureError::InvalidState(format!(
                "poll requires a started session (state: {:?})",
                self.state
            )));
        }

        let frame_size = self.frame_size();
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| CaptureError::InvalidState("no capture client".into()))?;

        drain_packets(capture, frame_size).map_err(CaptureError::into_capture)
    }

    /// Halt the stream and release the buffer-access handle.
    ///
    /// Returns `Ok(false)` if the session was not capturing.
    pub fn stop(&mut self) -> Result<bool, CaptureError> {
        self.ensure_open()?;
        if !self.state.is_started() {
            return Ok(false);
        }

        let result = match self.client.as_mut() {
            Some(client) => client.stop(),
            None => Ok(()),
        };
        self.capture = None;
        self.state = SessionState::Stopped;
        log::debug!("Capture stopped on \"{}\"", self.name);

        result.map(|_| true).map_err(CaptureError::into_capture)
    }

    /// Stop if needed and release every OS handle. The session is unusable
    /// afterwards.
    pub fn close(&mut self) -> Result<(), CaptureError> {
        self.ensure_open()?;
        if self.state.is_started() {
            if let Err(e) = self.stop() {
                log::warn!("Stopping stream during close failed: {}", e);
            }
        }

        self.capture = None;
        self.client = None;
        self.device = None;
        self.state = SessionState::Closed;
        log::debug!("Closed \"{}\"", self.name);
        Ok(())
    }

    /// Negotiated native format of the bound device.
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo::from_descriptor(self.name.clone(), &self.format)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn format(&self) -> &WaveFormatDescriptor {
        &self.format
    }

    pub fn data_type(&self) -> SampleFormat {
        self.format.classify()
    }

    /// Bytes per captured frame.
    pub fn frame_size(&self) -> usize {
        match self.format.block_align() as usize {
            0 => self.format.channels() as usize * self.data_type().byte_width(),
            n => n,
        }
    }

    /// Realized ring-buffer size in frames; 0 until the first start.
    pub fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    pub fn ring_capacity_frames(&self) -> usize {
        self.ring_capacity_frames
    }

    /// The bound device handle, until the session is closed.
    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    fn ensure_open(&self) -> Result<(), CaptureError> {
        if self.state.is_closed() {
            return Err(CaptureError::InvalidState("session is closed".into()));
        }
        Ok(())
    }
}

impl<D: AudioDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        if !self.state.is_closed() {
            let _ = self.close();
        }
    }
}

fn drain_packets<C: CaptureClient>(capture: &mut C, frame_size: usize) -> Result<Vec<u8>, CaptureError> {
    let mut result = Vec::new();

    while capture.next_packet_size()? > 0 {
        let packet = capture.get_buffer()?;
        let frames = packet.frames;
        let len = frames as usize * frame_size;

        let copied = if packet.silent {
            result.resize(result.len() + len, 0);
            Ok(())
        } else if packet.data.len() < len {
            Err(CaptureError::ShortBuffer {
                expected: len,
                actual: packet.data.len(),
            })
        } else {
            result.extend_from_slice(&packet.data[..len]);
            Ok(())
        };

        capture.release_buffer(frames)?;
        copied?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockDevice};

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn backend() -> MockBackend {
        MockBackend::new()
            .with_device("Speakers (Realtek)", WaveFormatDescriptor::float32(2, 48000))
            .with_device("Headphones", WaveFormatDescriptor::pcm(1, 44100, 16))
    }

    fn open_default(backend: &MockBackend) -> CaptureSession<MockDevice> {
        CaptureSession::open(backend, "", NameMatch::Exact).unwrap()
    }

    #[test]
    fn open_reads_native_format() {
        let backend = backend();
        let session = CaptureSession::open(&backend, "Headphones", NameMatch::Exact).unwrap();

        assert_eq!(session.state(), SessionState::Opened);
        let info = session.info();
        assert_eq!(info.name, "Headphones");
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 1);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.data_type, SampleFormat::SignedInt16);
        assert_eq!(session.frame_size(), 2);
    }

    #[test]
    fn open_unknown_device_fails() {
        let backend = backend();
        let err = CaptureSession::open(&backend, "Monitor", NameMatch::Partial).err().unwrap();
        assert!(matches!(err, CaptureError::DeviceNotFound(_)));
    }

    #[test]
    fn open_activation_failure_is_audio_client_error() {
        let backend = backend();
        backend.feed(0).fail_activate(true);
        let err = CaptureSession::open(&backend, "", NameMatch::Exact).err().unwrap();
        assert!(matches!(err, CaptureError::AudioClient(_)));
    }

    #[test]
    fn start_computes_buffer_duration() {
        let backend = backend();
        let mut session = open_default(&backend);

        assert!(session.start(16384));
        assert_eq!(session.state(), SessionState::Started);
        // 16384 frames at 48 kHz = 341.33 ms
        assert_eq!(backend.feed(0).last_buffer_duration_hns(), Some(3_413_333));
        assert_eq!(session.buffer_frames(), 16383);
        assert!(backend.feed(0).is_running());
    }

    #[test]
    fn start_failure_is_soft() {
        let backend = backend();
        let feed = backend.feed(0);
        feed.fail_start(true);

        let mut session = open_default(&backend);
        assert!(!session.start(4800));
        assert_eq!(session.state(), SessionState::Opened);
        assert_eq!(feed.capture_handles(), 0);

        // Retry once the device cooperates; the stream is not re-initialized.
        feed.fail_start(false);
        assert!(session.start(4800));
        assert_eq!(feed.initialize_calls(), 1);
    }

    #[test]
    fn initialize_failure_is_soft() {
        let backend = backend();
        backend.feed(0).fail_initialize(true);
        let mut session = open_default(&backend);
        assert!(!session.start(4800));
        assert_eq!(session.state(), SessionState::Opened);
        assert!(session.poll().is_err());
    }

    #[test]
    fn start_twice_is_rejected() {
        let backend = backend();
        let mut session = open_default(&backend);
        assert!(session.start(4800));
        assert!(!session.start(4800));
        assert_eq!(session.state(), SessionState::Started);
    }

    #[test]
    fn poll_before_start_is_rejected() {
        let backend = backend();
        let mut session = open_default(&backend);
        assert!(matches!(session.poll(), Err(CaptureError::InvalidState(_))));
    }

    #[test]
    fn poll_empty_is_not_an_error() {
        let backend = backend();
        let mut session = open_default(&backend);
        assert!(session.start(4800));
        assert!(session.poll().unwrap().is_empty());
    }

    #[test]
    fn poll_concatenates_packets_in_order() {
        let backend = backend();
        let feed = backend.feed(0);
        let mut session = open_default(&backend);
        assert!(session.start(4800));

        let first = f32_bytes(&[0.1, 0.2, 0.3, 0.4]);
        let second = f32_bytes(&[0.5, 0.6]);
        feed.push_packet(first.clone());
        feed.push_packet(second.clone());

        let buffer = session.poll().unwrap();
        assert_eq!(buffer, [first, second].concat());
        assert_eq!(buffer.len() % session.frame_size(), 0);
        assert_eq!(feed.released(), vec![2, 1]);
        assert_eq!(feed.pending_packets(), 0);
    }

    #[test]
    fn silent_packets_are_zero_filled() {
        let backend = backend();
        let feed = backend.feed(0);
        let mut session = open_default(&backend);
        assert!(session.start(4800));

        let loud = f32_bytes(&[1.0, -1.0]);
        feed.push_packet(loud.clone());
        feed.push_silent(3);

        let buffer = session.poll().unwrap();
        assert_eq!(buffer.len(), 4 * 8);
        assert_eq!(&buffer[..8], &loud[..]);
        assert!(buffer[8..].iter().all(|&b| b == 0));
        assert_eq!(feed.released(), vec![1, 3]);
    }

    #[test]
    fn truncated_packet_is_still_released() {
        let backend = backend();
        let feed = backend.feed(0);
        let mut session = open_default(&backend);
        assert!(session.start(4800));

        feed.push_truncated(4, vec![0u8; 8]);
        let err = session.poll().unwrap_err();
        assert!(matches!(err, CaptureError::Capture(_)));
        assert_eq!(feed.released(), vec![4]);

        // The buffer is not stalled: the next poll works.
        feed.push_packet(vec![0u8; 8]);
        assert_eq!(session.poll().unwrap().len(), 8);
    }

    #[test]
    fn device_error_mid_drain_is_capture_error() {
        let backend = backend();
        let feed = backend.feed(0);
        let mut session = open_default(&backend);
        assert!(session.start(4800));

        feed.fail_next_poll();
        assert!(matches!(session.poll(), Err(CaptureError::Capture(_))));
    }

    #[test]
    fn stop_and_restart() {
        let backend = backend();
        let feed = backend.feed(0);
        let mut session = open_default(&backend);

        assert_eq!(session.stop(), Ok(false));
        assert!(session.start(4800));
        assert_eq!(feed.capture_handles(), 1);

        assert_eq!(session.stop(), Ok(true));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(feed.capture_handles(), 0);
        assert!(!feed.is_running());
        assert_eq!(session.stop(), Ok(false));
        assert!(matches!(session.poll(), Err(CaptureError::InvalidState(_))));

        assert!(session.start(9600));
        assert_eq!(session.state(), SessionState::Started);
        assert_eq!(feed.initialize_calls(), 1);
        assert_eq!(session.ring_capacity_frames(), 4800);
    }

    #[test]
    fn stop_failure_still_releases_buffer_access() {
        let backend = backend();
        let feed = backend.feed(0);
        let mut session = open_default(&backend);
        assert!(session.start(4800));

        feed.fail_stop(true);
        assert!(matches!(session.stop(), Err(CaptureError::Capture(_))));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(feed.capture_handles(), 0);
    }

    #[test]
    fn close_releases_everything_and_invalidates() {
        let backend = backend();
        let feed = backend.feed(0);
        let mut session = open_default(&backend);
        assert!(session.start(4800));

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!feed.is_running());
        assert_eq!(feed.capture_handles(), 0);
        assert!(session.device().is_none());

        assert!(matches!(session.poll(), Err(CaptureError::InvalidState(_))));
        assert!(!session.start(4800));
        assert!(session.stop().is_err());
        assert!(session.close().is_err());
        assert_eq!(session.info().name, "Speakers (Realtek)");
    }

    #[test]
    fn drop_stops_running_stream() {
        let backend = backend();
        let feed = backend.feed(0);
        {
            let mut session = open_default(&backend);
            assert!(session.start(4800));
            assert!(feed.is_running());
        }
        assert!(!feed.is_running());
        assert_eq!(feed.capture_handles(), 0);
    }

    #[test]
    fn buffer_duration_math() {
        assert_eq!(buffer_duration_hns(48000, 48000), HNS_PER_SEC);
        assert_eq!(buffer_duration_hns(16384, 44100), 3_715_192);
        assert_eq!(buffer_duration_hns(100, 0), 0);
    }
}

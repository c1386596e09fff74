use crate::models::error::CaptureError;
use crate::models::format::WaveFormatDescriptor;

/// Access to the platform's render endpoints.
///
/// Implemented by:
/// - `WasapiBackend` (Windows, MMDevice API)
/// - `MockBackend` (scripted, for tests)
pub trait AudioBackend {
    type Device: AudioDevice;

    /// Active render (output) endpoints, in platform enumeration order.
    fn render_devices(&self) -> Result<Vec<Self::Device>, CaptureError>;

    /// The current default render endpoint.
    fn default_render_device(&self) -> Result<Self::Device, CaptureError>;
}

/// A render endpoint. Dropping the value releases the device handle.
pub trait AudioDevice {
    type Client: AudioClient;

    fn friendly_name(&self) -> Result<String, CaptureError>;

    /// Activate an audio client against this endpoint.
    fn activate(&self) -> Result<Self::Client, CaptureError>;
}

/// A stream client bound to one endpoint. Dropping it releases the client.
pub trait AudioClient {
    type Capture: CaptureClient;

    /// The endpoint's native shared-mode mix format.
    fn mix_format(&self) -> Result<WaveFormatDescriptor, CaptureError>;

    /// Initialize a shared-mode loopback stream in the mix format with the
    /// given buffer duration (100-nanosecond units).
    fn initialize_loopback(&mut self, buffer_duration_hns: i64) -> Result<(), CaptureError>;

    /// Realized ring-buffer size in frames. Valid after initialization.
    fn buffer_size(&self) -> Result<u32, CaptureError>;

    /// Acquire the buffer-access handle for an initialized stream.
    fn capture_client(&self) -> Result<Self::Capture, CaptureError>;

    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;
}

/// One packet handed out by the OS ring buffer.
///
/// `data` borrows the shared buffer until the packet is released; it holds
/// `frames` frames unless `silent` is set, in which case its contents are
/// meaningless and the frames must be treated as zeros.
#[derive(Debug)]
pub struct CapturedPacket<'a> {
    pub data: &'a [u8],
    pub frames: u32,
    pub silent: bool,
}

/// Buffer-access handle for a running loopback stream.
///
/// Every `get_buffer` must be paired with `release_buffer` before the next
/// `next_packet_size` call, or the stream stalls.
pub trait CaptureClient {
    /// Frames in the next available packet; 0 when nothing is queued.
    fn next_packet_size(&mut self) -> Result<u32, CaptureError>;

    fn get_buffer(&mut self) -> Result<CapturedPacket<'_>, CaptureError>;

    fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError>;
}

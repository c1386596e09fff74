//! Windows render-endpoint enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list active render (speaker/headphone)
//! endpoints and resolve the default one, and exposes each endpoint's
//! friendly name and audio client.

use std::rc::Rc;

use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use loopback_capture_core::models::error::CaptureError;
use loopback_capture_core::traits::audio_backend::{AudioBackend, AudioDevice};

use crate::com::ComApartment;
use crate::wasapi_loopback::WasapiAudioClient;

/// Render-endpoint source backed by the Windows MMDevice API.
pub struct WasapiBackend {
    enumerator: IMMDeviceEnumerator,
    apartment: Rc<ComApartment>,
}

impl WasapiBackend {
    /// Initialize COM on the calling thread and create the enumerator.
    pub fn new() -> Result<Self, CaptureError> {
        let apartment = ComApartment::initialize()?;
        unsafe {
            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| CaptureError::DeviceEnumeration(format!("failed to create enumerator: {}", e)))?;
            Ok(Self { enumerator, apartment })
        }
    }

    fn wrap(&self, device: IMMDevice) -> WasapiDevice {
        WasapiDevice {
            device,
            apartment: Rc::clone(&self.apartment),
        }
    }
}

impl AudioBackend for WasapiBackend {
    type Device = WasapiDevice;

    fn render_devices(&self) -> Result<Vec<WasapiDevice>, CaptureError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE)
                .map_err(|e| CaptureError::DeviceEnumeration(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| CaptureError::DeviceEnumeration(format!("GetCount failed: {}", e)))?;

            let mut devices = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = collection
                    .Item(i)
                    .map_err(|e| CaptureError::DeviceEnumeration(format!("Item({}) failed: {}", i, e)))?;
                devices.push(self.wrap(device));
            }
            Ok(devices)
        }
    }

    fn default_render_device(&self) -> Result<WasapiDevice, CaptureError> {
        unsafe {
            let device = self
                .enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|e| CaptureError::DeviceNotFound(format!("no default render device: {}", e)))?;
            Ok(self.wrap(device))
        }
    }
}

/// An active render endpoint.
pub struct WasapiDevice {
    device: IMMDevice,
    apartment: Rc<ComApartment>,
}

impl AudioDevice for WasapiDevice {
    type Client = WasapiAudioClient;

    /// Read the PKEY_Device_FriendlyName property.
    fn friendly_name(&self) -> Result<String, CaptureError> {
        unsafe {
            let store = self
                .device
                .OpenPropertyStore(STGM_READ)
                .map_err(|e| CaptureError::DeviceEnumeration(format!("OpenPropertyStore failed: {}", e)))?;

            let value = store
                .GetValue(&PKEY_Device_FriendlyName)
                .map_err(|e| CaptureError::DeviceEnumeration(format!("friendly name unavailable: {}", e)))?;

            Ok(value.to_string())
        }
    }

    fn activate(&self) -> Result<WasapiAudioClient, CaptureError> {
        unsafe {
            let client: IAudioClient = self
                .device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| CaptureError::AudioClient(format!("Activate failed: {}", e)))?;
            WasapiAudioClient::new(client, Rc::clone(&self.apartment))
        }
    }
}

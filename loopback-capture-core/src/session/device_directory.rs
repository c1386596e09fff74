use crate::models::audio_models::{DeviceInfo, NameMatch};
use crate::models::error::CaptureError;
use crate::traits::audio_backend::{AudioBackend, AudioClient, AudioDevice};

/// Render-device lookup on top of an [`AudioBackend`].
///
/// Lists devices without opening a capture session and resolves a
/// user-supplied name to a device handle.
pub struct DeviceDirectory<'a, B: AudioBackend> {
    backend: &'a B,
}

impl<'a, B: AudioBackend> DeviceDirectory<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// One [`DeviceInfo`] per active render endpoint, in enumeration order.
    ///
    /// Fails if the audio service cannot be reached or reports no endpoints.
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        let devices = self.backend.render_devices().map_err(CaptureError::into_enumeration)?;
        if devices.is_empty() {
            return Err(CaptureError::DeviceEnumeration("no active render endpoints".into()));
        }

        devices
            .iter()
            .map(|device| {
                let name = device.friendly_name()?;
                let client = device.activate()?;
                let format = client.mix_format()?;
                Ok(DeviceInfo::from_descriptor(name, &format))
            })
            .collect::<Result<Vec<_>, CaptureError>>()
            .map_err(CaptureError::into_enumeration)
    }

    /// Resolve `name` to a device. An empty name selects the default render
    /// device; otherwise the first endpoint in enumeration order that
    /// matches under `mode` wins.
    pub fn find_device(&self, name: &str, mode: NameMatch) -> Result<B::Device, CaptureError> {
        if name.is_empty() {
            return self.backend.default_render_device().map_err(|e| match e {
                e @ CaptureError::DeviceNotFound(_) => e,
                other => CaptureError::DeviceNotFound(other.to_string()),
            });
        }

        let devices = self.backend.render_devices().map_err(CaptureError::into_enumeration)?;
        for device in devices {
            let friendly_name = device.friendly_name().map_err(CaptureError::into_enumeration)?;
            if name_matches(&friendly_name, name, mode) {
                log::debug!("Matched device \"{}\" for \"{}\" ({:?})", friendly_name, name, mode);
                return Ok(device);
            }
        }

        Err(CaptureError::DeviceNotFound(format!("no render device matching \"{}\"", name)))
    }
}

/// Whether `candidate` satisfies the requested `target` name.
pub fn name_matches(candidate: &str, target: &str, mode: NameMatch) -> bool {
    match mode {
        NameMatch::Exact => candidate == target,
        NameMatch::Partial => normalize_name(candidate).contains(&normalize_name(target)),
    }
}

/// Per-character lowercase mapping, with no locale or context rules.
///
/// Characters whose lowercase form expands (e.g. `İ`) expand in place;
/// the final-sigma rule of `str::to_lowercase` is not applied.
pub fn normalize_name(name: &str) -> String {
    name.chars().flat_map(char::to_lowercase).collect()
}

//! Device information output.

use loopback_capture_core::DeviceInfo;

/// Plain-text block describing one device.
pub fn device_block(info: &DeviceInfo) -> String {
    format!(
        "DEVICE INFORMATION\nName: {}\nSample Rate: {}\nChannels: {}\nBPS: {}\nData Type: {}\n",
        info.name, info.sample_rate, info.channels, info.bits_per_sample, info.data_type
    )
}

/// Text blocks back to back, or a pretty-printed JSON array.
pub fn device_list(devices: &[DeviceInfo], json: bool) -> Result<String, serde_json::Error> {
    if json {
        return serde_json::to_string_pretty(devices).map(|s| s + "\n");
    }
    Ok(devices.iter().map(device_block).collect())
}

/// One device as a text block or a JSON object.
pub fn device_report(info: &DeviceInfo, json: bool) -> Result<String, serde_json::Error> {
    if json {
        return serde_json::to_string_pretty(info).map(|s| s + "\n");
    }
    Ok(device_block(info))
}

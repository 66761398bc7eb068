//! Input device enumeration.

use cpal::traits::{DeviceTrait, HostTrait};

use waveform_capture_core::models::device::InputDevice;
use waveform_capture_core::models::error::CaptureError;

/// List input devices, marking the system default.
pub fn list_input_devices() -> Result<Vec<InputDevice>, CaptureError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceInitFailed(e.to_string()))?;

    let mut available = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            let is_default = default_name.as_deref() == Some(name.as_str());
            available.push(InputDevice { name, is_default });
        }
    }
    Ok(available)
}

/// Find a specific input device by name.
pub(crate) fn find_input_device(
    host: &cpal::Host,
    name: &str,
) -> Result<cpal::Device, CaptureError> {
    let mut devices = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceInitFailed(e.to_string()))?;
    devices
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or(CaptureError::DeviceUnavailable)
}

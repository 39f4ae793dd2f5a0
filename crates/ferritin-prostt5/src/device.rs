//! Device selection and listing.
use crate::runtime::{Backend, DeviceInfo, DeviceMemory};
use tracing::debug;

/// Encoder layers offloaded when any GPU was selected. ProstT5 has 24, so
/// this places the whole encoder on the device.
pub const GPU_OFFLOAD_LAYERS: u32 = 24;

/// Selector disabling all devices.
pub const NO_DEVICES: &str = "none";

/// Resolve a comma-separated device selector.
///
/// Only GPU devices are kept; unknown names and other device kinds are
/// skipped. `none` selects nothing.
pub fn parse_device_list<B: Backend + ?Sized>(backend: &B, value: &str) -> Vec<DeviceInfo> {
    if value == NO_DEVICES {
        return Vec::new();
    }
    value
        .split(',')
        .filter_map(|name| match backend.device_by_name(name) {
            Some(dev) if dev.is_gpu() => Some(dev),
            Some(dev) => {
                debug!(device = name, kind = %dev.kind, "skipping non-GPU device");
                None
            }
            None => {
                debug!(device = name, "skipping unknown device");
                None
            }
        })
        .collect()
}

pub fn gpu_layers(devices: &[DeviceInfo]) -> u32 {
    if devices.iter().any(DeviceInfo::is_gpu) {
        GPU_OFFLOAD_LAYERS
    } else {
        0
    }
}

/// Whether a device should be shown to users.
///
/// Virtualized Metal devices (CI runners) enumerate but cannot run the
/// model; they report a paravirtual description or no memory at all.
pub fn is_listable(dev: &DeviceInfo) -> bool {
    if dev.name != "Metal" {
        return true;
    }
    let bad_description = dev.description.is_empty() || dev.description.contains("Paravirtual");
    let no_memory = matches!(dev.memory, Some(DeviceMemory { free: 0, total: 0 }));
    !(bad_description || no_memory)
}

/// Names of all usable devices of `backend`.
pub fn list_devices<B: Backend + ?Sized>(backend: &B) -> Vec<String> {
    backend
        .devices()
        .into_iter()
        .filter(is_listable)
        .map(|dev| dev.name)
        .collect()
}

//! Candle runtime.
//!
//! Runs the ProstT5 T5 encoder from `candle-transformers` followed by the
//! convolutional 3Di head. A model directory holds:
//!
//! * `config.json` - T5 configuration
//! * `tokenizer.json` - vocabulary, including the `<AA2fold>` prefix
//! * `model.safetensors` or `pytorch_model.bin` - encoder weights
//! * `cnn.safetensors`, `cnn.pt` or `cnn_chkpnt/model.pt` - head weights
//!
//! Device names follow the ggml convention (`CPU`, `CUDA0`, `Metal`).
//! GPUs are only available when built with the `cuda` or `metal` feature.
mod context;
mod head;
mod model;

pub use context::CandleContext;
pub use head::CnnHead;
pub use model::{CandleModel, ModelFiles, CONFIG_FILE, HEAD_FILES, TOKENIZER_FILE, WEIGHT_FILES};

use crate::bootstrap::{NumaStrategy, RuntimeOptions};
use crate::runtime::{Backend, DeviceInfo, DeviceKind, DeviceMemory, ModelParams};
use anyhow::{bail, Result};
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::Device;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

const MAX_CUDA_DEVICES: usize = 16;

#[derive(Debug, Default)]
pub struct CandleBackend {
    devices: OnceLock<Vec<DeviceInfo>>,
}

impl CandleBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the candle device behind a device name.
    pub fn open_device(name: &str) -> Result<Device> {
        if name == "CPU" {
            return Ok(Device::Cpu);
        }
        if let Some(ordinal) = name.strip_prefix("CUDA").and_then(|n| n.parse().ok()) {
            return Ok(Device::new_cuda(ordinal)?);
        }
        if name == "Metal" {
            return Ok(Device::new_metal(0)?);
        }
        bail!("unknown device {name}")
    }
}

fn enumerate_devices() -> Vec<DeviceInfo> {
    let mut devices = vec![DeviceInfo {
        name: "CPU".into(),
        description: format!("{} host threads", candle_core::utils::get_num_threads()),
        kind: DeviceKind::Cpu,
        memory: None,
    }];
    if cuda_is_available() {
        for ordinal in 0..MAX_CUDA_DEVICES {
            if Device::new_cuda(ordinal).is_err() {
                break;
            }
            devices.push(DeviceInfo {
                name: format!("CUDA{ordinal}"),
                description: format!("CUDA device {ordinal}"),
                kind: DeviceKind::Gpu,
                memory: None,
            });
        }
    }
    if metal_is_available() {
        devices.extend(metal_device());
    }
    devices
}

/// A Metal device as reported by the driver. Virtualized devices (CI
/// runners) carry a paravirtual name and no working set.
#[cfg_attr(not(feature = "metal"), allow(dead_code))]
fn metal_device_info(description: &str, working_set: u64, allocated: u64) -> DeviceInfo {
    DeviceInfo {
        name: "Metal".into(),
        description: description.to_string(),
        kind: DeviceKind::Gpu,
        memory: Some(DeviceMemory {
            free: working_set.saturating_sub(allocated),
            total: working_set,
        }),
    }
}

#[cfg(feature = "metal")]
fn metal_device() -> Option<DeviceInfo> {
    match Device::new_metal(0) {
        Ok(Device::Metal(metal)) => {
            let dev = metal.device();
            Some(metal_device_info(
                dev.name(),
                dev.recommended_max_working_set_size(),
                dev.current_allocated_size(),
            ))
        }
        _ => None,
    }
}

#[cfg(not(feature = "metal"))]
fn metal_device() -> Option<DeviceInfo> {
    None
}

impl Backend for CandleBackend {
    type Model = CandleModel;

    fn name(&self) -> &str {
        "candle"
    }

    fn init(&self, options: &RuntimeOptions) -> Result<()> {
        if options.numa != NumaStrategy::Disabled {
            warn!(numa = ?options.numa, "NUMA placement is not supported by the candle backend");
        }
        Ok(())
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.get_or_init(enumerate_devices).clone()
    }

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<CandleModel> {
        // candle has no partial offload: any offloaded layer places the whole
        // encoder on the first selected GPU
        let device = match params.devices.first() {
            Some(name) if params.n_gpu_layers > 0 => Self::open_device(name)?,
            _ => Device::Cpu,
        };
        info!(device = ?device, "placing ProstT5 weights");
        CandleModel::load(path, &device, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{is_listable, list_devices, parse_device_list};

    #[test]
    fn test_cpu_is_always_listed() {
        let backend = CandleBackend::new();
        let devices = backend.devices();
        assert_eq!(devices[0].name, "CPU");
        assert_eq!(devices[0].kind, DeviceKind::Cpu);
        assert!(list_devices(&backend).contains(&"CPU".to_string()));
    }

    #[test]
    fn test_cpu_is_not_a_gpu() {
        let backend = CandleBackend::new();
        assert!(parse_device_list(&backend, "CPU").is_empty());
        assert!(parse_device_list(&backend, "Vulkan0").is_empty());
    }

    #[test]
    fn test_metal_device_info() {
        let virtual_metal = metal_device_info("Apple Paravirtual device", 0, 0);
        assert!(!is_listable(&virtual_metal));

        let m2 = metal_device_info("Apple M2 Max", 48 << 30, 2 << 30);
        assert!(is_listable(&m2));
        assert_eq!(
            m2.memory,
            Some(DeviceMemory {
                free: 46 << 30,
                total: 48 << 30
            })
        );

        // a driver that reports no working set is hidden too
        assert!(!is_listable(&metal_device_info("Apple M1", 0, 0)));
    }

    #[test]
    fn test_open_device() {
        assert!(matches!(CandleBackend::open_device("CPU"), Ok(Device::Cpu)));
        assert!(CandleBackend::open_device("TPU0").is_err());
        assert!(CandleBackend::open_device("CUDAx").is_err());
    }

    #[test]
    fn test_missing_model_dir() {
        let backend = CandleBackend::new();
        let dir = tempfile::tempdir().unwrap();
        let err = backend
            .load_model(&dir.path().join("absent"), &ModelParams::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("does not exist"));
    }
}

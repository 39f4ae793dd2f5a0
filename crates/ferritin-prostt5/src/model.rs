//! ProstT5 model handle.
use crate::bootstrap::Runtime;
use crate::device::{gpu_layers, parse_device_list};
use crate::profile::ModelProfile;
use crate::runtime::{Backend, DeviceInfo, ModelParams, RuntimeModel};
use crate::session::ProstT5;
use anyhow::{Context, Result};
use itertools::Itertools;
use std::path::Path;
use tracing::info;

/// Loaded weights plus their placement.
///
/// Borrows the [`Runtime`] it was loaded with; sessions in turn borrow the
/// model, so one set of weights can serve several sessions.
pub struct ProstT5Model<'r, B: Backend> {
    runtime: &'r Runtime<B>,
    inner: B::Model,
    devices: Vec<DeviceInfo>,
    params: ModelParams,
    profile: ModelProfile,
}

impl<'r, B: Backend> ProstT5Model<'r, B> {
    /// Load `model_file` placing it on the GPUs named by `device`
    /// (comma-separated, or `none`).
    pub fn load<P: AsRef<Path>>(runtime: &'r Runtime<B>, model_file: P, device: &str) -> Result<Self> {
        let model_file = model_file.as_ref();
        let backend = runtime.backend();
        let devices = parse_device_list(backend, device);
        let params = ModelParams {
            devices: devices.iter().map(|dev| dev.name.clone()).collect(),
            n_gpu_layers: gpu_layers(&devices),
            use_mmap: true,
        };
        info!(
            model = %model_file.display(),
            devices = %params.devices.iter().join(","),
            n_gpu_layers = params.n_gpu_layers,
            "loading model"
        );
        let inner = backend
            .load_model(model_file, &params)
            .with_context(|| format!("failed to load model from {}", model_file.display()))?;
        let profile = ModelProfile::resolve(inner.n_vocab(), inner.n_cls_out());
        info!(
            profile = profile.name,
            n_vocab = inner.n_vocab(),
            n_classes = profile.n_classes,
            layout = %profile.layout,
            "model loaded"
        );
        Ok(Self {
            runtime,
            inner,
            devices,
            params,
            profile,
        })
    }

    /// New prediction session with `threads` compute threads.
    pub fn session(&self, threads: usize) -> Result<ProstT5<'_, B>> {
        ProstT5::new(self, threads)
    }

    pub fn runtime(&self) -> &'r Runtime<B> {
        self.runtime
    }

    pub fn runtime_model(&self) -> &B::Model {
        &self.inner
    }

    /// GPU devices the weights were placed on.
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }
}

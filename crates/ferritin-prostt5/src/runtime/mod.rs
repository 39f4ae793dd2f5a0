//! The inference runtime seam.
//!
//! The adapter never touches tensors. Everything it needs from a runtime is
//! captured by three traits, one per lifecycle stage:
//!
//! * [`Backend`]: process-wide, enumerates devices and loads weights.
//! * [`RuntimeModel`]: loaded weights plus vocabulary; creates contexts.
//! * [`RuntimeContext`]: one execution context; runs encoder passes.
//!
//! Releasing a model or context is `Drop`.
//!
//! [`crate::candle::CandleBackend`] runs real ProstT5 weights. With the
//! `stub` feature, `stub::StubBackend` produces synthetic scores for tests.
#[cfg(any(test, feature = "stub"))]
pub mod stub;

use crate::bootstrap::RuntimeOptions;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub type TokenId = u32;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Gpu,
    /// Accelerators that only take part of the work (BLAS and friends).
    Accel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMemory {
    pub free: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Backend name, e.g. `CPU`, `CUDA0`, `Metal`.
    pub name: String,
    pub description: String,
    pub kind: DeviceKind,
    /// `None` when the backend cannot query memory.
    pub memory: Option<DeviceMemory>,
}

impl DeviceInfo {
    pub fn is_gpu(&self) -> bool {
        self.kind == DeviceKind::Gpu
    }
}

/// Placement of the weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Accepted GPU devices, in the order given by the caller.
    pub devices: Vec<String>,
    /// Encoder layers to offload; 0 keeps the model on the CPU.
    pub n_gpu_layers: u32,
    pub use_mmap: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            n_gpu_layers: 0,
            use_mmap: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttentionType {
    Causal,
    NonCausal,
}

/// Execution context settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextParams {
    pub n_threads: usize,
    pub n_threads_batch: usize,
    pub n_ctx: usize,
    pub n_batch: usize,
    pub n_ubatch: usize,
    /// Keep the per-token output buffer instead of sampling logits.
    pub embeddings: bool,
    pub attention: AttentionType,
}

impl ContextParams {
    /// Settings for a single-sequence encoder pass with `threads` compute threads.
    pub fn encoder(threads: usize) -> Self {
        Self {
            n_threads: threads,
            n_threads_batch: threads,
            n_ctx: 2048,
            n_batch: 2048,
            n_ubatch: 2048,
            embeddings: true,
            attention: AttentionType::NonCausal,
        }
    }
}

impl Default for ContextParams {
    fn default() -> Self {
        Self::encoder(1)
    }
}

/// Runtime performance counters of one context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfCounters {
    pub t_load_ms: f64,
    pub t_encode_ms: f64,
    pub n_encode: u64,
    pub n_tokens: u64,
}

impl PerfCounters {
    pub fn record_encode(&mut self, n_tokens: usize, elapsed: Duration) {
        self.t_encode_ms += elapsed.as_secs_f64() * 1e3;
        self.n_encode += 1;
        self.n_tokens += n_tokens as u64;
    }
}

impl fmt::Display for PerfCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let per_token = if self.n_tokens > 0 {
            self.t_encode_ms / self.n_tokens as f64
        } else {
            0.0
        };
        let per_second = if self.t_encode_ms > 0.0 {
            1e3 * self.n_tokens as f64 / self.t_encode_ms
        } else {
            0.0
        };
        writeln!(f, "       load time = {:10.2} ms", self.t_load_ms)?;
        writeln!(
            f,
            "     encode time = {:10.2} ms / {:5} tokens ({:8.2} ms per token, {:8.2} tokens per second)",
            self.t_encode_ms, self.n_tokens, per_token, per_second
        )?;
        write!(f, "   encode passes = {:10}", self.n_encode)
    }
}

/// Process-wide entry point of a runtime.
pub trait Backend {
    type Model: RuntimeModel;

    fn name(&self) -> &str;

    /// Called once by [`crate::Runtime::init`].
    fn init(&self, _options: &RuntimeOptions) -> Result<()> {
        Ok(())
    }

    /// Called when the [`crate::Runtime`] is dropped.
    fn shutdown(&self) {}

    /// All devices the runtime knows about, unfiltered.
    fn devices(&self) -> Vec<DeviceInfo>;

    fn device_by_name(&self, name: &str) -> Option<DeviceInfo> {
        self.devices().into_iter().find(|dev| dev.name == name)
    }

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<Self::Model>;
}

/// Loaded weights and vocabulary.
pub trait RuntimeModel {
    type Context: RuntimeContext;

    /// Tokenize `text` without adding special tokens. With `parse_special`
    /// control pieces such as `<unk>` resolve to their special token.
    fn tokenize(&self, text: &str, parse_special: bool) -> Vec<TokenId>;

    fn n_vocab(&self) -> usize;

    /// Class count reported by the classifier head, 0 when unknown.
    fn n_cls_out(&self) -> u32;

    fn create_context(&self, params: &ContextParams) -> Result<Self::Context>;
}

/// One execution context. Not shareable between concurrent callers.
pub trait RuntimeContext {
    /// Run one encoder pass over `tokens` as a single batch.
    fn encode(&mut self, tokens: &[TokenId]) -> Result<()>;

    /// Block until queued device work has finished.
    fn synchronize(&mut self) {}

    /// Score buffer of the last successful [`RuntimeContext::encode`].
    fn scores(&self) -> Option<&[f32]>;

    fn perf(&self) -> PerfCounters;
}

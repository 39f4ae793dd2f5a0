//! ProstT5 weights loaded with candle.
use super::context::CandleContext;
use super::head::CnnHead;
use crate::alphabet::THREEDI_CLASSES;
use crate::profile::ModelProfile;
use crate::runtime::{ContextParams, ModelParams, PerfCounters, RuntimeModel, TokenId};
use crate::tokenizer::START_MARKER;
use anyhow::{anyhow, ensure, Error as E, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
/// Encoder weights, first match wins.
pub const WEIGHT_FILES: &[&str] = &["model.safetensors", "pytorch_model.bin"];
/// Classification head weights, first match wins.
pub const HEAD_FILES: &[&str] = &["cnn.safetensors", "cnn.pt", "cnn_chkpnt/model.pt"];

/// Files making up a ProstT5 model directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
    pub head: PathBuf,
}

fn first_existing(dir: &Path, candidates: &[&str]) -> Result<PathBuf> {
    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| anyhow!("none of [{}] found in {}", candidates.join(", "), dir.display()))
}

impl ModelFiles {
    /// Locate the model files. `path` is either the model directory or the
    /// encoder weights file inside it.
    pub fn locate(path: &Path) -> Result<Self> {
        let (dir, weights) = if path.is_file() {
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            (dir, Some(path.to_path_buf()))
        } else {
            (path, None)
        };
        ensure!(dir.is_dir(), "model directory {} does not exist", dir.display());
        let weights = match weights {
            Some(weights) => weights,
            None => first_existing(dir, WEIGHT_FILES)?,
        };
        Ok(Self {
            config: first_existing(dir, &[CONFIG_FILE])?,
            tokenizer: first_existing(dir, &[TOKENIZER_FILE])?,
            weights,
            head: first_existing(dir, HEAD_FILES)?,
        })
    }
}

fn is_safetensors(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "safetensors")
}

fn var_builder(path: &Path, device: &Device, use_mmap: bool) -> Result<VarBuilder<'static>> {
    let vb = if is_safetensors(path) && use_mmap {
        unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)? }
    } else if is_safetensors(path) {
        let tensors = candle_core::safetensors::load(path, &Device::Cpu)?;
        VarBuilder::from_tensors(tensors, DType::F32, device)
    } else {
        VarBuilder::from_pth(path, DType::F32, device)?
    };
    Ok(vb)
}

/// The head checkpoint of the reference release nests its tensors under
/// `state_dict`; converted checkpoints are flat.
fn head_var_builder(path: &Path, device: &Device, use_mmap: bool) -> Result<VarBuilder<'static>> {
    if is_safetensors(path) {
        return var_builder(path, device, use_mmap);
    }
    let tensors = candle_core::pickle::read_all_with_key(path, Some("state_dict"))
        .or_else(|_| candle_core::pickle::read_all(path))?;
    let tensors: HashMap<String, Tensor> = tensors.into_iter().collect();
    Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path).map_err(E::msg)?;
    // one residue at a time: padding or truncation would corrupt the input
    tokenizer.with_padding(None);
    tokenizer.with_truncation(None).map_err(E::msg)?;
    Ok(tokenizer)
}

/// T5 encoder, 3Di head and vocabulary on one device.
pub struct CandleModel {
    encoder: t5::T5EncoderModel,
    head: CnnHead,
    tokenizer: Tokenizer,
    device: Device,
    start_token: Option<TokenId>,
    load_ms: f64,
}

impl CandleModel {
    pub fn load(path: &Path, device: &Device, params: &ModelParams) -> Result<Self> {
        let started = Instant::now();
        let files = ModelFiles::locate(path)?;
        debug!(?files, ?device, "loading ProstT5 weights");

        let config: t5::Config = serde_json::from_str(&std::fs::read_to_string(&files.config)?)?;
        let tokenizer = load_tokenizer(&files.tokenizer)?;
        let encoder = t5::T5EncoderModel::load(
            var_builder(&files.weights, device, params.use_mmap)?,
            &config,
        )?;
        let head = CnnHead::load(
            head_var_builder(&files.head, device, params.use_mmap)?,
            config.d_model,
            THREEDI_CLASSES,
        )?;
        let start_token = tokenizer.token_to_id(START_MARKER);
        if start_token.is_none() {
            warn!("vocabulary has no {START_MARKER} token, residues are encoded without a task prefix");
        }

        Ok(Self {
            encoder,
            head,
            tokenizer,
            device: device.clone(),
            start_token,
            load_ms: started.elapsed().as_secs_f64() * 1e3,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }
}

impl RuntimeModel for CandleModel {
    type Context = CandleContext;

    fn tokenize(&self, text: &str, parse_special: bool) -> Vec<TokenId> {
        if parse_special {
            if let Some(id) = self.tokenizer.token_to_id(text) {
                return vec![id];
            }
        }
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.get_ids().to_vec(),
            Err(err) => {
                debug!(piece = text, error = %err, "tokenization failed");
                Vec::new()
            }
        }
    }

    fn n_vocab(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    fn n_cls_out(&self) -> u32 {
        self.head.n_classes() as u32
    }

    fn create_context(&self, params: &ContextParams) -> Result<CandleContext> {
        let profile = ModelProfile::resolve(self.n_vocab(), self.n_cls_out());
        let perf = PerfCounters {
            t_load_ms: self.load_ms,
            ..Default::default()
        };
        CandleContext::new(
            self.encoder.clone(),
            self.head.clone(),
            self.device.clone(),
            self.start_token,
            profile.layout,
            params.clone(),
            perf,
        )
    }
}

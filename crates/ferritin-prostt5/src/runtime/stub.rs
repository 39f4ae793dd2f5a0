//! In-memory runtime with synthetic vocabularies and scores.
//!
//! Used to exercise tokenization, profile handling and decoding without
//! model weights.
use super::{
    Backend, ContextParams, DeviceInfo, DeviceKind, DeviceMemory, ModelParams, PerfCounters,
    RuntimeContext, RuntimeModel, TokenId,
};
use crate::profile::ModelProfile;
use anyhow::{bail, ensure, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

const GIB: u64 = 1 << 30;

/// Piece to token tables. Lookups are exact: a piece either is a token or
/// tokenizes to nothing.
#[derive(Debug, Clone, Default)]
pub struct StubVocab {
    pieces: HashMap<String, TokenId>,
    special: HashMap<String, TokenId>,
    n_vocab: usize,
}

impl StubVocab {
    pub fn new(n_vocab: usize) -> Self {
        Self {
            n_vocab,
            ..Default::default()
        }
    }

    pub fn with_piece(mut self, piece: &str, id: TokenId) -> Self {
        self.pieces.insert(piece.to_string(), id);
        self
    }

    pub fn with_special(mut self, piece: &str, id: TokenId) -> Self {
        self.special.insert(piece.to_string(), id);
        self
    }

    /// 150 token sentencepiece vocabulary; residues carry the word boundary
    /// marker (`▁A`).
    pub fn sentencepiece() -> Self {
        let mut vocab = Self::new(150)
            .with_special("<pad>", 0)
            .with_special("</s>", 1)
            .with_special("<unk>", 2)
            .with_special("<fold2AA>", 148)
            .with_special("<AA2fold>", 149);
        for (i, c) in "ACDEFGHIKLMNPQRSTVWYXUZOB".chars().enumerate() {
            vocab = vocab.with_piece(&format!("▁{c}"), 3 + i as TokenId);
        }
        vocab
    }

    /// 28 token vocabulary with bare residue pieces.
    pub fn compact() -> Self {
        let mut vocab = Self::new(28)
            .with_special("<pad>", 0)
            .with_special("</s>", 1)
            .with_special("<unk>", 2)
            .with_special("<AA2fold>", 24)
            .with_special("<fold2AA>", 25)
            .with_piece("B", 26)
            .with_piece("Z", 27);
        for (i, c) in "ACDEFGHIKLMNPQRSTVWYX".chars().enumerate() {
            vocab = vocab.with_piece(&c.to_string(), 3 + i as TokenId);
        }
        vocab
    }

    fn tokenize(&self, text: &str, parse_special: bool) -> Vec<TokenId> {
        if parse_special {
            if let Some(&id) = self.special.get(text) {
                return vec![id];
            }
        }
        self.pieces.get(text).map(|&id| vec![id]).unwrap_or_default()
    }
}

/// What a stub context writes into its score buffer.
#[derive(Debug, Clone)]
pub enum Scoring {
    /// One score row per token after the start marker, peaking at class
    /// `token id % n_classes`, in the layout of the resolved profile.
    TokenEcho,
    /// This buffer, verbatim, for every pass.
    Fixed(Vec<f32>),
    /// The pass succeeds but leaves no buffer.
    Empty,
    /// The pass fails.
    Fail,
}

#[derive(Debug, Clone)]
pub struct StubBackend {
    devices: Vec<DeviceInfo>,
    vocab: StubVocab,
    n_cls_out: u32,
    scoring: Scoring,
    fail_load: bool,
    shutdowns: Arc<AtomicUsize>,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(StubVocab::sentencepiece(), 20)
    }
}

impl StubBackend {
    pub fn new(vocab: StubVocab, n_cls_out: u32) -> Self {
        Self {
            devices: default_devices(),
            vocab,
            n_cls_out,
            scoring: Scoring::TokenEcho,
            fail_load: false,
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    /// Every `load_model` call fails.
    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    /// Counter of `shutdown` calls.
    pub fn shutdown_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.shutdowns)
    }
}

/// A host CPU, one GPU, a BLAS accelerator and a paravirtualized Metal device.
pub fn default_devices() -> Vec<DeviceInfo> {
    vec![
        DeviceInfo {
            name: "CPU".into(),
            description: "Stub host CPU".into(),
            kind: DeviceKind::Cpu,
            memory: Some(DeviceMemory {
                free: 16 * GIB,
                total: 32 * GIB,
            }),
        },
        DeviceInfo {
            name: "CUDA0".into(),
            description: "Stub GPU".into(),
            kind: DeviceKind::Gpu,
            memory: Some(DeviceMemory {
                free: 7 * GIB,
                total: 8 * GIB,
            }),
        },
        DeviceInfo {
            name: "BLAS".into(),
            description: "Stub BLAS".into(),
            kind: DeviceKind::Accel,
            memory: None,
        },
        DeviceInfo {
            name: "Metal".into(),
            description: "Apple Paravirtual device".into(),
            kind: DeviceKind::Gpu,
            memory: Some(DeviceMemory { free: 0, total: 0 }),
        },
    ]
}

impl Backend for StubBackend {
    type Model = StubModel;

    fn name(&self) -> &str {
        "stub"
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<StubModel> {
        if self.fail_load {
            bail!("stub backend refused to load {}", path.display());
        }
        Ok(StubModel {
            vocab: self.vocab.clone(),
            n_cls_out: self.n_cls_out,
            scoring: self.scoring.clone(),
            params: params.clone(),
            path: path.to_path_buf(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StubModel {
    vocab: StubVocab,
    n_cls_out: u32,
    scoring: Scoring,
    params: ModelParams,
    path: PathBuf,
}

impl StubModel {
    /// Placement the model was loaded with.
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuntimeModel for StubModel {
    type Context = StubContext;

    fn tokenize(&self, text: &str, parse_special: bool) -> Vec<TokenId> {
        self.vocab.tokenize(text, parse_special)
    }

    fn n_vocab(&self) -> usize {
        self.vocab.n_vocab
    }

    fn n_cls_out(&self) -> u32 {
        self.n_cls_out
    }

    fn create_context(&self, params: &ContextParams) -> Result<StubContext> {
        ensure!(params.n_threads > 0, "thread count must be positive");
        Ok(StubContext {
            start_token: self.vocab.special.get("<AA2fold>").copied(),
            profile: ModelProfile::resolve(self.n_vocab(), self.n_cls_out),
            n_batch: params.n_batch,
            scoring: self.scoring.clone(),
            scores: None,
            perf: PerfCounters::default(),
        })
    }
}

#[derive(Debug)]
pub struct StubContext {
    start_token: Option<TokenId>,
    profile: ModelProfile,
    n_batch: usize,
    scoring: Scoring,
    scores: Option<Vec<f32>>,
    perf: PerfCounters,
}

impl StubContext {
    fn echo(&self, tokens: &[TokenId]) -> Vec<f32> {
        let rows = match (tokens.first(), self.start_token) {
            (Some(&first), Some(start)) if first == start => &tokens[1..],
            _ => tokens,
        };
        let n_classes = self.profile.n_classes;
        let mut scores = vec![0.0; rows.len() * n_classes];
        for (position, &token) in rows.iter().enumerate() {
            let class = token as usize % n_classes;
            let idx = self
                .profile
                .layout
                .index(position, class, rows.len(), n_classes);
            scores[idx] = 1.0;
        }
        scores
    }
}

impl RuntimeContext for StubContext {
    fn encode(&mut self, tokens: &[TokenId]) -> Result<()> {
        self.scores = None;
        ensure!(!tokens.is_empty(), "cannot encode an empty batch");
        ensure!(
            tokens.len() <= self.n_batch,
            "batch of {} tokens exceeds n_batch = {}",
            tokens.len(),
            self.n_batch
        );
        let started = Instant::now();
        let scores = match &self.scoring {
            Scoring::TokenEcho => Some(self.echo(tokens)),
            Scoring::Fixed(buffer) => Some(buffer.clone()),
            Scoring::Empty => None,
            Scoring::Fail => bail!("stub encoder failure"),
        };
        self.perf.record_encode(tokens.len(), started.elapsed());
        self.scores = scores;
        Ok(())
    }

    fn scores(&self) -> Option<&[f32]> {
        self.scores.as_deref()
    }

    fn perf(&self) -> PerfCounters {
        self.perf
    }
}

use super::head::CnnHead;
use crate::profile::ScoreLayout;
use crate::runtime::{ContextParams, PerfCounters, RuntimeContext, TokenId};
use anyhow::{ensure, Result};
use candle_core::{Device, Module, Tensor};
use candle_transformers::models::t5;
use std::time::Instant;
use tracing::debug;

/// Encoder pass executor with its own compute thread pool.
pub struct CandleContext {
    encoder: t5::T5EncoderModel,
    head: CnnHead,
    device: Device,
    pool: rayon::ThreadPool,
    start_token: Option<TokenId>,
    layout: ScoreLayout,
    params: ContextParams,
    scores: Option<Vec<f32>>,
    perf: PerfCounters,
}

impl CandleContext {
    pub(crate) fn new(
        encoder: t5::T5EncoderModel,
        head: CnnHead,
        device: Device,
        start_token: Option<TokenId>,
        layout: ScoreLayout,
        params: ContextParams,
        perf: PerfCounters,
    ) -> Result<Self> {
        ensure!(params.n_threads_batch > 0, "thread count must be positive");
        ensure!(params.embeddings, "the 3Di head needs the per-token output buffer");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.n_threads_batch)
            .thread_name(|i| format!("prostt5-encode-{i}"))
            .build()?;
        Ok(Self {
            encoder,
            head,
            device,
            pool,
            start_token,
            layout,
            params,
            scores: None,
            perf,
        })
    }
}

/// Encoder states of every token after the start marker through the head,
/// flattened in `layout` order.
fn forward(
    encoder: &mut t5::T5EncoderModel,
    head: &CnnHead,
    device: &Device,
    tokens: &[TokenId],
    skip: usize,
    layout: ScoreLayout,
) -> candle_core::Result<Vec<f32>> {
    let rows = tokens.len() - skip;
    if rows == 0 {
        return Ok(Vec::new());
    }
    let input_ids = Tensor::new(tokens, device)?.unsqueeze(0)?;
    let hidden = encoder.forward(&input_ids)?.narrow(1, skip, rows)?;
    // [n_classes, rows]
    let logits = head.forward(&hidden)?.squeeze(0)?;
    let logits = match layout {
        ScoreLayout::ClassMajor => logits,
        ScoreLayout::TokenMajor => logits.t()?.contiguous()?,
    };
    logits.flatten_all()?.to_vec1::<f32>()
}

impl RuntimeContext for CandleContext {
    fn encode(&mut self, tokens: &[TokenId]) -> Result<()> {
        self.scores = None;
        ensure!(!tokens.is_empty(), "cannot encode an empty batch");
        ensure!(
            tokens.len() <= self.params.n_ubatch && tokens.len() <= self.params.n_ctx,
            "batch of {} tokens exceeds the context size ({})",
            tokens.len(),
            self.params.n_ubatch.min(self.params.n_ctx)
        );
        let skip = usize::from(self.start_token.is_some() && tokens.first() == self.start_token.as_ref());

        let started = Instant::now();
        let Self {
            encoder,
            head,
            device,
            pool,
            layout,
            ..
        } = self;
        let layout = *layout;
        let scores = pool.install(|| forward(encoder, head, device, tokens, skip, layout))?;
        let elapsed = started.elapsed();
        debug!(tokens = tokens.len(), ms = elapsed.as_millis() as u64, "encoder pass");

        self.perf.record_encode(tokens.len(), elapsed);
        self.scores = Some(scores);
        Ok(())
    }

    fn scores(&self) -> Option<&[f32]> {
        self.scores.as_deref()
    }

    fn perf(&self) -> PerfCounters {
        self.perf
    }
}

//! Prediction sessions.
use crate::decode::{decode_3di, ScoreMatrix};
use crate::error::PredictError;
use crate::model::ProstT5Model;
use crate::profile::ModelProfile;
use crate::runtime::{Backend, ContextParams, PerfCounters, RuntimeContext, RuntimeModel};
use crate::tokenizer::{build_tokens, TokenSequence};
use anyhow::{ensure, Context, Result};
use tracing::{debug, warn};

type ContextOf<B> = <<B as Backend>::Model as RuntimeModel>::Context;

/// An execution context bound to a [`ProstT5Model`].
///
/// `predict` takes `&mut self`: callers that predict concurrently need one
/// session each, all borrowing the same model.
pub struct ProstT5<'m, B: Backend> {
    model: &'m ProstT5Model<'m, B>,
    ctx: ContextOf<B>,
    params: ContextParams,
}

impl<'m, B: Backend> ProstT5<'m, B> {
    pub fn new(model: &'m ProstT5Model<'m, B>, threads: usize) -> Result<Self> {
        Self::with_params(model, ContextParams::encoder(threads))
    }

    pub fn with_params(model: &'m ProstT5Model<'m, B>, params: ContextParams) -> Result<Self> {
        ensure!(params.n_threads > 0, "thread count must be positive");
        let ctx = model
            .runtime_model()
            .create_context(&params)
            .context("failed to create inference context")?;
        debug!(threads = params.n_threads, n_ctx = params.n_ctx, "session created");
        Ok(Self { model, ctx, params })
    }

    /// Predict the 3Di string of `aa`.
    ///
    /// The result has one letter per input byte. Failures are logged and
    /// yield an empty string.
    pub fn predict(&mut self, aa: &str) -> String {
        match self.try_predict(aa) {
            Ok(states) => states,
            Err(err) => {
                warn!(error = %err, residues = aa.len(), "prediction failed");
                String::new()
            }
        }
    }

    /// Like [`ProstT5::predict`] but reports why a prediction failed.
    pub fn try_predict(&mut self, aa: &str) -> Result<String, PredictError> {
        let tokens = build_tokens(self.model.runtime_model(), aa)?;
        if tokens.is_empty() {
            return Ok(String::new());
        }
        let profile = self.model.profile();
        let pred_len = profile.pred_len(aa.len(), tokens.len(), tokens.has_start_end());
        encode(&mut self.ctx, &tokens, profile, pred_len, aa.len())
    }

    /// Performance counters of the underlying context.
    pub fn perf(&self) -> PerfCounters {
        self.ctx.perf()
    }

    pub fn model(&self) -> &'m ProstT5Model<'m, B> {
        self.model
    }

    pub fn params(&self) -> &ContextParams {
        &self.params
    }
}

/// Run one encoder pass and decode the first `output_len` positions.
fn encode<C: RuntimeContext>(
    ctx: &mut C,
    tokens: &TokenSequence,
    profile: &ModelProfile,
    pred_len: usize,
    output_len: usize,
) -> Result<String, PredictError> {
    ctx.encode(tokens.as_slice()).map_err(PredictError::Encode)?;
    ctx.synchronize();
    let scores = ctx.scores().ok_or(PredictError::MissingScores)?;
    if pred_len == 0 || output_len == 0 {
        return Ok(String::new());
    }
    let matrix = ScoreMatrix::new(scores, pred_len, profile.n_classes, profile.layout)?;
    Ok(decode_3di(&matrix, output_len))
}

//! ProstT5 3Di classification head.
//!
//! Two `(7, 1)` convolutions over the encoder states:
//!
//! ```text
//! [B, L, d_model] -> Conv(d_model -> 32) -> ReLU -> Conv(32 -> 20) -> [B, 20, L]
//! ```
//!
//! The kernels have width 1, so they are loaded as 1D convolutions along the
//! sequence.
use candle_core::{Module, Result, Tensor};
use candle_nn::{Conv1d, Conv1dConfig, VarBuilder};

const HIDDEN_CHANNELS: usize = 32;
const KERNEL: usize = 7;

#[derive(Debug, Clone)]
pub struct CnnHead {
    conv1: Conv1d,
    conv2: Conv1d,
    n_classes: usize,
}

fn conv_7x1(vb: VarBuilder, in_channels: usize, out_channels: usize) -> Result<Conv1d> {
    let weight = vb
        .get((out_channels, in_channels, KERNEL, 1), "weight")?
        .squeeze(3)?;
    let bias = vb.get(out_channels, "bias")?;
    let config = Conv1dConfig {
        padding: KERNEL / 2,
        ..Default::default()
    };
    Ok(Conv1d::new(weight, Some(bias), config))
}

impl CnnHead {
    /// Load from the `classifier.*` tensors of the head checkpoint.
    pub fn load(vb: VarBuilder, d_model: usize, n_classes: usize) -> Result<Self> {
        let vb = vb.pp("classifier");
        let conv1 = conv_7x1(vb.pp("0"), d_model, HIDDEN_CHANNELS)?;
        // classifier.1 is the ReLU, classifier.2 a dropout
        let conv2 = conv_7x1(vb.pp("3"), HIDDEN_CHANNELS, n_classes)?;
        Ok(Self {
            conv1,
            conv2,
            n_classes,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

impl Module for CnnHead {
    /// `[B, L, d_model]` encoder states to `[B, n_classes, L]` logits.
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = xs.transpose(1, 2)?.contiguous()?;
        let xs = self.conv1.forward(&xs)?.relu()?;
        self.conv2.forward(&xs)
    }
}

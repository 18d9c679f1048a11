use candle_core::{Result, Tensor};
use candle_nn::{linear_no_bias, ops, Linear, Module, VarBuilder};

/// Collapses a [B, T, C] sequence into [B, C] by a learned softmax weighting
/// over the time dimension.
pub struct AttentionWeightedAverage {
    score: Linear,
}

impl AttentionWeightedAverage {
    pub fn new(num_features: usize, var_builder: VarBuilder) -> Result<Self> {
        Ok(Self {
            score: linear_no_bias(num_features, 1, var_builder.push_prefix("score"))?,
        })
    }
}

impl Module for AttentionWeightedAverage {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        // shape = [B, T, 1]
        let scores = self.score.forward(xs)?;
        let weights = ops::softmax(&scores, 1)?;
        // shape = [B, C]
        xs.broadcast_mul(&weights)?.sum(1)
    }
}

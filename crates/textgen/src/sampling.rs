use candle_core::Error;
use chartok::tokenizers::{TokenId, PAD_ID};
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};

use crate::{Result, EPS};

/// Pick the next token from a row of logits.
///
/// The logits are divided by `temperature` before the softmax, so higher
/// values flatten the distribution. A temperature of (almost) zero always
/// picks the most likely token. The padding token is never picked.
pub fn sample_token(logits: &[f32], temperature: f64, rng: &mut impl Rng) -> Result<TokenId> {
    let candidates = || {
        logits
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != PAD_ID as usize)
    };

    if temperature <= EPS {
        return candidates()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| idx as TokenId)
            .ok_or_else(|| Error::Msg("no token to sample from".into()).into());
    }

    let scaled = logits
        .iter()
        .map(|logit| (*logit as f64) / temperature)
        .collect::<Vec<_>>();
    let max = candidates()
        .map(|(idx, _)| scaled[idx])
        .fold(f64::NEG_INFINITY, f64::max);

    // Softmax without the normalisation, WeightedIndex takes care of it.
    let weights = scaled
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            if idx == PAD_ID as usize {
                0.0
            } else {
                (value - max).exp()
            }
        })
        .collect::<Vec<_>>();

    // This essentially simulates torch.multinomial(probs, num_samples=1)
    let dist = WeightedIndex::new(&weights).map_err(Error::wrap)?;
    Ok(dist.sample(rng) as TokenId)
}

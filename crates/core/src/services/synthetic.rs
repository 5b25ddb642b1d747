use crate::errors::CoreError;
use crate::models::price::{round2, PriceChange, Trend};

/// Produces simulated [`PriceChange`] values within `±spread / 2` percent.
///
/// Randomness comes from the OS via `getrandom`. [`SyntheticEstimator::fixed`]
/// replaces it with a constant sample for deterministic callers.
#[derive(Debug, Clone, Default)]
pub struct SyntheticEstimator {
    fixed: Option<f64>,
}

impl SyntheticEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always use `sample` (clamped into `[0, 1]`) instead of OS randomness.
    pub fn fixed(sample: f64) -> Self {
        Self {
            fixed: Some(sample.clamp(0.0, 1.0)),
        }
    }

    /// Uniform sample in `[0, 1)`.
    fn sample(&self) -> Result<f64, CoreError> {
        if let Some(sample) = self.fixed {
            return Ok(sample);
        }
        let mut buf = [0u8; 8];
        getrandom::getrandom(&mut buf)?;
        // Top 53 bits fill an f64 mantissa exactly.
        let bits = u64::from_le_bytes(buf) >> 11;
        Ok(bits as f64 / (1u64 << 53) as f64)
    }

    /// `change = sample × spread − spread / 2`, rounded to two decimals.
    /// The trend comes from an independent second sample.
    pub fn estimate(&self, spread: f64) -> Result<PriceChange, CoreError> {
        let change = self.sample()? * spread - spread / 2.0;
        let trend = if self.sample()? > 0.5 {
            Trend::Up
        } else {
            Trend::Down
        };
        Ok(PriceChange {
            change_percent: round2(change),
            trend,
            synthetic: true,
        })
    }
}

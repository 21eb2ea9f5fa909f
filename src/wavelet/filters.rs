use serde::{Deserialize, Serialize};

use crate::error::{Result, WaveletError};

const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

// ---------------------------------------------------------------------------
// FilterSet – the four trainable filters of a two-channel filter bank
// ---------------------------------------------------------------------------

/// Decomposition and reconstruction filters, all of the same length.
///
/// Coefficients follow the usual convention: analysis convolves with
/// `dec_*` and downsamples, synthesis upsamples and convolves with `rec_*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub name: String,
    pub dec_lo: Vec<f64>,
    pub dec_hi: Vec<f64>,
    pub rec_lo: Vec<f64>,
    pub rec_hi: Vec<f64>,
}

impl FilterSet {
    /// Build and validate a filter set.
    pub fn new(
        name: impl Into<String>,
        dec_lo: Vec<f64>,
        dec_hi: Vec<f64>,
        rec_lo: Vec<f64>,
        rec_hi: Vec<f64>,
    ) -> Result<Self> {
        let set = FilterSet {
            name: name.into(),
            dec_lo,
            dec_hi,
            rec_lo,
            rec_hi,
        };
        set.validate()?;
        Ok(set)
    }

    /// The two-tap Haar wavelet.
    pub fn haar() -> Self {
        let a = FRAC_1_SQRT_2;
        FilterSet {
            name: "haar".into(),
            dec_lo: vec![a, a],
            dec_hi: vec![-a, a],
            rec_lo: vec![a, a],
            rec_hi: vec![a, -a],
        }
    }

    /// Haar filters zero-padded to six taps, leaving room for the optimizer
    /// to grow a longer support.
    pub fn custom_haar() -> Self {
        let a = FRAC_1_SQRT_2;
        FilterSet {
            name: "custom".into(),
            dec_lo: vec![0.0, 0.0, a, a, 0.0, 0.0],
            dec_hi: vec![0.0, 0.0, -a, a, 0.0, 0.0],
            rec_lo: vec![0.0, 0.0, a, a, 0.0, 0.0],
            rec_hi: vec![0.0, 0.0, a, -a, 0.0, 0.0],
        }
    }

    /// Check that all four filters share one non-zero length and hold finite values.
    pub fn validate(&self) -> Result<()> {
        let lens = [
            self.dec_lo.len(),
            self.dec_hi.len(),
            self.rec_lo.len(),
            self.rec_hi.len(),
        ];
        if lens[0] == 0 || lens.iter().any(|&l| l != lens[0]) {
            return Err(WaveletError::FilterLength {
                dec_lo: lens[0],
                dec_hi: lens[1],
                rec_lo: lens[2],
                rec_hi: lens[3],
            });
        }
        if self.coefficients().any(|c| !c.is_finite()) {
            return Err(WaveletError::InvalidConfig(format!(
                "filter set '{}' contains non-finite coefficients",
                self.name
            )));
        }
        Ok(())
    }

    /// Filter length `L`.
    pub fn taps(&self) -> usize {
        self.dec_lo.len()
    }

    /// Group delay of the analysis/synthesis pair, `L - 1`.
    pub fn delay(&self) -> usize {
        self.taps().saturating_sub(1)
    }

    /// All coefficients in `dec_lo ‖ dec_hi ‖ rec_lo ‖ rec_hi` order.
    pub fn coefficients(&self) -> impl Iterator<Item = f64> + '_ {
        self.dec_lo
            .iter()
            .chain(&self.dec_hi)
            .chain(&self.rec_lo)
            .chain(&self.rec_hi)
            .copied()
    }

    pub fn coefficients_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.dec_lo
            .iter_mut()
            .chain(self.dec_hi.iter_mut())
            .chain(self.rec_lo.iter_mut())
            .chain(self.rec_hi.iter_mut())
    }

    /// Total number of trainable coefficients.
    pub fn parameter_count(&self) -> usize {
        4 * self.taps()
    }
}

// ---------------------------------------------------------------------------
// FilterGradients
// ---------------------------------------------------------------------------

/// Partial derivatives of a scalar with respect to every filter tap.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGradients {
    pub dec_lo: Vec<f64>,
    pub dec_hi: Vec<f64>,
    pub rec_lo: Vec<f64>,
    pub rec_hi: Vec<f64>,
}

impl FilterGradients {
    pub fn zeros(taps: usize) -> Self {
        FilterGradients {
            dec_lo: vec![0.0; taps],
            dec_hi: vec![0.0; taps],
            rec_lo: vec![0.0; taps],
            rec_hi: vec![0.0; taps],
        }
    }

    pub fn taps(&self) -> usize {
        self.dec_lo.len()
    }

    /// Add `other` into `self` tap by tap.
    pub fn accumulate(&mut self, other: &FilterGradients) {
        for (a, b) in self.iter_mut().zip(other.iter()) {
            *a += b;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for g in self.iter_mut() {
            *g *= factor;
        }
    }

    /// Gradient entries in the same order as [`FilterSet::coefficients`].
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.dec_lo
            .iter()
            .chain(&self.dec_hi)
            .chain(&self.rec_lo)
            .chain(&self.rec_hi)
            .copied()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.dec_lo
            .iter_mut()
            .chain(self.dec_hi.iter_mut())
            .chain(self.rec_lo.iter_mut())
            .chain(self.rec_hi.iter_mut())
    }

    /// Euclidean norm over all taps.
    pub fn norm(&self) -> f64 {
        self.iter().map(|g| g * g).sum::<f64>().sqrt()
    }
}

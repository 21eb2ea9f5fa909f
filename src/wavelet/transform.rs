use rayon::prelude::*;

use super::filters::{FilterGradients, FilterSet};
use crate::config::Device;
use crate::data::model::{SignalBatch, SubBands};
use crate::error::{Result, WaveletError};

// ---------------------------------------------------------------------------
// FilterBank – multi-level periodic analysis / synthesis
// ---------------------------------------------------------------------------

/// An N-level two-channel filter bank with periodic boundary handling.
///
/// The filters are not owned by the bank: every operation takes the current
/// [`FilterSet`] so the same bank can be reused while the filters are trained.
///
/// Level layout for `levels = 3` and a length-32 input:
/// ```text
///   x (32) ──┬─ hi ─▶ band 0 (16)
///            └─ lo (16) ──┬─ hi ─▶ band 1 (8)
///                         └─ lo (8) ──┬─ hi ─▶ band 2 (4)
///                                     └─ lo ─▶ band 3 (4, approximation)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterBank {
    levels: usize,
    device: Device,
}

impl FilterBank {
    pub fn new(levels: usize, device: Device) -> Result<Self> {
        if levels == 0 {
            return Err(WaveletError::InvalidConfig(
                "filter bank needs at least one decomposition level".into(),
            ));
        }
        Ok(FilterBank { levels, device })
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Signals must be non-empty and divisible by `2^levels`; anything else is
    /// rejected rather than padded.
    pub fn check_length(&self, len: usize) -> Result<()> {
        let block = 1usize.checked_shl(self.levels as u32).unwrap_or(0);
        if len == 0 || block == 0 || len % block != 0 {
            return Err(WaveletError::LengthNotDivisible {
                len,
                levels: self.levels,
            });
        }
        Ok(())
    }

    /// Decompose every row of `signal` into `levels + 1` sub-bands.
    pub fn analysis(&self, filters: &FilterSet, signal: &SignalBatch) -> Result<SubBands> {
        self.check_length(signal.len())?;
        let mut bands = Vec::with_capacity(self.levels + 1);
        let mut current = signal.clone();
        for _ in 0..self.levels {
            let (lo, hi) = self.analyze_level(filters, &current)?;
            bands.push(hi);
            current = lo;
        }
        bands.push(current);
        Ok(SubBands::new(bands))
    }

    /// Rebuild a batch from sub-bands, coarsest level first.
    pub fn synthesis(&self, filters: &FilterSet, bands: &SubBands) -> Result<SignalBatch> {
        let mut current = self.check_subbands(bands)?.clone();
        for level in (0..self.levels).rev() {
            current = self.synthesize_level(filters, &current, bands.band(level))?;
        }
        Ok(current)
    }

    /// Gradient of a scalar with respect to the decomposition filters, given
    /// the gradient of that scalar with respect to each sub-band.
    pub fn analysis_backward(
        &self,
        filters: &FilterSet,
        signal: &SignalBatch,
        grad_bands: &SubBands,
    ) -> Result<FilterGradients> {
        self.check_length(signal.len())?;
        self.check_subbands(grad_bands)?;

        // Level inputs are not kept by the forward pass; recompute them.
        let mut inputs = Vec::with_capacity(self.levels);
        let mut current = signal.clone();
        for _ in 0..self.levels {
            let (lo, _) = self.analyze_level(filters, &current)?;
            inputs.push(current);
            current = lo;
        }

        let mut grads = FilterGradients::zeros(filters.taps());
        let mut grad_lo = grad_bands.band(self.levels).clone();
        for level in (0..self.levels).rev() {
            let (grad_input, level_grads) = self.analyze_level_backward(
                filters,
                &inputs[level],
                &grad_lo,
                grad_bands.band(level),
            )?;
            grads.accumulate(&level_grads);
            grad_lo = grad_input;
        }
        Ok(grads)
    }

    /// Gradients with respect to the sub-bands and the reconstruction filters,
    /// given the gradient with respect to the synthesized batch.
    pub fn synthesis_backward(
        &self,
        filters: &FilterSet,
        bands: &SubBands,
        grad_output: &SignalBatch,
    ) -> Result<(SubBands, FilterGradients)> {
        let approx = self.check_subbands(bands)?;

        // inputs[level] is the coarse reconstruction entering that level.
        let mut inputs = vec![SignalBatch::zeros(0, 0); self.levels];
        let mut current = approx.clone();
        for level in (0..self.levels).rev() {
            let next = self.synthesize_level(filters, &current, bands.band(level))?;
            inputs[level] = current;
            current = next;
        }
        current.expect_shape("output gradient", grad_output.shape())?;

        let mut grads = FilterGradients::zeros(filters.taps());
        let mut grad_bands = Vec::with_capacity(self.levels + 1);
        let mut grad_current = grad_output.clone();
        for (level, input) in inputs.iter().enumerate() {
            let (grad_lo, grad_hi, level_grads) =
                self.synthesize_level_backward(filters, input, bands.band(level), &grad_current)?;
            grads.accumulate(&level_grads);
            grad_bands.push(grad_hi);
            grad_current = grad_lo;
        }
        grad_bands.push(grad_current);
        Ok((SubBands::new(grad_bands), grads))
    }

    // -- structural checks --

    /// Verify count and shapes of a sub-band list; returns the approximation.
    fn check_subbands<'a>(&self, bands: &'a SubBands) -> Result<&'a SignalBatch> {
        if bands.len() != self.levels + 1 {
            return Err(WaveletError::SubbandCount {
                expected: self.levels + 1,
                got: bands.len(),
            });
        }
        let approx = bands.band(self.levels);
        let (rows, coarse) = approx.shape();
        for level in 0..self.levels {
            let expected = (rows, coarse << (self.levels - 1 - level));
            if bands.band(level).shape() != expected {
                return Err(WaveletError::ShapeMismatch {
                    what: "detail sub-band",
                    expected,
                    got: bands.band(level).shape(),
                });
            }
        }
        Ok(approx)
    }

    // -- single-level passes, dispatched per row on the configured device --

    fn analyze_level(
        &self,
        filters: &FilterSet,
        input: &SignalBatch,
    ) -> Result<(SignalBatch, SignalBatch)> {
        let half = input.len() / 2;
        let rows = self.map_rows(input.rows(), |r| analyze_row(filters, input.row(r)));
        let (lo, hi): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        Ok((
            stack(input.rows(), half, lo)?,
            stack(input.rows(), half, hi)?,
        ))
    }

    fn analyze_level_backward(
        &self,
        filters: &FilterSet,
        input: &SignalBatch,
        grad_lo: &SignalBatch,
        grad_hi: &SignalBatch,
    ) -> Result<(SignalBatch, FilterGradients)> {
        let half = (input.rows(), input.len() / 2);
        grad_lo.expect_shape("low-pass gradient", half)?;
        grad_hi.expect_shape("high-pass gradient", half)?;

        let rows = self.map_rows(input.rows(), |r| {
            analyze_row_backward(filters, input.row(r), grad_lo.row(r), grad_hi.row(r))
        });
        let mut grads = FilterGradients::zeros(filters.taps());
        let mut grad_input = Vec::with_capacity(rows.len());
        for (dx, g) in rows {
            grads.accumulate(&g);
            grad_input.push(dx);
        }
        Ok((stack(input.rows(), input.len(), grad_input)?, grads))
    }

    fn synthesize_level(
        &self,
        filters: &FilterSet,
        lo: &SignalBatch,
        hi: &SignalBatch,
    ) -> Result<SignalBatch> {
        lo.expect_shape("detail sub-band", hi.shape())?;
        let rows = self.map_rows(lo.rows(), |r| synthesize_row(filters, lo.row(r), hi.row(r)));
        stack(lo.rows(), lo.len() * 2, rows)
    }

    fn synthesize_level_backward(
        &self,
        filters: &FilterSet,
        lo: &SignalBatch,
        hi: &SignalBatch,
        grad_output: &SignalBatch,
    ) -> Result<(SignalBatch, SignalBatch, FilterGradients)> {
        grad_output.expect_shape("output gradient", (lo.rows(), lo.len() * 2))?;
        let rows = self.map_rows(lo.rows(), |r| {
            synthesize_row_backward(filters, lo.row(r), hi.row(r), grad_output.row(r))
        });
        let mut grads = FilterGradients::zeros(filters.taps());
        let mut grad_lo = Vec::with_capacity(rows.len());
        let mut grad_hi = Vec::with_capacity(rows.len());
        for (dlo, dhi, g) in rows {
            grads.accumulate(&g);
            grad_lo.push(dlo);
            grad_hi.push(dhi);
        }
        Ok((
            stack(lo.rows(), lo.len(), grad_lo)?,
            stack(lo.rows(), lo.len(), grad_hi)?,
            grads,
        ))
    }

    /// Run `f` for every row index, in order, on the configured device.
    fn map_rows<R, F>(&self, rows: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Sync + Send,
    {
        match self.device {
            Device::Cpu => (0..rows).map(f).collect(),
            Device::Parallel => (0..rows).into_par_iter().map(f).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Row kernels
// ---------------------------------------------------------------------------
//
// Analysis:  lo[k] = Σ_j dec_lo[j] · x[(2k − j) mod N]
// Synthesis: out[(2k + j − d) mod N] += rec_lo[j] · lo[k] + rec_hi[j] · hi[k],
//            d = L − 1

#[inline]
fn wrap(i: isize, n: usize) -> usize {
    i.rem_euclid(n as isize) as usize
}

fn analyze_row(filters: &FilterSet, x: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = x.len();
    let mut lo = vec![0.0; n / 2];
    let mut hi = vec![0.0; n / 2];
    for k in 0..n / 2 {
        for (j, (&h0, &h1)) in filters.dec_lo.iter().zip(&filters.dec_hi).enumerate() {
            let v = x[wrap(2 * k as isize - j as isize, n)];
            lo[k] += h0 * v;
            hi[k] += h1 * v;
        }
    }
    (lo, hi)
}

fn analyze_row_backward(
    filters: &FilterSet,
    x: &[f64],
    grad_lo: &[f64],
    grad_hi: &[f64],
) -> (Vec<f64>, FilterGradients) {
    let n = x.len();
    let mut dx = vec![0.0; n];
    let mut grads = FilterGradients::zeros(filters.taps());
    for k in 0..n / 2 {
        for (j, (&h0, &h1)) in filters.dec_lo.iter().zip(&filters.dec_hi).enumerate() {
            let idx = wrap(2 * k as isize - j as isize, n);
            dx[idx] += h0 * grad_lo[k] + h1 * grad_hi[k];
            grads.dec_lo[j] += grad_lo[k] * x[idx];
            grads.dec_hi[j] += grad_hi[k] * x[idx];
        }
    }
    (dx, grads)
}

fn synthesize_row(filters: &FilterSet, lo: &[f64], hi: &[f64]) -> Vec<f64> {
    let n = lo.len() * 2;
    let delay = filters.delay() as isize;
    let mut out = vec![0.0; n];
    for k in 0..lo.len() {
        for (j, (&g0, &g1)) in filters.rec_lo.iter().zip(&filters.rec_hi).enumerate() {
            out[wrap((2 * k + j) as isize - delay, n)] += g0 * lo[k] + g1 * hi[k];
        }
    }
    out
}

fn synthesize_row_backward(
    filters: &FilterSet,
    lo: &[f64],
    hi: &[f64],
    grad_out: &[f64],
) -> (Vec<f64>, Vec<f64>, FilterGradients) {
    let n = lo.len() * 2;
    let delay = filters.delay() as isize;
    let mut dlo = vec![0.0; lo.len()];
    let mut dhi = vec![0.0; hi.len()];
    let mut grads = FilterGradients::zeros(filters.taps());
    for k in 0..lo.len() {
        for (j, (&g0, &g1)) in filters.rec_lo.iter().zip(&filters.rec_hi).enumerate() {
            let up = grad_out[wrap((2 * k + j) as isize - delay, n)];
            dlo[k] += g0 * up;
            dhi[k] += g1 * up;
            grads.rec_lo[j] += lo[k] * up;
            grads.rec_hi[j] += hi[k] * up;
        }
    }
    (dlo, dhi, grads)
}

fn stack(rows: usize, len: usize, parts: Vec<Vec<f64>>) -> Result<SignalBatch> {
    let mut data = Vec::with_capacity(rows * len);
    for part in parts {
        data.extend(part);
    }
    SignalBatch::from_vec(rows, len, data)
}

use std::fmt;

use super::optimizer::Optimizer;
use crate::data::model::{SignalBatch, SubBands};
use crate::error::Result;
use crate::wavelet::{
    alias_cancellation_loss, perfect_reconstruction_loss, FilterBank, FilterGradients, FilterSet,
    PruneStrategy,
};

// ---------------------------------------------------------------------------
// LossBreakdown
// ---------------------------------------------------------------------------

/// The three loss terms of one step and their (equally weighted) sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossBreakdown {
    pub total: f64,
    pub mse: f64,
    pub alias: f64,
    pub perfect: f64,
}

impl LossBreakdown {
    pub fn is_finite(&self) -> bool {
        self.total.is_finite()
            && self.mse.is_finite()
            && self.alias.is_finite()
            && self.perfect.is_finite()
    }
}

impl fmt::Display for LossBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6e} mse {:.6e} acl {:.6e} prl {:.6e}",
            self.total, self.mse, self.alias, self.perfect
        )
    }
}

// ---------------------------------------------------------------------------
// Forward pass
// ---------------------------------------------------------------------------

/// Everything produced by analysis → prune → synthesis.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub bands: SubBands,
    pub pruned: SubBands,
    pub mask: SubBands,
    pub signal: SignalBatch,
}

pub fn reconstruct(
    bank: &FilterBank,
    filters: &FilterSet,
    strategy: &PruneStrategy,
    batch: &SignalBatch,
) -> Result<Reconstruction> {
    let bands = bank.analysis(filters, batch)?;
    let (pruned, mask) = strategy.apply(&bands)?;
    let signal = bank.synthesis(filters, &pruned)?;
    Ok(Reconstruction {
        bands,
        pruned,
        mask,
        signal,
    })
}

/// Loss breakdown and the gradient of `total` with respect to every tap.
pub fn evaluate(
    bank: &FilterBank,
    filters: &FilterSet,
    strategy: &PruneStrategy,
    batch: &SignalBatch,
) -> Result<(LossBreakdown, FilterGradients)> {
    let rec = reconstruct(bank, filters, strategy, batch)?;
    let mse = rec.signal.mse(batch)?;

    // d mse / d rec = 2 (rec − x) / count
    let count = batch.as_slice().len().max(1) as f64;
    let grad_rec = SignalBatch::from_vec(
        batch.rows(),
        batch.len(),
        rec.signal
            .as_slice()
            .iter()
            .zip(batch.as_slice())
            .map(|(r, x)| 2.0 * (r - x) / count)
            .collect(),
    )?;

    let (grad_pruned, mut grads) = bank.synthesis_backward(filters, &rec.pruned, &grad_rec)?;
    // Pruning is a product with a constant mask.
    let grad_bands = grad_pruned
        .iter()
        .zip(rec.mask.iter())
        .map(|(g, m)| g.masked(m))
        .collect::<Result<Vec<_>>>()?;
    grads.accumulate(&bank.analysis_backward(filters, batch, &SubBands::new(grad_bands))?);

    let (alias, alias_grads) = alias_cancellation_loss(filters);
    let (perfect, perfect_grads) = perfect_reconstruction_loss(filters);
    grads.accumulate(&alias_grads);
    grads.accumulate(&perfect_grads);

    Ok((
        LossBreakdown {
            total: mse + alias + perfect,
            mse,
            alias,
            perfect,
        },
        grads,
    ))
}

/// One optimization step: evaluate the losses on `batch`, then update
/// `filters` once. The returned losses are those of the filters before the
/// update.
pub fn train_step(
    bank: &FilterBank,
    filters: &mut FilterSet,
    optimizer: &mut Optimizer,
    strategy: &PruneStrategy,
    batch: &SignalBatch,
) -> Result<LossBreakdown> {
    let (losses, grads) = evaluate(bank, filters, strategy, batch)?;
    optimizer.step(filters, &grads)?;
    Ok(losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Device;
    use crate::data::generator::MackeyGenerator;
    use crate::train::optimizer::OptimizerConfig;
    use approx::assert_abs_diff_eq;

    fn perturbed_haar() -> FilterSet {
        let mut f = FilterSet::custom_haar();
        let bumps = [0.03, -0.02, 0.05, 0.01, -0.04, 0.02];
        for (i, c) in f.coefficients_mut().enumerate() {
            *c += bumps[i % bumps.len()] * (1.0 + i as f64 / 10.0);
        }
        f
    }

    #[test]
    fn exact_filters_without_pruning_have_zero_loss() {
        let bank = FilterBank::new(3, Device::Cpu).unwrap();
        let batch = MackeyGenerator::new(4, 32, 0.1, 11).unwrap().generate();
        let (losses, grads) =
            evaluate(&bank, &FilterSet::custom_haar(), &PruneStrategy::None, &batch).unwrap();
        assert!(losses.total < 1e-20);
        assert!(grads.norm() < 1e-9);
    }

    #[test]
    fn total_gradient_matches_finite_differences() {
        let bank = FilterBank::new(2, Device::Cpu).unwrap();
        let batch = MackeyGenerator::new(3, 16, 0.1, 12).unwrap().generate();
        let filters = perturbed_haar();

        for strategy in [PruneStrategy::None, PruneStrategy::ScaleCutoff { zero_at: 2 }] {
            let (_, grads) = evaluate(&bank, &filters, &strategy, &batch).unwrap();
            let analytic: Vec<f64> = grads.iter().collect();
            let h = 1e-6;
            for (i, &g) in analytic.iter().enumerate() {
                let mut plus = filters.clone();
                let mut minus = filters.clone();
                *plus.coefficients_mut().nth(i).unwrap() += h;
                *minus.coefficients_mut().nth(i).unwrap() -= h;
                let numeric = (evaluate(&bank, &plus, &strategy, &batch).unwrap().0.total
                    - evaluate(&bank, &minus, &strategy, &batch).unwrap().0.total)
                    / (2.0 * h);
                assert_abs_diff_eq!(g, numeric, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn train_step_updates_filters_and_reports_pre_update_loss() {
        let bank = FilterBank::new(3, Device::Cpu).unwrap();
        let batch = MackeyGenerator::new(4, 32, 0.1, 13).unwrap().generate();
        let mut filters = perturbed_haar();
        let strategy = PruneStrategy::Magnitude { cutoff: 0.1 };
        let mut opt = Optimizer::new(OptimizerConfig::default(), filters.parameter_count());

        let (expected, _) = evaluate(&bank, &filters, &strategy, &batch).unwrap();
        let before = filters.clone();
        let losses = train_step(&bank, &mut filters, &mut opt, &strategy, &batch).unwrap();

        assert_eq!(losses, expected);
        let sum = losses.mse + losses.alias + losses.perfect;
        assert_abs_diff_eq!(losses.total, sum, epsilon = 1e-15);
        assert_ne!(filters, before);
        assert_eq!(opt.steps(), 1);
    }

    #[test]
    fn mismatched_batch_length_is_fatal() {
        let bank = FilterBank::new(3, Device::Cpu).unwrap();
        let batch = SignalBatch::zeros(2, 20);
        assert!(evaluate(&bank, &FilterSet::custom_haar(), &PruneStrategy::None, &batch).is_err());
    }
}

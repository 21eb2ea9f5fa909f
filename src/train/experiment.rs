use std::time::Instant;

use anyhow::Result;

use super::optimizer::Optimizer;
use super::step::{evaluate, reconstruct, Reconstruction};
use crate::config::ExperimentConfig;
use crate::data::generator::MackeyGenerator;
use crate::data::model::SignalBatch;
use crate::error::WaveletError;
use crate::report::{AxisScale, ReportSink, Series};
use crate::wavelet::{
    alias_cancellation_loss, perfect_reconstruction_loss, FilterBank, FilterSet, PruneStrategy,
};

/// Leading MSE entries left out of the history plot.
const HISTORY_SKIP: usize = 10;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the experiment currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing run yet.
    Ready,
    /// Baseline measured with the initial filters.
    Baseline,
    /// Inside the optimization loop; `step` updates applied so far.
    Learning { step: usize },
    /// Optimization finished and the learned filters evaluated.
    Done,
}

// ---------------------------------------------------------------------------
// ExperimentSummary
// ---------------------------------------------------------------------------

/// Headline numbers of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSummary {
    pub initial_alias_loss: f64,
    pub initial_perfect_loss: f64,
    /// Summed absolute error of reference row 0, initial filters, no pruning.
    pub initial_error: f64,
    /// Same, with pruning.
    pub initial_pruned_error: f64,
    /// Pruned error of reference row 0 with the learned filters.
    pub optimized_pruned_error: f64,
    /// Reconstruction MSE of every optimization step.
    pub mse_history: Vec<f64>,
    pub filters: FilterSet,
}

// ---------------------------------------------------------------------------
// Experiment
// ---------------------------------------------------------------------------

/// Owns the trainable filters and drives baseline → learning → evaluation.
#[derive(Debug, Clone)]
pub struct Experiment {
    config: ExperimentConfig,
    bank: FilterBank,
    generator: MackeyGenerator,
    filters: FilterSet,
    optimizer: Optimizer,
    phase: Phase,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> crate::error::Result<Self> {
        config.validate()?;
        let bank = FilterBank::new(config.levels, config.device)?;
        let generator =
            MackeyGenerator::new(config.batch_size, config.tmax, config.delta_t, config.seed)?;
        let filters = config.wavelet.clone();
        let optimizer = Optimizer::new(config.optimizer, filters.parameter_count());
        Ok(Experiment {
            config,
            bank,
            generator,
            filters,
            optimizer,
            phase: Phase::Ready,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run both phases end to end.
    pub fn run(&mut self, sink: &mut dyn ReportSink) -> Result<ExperimentSummary> {
        let started = Instant::now();
        let reference = self.generator.generate();

        let (initial_alias_loss, _) = alias_cancellation_loss(&self.filters);
        let (initial_perfect_loss, _) = perfect_reconstruction_loss(&self.filters);
        sink.scalars(
            &format!("alias cancellation loss ({})", self.filters.name),
            &[("", initial_alias_loss)],
        );
        sink.scalars("perfect reconstruction loss", &[("", initial_perfect_loss)]);

        let (initial_error, initial_pruned_error) = self.baseline(&reference, sink)?;
        let mse_history = self.optimize(sink)?;
        let optimized_pruned_error = self.evaluate_learned(&reference, &mse_history, sink)?;

        log::info!(
            "finished {} steps in {:.1?}: pruned error {:.4e} -> {:.4e}",
            mse_history.len(),
            started.elapsed(),
            initial_pruned_error,
            optimized_pruned_error
        );

        Ok(ExperimentSummary {
            initial_alias_loss,
            initial_perfect_loss,
            initial_error,
            initial_pruned_error,
            optimized_pruned_error,
            mse_history,
            filters: self.filters.clone(),
        })
    }

    /// Phase 1: fixed filters. Returns the unpruned and pruned errors of
    /// reference row 0.
    pub fn baseline(
        &mut self,
        reference: &SignalBatch,
        sink: &mut dyn ReportSink,
    ) -> Result<(f64, f64)> {
        log::info!(
            "baseline with '{}' filters, {} levels, {:?}",
            self.filters.name,
            self.bank.levels(),
            self.config.prune
        );

        let exact = reconstruct(&self.bank, &self.filters, &PruneStrategy::None, reference)?;
        let error = exact.signal.row_abs_error(reference, 0)?;
        sink.scalars("reconstruction error", &[("", error)]);

        let pruned = reconstruct(&self.bank, &self.filters, &self.config.prune, reference)?;
        let pruned_error = pruned.signal.row_abs_error(reference, 0)?;
        sink.scalars("initial pruned reconstruction error", &[("", pruned_error)]);
        log::info!(
            "kept {} of {} coefficients",
            pruned.pruned.count_nonzero(),
            pruned.bands.count_nonzero()
        );

        let label = self.config.label.clone();
        self.plot_reconstruction(&label, &pruned, reference, sink)?;
        self.phase = Phase::Baseline;
        Ok((error, pruned_error))
    }

    /// Phase 2: learned filters. Returns the MSE of every step.
    pub fn optimize(&mut self, sink: &mut dyn ReportSink) -> Result<Vec<f64>> {
        log::info!(
            "optimizing {} coefficients for {} steps with {:?}",
            self.filters.parameter_count(),
            self.config.steps,
            self.optimizer.config()
        );

        let mut history = Vec::with_capacity(self.config.steps);
        for step in 0..self.config.steps {
            let batch = self.generator.generate();
            let (losses, grads) =
                evaluate(&self.bank, &self.filters, &self.config.prune, &batch)?;

            // Abort before updating; the filters keep their last finite values.
            if self.config.abort_on_non_finite && !losses.is_finite() {
                log::error!("step {step}: {losses}");
                return Err(WaveletError::NonFiniteLoss { step }.into());
            }
            self.optimizer.step(&mut self.filters, &grads)?;
            self.phase = Phase::Learning { step: step + 1 };
            log::debug!("step {step}: {losses}");
            sink.scalars(
                &format!("step {step}"),
                &[
                    ("loss", losses.total),
                    ("mse", losses.mse),
                    ("acl", losses.alias),
                    ("prl", losses.perfect),
                ],
            );
            history.push(losses.mse);
        }
        Ok(history)
    }

    /// Re-run the reference batch with the learned filters and plot the results.
    fn evaluate_learned(
        &mut self,
        reference: &SignalBatch,
        mse_history: &[f64],
        sink: &mut dyn ReportSink,
    ) -> Result<f64> {
        let pruned = reconstruct(&self.bank, &self.filters, &self.config.prune, reference)?;
        let error = pruned.signal.row_abs_error(reference, 0)?;
        sink.scalars("optimized pruned reconstruction error", &[("", error)]);

        let label = format!("optimized_{}", self.config.label);
        self.plot_reconstruction(&label, &pruned, reference, sink)?;

        let tail = mse_history.get(HISTORY_SKIP..).unwrap_or(&[]).to_vec();
        sink.figure(
            &format!("{}_mse_history", self.config.label),
            &[Series::new("mse", tail)],
            AxisScale::Log,
        )?;
        self.phase = Phase::Done;
        Ok(error)
    }

    fn plot_reconstruction(
        &self,
        name: &str,
        rec: &Reconstruction,
        reference: &SignalBatch,
        sink: &mut dyn ReportSink,
    ) -> Result<()> {
        let output = rec.signal.row(0);
        let input = reference.row(0);
        let error: Vec<f64> = output.iter().zip(input).map(|(a, b)| (a - b).abs()).collect();
        sink.figure(
            name,
            &[
                Series::new("reconstruction", output.to_vec()),
                Series::new("original", input.to_vec()),
                Series::new("abs error", error),
            ],
            AxisScale::Linear,
        )?;
        sink.figure(
            &format!("{name}_coefficients"),
            &[
                Series::new("coefficients", rec.bands.concat_row(0)),
                Series::new("pruned", rec.pruned.concat_row(0)),
            ],
            AxisScale::Log,
        )
    }
}

/// Filter optimization: optimizers, the pure training step, and the
/// two-phase experiment driver.
///
/// ```text
///   generator ──▶ batch ──▶ step::train_step ──▶ LossBreakdown ──▶ ReportSink
///                              │        ▲
///                              ▼        │
///                          Optimizer ── FilterSet
/// ```

pub mod experiment;
pub mod optimizer;
pub mod step;

pub use experiment::{Experiment, ExperimentSummary, Phase};
pub use optimizer::{Optimizer, OptimizerConfig};
pub use step::{evaluate, reconstruct, train_step, LossBreakdown, Reconstruction};

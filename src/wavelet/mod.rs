/// Learnable two-channel filter bank.
///
/// ```text
///   SignalBatch ──▶ transform::analysis ──▶ SubBands ──▶ prune ──▶ transform::synthesis ──▶ SignalBatch
///                         ▲                                               ▲
///                         └──────────────── FilterSet ────────────────────┘
///                                              │
///                                              ▼
///                                 loss (alias / perfect reconstruction)
/// ```

pub mod filters;
pub mod loss;
pub mod prune;
pub mod transform;

pub use filters::{FilterGradients, FilterSet};
pub use loss::{alias_cancellation_loss, perfect_reconstruction_loss};
pub use prune::PruneStrategy;
pub use transform::FilterBank;

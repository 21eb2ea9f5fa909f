/// Data layer: signal containers and the Mackey-Glass source.
///
/// Architecture:
/// ```text
///   ┌────────────────┐
///   │   generator    │  Mackey-Glass DDE → SignalBatch (batch × time)
///   └────────────────┘
///          │
///          ▼
///   ┌────────────────┐
///   │     model      │  SignalBatch, SubBands (finest … coarsest, approx)
///   └────────────────┘
/// ```

pub mod generator;
pub mod model;

//! Learnable wavelet filter banks for compressing a chaotic time series.
//!
//! A multi-level periodic filter bank decomposes Mackey-Glass sequences into
//! sub-bands, a pruning policy drops coefficients, and the four filters are
//! trained by gradient descent on reconstruction MSE plus alias-cancellation
//! and perfect-reconstruction penalties.

pub mod config;
pub mod data;
pub mod error;
pub mod report;
pub mod train;
pub mod wavelet;

pub use config::{Device, ExperimentConfig};
pub use error::WaveletError;

use thiserror::Error;

// ---------------------------------------------------------------------------
// WaveletError – fatal configuration / shape errors
// ---------------------------------------------------------------------------

/// Errors raised by the numerical core.
///
/// None of these are recoverable: a filter bank with mismatched shapes has no
/// meaningful partial result, so callers abort the run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WaveletError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "filter lengths must be equal and non-zero \
         (dec_lo {dec_lo}, dec_hi {dec_hi}, rec_lo {rec_lo}, rec_hi {rec_hi})"
    )]
    FilterLength {
        dec_lo: usize,
        dec_hi: usize,
        rec_lo: usize,
        rec_hi: usize,
    },

    #[error("signal length {len} is not divisible by 2^{levels}")]
    LengthNotDivisible { len: usize, levels: usize },

    #[error("expected {expected} sub-bands, got {got}")]
    SubbandCount { expected: usize, got: usize },

    #[error("{what}: expected shape {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("loss became non-finite at step {step}")]
    NonFiniteLoss { step: usize },
}

pub type Result<T> = std::result::Result<T, WaveletError>;

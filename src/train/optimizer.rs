use serde::{Deserialize, Serialize};

use crate::error::{Result, WaveletError};
use crate::wavelet::{FilterGradients, FilterSet};

// ---------------------------------------------------------------------------
// OptimizerConfig
// ---------------------------------------------------------------------------

/// Optimizer selection and hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd {
        lr: f64,
    },
    Adagrad {
        lr: f64,
        #[serde(default = "default_adagrad_eps")]
        eps: f64,
    },
    Adam {
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_adam_eps")]
        eps: f64,
    },
}

fn default_adagrad_eps() -> f64 {
    1e-10
}
fn default_beta1() -> f64 {
    0.9
}
fn default_beta2() -> f64 {
    0.999
}
fn default_adam_eps() -> f64 {
    1e-8
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adagrad {
            lr: 0.001,
            eps: default_adagrad_eps(),
        }
    }
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> f64 {
        match *self {
            OptimizerConfig::Sgd { lr }
            | OptimizerConfig::Adagrad { lr, .. }
            | OptimizerConfig::Adam { lr, .. } => lr,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let lr = self.learning_rate();
        if !(lr.is_finite() && lr > 0.0) {
            return Err(WaveletError::InvalidConfig(format!(
                "learning rate must be positive, got {lr}"
            )));
        }
        if let OptimizerConfig::Adam { beta1, beta2, .. } = *self {
            if !(0.0..1.0).contains(&beta1) || !(0.0..1.0).contains(&beta2) {
                return Err(WaveletError::InvalidConfig(format!(
                    "adam betas must lie in [0, 1), got ({beta1}, {beta2})"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Optimizer – per-coefficient state
// ---------------------------------------------------------------------------

/// Optimizer state for one [`FilterSet`], one slot per coefficient in
/// `dec_lo ‖ dec_hi ‖ rec_lo ‖ rec_hi` order.
#[derive(Debug, Clone)]
pub struct Optimizer {
    config: OptimizerConfig,
    /// Adagrad: running sum of squared gradients. Adam: first moment.
    m: Vec<f64>,
    /// Adam: second moment.
    v: Vec<f64>,
    t: i32,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig, parameter_count: usize) -> Self {
        Optimizer {
            config,
            m: vec![0.0; parameter_count],
            v: vec![0.0; parameter_count],
            t: 0,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> i32 {
        self.t
    }

    /// Apply one update to `filters` in place.
    pub fn step(&mut self, filters: &mut FilterSet, grads: &FilterGradients) -> Result<()> {
        if grads.taps() != filters.taps() || self.m.len() != filters.parameter_count() {
            return Err(WaveletError::ShapeMismatch {
                what: "optimizer state",
                expected: (4, filters.taps()),
                got: (4, grads.taps()),
            });
        }
        self.t += 1;

        let params = filters.coefficients_mut().zip(grads.iter());
        match self.config {
            OptimizerConfig::Sgd { lr } => {
                for (p, g) in params {
                    *p -= lr * g;
                }
            }
            OptimizerConfig::Adagrad { lr, eps } => {
                for ((p, g), acc) in params.zip(self.m.iter_mut()) {
                    *acc += g * g;
                    *p -= lr * g / (acc.sqrt() + eps);
                }
            }
            OptimizerConfig::Adam {
                lr,
                beta1,
                beta2,
                eps,
            } => {
                let bias1 = 1.0 - beta1.powi(self.t);
                let bias2 = 1.0 - beta2.powi(self.t);
                for (((p, g), m), v) in params.zip(self.m.iter_mut()).zip(self.v.iter_mut()) {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bias1;
                    let v_hat = *v / bias2;
                    *p -= lr * m_hat / (v_hat.sqrt() + eps);
                }
            }
        }
        Ok(())
    }

    /// Clear accumulated state.
    pub fn reset(&mut self) {
        self.m.iter_mut().for_each(|x| *x = 0.0);
        self.v.iter_mut().for_each(|x| *x = 0.0);
        self.t = 0;
    }
}

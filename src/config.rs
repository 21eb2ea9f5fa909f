use std::path::{Path, PathBuf};

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WaveletError};
use crate::train::optimizer::OptimizerConfig;
use crate::wavelet::{FilterSet, PruneStrategy};

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// Where batch rows are processed. Results are identical on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    /// Sequential, one row after the other.
    #[default]
    Cpu,
    /// Rows spread over the rayon thread pool.
    Parallel,
}

// ---------------------------------------------------------------------------
// ExperimentConfig
// ---------------------------------------------------------------------------

/// Every run parameter of the experiment. Missing JSON keys take the defaults.
///
/// `iterations`, `lr`, `dropout`, `channels`, `pred_samples` and the windowing
/// keys belong to the sequence-model setup the generator was shared with; they
/// are accepted and validated but the wavelet run only reads `tmax`,
/// `delta_t` and `batch_size` from that group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub iterations: usize,
    pub tmax: usize,
    pub delta_t: f64,
    pub pred_samples: usize,
    pub window_size: usize,
    pub lr: f64,
    pub batch_size: usize,
    pub dropout: f64,
    pub channels: Vec<usize>,
    /// Defaults to half the window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap: Option<usize>,
    /// Defaults to `window_size - overlap`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_size: Option<usize>,
    /// Defaults to `(window_size / 2 + 1) * 2` (real and imaginary parts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fft_freq_no: Option<usize>,
    pub window_fun: String,

    /// Optimization steps in the learned-filter phase.
    pub steps: usize,
    /// Decomposition levels.
    pub levels: usize,
    pub optimizer: OptimizerConfig,
    pub prune: PruneStrategy,
    pub seed: u64,
    pub device: Device,
    /// Stem of the output image names.
    pub label: String,
    pub output_dir: PathBuf,
    pub abort_on_non_finite: bool,
    /// Initial filters.
    pub wavelet: FilterSet,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            iterations: 8000,
            tmax: 256,
            delta_t: 0.1,
            pred_samples: 256,
            window_size: 512,
            lr: 0.004,
            batch_size: 256,
            dropout: 0.0,
            channels: vec![30; 6],
            overlap: None,
            step_size: None,
            fft_freq_no: None,
            window_fun: "hamming".into(),

            steps: 2000,
            levels: 8,
            optimizer: OptimizerConfig::default(),
            prune: PruneStrategy::default(),
            seed: 0,
            device: Device::Cpu,
            label: "haar".into(),
            output_dir: PathBuf::from("."),
            abort_on_non_finite: true,
            wavelet: FilterSet::custom_haar(),
        }
    }
}

impl ExperimentConfig {
    /// Read a JSON config file and validate it.
    pub fn load(path: &Path) -> AnyResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ExperimentConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating config {}", path.display()))?;

        let unused = config.unused_overrides();
        if !unused.is_empty() {
            log::warn!(
                "config keys {unused:?} are accepted for compatibility but do not affect the run"
            );
        }
        Ok(config)
    }

    pub fn overlap(&self) -> usize {
        self.overlap.unwrap_or(self.window_size / 2)
    }

    pub fn step_size(&self) -> usize {
        self.step_size
            .unwrap_or_else(|| self.window_size.saturating_sub(self.overlap()))
    }

    pub fn fft_freq_no(&self) -> usize {
        self.fft_freq_no.unwrap_or((self.window_size / 2 + 1) * 2)
    }

    /// Check every parameter the run depends on, plus basic sanity of the
    /// carried-over keys.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(WaveletError::InvalidConfig(msg));

        if self.batch_size == 0 {
            return invalid("batch_size must be positive".into());
        }
        if self.tmax == 0 {
            return invalid("tmax must be positive".into());
        }
        if !(self.delta_t.is_finite() && self.delta_t > 0.0) {
            return invalid(format!("delta_t must be positive, got {}", self.delta_t));
        }
        if self.levels == 0 || self.levels >= usize::BITS as usize {
            return invalid(format!("levels must be in 1..{}, got {}", usize::BITS, self.levels));
        }
        if self.tmax % (1usize << self.levels) != 0 {
            return Err(WaveletError::LengthNotDivisible {
                len: self.tmax,
                levels: self.levels,
            });
        }
        if self.window_size == 0 || self.overlap() >= self.window_size {
            return invalid(format!(
                "overlap {} must be smaller than window_size {}",
                self.overlap(),
                self.window_size
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return invalid(format!("dropout must lie in [0, 1), got {}", self.dropout));
        }
        if self.label.is_empty() || self.label.contains(['/', '\\']) {
            return invalid(format!("label '{}' is not a plain file stem", self.label));
        }
        self.wavelet.validate()?;
        self.prune.validate()?;
        self.optimizer.validate()?;
        Ok(())
    }

    /// Carried-over keys whose value differs from the default.
    pub fn unused_overrides(&self) -> Vec<&'static str> {
        let d = ExperimentConfig::default();
        let mut keys = Vec::new();
        if self.iterations != d.iterations {
            keys.push("iterations");
        }
        if self.pred_samples != d.pred_samples {
            keys.push("pred_samples");
        }
        if self.window_size != d.window_size
            || self.overlap.is_some()
            || self.step_size.is_some()
            || self.fft_freq_no.is_some()
        {
            keys.push("window_size/overlap/step_size/fft_freq_no");
        }
        if self.lr != d.lr {
            keys.push("lr");
        }
        if self.dropout != d.dropout {
            keys.push("dropout");
        }
        if self.channels != d.channels {
            keys.push("channels");
        }
        if self.window_fun != d.window_fun {
            keys.push("window_fun");
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_reference_run() {
        let c = ExperimentConfig::default();
        assert_eq!(c.iterations, 8000);
        assert_eq!(c.tmax, 256);
        assert_eq!(c.batch_size, 256);
        assert_eq!(c.channels, vec![30; 6]);
        assert_eq!(c.overlap(), 256);
        assert_eq!(c.step_size(), 256);
        assert_eq!(c.fft_freq_no(), 514);
        assert_eq!(c.window_fun, "hamming");
        assert_eq!(c.optimizer.learning_rate(), 0.001);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn derived_keys_follow_window_size() {
        let c: ExperimentConfig = serde_json::from_str(r#"{"window_size": 128}"#).unwrap();
        assert_eq!(c.overlap(), 64);
        assert_eq!(c.step_size(), 64);
        assert_eq!(c.fft_freq_no(), 130);
        assert_eq!(c.unused_overrides(), vec!["window_size/overlap/step_size/fft_freq_no"]);
    }

    #[test]
    fn json_round_trip_of_defaults() {
        let c = ExperimentConfig::default();
        let text = serde_json::to_string(&c).unwrap();
        let back: ExperimentConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let c: ExperimentConfig = serde_json::from_str(
            r#"{"batch_size": 4, "tmax": 32, "levels": 3,
                "prune": {"kind": "scale_cutoff", "zero_at": 2},
                "device": "parallel"}"#,
        )
        .unwrap();
        assert_eq!(c.batch_size, 4);
        assert_eq!(c.prune, PruneStrategy::ScaleCutoff { zero_at: 2 });
        assert_eq!(c.device, Device::Parallel);
        assert_eq!(c.wavelet, FilterSet::custom_haar());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut c = ExperimentConfig::default();
        c.tmax = 100;
        assert!(matches!(c.validate(), Err(WaveletError::LengthNotDivisible { .. })));

        let mut c = ExperimentConfig::default();
        c.batch_size = 0;
        assert!(c.validate().is_err());

        let mut c = ExperimentConfig::default();
        c.label = "../escape".into();
        assert!(c.validate().is_err());

        let mut c = ExperimentConfig::default();
        c.wavelet.rec_hi.pop();
        assert!(matches!(c.validate(), Err(WaveletError::FilterLength { .. })));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"steps": 5, "label": "db"}}"#).unwrap();
        let c = ExperimentConfig::load(file.path()).unwrap();
        assert_eq!(c.steps, 5);
        assert_eq!(c.label, "db");

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{"levels": 0}}"#).unwrap();
        assert!(ExperimentConfig::load(bad.path()).is_err());
    }
}

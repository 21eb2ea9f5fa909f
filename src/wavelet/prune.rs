use serde::{Deserialize, Serialize};

use crate::data::model::{SignalBatch, SubBands};
use crate::error::{Result, WaveletError};

// ---------------------------------------------------------------------------
// PruneStrategy – which coefficients survive compression
// ---------------------------------------------------------------------------

/// Coefficient pruning policy applied between analysis and synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PruneStrategy {
    /// Keep everything.
    None,
    /// Zero whole sub-bands: band `i` is zeroed when `i <= bands - zero_at`.
    /// With the finest-first ordering this drops the fine detail bands and
    /// keeps the coarse end of the list.
    ScaleCutoff { zero_at: usize },
    /// Zero individual coefficients with `|c| <= cutoff`.
    Magnitude { cutoff: f64 },
}

impl Default for PruneStrategy {
    fn default() -> Self {
        PruneStrategy::Magnitude { cutoff: 0.5 }
    }
}

impl PruneStrategy {
    pub fn validate(&self) -> Result<()> {
        match *self {
            PruneStrategy::Magnitude { cutoff } if !(cutoff.is_finite() && cutoff >= 0.0) => {
                Err(WaveletError::InvalidConfig(format!(
                    "magnitude cutoff must be a non-negative number, got {cutoff}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Apply the policy. Returns the pruned sub-bands and the 0/1 mask that
    /// produced them, so gradients can be routed through kept entries only.
    pub fn apply(&self, bands: &SubBands) -> Result<(SubBands, SubBands)> {
        let masks: Vec<SignalBatch> = bands
            .iter()
            .enumerate()
            .map(|(i, band)| self.mask_for(i, bands.len(), band))
            .collect();
        let pruned = bands
            .iter()
            .zip(&masks)
            .map(|(band, mask)| band.masked(mask))
            .collect::<Result<Vec<_>>>()?;
        Ok((SubBands::new(pruned), SubBands::new(masks)))
    }

    /// Convenience wrapper when only the pruned coefficients are needed.
    pub fn prune(&self, bands: &SubBands) -> Result<SubBands> {
        self.apply(bands).map(|(pruned, _)| pruned)
    }

    fn mask_for(&self, index: usize, count: usize, band: &SignalBatch) -> SignalBatch {
        let (rows, len) = band.shape();
        let mut mask = SignalBatch::zeros(rows, len);
        match *self {
            PruneStrategy::None => mask.as_mut_slice().fill(1.0),
            PruneStrategy::ScaleCutoff { zero_at } => {
                let zeroed = index as isize <= count as isize - zero_at as isize;
                if !zeroed {
                    mask.as_mut_slice().fill(1.0);
                }
            }
            PruneStrategy::Magnitude { cutoff } => {
                for (m, &c) in mask.as_mut_slice().iter_mut().zip(band.as_slice()) {
                    if c.abs() > cutoff {
                        *m = 1.0;
                    }
                }
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bands() -> SubBands {
        SubBands::new(vec![
            SignalBatch::from_rows(vec![vec![0.1, -0.9, 0.4, 2.0], vec![-0.05, 0.3, -1.2, 0.6]])
                .unwrap(),
            SignalBatch::from_rows(vec![vec![0.7, -0.2], vec![1.5, 0.0]]).unwrap(),
            SignalBatch::from_rows(vec![vec![-3.0], vec![0.45]]).unwrap(),
            SignalBatch::from_rows(vec![vec![4.0], vec![2.5]]).unwrap(),
        ])
    }

    #[test]
    fn scale_cutoff_keeps_tail_of_list() {
        let (pruned, mask) = PruneStrategy::ScaleCutoff { zero_at: 2 }
            .apply(&sample_bands())
            .unwrap();
        // 4 bands, zero_at 2: indices 0..=2 are zeroed.
        for i in 0..3 {
            assert_eq!(pruned.band(i).count_nonzero(), 0);
            assert_eq!(mask.band(i).count_nonzero(), 0);
        }
        assert_eq!(pruned.band(3), sample_bands().band(3));
    }

    #[test]
    fn scale_cutoff_edges() {
        let bands = sample_bands();
        let all = PruneStrategy::ScaleCutoff { zero_at: 0 }.prune(&bands).unwrap();
        assert_eq!(all.count_nonzero(), 0);
        let none = PruneStrategy::ScaleCutoff { zero_at: 10 }.prune(&bands).unwrap();
        assert_eq!(none, bands);
    }

    #[test]
    fn scale_cutoff_is_idempotent() {
        let bands = sample_bands();
        for zero_at in 0..6 {
            let s = PruneStrategy::ScaleCutoff { zero_at };
            let once = s.prune(&bands).unwrap();
            let twice = s.prune(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn magnitude_preserves_shape_and_drops_small_values() {
        let bands = sample_bands();
        let pruned = PruneStrategy::Magnitude { cutoff: 0.5 }.prune(&bands).unwrap();
        assert_eq!(pruned.len(), bands.len());
        for (p, b) in pruned.iter().zip(bands.iter()) {
            assert_eq!(p.shape(), b.shape());
            for (&pv, &bv) in p.as_slice().iter().zip(b.as_slice()) {
                if bv.abs() > 0.5 {
                    assert_eq!(pv, bv);
                } else {
                    assert_eq!(pv, 0.0);
                }
            }
        }
    }

    #[test]
    fn magnitude_retained_count_is_monotone() {
        let bands = sample_bands();
        let mut last = usize::MAX;
        for step in 0..50 {
            let cutoff = step as f64 * 0.1;
            let kept = PruneStrategy::Magnitude { cutoff }
                .prune(&bands)
                .unwrap()
                .count_nonzero();
            assert!(kept <= last, "cutoff {cutoff} kept {kept} > {last}");
            last = kept;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn none_is_identity() {
        let bands = sample_bands();
        assert_eq!(PruneStrategy::None.prune(&bands).unwrap(), bands);
    }

    #[test]
    fn invalid_cutoff_rejected() {
        assert!(PruneStrategy::Magnitude { cutoff: -1.0 }.validate().is_err());
        assert!(PruneStrategy::Magnitude { cutoff: f64::NAN }.validate().is_err());
        assert!(PruneStrategy::ScaleCutoff { zero_at: 3 }.validate().is_ok());
    }

    #[test]
    fn deserializes_from_tagged_json() {
        let s: PruneStrategy =
            serde_json::from_str(r#"{"kind":"scale_cutoff","zero_at":5}"#).unwrap();
        assert_eq!(s, PruneStrategy::ScaleCutoff { zero_at: 5 });
        let s: PruneStrategy = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(s, PruneStrategy::None);
    }
}

use crate::error::{Result, WaveletError};

// ---------------------------------------------------------------------------
// SignalBatch – batch index × time index
// ---------------------------------------------------------------------------

/// A dense batch of equally long real-valued sequences, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBatch {
    rows: usize,
    len: usize,
    data: Vec<f64>,
}

impl SignalBatch {
    /// A `rows × len` batch of zeros.
    pub fn zeros(rows: usize, len: usize) -> Self {
        SignalBatch {
            rows,
            len,
            data: vec![0.0; rows * len],
        }
    }

    /// Wrap a row-major buffer. The buffer must hold exactly `rows * len` samples.
    pub fn from_vec(rows: usize, len: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * len {
            return Err(WaveletError::ShapeMismatch {
                what: "batch buffer",
                expected: (rows, len),
                got: (1, data.len()),
            });
        }
        Ok(SignalBatch { rows, len, data })
    }

    /// Build a batch from individual sequences, which must all share one length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let len = rows.first().map(Vec::len).unwrap_or(0);
        let n_rows = rows.len();
        let mut data = Vec::with_capacity(n_rows * len);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != len {
                return Err(WaveletError::ShapeMismatch {
                    what: "batch row",
                    expected: (i, len),
                    got: (i, row.len()),
                });
            }
            data.extend(row);
        }
        Ok(SignalBatch {
            rows: n_rows,
            len,
            data,
        })
    }

    /// Number of sequences (batch size).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Time extent of every sequence.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the batch holds no samples at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `(rows, len)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.len)
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.len..(i + 1) * self.len]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.len..(i + 1) * self.len]
    }

    /// Iterate over the sequences in batch order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics, and a zero-length batch has nothing to yield anyway.
        self.data.chunks_exact(self.len.max(1)).take(self.rows)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Elementwise product with a same-shaped mask.
    pub fn masked(&self, mask: &SignalBatch) -> Result<SignalBatch> {
        self.expect_shape("mask", mask.shape())?;
        let data = self
            .data
            .iter()
            .zip(&mask.data)
            .map(|(&v, &m)| v * m)
            .collect();
        Ok(SignalBatch {
            rows: self.rows,
            len: self.len,
            data,
        })
    }

    /// Number of samples that are exactly non-zero.
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0.0).count()
    }

    /// Mean squared error against a reference batch of the same shape.
    pub fn mse(&self, reference: &SignalBatch) -> Result<f64> {
        self.expect_shape("reference batch", reference.shape())?;
        if self.data.is_empty() {
            return Ok(0.0);
        }
        let sum: f64 = self
            .data
            .iter()
            .zip(&reference.data)
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Ok(sum / self.data.len() as f64)
    }

    /// Largest absolute sample-wise difference against a reference batch.
    pub fn max_abs_diff(&self, reference: &SignalBatch) -> Result<f64> {
        self.expect_shape("reference batch", reference.shape())?;
        Ok(self
            .data
            .iter()
            .zip(&reference.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }

    /// Summed absolute difference of one row against the same row of `reference`.
    pub fn row_abs_error(&self, reference: &SignalBatch, row: usize) -> Result<f64> {
        self.expect_shape("reference batch", reference.shape())?;
        if row >= self.rows {
            return Err(WaveletError::ShapeMismatch {
                what: "row index",
                expected: (self.rows, self.len),
                got: (row, self.len),
            });
        }
        Ok(self
            .row(row)
            .iter()
            .zip(reference.row(row))
            .map(|(a, b)| (a - b).abs())
            .sum())
    }

    pub(crate) fn expect_shape(&self, what: &'static str, got: (usize, usize)) -> Result<()> {
        if self.shape() != got {
            return Err(WaveletError::ShapeMismatch {
                what,
                expected: self.shape(),
                got,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SubBands – the output of a multi-level analysis
// ---------------------------------------------------------------------------

/// Ordered sub-band coefficients.
///
/// Index 0 is the finest detail band, the coarsest detail band sits at
/// `len() - 2`, and the final entry is the low-pass approximation.
#[derive(Debug, Clone, PartialEq)]
pub struct SubBands {
    bands: Vec<SignalBatch>,
}

impl SubBands {
    pub fn new(bands: Vec<SignalBatch>) -> Self {
        SubBands { bands }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Number of decomposition levels represented (detail band count).
    pub fn levels(&self) -> usize {
        self.bands.len().saturating_sub(1)
    }

    pub fn band(&self, i: usize) -> &SignalBatch {
        &self.bands[i]
    }

    /// The coarsest (low-pass) approximation band.
    pub fn approximation(&self) -> Option<&SignalBatch> {
        self.bands.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SignalBatch> {
        self.bands.iter()
    }

    pub fn as_slice(&self) -> &[SignalBatch] {
        &self.bands
    }

    pub fn into_inner(self) -> Vec<SignalBatch> {
        self.bands
    }

    /// Total number of non-zero coefficients across all bands.
    pub fn count_nonzero(&self) -> usize {
        self.bands.iter().map(SignalBatch::count_nonzero).sum()
    }

    /// Concatenate one batch row across all bands, finest first.
    pub fn concat_row(&self, row: usize) -> Vec<f64> {
        self.bands
            .iter()
            .flat_map(|b| b.row(row).iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = SignalBatch::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, WaveletError::ShapeMismatch { .. }));
    }

    #[test]
    fn row_access_is_row_major() {
        let b = SignalBatch::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(b.shape(), (2, 3));
        assert_eq!(b.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(b.iter_rows().count(), 2);
    }

    #[test]
    fn error_metrics() {
        let a = SignalBatch::from_rows(vec![vec![1.0, 2.0], vec![0.0, 0.0]]).unwrap();
        let b = SignalBatch::from_rows(vec![vec![1.5, 1.0], vec![0.0, 2.0]]).unwrap();
        assert_abs_diff_eq!(a.mse(&b).unwrap(), (0.25 + 1.0 + 4.0) / 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.max_abs_diff(&b).unwrap(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.row_abs_error(&b, 0).unwrap(), 1.5, epsilon = 1e-12);
        assert!(a.mse(&SignalBatch::zeros(1, 2)).is_err());
    }

    #[test]
    fn subbands_concat_finest_first() {
        let fine = SignalBatch::from_rows(vec![vec![1.0, 2.0]]).unwrap();
        let approx = SignalBatch::from_rows(vec![vec![3.0]]).unwrap();
        let bands = SubBands::new(vec![fine, approx]);
        assert_eq!(bands.levels(), 1);
        assert_eq!(bands.concat_row(0), vec![1.0, 2.0, 3.0]);
        assert_eq!(bands.approximation().unwrap().row(0), &[3.0]);
    }
}

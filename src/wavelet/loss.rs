//! Filter-only regularizers.
//!
//! Both losses look at the polynomial products of decomposition and
//! reconstruction filters, no signal data involved:
//!
//! ```text
//!   alias:   Σ_n ( Σ_j (−1)^j (dec_lo[j] rec_lo[n−j] + dec_hi[j] rec_hi[n−j]) )²
//!   perfect: Σ_n ( Σ_j        dec_lo[j] rec_lo[n−j] + dec_hi[j] rec_hi[n−j]  − 2 δ[n − (L−1)] )²
//! ```

use super::filters::{FilterGradients, FilterSet};

/// Alias-cancellation loss and its gradient.
///
/// Zero when `G0(z)H0(−z) + G1(z)H1(−z) = 0`.
pub fn alias_cancellation_loss(filters: &FilterSet) -> (f64, FilterGradients) {
    squared_residual(filters, alternating_sign, |_| 0.0)
}

/// Perfect-reconstruction loss and its gradient.
///
/// Zero when `G0(z)H0(z) + G1(z)H1(z) = 2 z^−(L−1)`.
pub fn perfect_reconstruction_loss(filters: &FilterSet) -> (f64, FilterGradients) {
    let center = filters.delay();
    squared_residual(filters, |_| 1.0, |n| if n == center { 2.0 } else { 0.0 })
}

fn alternating_sign(j: usize) -> f64 {
    if j % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// `Σ_n (p[n] − target(n))²` with
/// `p[n] = Σ_j sign(j) · (dec_lo[j] rec_lo[n−j] + dec_hi[j] rec_hi[n−j])`.
fn squared_residual(
    filters: &FilterSet,
    sign: impl Fn(usize) -> f64,
    target: impl Fn(usize) -> f64,
) -> (f64, FilterGradients) {
    let taps = filters.taps();
    let width = (2 * taps).saturating_sub(1);

    let mut residual = vec![0.0; width];
    for j in 0..taps {
        let s = sign(j);
        for k in 0..taps {
            residual[j + k] +=
                s * (filters.dec_lo[j] * filters.rec_lo[k] + filters.dec_hi[j] * filters.rec_hi[k]);
        }
    }
    for (n, r) in residual.iter_mut().enumerate() {
        *r -= target(n);
    }
    let value = residual.iter().map(|r| r * r).sum();

    let mut grads = FilterGradients::zeros(taps);
    for j in 0..taps {
        let s = sign(j);
        for k in 0..taps {
            let r2 = 2.0 * residual[j + k] * s;
            grads.dec_lo[j] += r2 * filters.rec_lo[k];
            grads.dec_hi[j] += r2 * filters.rec_hi[k];
            grads.rec_lo[k] += r2 * filters.dec_lo[j];
            grads.rec_hi[k] += r2 * filters.dec_hi[j];
        }
    }
    (value, grads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_filters(taps: usize, rng: &mut StdRng) -> FilterSet {
        let mut draw = || (0..taps).map(|_| rng.gen_range(-2.0..2.0)).collect::<Vec<f64>>();
        FilterSet::new("random", draw(), draw(), draw(), draw()).unwrap()
    }

    #[test]
    fn haar_filters_have_zero_loss() {
        for f in [FilterSet::haar(), FilterSet::custom_haar()] {
            let (acl, acl_grad) = alias_cancellation_loss(&f);
            let (prl, prl_grad) = perfect_reconstruction_loss(&f);
            assert_abs_diff_eq!(acl, 0.0, epsilon = 1e-24);
            assert_abs_diff_eq!(prl, 0.0, epsilon = 1e-24);
            assert!(acl_grad.norm() < 1e-12);
            assert!(prl_grad.norm() < 1e-12);
        }
    }

    #[test]
    fn zero_filters_miss_the_delay_target() {
        let f = FilterSet::new("zero", vec![0.0; 4], vec![0.0; 4], vec![0.0; 4], vec![0.0; 4])
            .unwrap();
        assert_eq!(perfect_reconstruction_loss(&f).0, 4.0);
        assert_eq!(alias_cancellation_loss(&f).0, 0.0);
    }

    #[test]
    fn losses_are_non_negative() {
        let mut rng = StdRng::seed_from_u64(5);
        for taps in 1..8 {
            for _ in 0..20 {
                let f = random_filters(taps, &mut rng);
                assert!(alias_cancellation_loss(&f).0 >= 0.0);
                assert!(perfect_reconstruction_loss(&f).0 >= 0.0);
            }
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(17);
        let f = random_filters(6, &mut rng);
        let h = 1e-6;
        for loss in [alias_cancellation_loss, perfect_reconstruction_loss] {
            let (_, grads) = loss(&f);
            let analytic: Vec<f64> = grads.iter().collect();
            for (i, &g) in analytic.iter().enumerate() {
                let mut plus = f.clone();
                let mut minus = f.clone();
                *plus.coefficients_mut().nth(i).unwrap() += h;
                *minus.coefficients_mut().nth(i).unwrap() -= h;
                let numeric = (loss(&plus).0 - loss(&minus).0) / (2.0 * h);
                assert_abs_diff_eq!(g, numeric, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn scaled_haar_is_penalized() {
        let mut f = FilterSet::custom_haar();
        for c in f.rec_lo.iter_mut() {
            *c *= 1.1;
        }
        assert!(perfect_reconstruction_loss(&f).0 > 0.0);
        assert!(alias_cancellation_loss(&f).0 > 0.0);
    }
}

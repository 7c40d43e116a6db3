//! Taper banks and taper weighting for spectral estimation.
//!
//! DPSS (Slepian) tapers are computed from the symmetric tridiagonal
//! eigenproblem (the `scipy.signal.windows.dpss` formulation), with
//! spectral concentrations from the sinc-kernel quadratic form. The
//! adaptive reweighting is MNE's iterative bias-reduction scheme: per
//! frequency, tapers contribute more where their estimated bias is lower.
use std::f64::consts::PI;

use nalgebra::DMatrix;
use ndarray::Array2;
use tracing::debug;

/// A bank of orthonormal tapers with their spectral concentrations.
#[derive(Debug, Clone)]
pub struct TaperBank {
    /// One taper per row, each `n_times` long, unit energy.
    pub tapers: Vec<Vec<f64>>,
    /// Concentration eigenvalue per taper, in (0, 1).
    pub eigvals: Vec<f64>,
}

impl TaperBank {
    pub fn n_tapers(&self) -> usize {
        self.tapers.len()
    }

    /// Single Hann taper with a unit concentration, for fourier mode.
    pub fn hann(n_times: usize) -> TaperBank {
        TaperBank { tapers: vec![hann(n_times)], eigvals: vec![1.0] }
    }
}

/// Hann window of length `n`.
pub fn hann(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Discrete prolate spheroidal sequences.
///
/// `half_nbw` is the standardized half-bandwidth `N*W`; up to
/// `n_tapers_max` tapers are returned, ordered by decreasing
/// concentration. With `low_bias`, tapers with concentration <= 0.9 are
/// dropped (always keeping at least the best one).
pub fn dpss_windows(n_times: usize, half_nbw: f64, n_tapers_max: usize, low_bias: bool) -> TaperBank {
    let n = n_times;
    let w = half_nbw / n as f64;

    // Symmetric tridiagonal operator whose top eigenvectors are the
    // most concentrated sequences.
    let cos_2pw = (2.0 * PI * w).cos();
    let mut mat = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        let d = (n as f64 - 1.0 - 2.0 * i as f64) / 2.0;
        mat[(i, i)] = d * d * cos_2pw;
        if i > 0 {
            let e = i as f64 * (n - i) as f64 / 2.0;
            mat[(i, i - 1)] = e;
            mat[(i - 1, i)] = e;
        }
    }

    let eig = mat.symmetric_eigen();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let n_tapers = n_tapers_max.min(n);
    let tapers: Vec<Vec<f64>> = order[..n_tapers]
        .iter()
        .map(|&j| eig.eigenvectors.column(j).iter().copied().collect())
        .collect();

    // Concentration within [-W, W] via the Dirichlet kernel quadratic
    // form: K[m] = sin(2 pi W m) / (pi m), K[0] = 2W.
    let kernel: Vec<f64> = (0..n)
        .map(|m| if m == 0 { 2.0 * w } else { (2.0 * PI * w * m as f64).sin() / (PI * m as f64) })
        .collect();
    let eigvals: Vec<f64> = tapers
        .iter()
        .map(|t| {
            let mut lam = 0.0;
            for i in 0..n {
                for j in 0..n {
                    lam += t[i] * kernel[i.abs_diff(j)] * t[j];
                }
            }
            lam.clamp(f64::MIN_POSITIVE, 1.0)
        })
        .collect();

    let (tapers, eigvals) = if low_bias {
        let keep: Vec<usize> =
            (0..n_tapers).filter(|&k| eigvals[k] > 0.9).collect();
        if keep.is_empty() {
            // Keep the single most concentrated taper rather than none.
            (vec![tapers[0].clone()], vec![eigvals[0]])
        } else {
            (
                keep.iter().map(|&k| tapers[k].clone()).collect(),
                keep.iter().map(|&k| eigvals[k]).collect(),
            )
        }
    } else {
        (tapers, eigvals)
    };

    debug!(n_tapers = tapers.len(), half_nbw, "dpss taper bank built");
    TaperBank { tapers, eigvals }
}

/// Adaptive taper weights for one epoch-channel spectrum.
///
/// `power` is `[n_tapers, n_bins]` of squared coefficient magnitudes,
/// `var` the time-domain variance of the channel. Fixed-point iteration
/// of `d_k = sqrt(lambda_k) * psd / (lambda_k * psd + var * (1 - lambda_k))`,
/// seeded from the first two tapers, capped at 150 iterations with a
/// relative tolerance of 1e-10.
pub fn adaptive_weights(power: &Array2<f64>, eigvals: &[f64], var: f64) -> Array2<f64> {
    let (n_tapers, n_bins) = power.dim();
    debug_assert_eq!(n_tapers, eigvals.len());

    let sqrt_l: Vec<f64> = eigvals.iter().map(|l| l.sqrt()).collect();
    let mut weights = Array2::<f64>::zeros((n_tapers, n_bins));
    if var <= 0.0 || n_tapers < 2 {
        for k in 0..n_tapers {
            weights.row_mut(k).fill(sqrt_l[k]);
        }
        return weights;
    }

    // Seed estimate from the two most concentrated tapers.
    let l0 = eigvals[0];
    let l1 = eigvals[1];
    let mut psd: Vec<f64> = (0..n_bins)
        .map(|f| (l0 * power[[0, f]] + l1 * power[[1, f]]) / (l0 + l1))
        .collect();

    for _ in 0..150 {
        let mut max_rel = 0.0_f64;
        for f in 0..n_bins {
            let mut num = 0.0;
            let mut den = 0.0;
            for k in 0..n_tapers {
                let d = sqrt_l[k] * psd[f] / (eigvals[k] * psd[f] + var * (1.0 - eigvals[k]));
                weights[[k, f]] = d;
                num += d * d * power[[k, f]];
                den += d * d;
            }
            let new = if den > 0.0 { num / den } else { 0.0 };
            if psd[f] > 0.0 {
                max_rel = max_rel.max((new - psd[f]).abs() / psd[f]);
            }
            psd[f] = new;
        }
        if max_rel < 1e-10 {
            break;
        }
    }
    weights
}

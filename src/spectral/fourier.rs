//! Per-epoch tapered Fourier coefficients.
//!
//! Shared by the multitaper and fourier modes: each selected channel of
//! each epoch is multiplied by every taper of the bank and transformed,
//! keeping only the requested rFFT bins. Taper weights are attached here
//! so the CSD aggregator never needs to know about adaptivity.
use ndarray::{s, Array2, Array3, Array4};
use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::FftPlanner;

use crate::spectral::taper::{adaptive_weights, TaperBank};

/// Complex coefficients and matching taper weights, both indexed
/// `[n_epochs, n_tapers, n_channels, n_bins]`.
#[derive(Debug, Clone)]
pub struct TaperedSpectra {
    pub coeffs: Array4<Complex64>,
    pub weights: Array4<f64>,
}

/// Transform `data` (`[n_epochs, n_channels, n_times]`, channels taken
/// from `sel`) with the taper bank, keeping the rFFT bins in `bins`.
///
/// With `adaptive`, per-channel per-frequency weights are derived by the
/// iterative reweighting of
/// [`adaptive_weights`]; otherwise the fixed
/// `sqrt(lambda_k)` weighting applies everywhere.
pub fn tapered_fft(
    data: &ndarray::Array3<f64>,
    sel: &[usize],
    bank: &TaperBank,
    bins: &[usize],
    adaptive: bool,
) -> TaperedSpectra {
    let n_epochs = data.shape()[0];
    let n_times = data.shape()[2];
    let n_sel = sel.len();
    let n_tapers = bank.n_tapers();
    let n_bins = bins.len();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_times);

    // Epochs are independent; per-epoch results are collected in index
    // order so the output never depends on the scheduling.
    let per_epoch: Vec<(Array3<Complex64>, Array3<f64>)> = (0..n_epochs)
        .into_par_iter()
        .map(|e| {
            let mut coeffs = Array3::<Complex64>::zeros((n_tapers, n_sel, n_bins));
            let mut weights = Array3::<f64>::zeros((n_tapers, n_sel, n_bins));

            for (ci, &ch) in sel.iter().enumerate() {
                let row = data.slice(s![e, ch, ..]);
                for (k, taper) in bank.tapers.iter().enumerate() {
                    let mut buf: Vec<Complex64> = row
                        .iter()
                        .zip(taper)
                        .map(|(&x, &t)| Complex64::new(x * t, 0.0))
                        .collect();
                    fft.process(&mut buf);
                    for (bi, &bin) in bins.iter().enumerate() {
                        coeffs[[k, ci, bi]] = buf[bin];
                    }
                }

                if adaptive {
                    let mut power = Array2::<f64>::zeros((n_tapers, n_bins));
                    for k in 0..n_tapers {
                        for bi in 0..n_bins {
                            power[[k, bi]] = coeffs[[k, ci, bi]].norm_sqr();
                        }
                    }
                    let mean = row.iter().sum::<f64>() / n_times as f64;
                    let var =
                        row.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / n_times as f64;
                    let w = adaptive_weights(&power, &bank.eigvals, var);
                    weights.slice_mut(s![.., ci, ..]).assign(&w);
                } else {
                    for k in 0..n_tapers {
                        weights.slice_mut(s![k, ci, ..]).fill(bank.eigvals[k].sqrt());
                    }
                }
            }
            (coeffs, weights)
        })
        .collect();

    let mut coeffs = Array4::<Complex64>::zeros((n_epochs, n_tapers, n_sel, n_bins));
    let mut weights = Array4::<f64>::zeros((n_epochs, n_tapers, n_sel, n_bins));
    for (e, (c, w)) in per_epoch.into_iter().enumerate() {
        coeffs.slice_mut(s![e, .., .., ..]).assign(&c);
        weights.slice_mut(s![e, .., .., ..]).assign(&w);
    }
    TaperedSpectra { coeffs, weights }
}

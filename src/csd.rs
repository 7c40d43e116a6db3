//! Cross-spectral density aggregation.
//!
//! Pools per-epoch (per-taper, per-time) coefficients into one Hermitian
//! CSD matrix per frequency (and per time in wavelet mode), averaged
//! over epochs. Taper weighting matches MNE's `_csd_from_mt`: each
//! epoch's contribution is `sum_k (w_ik X_ik) conj(w_jk X_jk)` divided
//! by the weight norms of both channels. Frequencies are independent, so
//! the matrices are built in parallel; the epoch sum inside each
//! frequency stays sequential to keep results bit-for-bit reproducible.
use nalgebra::DMatrix;
use ndarray::Array4;
use num_complex::Complex64;
use rayon::prelude::*;

use crate::spectral::TaperedSpectra;

/// One Hermitian matrix per (frequency, time) over the compacted channel
/// union. `n_times == 1` outside wavelet mode.
pub struct CsdTensor {
    mats: Vec<DMatrix<Complex64>>,
    pub n_freqs: usize,
    pub n_times: usize,
}

impl CsdTensor {
    pub fn at(&self, f: usize, t: usize) -> &DMatrix<Complex64> {
        &self.mats[f * self.n_times + t]
    }

    /// Extract the sub-block with the given row/column channels.
    pub fn block(&self, f: usize, t: usize, rows: &[usize], cols: &[usize]) -> DMatrix<Complex64> {
        let m = self.at(f, t);
        DMatrix::from_fn(rows.len(), cols.len(), |i, j| m[(rows[i], cols[j])])
    }
}

/// Hermitian cleanup: mirror the upper triangle, force the diagonal to
/// non-negative real auto-spectra.
fn finish(mut m: DMatrix<Complex64>) -> DMatrix<Complex64> {
    let n = m.nrows();
    for i in 0..n {
        m[(i, i)] = Complex64::new(m[(i, i)].re.max(0.0), 0.0);
        for j in (i + 1)..n {
            m[(j, i)] = m[(i, j)].conj();
        }
    }
    m
}

/// CSD from multitaper/fourier coefficients.
pub fn from_tapered(spectra: &TaperedSpectra) -> CsdTensor {
    let (n_epochs, n_tapers, n_ch, n_freqs) = spectra.coeffs.dim();
    let coeffs = &spectra.coeffs;
    let weights = &spectra.weights;

    let mats: Vec<DMatrix<Complex64>> = (0..n_freqs)
        .into_par_iter()
        .map(|f| {
            let mut m = DMatrix::<Complex64>::zeros(n_ch, n_ch);
            for e in 0..n_epochs {
                // Per-channel weight norms for this epoch and frequency.
                let norms: Vec<f64> = (0..n_ch)
                    .map(|c| {
                        (0..n_tapers)
                            .map(|k| weights[[e, k, c, f]] * weights[[e, k, c, f]])
                            .sum::<f64>()
                            .sqrt()
                    })
                    .collect();

                for i in 0..n_ch {
                    for j in i..n_ch {
                        let mut acc = Complex64::new(0.0, 0.0);
                        for k in 0..n_tapers {
                            let xi = coeffs[[e, k, i, f]] * weights[[e, k, i, f]];
                            let xj = coeffs[[e, k, j, f]] * weights[[e, k, j, f]];
                            acc += xi * xj.conj();
                        }
                        let den = (norms[i] * norms[j]).max(f64::MIN_POSITIVE);
                        m[(i, j)] += acc / den;
                    }
                }
            }
            let scale = Complex64::new(1.0 / n_epochs as f64, 0.0);
            for i in 0..n_ch {
                for j in i..n_ch {
                    m[(i, j)] *= scale;
                }
            }
            finish(m)
        })
        .collect();

    CsdTensor { mats, n_freqs, n_times: 1 }
}

/// CSD from wavelet coefficients (`[n_epochs, n_channels, n_freqs,
/// n_times]`), one matrix per (frequency, time).
pub fn from_wavelet(coeffs: &Array4<Complex64>) -> CsdTensor {
    let (n_epochs, n_ch, n_freqs, n_times) = coeffs.dim();

    let mats: Vec<DMatrix<Complex64>> = (0..n_freqs * n_times)
        .into_par_iter()
        .map(|ft| {
            let (f, t) = (ft / n_times, ft % n_times);
            let mut m = DMatrix::<Complex64>::zeros(n_ch, n_ch);
            for e in 0..n_epochs {
                for i in 0..n_ch {
                    for j in i..n_ch {
                        m[(i, j)] += coeffs[[e, i, f, t]] * coeffs[[e, j, f, t]].conj();
                    }
                }
            }
            let scale = Complex64::new(1.0 / n_epochs as f64, 0.0);
            for i in 0..n_ch {
                for j in i..n_ch {
                    m[(i, j)] *= scale;
                }
            }
            finish(m)
        })
        .collect();

    CsdTensor { mats, n_freqs, n_times }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::{tapered_fft, TaperBank};
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;
    use std::f64::consts::PI;

    fn two_channel_spectra() -> TaperedSpectra {
        // Channel 1 is channel 0 delayed by two samples.
        let n_times = 128;
        let data = Array3::from_shape_fn((4, 2, n_times), |(e, c, t)| {
            let phase = 2.0 * PI * 10.0 * (t as f64 - 2.0 * c as f64) / 64.0;
            (phase + e as f64).sin()
        });
        let bank = TaperBank::hann(n_times);
        let bins: Vec<usize> = (0..=n_times / 2).collect();
        tapered_fft(&data, &[0, 1], &bank, &bins, false)
    }

    #[test]
    fn csd_is_hermitian_with_real_diagonal() {
        let csd = from_tapered(&two_channel_spectra());
        for f in 0..csd.n_freqs {
            let m = csd.at(f, 0);
            for i in 0..2 {
                assert_eq!(m[(i, i)].im, 0.0);
                assert!(m[(i, i)].re >= 0.0);
                for j in 0..2 {
                    let d = (m[(i, j)] - m[(j, i)].conj()).norm();
                    assert_abs_diff_eq!(d, 0.0, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn identical_channels_are_fully_coherent() {
        let data = Array3::from_shape_fn((3, 2, 64), |(e, _, t)| {
            (2.0 * PI * 5.0 * t as f64 / 64.0 + e as f64 * 0.7).cos()
        });
        let bank = TaperBank::hann(64);
        let spectra = tapered_fft(&data, &[0, 1], &bank, &[5], false);
        let csd = from_tapered(&spectra);
        let m = csd.at(0, 0);
        let coh = m[(0, 1)].norm() / (m[(0, 0)].re * m[(1, 1)].re).sqrt();
        assert_abs_diff_eq!(coh, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn delayed_copy_has_imaginary_cross_spectrum() {
        let csd = from_tapered(&two_channel_spectra());
        // 10 Hz at sfreq 64 over 128 samples lands at bin 20.
        let m = csd.at(20, 0);
        let im_coh = m[(0, 1)].im.abs() / (m[(0, 0)].re * m[(1, 1)].re).sqrt();
        assert!(im_coh > 0.5, "imaginary coherence too small: {im_coh}");
    }

    #[test]
    fn wavelet_csd_shape_and_hermitian() {
        let coeffs = ndarray::Array4::from_shape_fn((2, 3, 4, 8), |(e, c, f, t)| {
            Complex64::new((e + c + f) as f64 * 0.1, t as f64 * 0.05 - c as f64 * 0.02)
        });
        let csd = from_wavelet(&coeffs);
        assert_eq!(csd.n_freqs, 4);
        assert_eq!(csd.n_times, 8);
        let m = csd.at(2, 5);
        for i in 0..3 {
            for j in 0..3 {
                let d = (m[(i, j)] - m[(j, i)].conj()).norm();
                assert_abs_diff_eq!(d, 0.0, epsilon = 1e-12);
            }
        }
    }
}

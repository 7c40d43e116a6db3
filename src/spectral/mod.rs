//! Spectral decomposition: epoched signals to complex coefficients.
//!
//! - [`taper`]: DPSS taper banks, Hann window, adaptive taper weights.
//! - [`fourier`]: tapered per-epoch FFT (multitaper + fourier modes).
//! - [`wavelet`]: Morlet wavelets and the continuous wavelet transform.
use ndarray::{Array3, Array4};
use num_complex::Complex64;
use tracing::{debug, warn};

pub mod fourier;
pub mod taper;
pub mod wavelet;

pub use fourier::{tapered_fft, TaperedSpectra};
pub use taper::{adaptive_weights, dpss_windows, hann, TaperBank};
pub use wavelet::{cwt_morlet, morlet_bank};

use crate::config::{ConnectivityParams, Mode, Plan};
use crate::error::ConnectivityError;

/// Per-epoch, per-channel complex coefficients at the masked grid.
pub enum SpectralCoeffs {
    /// Multitaper / fourier: `[n_epochs, n_tapers, n_channels, n_freqs]`
    /// with matching taper weights.
    Tapered(TaperedSpectra),
    /// Wavelet: `[n_epochs, n_channels, n_freqs, n_times]`.
    Wavelet(Array4<Complex64>),
}

/// Run the decomposition stage of a validated plan.
pub(crate) fn decompose(
    data: &Array3<f64>,
    sfreq: f64,
    params: &ConnectivityParams,
    plan: &Plan,
) -> Result<SpectralCoeffs, ConnectivityError> {
    let n_times = data.shape()[2];
    match params.mode {
        Mode::Multitaper => {
            let half_nbw =
                params.mt_bandwidth.map(|bw| bw * n_times as f64 / (2.0 * sfreq)).unwrap_or(4.0);
            let n_tapers_max = ((2.0 * half_nbw) as usize).max(1);
            let bank = dpss_windows(n_times, half_nbw, n_tapers_max, params.mt_low_bias);

            let mut adaptive = params.mt_adaptive;
            if adaptive && bank.n_tapers() < 3 {
                warn!(
                    n_tapers = bank.n_tapers(),
                    "too few tapers for adaptive weighting, using fixed weights"
                );
                adaptive = false;
            }
            debug!(
                n_tapers = bank.n_tapers(),
                adaptive,
                n_bins = plan.bins.len(),
                "multitaper decomposition"
            );
            Ok(SpectralCoeffs::Tapered(tapered_fft(data, &plan.sel, &bank, &plan.bins, adaptive)))
        }
        Mode::Fourier => {
            let bank = TaperBank::hann(n_times);
            debug!(n_bins = plan.bins.len(), "single-taper fourier decomposition");
            Ok(SpectralCoeffs::Tapered(tapered_fft(data, &plan.sel, &bank, &plan.bins, false)))
        }
        Mode::CwtMorlet => {
            // Validation guarantees cwt_freqs is present and usable; the
            // bank covers only the band-masked frequencies.
            let all_freqs = params.cwt_freqs.as_ref().expect("validated cwt_freqs");
            let all_cycles = params.cwt_n_cycles.resolve(all_freqs.len())?;
            let cycles: Vec<f64> = plan.bins.iter().map(|&b| all_cycles[b]).collect();
            let wavelets = morlet_bank(sfreq, &plan.freqs, &cycles);
            debug!(n_freqs = wavelets.len(), "cwt_morlet decomposition");
            Ok(SpectralCoeffs::Wavelet(cwt_morlet(data, &plan.sel, &wavelets)))
        }
    }
}

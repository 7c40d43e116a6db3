//! # mvconn — multivariate spectral connectivity in pure Rust
//!
//! `mvconn` computes frequency-domain multivariate connectivity between
//! two groups of channels ("seed" and "target") of epoched multichannel
//! recordings, ported from
//! [MNE-Connectivity](https://mne.tools/mne-connectivity)'s
//! `multivar_spectral_connectivity_epochs`. No Python, no BLAS, no C
//! libraries — pure Rust on [RustFFT](https://crates.io/crates/rustfft)
//! and [nalgebra](https://nalgebra.rs).
//!
//! ## Pipeline overview
//!
//! ```text
//! epochs [E, C, T] + ConnectivityParams
//!   │
//!   ├─ config::validate()     fail-fast checks → frequency grid + plan
//!   ├─ spectral::decompose()  multitaper (DPSS) / fourier (Hann) / cwt_morlet
//!   ├─ csd                    Hermitian CSD per frequency[, time]
//!   ├─ reduce                 SVD component bases per seed/target group
//!   ├─ method                 MIC / MIM from the whitened imaginary cross block
//!   └─ result                 SpectralConnectivity [n_cons, n_freqs, n_times]
//! ```
//!
//! ## Quick start
//!
//! ```
//! use mvconn::{
//!     multivar_spectral_connectivity_epochs, ConnectivityParams, Indices, Method, Mode,
//! };
//! use ndarray::Array3;
//!
//! // 8 epochs, 2 channels, 256 samples at 50 Hz.
//! let data = Array3::from_shape_fn((8, 2, 256), |(e, c, t)| {
//!     let phase = 2.0 * std::f64::consts::PI * 10.0 * t as f64 / 50.0;
//!     (phase + e as f64 + c as f64 * 0.5).sin()
//! });
//!
//! let params = ConnectivityParams {
//!     indices: Some(Indices::new(vec![vec![0]], vec![vec![1]])),
//!     methods: vec![Method::Mic, Method::Mim],
//!     mode: Mode::Fourier,
//!     ..ConnectivityParams::default()
//! };
//!
//! let con = multivar_spectral_connectivity_epochs(&data, 50.0, &params).unwrap();
//! assert_eq!(con.n_epochs_used, 8);
//! let mic = con.raveled("mic").unwrap(); // [n_cons, n_freqs]
//! assert_eq!(mic.shape(), &[1, con.n_freqs()]);
//! ```
//!
//! The measures are the multivariate imaginary-coherence family of
//! Ewald et al. (2012) — phase-lag sensitive and robust to zero-lag
//! (volume-conduction) artifacts. Every call is pure and synchronous:
//! inputs are read-only, all intermediate tensors are freshly allocated,
//! and repeated calls with identical inputs produce identical results
//! regardless of the rayon thread count.

pub mod config;
pub mod csd;
pub mod error;
pub mod method;
pub mod reduce;
pub mod result;
pub mod spectral;

use ndarray::Array3;
use rayon::prelude::*;
use tracing::debug;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `mvconn::Foo` without having to know the internal module layout.

pub use config::{ConnectivityParams, CycleSpec, Indices, Mode};
pub use error::ConnectivityError;
pub use method::{ConnectivityMethod, Method, ReducedCsd, WhitenedCross};
pub use result::SpectralConnectivity;
pub use spectral::SpectralCoeffs;

/// Compute **multivariate spectral connectivity** between seed and
/// target channel groups of epoched data.
///
/// This is the main entry point of the crate. It validates the whole
/// request up front, decomposes every epoch into complex spectral
/// coefficients, pools them into a Hermitian cross-spectral density per
/// frequency (and per time in cwt mode), optionally compresses each
/// group through SVD component selection, and scores every requested
/// method from the shared reduced blocks.
///
/// # Arguments
///
/// * `data`   – Epoched signals, shape `[n_epochs, n_channels, n_times]`.
///   Read-only; every epoch shares the channel count and length by
///   construction of the array.
/// * `sfreq`  – Sampling rate in Hz.
/// * `params` – Request configuration (see [`ConnectivityParams`]).
///
/// # Returns
///
/// A [`SpectralConnectivity`] with one `[n_cons, n_freqs, n_times]`
/// score array per requested method, the frequency axis actually used,
/// the time axis (cwt mode only) and usage metadata. MIC scores lie in
/// `[0, 1]`; MIM scores are non-negative.
///
/// # Errors
///
/// All validation happens before any numeric work; see
/// [`ConnectivityError`] for the full surface. There is no partial
/// success: one invalid connection aborts the whole call.
pub fn multivar_spectral_connectivity_epochs(
    data: &Array3<f64>,
    sfreq: f64,
    params: &ConnectivityParams,
) -> Result<SpectralConnectivity, ConnectivityError> {
    let shape = data.dim();
    let plan = config::validate(shape, sfreq, params)?;
    debug!(
        mode = params.mode.as_str(),
        n_cons = plan.seeds.len(),
        n_freqs = plan.freqs.len(),
        n_epochs = shape.0,
        "connectivity request validated"
    );

    let coeffs = spectral::decompose(data, sfreq, params, &plan)?;
    let csd = match &coeffs {
        SpectralCoeffs::Tapered(spectra) => csd::from_tapered(spectra),
        SpectralCoeffs::Wavelet(coeffs) => csd::from_wavelet(coeffs),
    };

    let n_cons = plan.seeds.len();
    let (n_freqs, n_times) = (csd.n_freqs, csd.n_times);
    let mut per_method: Vec<Array3<f64>> =
        params.methods.iter().map(|_| Array3::zeros((n_cons, n_freqs, n_times))).collect();

    for con in 0..n_cons {
        let seeds = &plan.seeds[con];
        let targets = &plan.targets[con];
        let bases = reduce::component_bases(
            &csd,
            seeds,
            targets,
            plan.n_seed_comps[con],
            plan.n_target_comps[con],
        );

        // Frequencies (and times) are independent; the collected order
        // follows the index, never the scheduling.
        let scores: Vec<Vec<f64>> = (0..n_freqs * n_times)
            .into_par_iter()
            .map(|ft| {
                let (f, t) = (ft / n_times, ft % n_times);
                let blocks = reduce::reduced_blocks(&csd, f, t, seeds, targets, &bases);
                let whitened = method::whitened_cross(&blocks);
                params.methods.iter().map(|m| m.score(&blocks, &whitened)).collect()
            })
            .collect();

        for (ft, point) in scores.into_iter().enumerate() {
            let (f, t) = (ft / n_times, ft % n_times);
            for (mi, score) in point.into_iter().enumerate() {
                per_method[mi][[con, f, t]] = score;
            }
        }
    }

    let times = (params.mode == Mode::CwtMorlet)
        .then(|| (0..shape.2).map(|i| i as f64 / sfreq).collect());

    Ok(SpectralConnectivity::new(
        params.methods.iter().map(|m| m.name().to_string()).collect(),
        per_method,
        plan.freqs,
        times,
        shape.0,
        params.mode,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn noise_data() -> Array3<f64> {
        // Deterministic pseudo-noise; enough structure to exercise the
        // whole pipeline without a rand dependency in unit tests.
        Array3::from_shape_fn((4, 3, 128), |(e, c, t)| {
            ((e * 7919 + c * 104729 + t * 1299709) as f64 * 0.618).sin()
        })
    }

    #[test]
    fn score_axis_matches_frequency_grid() {
        let params = ConnectivityParams {
            indices: Some(Indices::new(vec![vec![0]], vec![vec![1, 2]])),
            methods: vec![Method::Mic, Method::Mim],
            mode: Mode::Fourier,
            ..ConnectivityParams::default()
        };
        let con = multivar_spectral_connectivity_epochs(&noise_data(), 64.0, &params).unwrap();
        assert_eq!(con.method_names(), &["mic".to_string(), "mim".to_string()]);
        assert!(con.freqs.windows(2).all(|w| w[1] > w[0]));
        for name in ["mic", "mim"] {
            let arr = con.get(name).unwrap();
            assert_eq!(arr.shape(), &[1, con.n_freqs(), 1]);
        }
    }

    #[test]
    fn mic_bounded_and_mim_non_negative() {
        let params = ConnectivityParams {
            indices: Some(Indices::new(vec![vec![0, 1]], vec![vec![2]])),
            methods: vec![Method::Mic, Method::Mim],
            ..ConnectivityParams::default()
        };
        let con = multivar_spectral_connectivity_epochs(&noise_data(), 64.0, &params).unwrap();
        assert!(con.get("mic").unwrap().iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(con.get("mim").unwrap().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn custom_method_is_scored_alongside_builtins() {
        struct SecondComponent;
        impl ConnectivityMethod for SecondComponent {
            fn name(&self) -> &str {
                "mic2"
            }
            fn score(&self, _: &ReducedCsd, whitened: &WhitenedCross) -> f64 {
                whitened.singular_values.get(1).copied().unwrap_or(0.0)
            }
        }

        let params = ConnectivityParams {
            indices: Some(Indices::new(vec![vec![0, 1]], vec![vec![2]])),
            methods: vec![Method::Mic, Method::Custom(std::sync::Arc::new(SecondComponent))],
            mode: Mode::Fourier,
            ..ConnectivityParams::default()
        };
        let con = multivar_spectral_connectivity_epochs(&noise_data(), 64.0, &params).unwrap();
        let mic = con.get("mic").unwrap();
        let mic2 = con.get("mic2").unwrap();
        // The second singular value never exceeds the first.
        for (a, b) in mic.iter().zip(mic2.iter()) {
            assert!(b <= a, "second component {b} > first {a}");
        }
    }
}

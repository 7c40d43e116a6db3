/// Shared helpers: seeded ground-truth dataset synthesis.
///
/// Mirrors the reference test recipe: white noise on every channel, with
/// channel 1 replaced by a zero-phase band-passed copy of channel 0
/// (optionally rolled by a few samples to inject a lag), plus a little
/// independent noise so no spectrum is exactly zero. The filter is a
/// Hamming-windowed-sinc bandpass built as the difference of two unit-DC
/// lowpass kernels, applied across the whole continuous recording before
/// it is chopped into epochs.
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;

/// Epoched dataset with known connectivity confined to `[fstart, fend]` Hz.
///
/// Returns `[n_epochs, n_signals, n_times]`. Channel 1 carries the
/// band-limited copy of channel 0; channels >= 2 stay independent noise.
#[allow(clippy::too_many_arguments)]
pub fn bandpass_dataset(
    n_signals: usize,
    n_epochs: usize,
    n_times: usize,
    sfreq: f64,
    fstart: f64,
    fend: f64,
    trans_bandwidth: f64,
    shift: Option<usize>,
) -> Array3<f64> {
    let n_total = n_epochs * n_times;
    let mut rng = StdRng::seed_from_u64(0);

    let mut signals: Vec<Vec<f64>> = (0..n_signals)
        .map(|_| (0..n_total).map(|_| StandardNormal.sample(&mut rng)).collect())
        .collect();

    let h = firwin_bandpass(fstart, fend, trans_bandwidth, sfreq);
    let mut coupled = convolve_same(&signals[0], &h);
    if let Some(s) = shift {
        coupled = roll(&coupled, s);
    }
    for v in &mut coupled {
        let noise: f64 = StandardNormal.sample(&mut rng);
        *v += 1e-2 * noise;
    }
    signals[1] = coupled;

    Array3::from_shape_fn((n_epochs, n_signals, n_times), |(e, c, t)| {
        signals[c][e * n_times + t]
    })
}

/// First index with `freqs[i] >= value` (numpy `searchsorted`).
pub fn searchsorted(freqs: &[f64], value: f64) -> usize {
    freqs.iter().position(|&f| f >= value).unwrap_or(freqs.len())
}

/// Circularly shift right by `n` samples (numpy `roll`).
fn roll(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    (0..len).map(|i| x[(i + len - n % len) % len]).collect()
}

/// Hamming-windowed-sinc bandpass with unit passband gain, transitions
/// centered `trans_bw / 2` outside the band edges. Odd length from the
/// `ceil(3.3 / trans_bw * sfreq)` rule, so `same` convolution is
/// zero-phase.
fn firwin_bandpass(f_lo: f64, f_hi: f64, trans_bw: f64, sfreq: f64) -> Vec<f64> {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    let n = if n_raw % 2 == 0 { n_raw + 1 } else { n_raw };

    let hp = firwin_lowpass(n, f_hi + trans_bw / 2.0, sfreq);
    let lp = firwin_lowpass(n, f_lo - trans_bw / 2.0, sfreq);
    hp.iter().zip(&lp).map(|(a, b)| a - b).collect()
}

/// Lowpass windowed sinc, normalized to unit DC gain.
fn firwin_lowpass(n: usize, cutoff_hz: f64, sfreq: f64) -> Vec<f64> {
    assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            let win = 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos();
            sinc * win
        })
        .collect();

    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// `same` convolution with zero padding at the edges.
fn convolve_same(x: &[f64], h: &[f64]) -> Vec<f64> {
    let half = h.len() / 2;
    (0..x.len())
        .map(|i| {
            let mut acc = 0.0;
            for (j, &hj) in h.iter().enumerate() {
                let k = i + half;
                if k >= j && k - j < x.len() {
                    acc += x[k - j] * hj;
                }
            }
            acc
        })
        .collect()
}

//! Connectivity request configuration and fail-fast validation.
//!
//! [`ConnectivityParams`] holds every tunable parameter of the pipeline.
//! Validation happens in full before any numeric work: a single invalid
//! connection among many aborts the whole call. The checks mirror
//! `multivar_spectral_connectivity_epochs` in MNE-Connectivity.
use std::str::FromStr;

use crate::error::ConnectivityError;
use crate::method::Method;

/// Spectral-estimation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// DPSS multitaper estimates, optionally adaptively weighted.
    Multitaper,
    /// Single Hann-tapered Fourier transform per epoch.
    Fourier,
    /// Continuous Morlet wavelet transform; the only mode with a time axis.
    CwtMorlet,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Multitaper => "multitaper",
            Mode::Fourier => "fourier",
            Mode::CwtMorlet => "cwt_morlet",
        }
    }
}

impl FromStr for Mode {
    type Err = ConnectivityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multitaper" => Ok(Mode::Multitaper),
            "fourier" => Ok(Mode::Fourier),
            "cwt_morlet" => Ok(Mode::CwtMorlet),
            other => Err(ConnectivityError::InvalidMode(other.to_string())),
        }
    }
}

/// Number of wavelet cycles: one value for all frequencies, or one per
/// entry of `cwt_freqs`.
#[derive(Debug, Clone)]
pub enum CycleSpec {
    Scalar(f64),
    PerFreq(Vec<f64>),
}

impl CycleSpec {
    /// Resolve to one cycle count per frequency.
    pub(crate) fn resolve(&self, n_freqs: usize) -> Result<Vec<f64>, ConnectivityError> {
        match self {
            CycleSpec::Scalar(c) => Ok(vec![*c; n_freqs]),
            CycleSpec::PerFreq(v) => {
                if v.len() != n_freqs {
                    return Err(ConnectivityError::InvalidCwtFreqs(format!(
                        "cwt_n_cycles has {} entries but cwt_freqs has {}",
                        v.len(),
                        n_freqs
                    )));
                }
                Ok(v.clone())
            }
        }
    }
}

/// Seed/target channel groups. The i-th seed list and i-th target list
/// define one connection to be scored independently.
#[derive(Debug, Clone)]
pub struct Indices {
    pub seeds: Vec<Vec<usize>>,
    pub targets: Vec<Vec<usize>>,
}

impl Indices {
    pub fn new(seeds: Vec<Vec<usize>>, targets: Vec<Vec<usize>>) -> Self {
        Self { seeds, targets }
    }

    /// Number of seed/target connection pairs.
    pub fn n_cons(&self) -> usize {
        self.seeds.len()
    }
}

/// Configuration for one connectivity call.
///
/// All fields are `pub` so a request can be built with struct-update
/// syntax:
///
/// ```
/// use mvconn::{ConnectivityParams, Indices, Mode};
///
/// let params = ConnectivityParams {
///     indices: Some(Indices::new(vec![vec![0, 2]], vec![vec![1, 3]])),
///     mode: Mode::Fourier,
///     ..ConnectivityParams::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ConnectivityParams {
    /// Seed/target index groups. Required: there is no implicit
    /// all-pairs behavior, `None` fails with
    /// [`ConnectivityError::MissingIndices`].
    pub indices: Option<Indices>,

    /// Connectivity methods to compute. Built-ins are [`Method::Mic`]
    /// and [`Method::Mim`]; custom implementations go through
    /// [`Method::Custom`].
    ///
    /// Default: `[Method::Mic]`.
    pub methods: Vec<Method>,

    /// Spectral-estimation mode. Default: [`Mode::Multitaper`].
    pub mode: Mode,

    /// Lower band edge(s) in Hz. `None` means 0 Hz. When both `fmin`
    /// and `fmax` are sequences they define multiple bands and must
    /// have equal length.
    pub fmin: Option<Vec<f64>>,

    /// Upper band edge(s) in Hz. `None` means the Nyquist frequency.
    pub fmax: Option<Vec<f64>>,

    /// Multitaper time-bandwidth product in Hz
    /// (`half_nbw = mt_bandwidth * n_times / (2 * sfreq)`).
    /// `None` uses a half-bandwidth of 4.
    pub mt_bandwidth: Option<f64>,

    /// Iterative per-frequency adaptive taper reweighting.
    /// Default: `false`.
    pub mt_adaptive: bool,

    /// Keep only tapers with spectral concentration > 0.9.
    /// Default: `true`.
    pub mt_low_bias: bool,

    /// Wavelet-mode frequencies in Hz, strictly increasing. Required in
    /// [`Mode::CwtMorlet`], ignored otherwise.
    pub cwt_freqs: Option<Vec<f64>>,

    /// Wavelet cycle counts. Default: `Scalar(7.0)`.
    pub cwt_n_cycles: CycleSpec,

    /// Per-connection cap on seed components kept by the SVD reduction.
    /// `None` uses all available channels for every connection.
    pub n_seed_components: Option<Vec<usize>>,

    /// Per-connection cap on target components.
    pub n_target_components: Option<Vec<usize>>,
}

impl Default for ConnectivityParams {
    fn default() -> Self {
        Self {
            indices: None,
            methods: vec![Method::Mic],
            mode: Mode::Multitaper,
            fmin: None,
            fmax: None,
            mt_bandwidth: None,
            mt_adaptive: false,
            mt_low_bias: true,
            cwt_freqs: None,
            cwt_n_cycles: CycleSpec::Scalar(7.0),
            n_seed_components: None,
            n_target_components: None,
        }
    }
}

/// Fully validated execution plan: compacted channel selection, remapped
/// groups, masked frequency grid and resolved component counts.
#[derive(Debug)]
pub(crate) struct Plan {
    /// Original channel indices referenced by any group, sorted unique.
    pub sel: Vec<usize>,
    /// Seed groups remapped into `sel` positions.
    pub seeds: Vec<Vec<usize>>,
    /// Target groups remapped into `sel` positions.
    pub targets: Vec<Vec<usize>>,
    /// Masked frequency grid, strictly increasing.
    pub freqs: Vec<f64>,
    /// Positions of `freqs` within the full grid (rFFT bin numbers for
    /// multitaper/fourier, `cwt_freqs` positions for cwt).
    pub bins: Vec<usize>,
    /// Resolved per-connection component counts; `None` = identity.
    pub n_seed_comps: Vec<Option<usize>>,
    pub n_target_comps: Vec<Option<usize>>,
}

/// Validate the whole request against the data shape. Pure, no numeric
/// work beyond building the frequency grid.
pub(crate) fn validate(
    shape: (usize, usize, usize),
    sfreq: f64,
    params: &ConnectivityParams,
) -> Result<Plan, ConnectivityError> {
    let (n_epochs, n_channels, n_times) = shape;

    if n_epochs == 0 {
        return Err(ConnectivityError::BadInput("at least one epoch is required".into()));
    }
    if n_channels < 2 {
        return Err(ConnectivityError::BadInput(format!(
            "at least 2 channels are required, got {n_channels}"
        )));
    }
    if n_times < 2 {
        return Err(ConnectivityError::BadInput(format!(
            "at least 2 time samples per epoch are required, got {n_times}"
        )));
    }
    if !sfreq.is_finite() || sfreq <= 0.0 {
        return Err(ConnectivityError::BadInput(format!(
            "sampling rate must be positive and finite, got {sfreq}"
        )));
    }
    if let Some(bw) = params.mt_bandwidth {
        if !bw.is_finite() || bw <= 0.0 {
            return Err(ConnectivityError::BadInput(format!(
                "mt_bandwidth must be positive, got {bw}"
            )));
        }
    }

    if params.methods.is_empty() {
        return Err(ConnectivityError::UnsupportedMethodInterface(
            "at least one connectivity method must be requested".into(),
        ));
    }
    for method in &params.methods {
        method.validate()?;
    }

    let indices = params.indices.as_ref().ok_or(ConnectivityError::MissingIndices)?;
    let (sel, seeds, targets) = check_indices(indices, n_channels)?;

    let n_cons = seeds.len();
    let n_seed_comps =
        check_components(params.n_seed_components.as_deref(), &seeds, &targets, n_cons, "seed")?;
    let n_target_comps =
        check_components(params.n_target_components.as_deref(), &targets, &seeds, n_cons, "target")?;

    let (freqs, bins) = frequency_grid(params, sfreq, n_times)?;

    Ok(Plan { sel, seeds, targets, freqs, bins, n_seed_comps, n_target_comps })
}

/// Structural index checks; returns the compacted channel union and the
/// groups remapped into union positions.
fn check_indices(
    indices: &Indices,
    n_channels: usize,
) -> Result<(Vec<usize>, Vec<Vec<usize>>, Vec<Vec<usize>>), ConnectivityError> {
    if indices.seeds.len() != indices.targets.len() {
        return Err(ConnectivityError::InvalidIndices(format!(
            "seed and target sequences must have the same length ({} != {})",
            indices.seeds.len(),
            indices.targets.len()
        )));
    }
    if indices.seeds.is_empty() {
        return Err(ConnectivityError::InvalidIndices(
            "at least one seed/target connection pair is required".into(),
        ));
    }

    for (con, (seed, target)) in indices.seeds.iter().zip(&indices.targets).enumerate() {
        for (name, group) in [("seed", seed), ("target", target)] {
            if group.is_empty() {
                return Err(ConnectivityError::InvalidIndices(format!(
                    "the {name} group of connection {con} is empty"
                )));
            }
            let mut seen = group.clone();
            seen.sort_unstable();
            seen.dedup();
            if seen.len() != group.len() {
                return Err(ConnectivityError::InvalidIndices(format!(
                    "the {name} group of connection {con} contains duplicate channels"
                )));
            }
            if let Some(&ch) = group.iter().find(|&&ch| ch >= n_channels) {
                return Err(ConnectivityError::InvalidIndices(format!(
                    "channel {ch} in the {name} group of connection {con} is out of range \
                     (data has {n_channels} channels)"
                )));
            }
        }
    }

    let mut sel: Vec<usize> =
        indices.seeds.iter().chain(&indices.targets).flatten().copied().collect();
    sel.sort_unstable();
    sel.dedup();

    let remap = |group: &Vec<usize>| -> Vec<usize> {
        group.iter().map(|ch| sel.binary_search(ch).unwrap()).collect()
    };
    let seeds = indices.seeds.iter().map(remap).collect();
    let targets = indices.targets.iter().map(remap).collect();
    Ok((sel, seeds, targets))
}

/// Component-count checks. The permissible rank of a group is
/// `min(own group size, paired group size)` — the cross block cannot
/// exceed the smaller side. Requests above the bound fail, never clamp.
fn check_components(
    requested: Option<&[usize]>,
    own: &[Vec<usize>],
    paired: &[Vec<usize>],
    n_cons: usize,
    group: &'static str,
) -> Result<Vec<Option<usize>>, ConnectivityError> {
    let Some(requested) = requested else {
        return Ok(vec![None; n_cons]);
    };
    if requested.len() != n_cons {
        return Err(ConnectivityError::InvalidComponentSpec(format!(
            "n_{group}_components has {} entries but there are {n_cons} connections",
            requested.len()
        )));
    }
    let mut out = Vec::with_capacity(n_cons);
    for (con, (&k, (own_group, paired_group))) in
        requested.iter().zip(own.iter().zip(paired)).enumerate()
    {
        if k == 0 {
            return Err(ConnectivityError::InvalidComponentSpec(format!(
                "n_{group}_components must be at least 1 (connection {con})"
            )));
        }
        let bound = own_group.len().min(paired_group.len());
        if k > bound {
            return Err(ConnectivityError::ComponentCountExceeded {
                group,
                con,
                bound,
                requested: k,
            });
        }
        out.push(Some(k));
    }
    Ok(out)
}

/// Build the full frequency grid for the mode, then mask it by the
/// requested band(s).
fn frequency_grid(
    params: &ConnectivityParams,
    sfreq: f64,
    n_times: usize,
) -> Result<(Vec<f64>, Vec<usize>), ConnectivityError> {
    let grid: Vec<f64> = match params.mode {
        Mode::Multitaper | Mode::Fourier => {
            (0..=n_times / 2).map(|i| i as f64 * sfreq / n_times as f64).collect()
        }
        Mode::CwtMorlet => {
            let freqs = params
                .cwt_freqs
                .as_ref()
                .filter(|f| !f.is_empty())
                .ok_or_else(|| {
                    ConnectivityError::InvalidCwtFreqs(
                        "cwt_freqs must be specified in cwt_morlet mode".into(),
                    )
                })?;
            if freqs.windows(2).any(|w| w[1] <= w[0]) {
                return Err(ConnectivityError::InvalidCwtFreqs(
                    "cwt_freqs must be strictly increasing".into(),
                ));
            }
            let nyquist = sfreq / 2.0;
            if let Some(&f) = freqs.iter().find(|&&f| f <= 0.0 || f >= nyquist) {
                return Err(ConnectivityError::InvalidCwtFreqs(format!(
                    "cwt frequency {f} Hz must lie in (0, {nyquist}) Hz"
                )));
            }
            let cycles = params.cwt_n_cycles.resolve(freqs.len())?;
            for (&f, &c) in freqs.iter().zip(&cycles) {
                if !c.is_finite() || c <= 0.0 {
                    return Err(ConnectivityError::InvalidCwtFreqs(format!(
                        "cycle count {c} for {f} Hz must be positive"
                    )));
                }
                // Support is ±5 sigma_t; the wavelet must fit in one epoch.
                let half_len = (5.0 * c / (2.0 * std::f64::consts::PI * f) * sfreq) as usize;
                if 2 * half_len + 1 > n_times {
                    return Err(ConnectivityError::InvalidCwtFreqs(format!(
                        "the wavelet for {f} Hz ({c} cycles) is longer than one epoch \
                         ({} > {n_times} samples)",
                        2 * half_len + 1
                    )));
                }
            }
            freqs.clone()
        }
    };

    let fmin = params.fmin.clone().unwrap_or_else(|| vec![0.0]);
    let fmax = params.fmax.clone().unwrap_or_else(|| vec![sfreq / 2.0]);
    if fmin.len() != fmax.len() {
        return Err(ConnectivityError::FrequencyRangeLengthMismatch {
            n_fmin: fmin.len(),
            n_fmax: fmax.len(),
        });
    }

    let mut mask = vec![false; grid.len()];
    for (&lo, &hi) in fmin.iter().zip(&fmax) {
        if hi <= lo {
            return Err(ConnectivityError::InvalidFrequencyRange { fmin: lo, fmax: hi });
        }
        let mut any = false;
        for (bin, &f) in grid.iter().enumerate() {
            if f >= lo && f <= hi {
                mask[bin] = true;
                any = true;
            }
        }
        if !any {
            return Err(ConnectivityError::EmptyFrequencyRange { fmin: lo, fmax: hi });
        }
    }

    let bins: Vec<usize> = mask.iter().enumerate().filter(|(_, &m)| m).map(|(i, _)| i).collect();
    let freqs = bins.iter().map(|&b| grid[b]).collect();
    Ok((freqs, bins))
}

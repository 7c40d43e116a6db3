//! Typed error surface of the connectivity pipeline.
//!
//! Every variant corresponds to a deterministic configuration/input error
//! surfaced before (or instead of) numeric work — there is no partial or
//! degraded success mode. Numerical instability inside the metric engine is
//! handled by diagonal loading, never by raising.
use thiserror::Error;

/// Errors returned by [`multivar_spectral_connectivity_epochs`](crate::multivar_spectral_connectivity_epochs).
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// A string method identifier is not in the method registry.
    #[error("'{0}' is not a valid connectivity method (known: mic, mim)")]
    UnknownMethod(String),

    /// A caller-supplied method object does not satisfy the scoring
    /// interface contract (e.g. empty name, or a name colliding with a
    /// built-in method).
    #[error("the supplied connectivity method does not have a usable scoring interface: {0}")]
    UnsupportedMethodInterface(String),

    /// The spectral-estimation mode string is not one of
    /// `multitaper`, `fourier`, `cwt_morlet`.
    #[error("mode has an invalid value '{0}' (expected multitaper, fourier or cwt_morlet)")]
    InvalidMode(String),

    /// No seed/target index groups were supplied. Multivariate
    /// connectivity has no implicit all-pairs behavior.
    #[error("indices must be specified, got `None`")]
    MissingIndices,

    /// Seed/target index groups are structurally invalid (length
    /// mismatch, empty group, duplicate or out-of-range channel).
    #[error("invalid indices: {0}")]
    InvalidIndices(String),

    /// A requested [fmin, fmax] band contains no frequency of the grid.
    #[error("there are no frequency points between {fmin:.2} Hz and {fmax:.2} Hz")]
    EmptyFrequencyRange { fmin: f64, fmax: f64 },

    /// fmax does not exceed fmin for some band.
    #[error("fmax must be larger than fmin (got fmin={fmin}, fmax={fmax})")]
    InvalidFrequencyRange { fmin: f64, fmax: f64 },

    /// fmin and fmax sequences have different lengths.
    #[error("fmin and fmax must have the same length ({n_fmin} != {n_fmax})")]
    FrequencyRangeLengthMismatch { n_fmin: usize, n_fmax: usize },

    /// A requested component count exceeds the permissible rank for a
    /// group. The bound is `min(own group size, paired group size)` and
    /// is never silently clamped.
    #[error(
        "At most {bound} components can be taken from the {group} channels of connection {con}, \
         but {requested} were requested"
    )]
    ComponentCountExceeded {
        /// "seed" or "target".
        group: &'static str,
        con: usize,
        bound: usize,
        requested: usize,
    },

    /// `n_seed_components`/`n_target_components` length does not match
    /// the number of connections, or a count of zero was requested.
    #[error("invalid component specification: {0}")]
    InvalidComponentSpec(String),

    /// `cwt_freqs`/`cwt_n_cycles` are missing or unusable in cwt mode.
    #[error("invalid cwt parameters: {0}")]
    InvalidCwtFreqs(String),

    /// The epoched input array itself is malformed (too few channels,
    /// epochs or samples, or a non-finite sampling rate).
    #[error("invalid input data: {0}")]
    BadInput(String),
}

//! Connectivity methods and the shared eigen engine.
//!
//! Methods are a polymorphic dispatch over one capability: score a set of
//! reduced CSD blocks at a single (connection, frequency[, time]) point.
//! Built-ins implement the multivariate imaginary-coherence family of
//! Ewald et al. (2012):
//!
//! - MIC — maximized imaginary coherence: the largest singular value of
//!   the whitened imaginary cross block `Re(S_ss)^-1/2 Im(S_st) Re(S_tt)^-1/2`,
//!   i.e. the best unit-norm combination of seeds and targets, in [0, 1].
//! - MIM — multivariate interaction measure:
//!   `tr(Re(S_ss)^-1 Im(S_st) Re(S_tt)^-1 Im(S_st)^T)`, the squared
//!   Frobenius norm of the same whitened block, non-negative.
//!
//! The whitened block is computed once per point and shared by every
//! requested method; the CSD is never recomputed per method.
use std::fmt;
use std::sync::Arc;

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::ConnectivityError;

/// CSD sub-blocks of one connection at one (frequency[, time]) point,
/// already projected through the component-selection bases.
#[derive(Debug, Clone)]
pub struct ReducedCsd {
    /// Seed auto-spectra, `k_s x k_s`, Hermitian.
    pub seed_seed: DMatrix<Complex64>,
    /// Target auto-spectra, `k_t x k_t`, Hermitian.
    pub target_target: DMatrix<Complex64>,
    /// Seed-target cross-spectra, `k_s x k_t`.
    pub seed_target: DMatrix<Complex64>,
}

/// Singular values of the whitened imaginary cross block, computed once
/// per point by [`whitened_cross`] and handed to every method.
#[derive(Debug, Clone)]
pub struct WhitenedCross {
    /// Sorted descending by `nalgebra`.
    pub singular_values: Vec<f64>,
}

/// The method-computation interface. Implement this to plug a custom
/// score into the pipeline via [`Method::Custom`].
pub trait ConnectivityMethod: Send + Sync {
    /// Identifier recorded in the result metadata.
    fn name(&self) -> &str;

    /// Scalar score for one (connection, frequency[, time]) point.
    fn score(&self, blocks: &ReducedCsd, whitened: &WhitenedCross) -> f64;

    /// Configuration-time contract check. The default rejects empty
    /// names and collisions with the built-in registry.
    fn validate(&self) -> Result<(), ConnectivityError> {
        let name = self.name();
        if name.is_empty() {
            return Err(ConnectivityError::UnsupportedMethodInterface(
                "the method reports an empty name".into(),
            ));
        }
        if matches!(name, "mic" | "mim") {
            return Err(ConnectivityError::UnsupportedMethodInterface(format!(
                "the method name '{name}' collides with a built-in method"
            )));
        }
        Ok(())
    }
}

/// A requested connectivity method: a built-in, or a caller-supplied
/// implementation of [`ConnectivityMethod`].
#[derive(Clone)]
pub enum Method {
    /// Maximized imaginary coherence.
    Mic,
    /// Multivariate interaction measure.
    Mim,
    /// Caller-supplied method, validated at configuration time.
    Custom(Arc<dyn ConnectivityMethod>),
}

impl Method {
    /// Look up a built-in method by its string identifier.
    pub fn parse(name: &str) -> Result<Method, ConnectivityError> {
        match name {
            "mic" => Ok(Method::Mic),
            "mim" => Ok(Method::Mim),
            other => Err(ConnectivityError::UnknownMethod(other.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Method::Mic => "mic",
            Method::Mim => "mim",
            Method::Custom(m) => m.name(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConnectivityError> {
        match self {
            Method::Mic | Method::Mim => Ok(()),
            Method::Custom(m) => m.validate(),
        }
    }

    pub(crate) fn score(&self, blocks: &ReducedCsd, whitened: &WhitenedCross) -> f64 {
        match self {
            // sigma_max of the whitened cross block; clamp away rounding
            // overshoot from the regularized inversion.
            Method::Mic => {
                whitened.singular_values.iter().copied().fold(0.0, f64::max).min(1.0)
            }
            // Frobenius norm squared == tr(A^-1 C B^-1 C^T).
            Method::Mim => whitened.singular_values.iter().map(|s| s * s).sum(),
            Method::Custom(m) => m.score(blocks, whitened),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Method").field(&self.name()).finish()
    }
}

/// Whiten the imaginary cross block against the regularized real
/// auto-blocks and return its singular values.
pub fn whitened_cross(blocks: &ReducedCsd) -> WhitenedCross {
    let a = blocks.seed_seed.map(|z| z.re);
    let b = blocks.target_target.map(|z| z.re);
    let c = blocks.seed_target.map(|z| z.im);

    let d = inv_sqrt_sym(&a) * c * inv_sqrt_sym(&b);
    let singular_values = d.svd(false, false).singular_values.iter().copied().collect();
    WhitenedCross { singular_values }
}

/// Inverse matrix square root of a symmetric positive semi-definite
/// matrix. Near-singular spectra (e.g. from over-reduction) are floored
/// by deterministic diagonal loading before inversion.
fn inv_sqrt_sym(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.nrows();
    let sym = (m + m.transpose()) * 0.5;
    let eps = 1e-10 * sym.diagonal().iter().map(|v| v.abs()).sum::<f64>() / n as f64 + 1e-15;

    let eig = sym.symmetric_eigen();
    let mut scaled = eig.eigenvectors.clone();
    for (j, &lambda) in eig.eigenvalues.iter().enumerate() {
        let inv_sqrt = 1.0 / lambda.max(eps).sqrt();
        scaled.column_mut(j).scale_mut(inv_sqrt);
    }
    scaled * eig.eigenvectors.transpose()
}

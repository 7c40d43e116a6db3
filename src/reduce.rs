//! SVD-based component reduction of seed/target groups.
//!
//! Large channel groups make the multivariate eigen-problems unstable
//! and expensive; each group is first compressed onto the subspace most
//! relevant to the cross-interaction. The basis comes from the SVD of
//! the frequency- (and time-) averaged seed x target CSD block, so one
//! basis per connection is applied identically at every frequency of the
//! call: top-k left singular vectors for the seed side, top-k right
//! singular vectors for the target side.
use nalgebra::DMatrix;
use num_complex::Complex64;
use tracing::debug;

use crate::csd::CsdTensor;
use crate::method::ReducedCsd;

/// Component-selection bases of one connection. `None` means the
/// identity (all channels kept).
pub struct PairBases {
    pub seed: Option<DMatrix<Complex64>>,
    pub target: Option<DMatrix<Complex64>>,
}

/// Compute the reduction bases for one connection.
///
/// `k_seed`/`k_target` are the validated component counts; `None` or a
/// full-size count short-circuits to the identity (full-rank rotations
/// leave MIC and MIM unchanged).
pub fn component_bases(
    csd: &CsdTensor,
    seeds: &[usize],
    targets: &[usize],
    k_seed: Option<usize>,
    k_target: Option<usize>,
) -> PairBases {
    let ks = k_seed.filter(|&k| k < seeds.len());
    let kt = k_target.filter(|&k| k < targets.len());
    if ks.is_none() && kt.is_none() {
        return PairBases { seed: None, target: None };
    }

    // Average the cross block over every (frequency, time) point so the
    // same subspace serves the whole call.
    let mut cbar = DMatrix::<Complex64>::zeros(seeds.len(), targets.len());
    for f in 0..csd.n_freqs {
        for t in 0..csd.n_times {
            cbar += csd.block(f, t, seeds, targets);
        }
    }
    cbar /= Complex64::new((csd.n_freqs * csd.n_times) as f64, 0.0);

    // Singular values (and the matching vectors) come back sorted
    // descending, so the leading columns are the most cross-informative.
    // svd(true, true) always populates both factor fields.
    let nalgebra::SVD { u: Some(u), v_t: Some(v_t), .. } = cbar.svd(true, true) else {
        unreachable!("both SVD factors were requested");
    };
    let v = v_t.adjoint();

    debug!(ks, kt, "component reduction bases computed");
    PairBases {
        seed: ks.map(|k| fix_phases(u.columns(0, k).into_owned())),
        target: kt.map(|k| fix_phases(v.columns(0, k).into_owned())),
    }
}

/// Singular vectors are only defined up to a unit phase, which would
/// leak into `Im(S_st)` after projection. Pin each column so its
/// largest-modulus entry is real and positive.
fn fix_phases(mut basis: DMatrix<Complex64>) -> DMatrix<Complex64> {
    for mut col in basis.column_iter_mut() {
        let pivot = col
            .iter()
            .copied()
            .max_by(|a, b| a.norm_sqr().total_cmp(&b.norm_sqr()))
            .unwrap_or_else(|| Complex64::new(1.0, 0.0));
        if pivot.norm() > 0.0 {
            let rot = pivot.conj() / pivot.norm();
            for z in col.iter_mut() {
                *z *= rot;
            }
        }
    }
    basis
}

/// Project the three CSD sub-blocks of one connection at one
/// (frequency, time) point through the bases.
pub fn reduced_blocks(
    csd: &CsdTensor,
    f: usize,
    t: usize,
    seeds: &[usize],
    targets: &[usize],
    bases: &PairBases,
) -> ReducedCsd {
    let mut ss = csd.block(f, t, seeds, seeds);
    let mut tt = csd.block(f, t, targets, targets);
    let mut st = csd.block(f, t, seeds, targets);

    if let Some(u) = &bases.seed {
        ss = u.adjoint() * ss * u;
        st = u.adjoint() * st;
    }
    if let Some(v) = &bases.target {
        tt = v.adjoint() * tt * v;
        st = st * v;
    }
    ReducedCsd { seed_seed: ss, target_target: tt, seed_target: st }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csd::from_wavelet;
    use crate::method::{whitened_cross, Method};
    use approx::assert_abs_diff_eq;
    use ndarray::Array4;

    /// Three channels, one (frequency, time) point: seed channels 0 and 1
    /// are identical, channel 2 is a lagged copy. The seed cross subspace
    /// is rank one.
    fn rank_one_csd() -> CsdTensor {
        let coeffs = Array4::from_shape_fn((6, 3, 1, 1), |(e, c, _, _)| {
            let phase = e as f64 * 1.1;
            match c {
                0 | 1 => Complex64::from_polar(1.0, phase),
                _ => Complex64::from_polar(1.0, phase + 0.9),
            }
        });
        from_wavelet(&coeffs)
    }

    #[test]
    fn full_size_counts_short_circuit_to_identity() {
        let csd = rank_one_csd();
        let bases = component_bases(&csd, &[0, 1], &[2], Some(2), Some(1));
        assert!(bases.seed.is_none());
        assert!(bases.target.is_none());
    }

    #[test]
    fn seed_basis_columns_are_orthonormal() {
        let csd = rank_one_csd();
        let bases = component_bases(&csd, &[0, 1], &[2], Some(1), None);
        let u = bases.seed.expect("reduction requested");
        assert_eq!(u.shape(), (2, 1));
        let gram = u.adjoint() * &u;
        assert_abs_diff_eq!(gram[(0, 0)].re, 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(gram[(0, 0)].im, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn rank_one_reduction_preserves_mic() {
        let csd = rank_one_csd();

        let full = reduced_blocks(
            &csd,
            0,
            0,
            &[0, 1],
            &[2],
            &PairBases { seed: None, target: None },
        );
        let full_mic = Method::Mic.score(&full, &whitened_cross(&full));

        let bases = component_bases(&csd, &[0, 1], &[2], Some(1), None);
        let reduced = reduced_blocks(&csd, 0, 0, &[0, 1], &[2], &bases);
        assert_eq!(reduced.seed_seed.nrows(), 1);
        let reduced_mic = Method::Mic.score(&reduced, &whitened_cross(&reduced));

        assert_abs_diff_eq!(full_mic, reduced_mic, epsilon = 1e-6);
    }
}

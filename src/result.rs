//! The connectivity result container.
//!
//! Immutable once constructed; owned by the caller. Scores are indexed
//! by (connection, frequency, time) per method, with a singleton time
//! axis outside cwt_morlet mode.
use ndarray::{Array2, Array3};

use crate::config::Mode;

/// Scores and usage metadata of one connectivity call.
#[derive(Debug, Clone)]
pub struct SpectralConnectivity {
    methods: Vec<String>,
    /// One `[n_cons, n_freqs, n_times]` array per method.
    data: Vec<Array3<f64>>,
    /// Frequencies actually used, strictly increasing.
    pub freqs: Vec<f64>,
    /// Epoch-relative time stamps; `Some` only in cwt_morlet mode.
    pub times: Option<Vec<f64>>,
    /// Number of epochs consumed by the estimate.
    pub n_epochs_used: usize,
    /// Spectral-estimation mode used.
    pub mode: Mode,
}

impl SpectralConnectivity {
    pub(crate) fn new(
        methods: Vec<String>,
        data: Vec<Array3<f64>>,
        freqs: Vec<f64>,
        times: Option<Vec<f64>>,
        n_epochs_used: usize,
        mode: Mode,
    ) -> Self {
        debug_assert_eq!(methods.len(), data.len());
        Self { methods, data, freqs, times, n_epochs_used, mode }
    }

    /// Identifiers of the computed methods, in request order.
    pub fn method_names(&self) -> &[String] {
        &self.methods
    }

    pub fn n_cons(&self) -> usize {
        self.data.first().map_or(0, |d| d.shape()[0])
    }

    pub fn n_freqs(&self) -> usize {
        self.freqs.len()
    }

    /// Structured per-pair scores of one method:
    /// `[n_cons, n_freqs, n_times]` (`n_times == 1` outside cwt mode).
    pub fn get(&self, method: &str) -> Option<&Array3<f64>> {
        let idx = self.methods.iter().position(|m| m == method)?;
        Some(&self.data[idx])
    }

    /// Raveled layout of one method: the connection-pair axis first,
    /// frequency (then time) flattened into the second axis.
    pub fn raveled(&self, method: &str) -> Option<Array2<f64>> {
        let arr = self.get(method)?;
        let (n_cons, n_freqs, n_times) = arr.dim();
        let flat = arr.to_shape((n_cons, n_freqs * n_times)).ok()?.to_owned();
        Some(flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn sample() -> SpectralConnectivity {
        let data = Array3::from_shape_fn((2, 3, 1), |(c, f, _)| (c * 10 + f) as f64);
        SpectralConnectivity::new(
            vec!["mic".into()],
            vec![data],
            vec![1.0, 2.0, 3.0],
            None,
            8,
            Mode::Multitaper,
        )
    }

    #[test]
    fn get_and_raveled_agree() {
        let con = sample();
        assert_eq!(con.n_cons(), 2);
        assert_eq!(con.n_freqs(), 3);

        let structured = con.get("mic").unwrap();
        let raveled = con.raveled("mic").unwrap();
        assert_eq!(raveled.shape(), &[2, 3]);
        for c in 0..2 {
            for f in 0..3 {
                assert_eq!(raveled[[c, f]], structured[[c, f, 0]]);
            }
        }
    }

    #[test]
    fn unknown_method_yields_none() {
        assert!(sample().get("mim").is_none());
    }
}

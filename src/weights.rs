//! Flat posterior storage: creation, layer layout and unpacking.
//!
//! A sub-network with size specification `[D0, D1, ..., DL]` stores every
//! weight and bias in one flat vector, layer by layer:
//!
//! ```text
//! | W0 (D0 x D1, row-major) | b0 (D1) | W1 (D1 x D2) | b1 (D2) | ... |
//! ```
//!
//! Two such vectors exist per sub-network: means `m` and log-variances `v`.
//! [`unpack_weights`] hands out borrowed per-layer views into them; nothing is
//! copied. [`UnpackedWeights::pack`] is its exact inverse.
//!
//! # Example
//!
//! ```rust
//! use mfvi::weights::{create_weights, unpack_weights};
//!
//! let size = [4, 5, 3];
//! let (no_weights, m, v) = create_weights(&size);
//! assert_eq!(no_weights, 4 * 5 + 5 + 5 * 3 + 3);
//!
//! let unpacked = unpack_weights(&m, &v, &size).unwrap();
//! assert_eq!(unpacked.mw[0].dim(), (4, 5));
//! assert_eq!(unpacked.mb[1].len(), 3);
//! ```

use crate::error::{MfviError, Result};
use ndarray::{ArrayView1, ArrayView2};
use std::ops::Range;

/// Number of scalar parameters described by a size specification.
///
/// `Σ_i (size[i] * size[i+1] + size[i+1])`; zero for fewer than two widths.
pub fn no_weights(size: &[usize]) -> usize {
    size.windows(2).map(|w| w[0] * w[1] + w[1]).sum()
}

/// Allocate zero-initialised mean and log-variance vectors for `size`.
///
/// Returns `(no_weights, m, v)`.
pub fn create_weights(size: &[usize]) -> (usize, Vec<f64>, Vec<f64>) {
    let n = no_weights(size);
    (n, vec![0.0; n], vec![0.0; n])
}

/// Where one layer's weight matrix and bias vector live in the flat vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerLayout {
    pub din: usize,
    pub dout: usize,
    /// Offset of the first weight entry.
    pub offset: usize,
}

impl LayerLayout {
    /// Range of the `(din, dout)` row-major weight matrix.
    pub fn weights(&self) -> Range<usize> {
        self.offset..self.offset + self.din * self.dout
    }

    /// Range of the `dout` bias entries, immediately after the weights.
    pub fn biases(&self) -> Range<usize> {
        let start = self.offset + self.din * self.dout;
        start..start + self.dout
    }
}

/// Walk the layer boundaries of `size` left to right.
pub fn layer_layouts(size: &[usize]) -> Vec<LayerLayout> {
    let mut offset = 0;
    size.windows(2)
        .map(|w| {
            let layout = LayerLayout {
                din: w[0],
                dout: w[1],
                offset,
            };
            offset += w[0] * w[1] + w[1];
            layout
        })
        .collect()
}

/// Per-layer views into a flat `(m, v)` pair.
#[derive(Clone, Debug)]
pub struct UnpackedWeights<'a> {
    /// Weight means, one `(D_i, D_{i+1})` matrix per layer
    pub mw: Vec<ArrayView2<'a, f64>>,
    /// Weight log-variances
    pub vw: Vec<ArrayView2<'a, f64>>,
    /// Bias means, one `D_{i+1}` vector per layer
    pub mb: Vec<ArrayView1<'a, f64>>,
    /// Bias log-variances
    pub vb: Vec<ArrayView1<'a, f64>>,
}

impl UnpackedWeights<'_> {
    pub fn no_layers(&self) -> usize {
        self.mw.len()
    }

    /// Re-flatten into `(m, v)` in layer order.
    pub fn pack(&self) -> (Vec<f64>, Vec<f64>) {
        let mut m = Vec::new();
        let mut v = Vec::new();
        for i in 0..self.no_layers() {
            m.extend(self.mw[i].iter());
            m.extend(self.mb[i].iter());
            v.extend(self.vw[i].iter());
            v.extend(self.vb[i].iter());
        }
        (m, v)
    }
}

/// Slice flat mean and log-variance vectors into per-layer views.
///
/// Fails with [`MfviError::ShapeMismatch`] if either vector's length differs
/// from `no_weights(size)`.
pub fn unpack_weights<'a>(
    m: &'a [f64],
    v: &'a [f64],
    size: &[usize],
) -> Result<UnpackedWeights<'a>> {
    let expected = no_weights(size);
    for got in [m.len(), v.len()] {
        if got != expected {
            return Err(MfviError::ShapeMismatch {
                context: "unpack_weights",
                expected,
                got,
            });
        }
    }

    let layouts = layer_layouts(size);
    let mut unpacked = UnpackedWeights {
        mw: Vec::with_capacity(layouts.len()),
        vw: Vec::with_capacity(layouts.len()),
        mb: Vec::with_capacity(layouts.len()),
        vb: Vec::with_capacity(layouts.len()),
    };
    for layout in layouts {
        let shape = (layout.din, layout.dout);
        unpacked.mw.push(ArrayView2::from_shape(shape, &m[layout.weights()])?);
        unpacked.vw.push(ArrayView2::from_shape(shape, &v[layout.weights()])?);
        unpacked.mb.push(ArrayView1::from(&m[layout.biases()]));
        unpacked.vb.push(ArrayView1::from(&v[layout.biases()]));
    }
    Ok(unpacked)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn numbered(n: usize, scale: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * scale).collect()
    }

    #[rstest]
    #[case(vec![4], 0)]
    #[case(vec![4, 5], 25)]
    #[case(vec![4, 5, 3], 43)]
    #[case(vec![784, 100, 100, 10], 89_610)]
    #[case(vec![2, 0, 3], 3)]
    fn test_no_weights_closed_form(#[case] size: Vec<usize>, #[case] expected: usize) {
        assert_eq!(no_weights(&size), expected);
        let (n, m, v) = create_weights(&size);
        assert_eq!(n, expected);
        assert_eq!(m.len(), expected);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_zero_layer_spec_unpacks_empty() {
        let unpacked = unpack_weights(&[], &[], &[7]).unwrap();
        assert_eq!(unpacked.no_layers(), 0);
        let (m, v) = unpacked.pack();
        assert!(m.is_empty() && v.is_empty());
    }

    #[test]
    fn test_layouts_are_contiguous() {
        let layouts = layer_layouts(&[3, 4, 2]);
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts[0].weights(), 0..12);
        assert_eq!(layouts[0].biases(), 12..16);
        assert_eq!(layouts[1].weights(), 16..24);
        assert_eq!(layouts[1].biases(), 24..26);
    }

    #[test]
    fn test_unpack_is_row_major_input_major() {
        let size = [2, 3];
        let m = numbered(no_weights(&size), 1.0);
        let v = numbered(no_weights(&size), -1.0);
        let unpacked = unpack_weights(&m, &v, &size).unwrap();

        // W[i][o] = m[i * dout + o]
        assert_eq!(unpacked.mw[0][[0, 2]], 2.0);
        assert_eq!(unpacked.mw[0][[1, 0]], 3.0);
        assert_eq!(unpacked.mb[0].to_vec(), vec![6.0, 7.0, 8.0]);
        assert_eq!(unpacked.vb[0][0], -6.0);
    }

    #[rstest]
    #[case(vec![4, 5, 3])]
    #[case(vec![1, 1])]
    #[case(vec![6, 2, 2, 4])]
    fn test_pack_unpack_round_trip(#[case] size: Vec<usize>) {
        let n = no_weights(&size);
        let m: Vec<f64> = (0..n).map(|i| (i as f64).sin()).collect();
        let v: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).cos() - 3.0).collect();

        let (m2, v2) = unpack_weights(&m, &v, &size).unwrap().pack();

        // Bit-for-bit equality
        assert_eq!(m, m2);
        assert_eq!(v, v2);
    }

    #[test]
    fn test_unpack_rejects_wrong_length() {
        let size = [4, 5];
        let m = vec![0.0; no_weights(&size)];
        let v = vec![0.0; no_weights(&size) - 1];
        let err = unpack_weights(&m, &v, &size).unwrap_err();
        assert!(matches!(
            err,
            MfviError::ShapeMismatch { expected: 25, got: 24, .. }
        ));
    }
}

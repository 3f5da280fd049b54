//! Softmax and softmax cross-entropy over sampled logits.

use crate::error::{MfviError, Result};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

/// Mean softmax cross-entropy over rows, and its gradient w.r.t. the logits.
///
/// Each row of `logits` is scored against the same row of `labels`; labels
/// may be one-hot or any non-negative distribution. The gradient already
/// includes the `1 / rows` factor of the mean.
pub fn softmax_cross_entropy(
    logits: ArrayView2<f64>,
    labels: ArrayView2<f64>,
) -> Result<(f64, Array2<f64>)> {
    if labels.nrows() != logits.nrows() {
        return Err(MfviError::ShapeMismatch {
            context: "label rows",
            expected: logits.nrows(),
            got: labels.nrows(),
        });
    }
    if labels.ncols() != logits.ncols() {
        return Err(MfviError::ShapeMismatch {
            context: "label width",
            expected: logits.ncols(),
            got: labels.ncols(),
        });
    }
    let rows = logits.nrows();
    let scale = 1.0 / rows.max(1) as f64;
    let mut grad = Array2::zeros(logits.raw_dim());
    let mut total = 0.0;

    for ((z, y), mut g) in logits
        .outer_iter()
        .zip(labels.outer_iter())
        .zip(grad.outer_iter_mut())
    {
        let max = z.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let lse = max + z.iter().map(|&zi| (zi - max).exp()).sum::<f64>().ln();
        let mass: f64 = y.sum();

        total -= z.iter().zip(y.iter()).map(|(&zi, &yi)| yi * (zi - lse)).sum::<f64>();
        for ((gi, &zi), &yi) in g.iter_mut().zip(z.iter()).zip(y.iter()) {
            *gi = ((zi - lse).exp() * mass - yi) * scale;
        }
    }

    Ok((total * scale, grad))
}

/// Softmax over the last axis of `(samples, batch, classes)` logits.
pub fn softmax(logits: ArrayView3<f64>) -> Array3<f64> {
    let mut probs = logits.to_owned();
    for mut lane in probs.lanes_mut(Axis(2)) {
        let max = lane.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        lane.mapv_inplace(|z| (z - max).exp());
        let sum = lane.sum();
        lane.mapv_inplace(|p| p / sum);
    }
    probs
}

//! Variational feed-forward sub-network.
//!
//! A [`HalfNet`] is either the shared lower stack or one task-specific upper
//! head of an [`MfviNn`](crate::MfviNn). It owns a factorized Gaussian
//! posterior `q(w) = N(m, exp(v))` over every weight and bias, a diagonal
//! Gaussian prior `N(m0, p0)`, and an activation.
//!
//! # Local reparameterization
//!
//! Instead of sampling every weight, each layer samples its pre-activation
//! from the closed-form distribution induced by the posterior:
//!
//! ```text
//! m_pre = a · Mw                 v_pre = a² · exp(Vw)
//! pre   = eps_w * sqrt(v_pre + 1e-9) + m_pre + eps_b * exp(vb / 2) + mb
//! ```
//!
//! with `eps_w` drawn per (sample, row, unit) and `eps_b` per (sample, unit).
//! All `K` Monte-Carlo samples run as one batched matrix product: activations
//! are kept as `(K * batch, D)` matrices, sample-major.
//!
//! # KL divergence
//!
//! ```text
//! KL = -0.5 * n + 0.5 * Σ(ln p0 - v) + 0.5 * Σ((exp(v) + (m0 - m)²) / p0)
//! ```
//!
//! where `v` is a log-variance but `p0` is a plain variance.

use crate::activation::Activation;
use crate::error::{MfviError, Result};
use crate::noise::NoiseSource;
use crate::weights::{create_weights, layer_layouts, unpack_weights, UnpackedWeights};
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

/// Floor added to the propagated variance before the square root.
pub const VARIANCE_FLOOR: f64 = 1e-9;

/// Diagonal Gaussian prior `N(mean, variance)` over a sub-network's parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub mean: Vec<f64>,
    /// Variances (not log-variances).
    pub variance: Vec<f64>,
}

impl Prior {
    /// Same mean and variance for every parameter.
    pub fn isotropic(no_weights: usize, mean: f64, variance: f64) -> Self {
        Self {
            mean: vec![mean; no_weights],
            variance: vec![variance; no_weights],
        }
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    fn validate(&self, no_weights: usize) -> Result<()> {
        for got in [self.mean.len(), self.variance.len()] {
            if got != no_weights {
                return Err(MfviError::ShapeMismatch {
                    context: "prior",
                    expected: no_weights,
                    got,
                });
            }
        }
        if let Some(bad) = self.variance.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
            return Err(MfviError::InvalidConfig(format!(
                "prior variance must be positive and finite, got {bad}"
            )));
        }
        Ok(())
    }
}

/// Gradient of a scalar w.r.t. a sub-network's `(m, v)`, flat like the posterior.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradients {
    pub m: Vec<f64>,
    pub v: Vec<f64>,
}

impl Gradients {
    pub fn zeros(no_weights: usize) -> Self {
        Self {
            m: vec![0.0; no_weights],
            v: vec![0.0; no_weights],
        }
    }

    /// `self += scale * other`
    pub fn add_scaled(&mut self, other: &Gradients, scale: f64) {
        for (a, b) in self.m.iter_mut().zip(&other.m) {
            *a += scale * b;
        }
        for (a, b) in self.v.iter_mut().zip(&other.v) {
            *a += scale * b;
        }
    }
}

/// Cached intermediates of one layer, kept for the backward pass.
#[derive(Clone, Debug)]
pub(crate) struct LayerTrace {
    input: Array2<f64>,
    eps_w: Array2<f64>,
    std_w: Array2<f64>,
    /// One row per Monte-Carlo sample.
    eps_b: Array2<f64>,
    pre: Array2<f64>,
}

/// Record of a stochastic forward pass over `(K * batch, D)` rows.
#[derive(Clone, Debug)]
pub(crate) struct ForwardTrace {
    batch: usize,
    layers: Vec<LayerTrace>,
    pub(crate) output: Array2<f64>,
}

/// One variational sub-network.
#[derive(Clone, Debug)]
pub struct HalfNet {
    size: Vec<usize>,
    no_weights: usize,
    activation: Activation,
    /// Posterior means
    m: Vec<f64>,
    /// Posterior log-variances
    v: Vec<f64>,
    prior: Prior,
}

impl HalfNet {
    /// Create with tanh activation, zero posterior and a standard normal prior.
    pub fn new(size: &[usize]) -> Result<Self> {
        Self::with_activation(size, Activation::Tanh)
    }

    pub fn with_activation(size: &[usize], activation: Activation) -> Result<Self> {
        if size.is_empty() {
            return Err(MfviError::EmptySize);
        }
        let (no_weights, m, v) = create_weights(size);
        Ok(Self {
            size: size.to_vec(),
            no_weights,
            activation,
            m,
            v,
            prior: Prior::isotropic(no_weights, 0.0, 1.0),
        })
    }

    // --- Accessors ---

    pub fn size(&self) -> &[usize] {
        &self.size
    }

    pub fn no_layers(&self) -> usize {
        self.size.len() - 1
    }

    pub fn no_weights(&self) -> usize {
        self.no_weights
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn input_dim(&self) -> usize {
        self.size[0]
    }

    pub fn output_dim(&self) -> usize {
        self.size[self.size.len() - 1]
    }

    pub fn mean(&self) -> &[f64] {
        &self.m
    }

    pub fn log_variance(&self) -> &[f64] {
        &self.v
    }

    pub fn prior(&self) -> &Prior {
        &self.prior
    }

    /// Per-layer views of the posterior.
    pub fn unpacked(&self) -> Result<UnpackedWeights<'_>> {
        unpack_weights(&self.m, &self.v, &self.size)
    }

    pub(crate) fn params_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        (&mut self.m, &mut self.v)
    }

    // --- Posterior / prior updates ---

    /// Overwrite the posterior.
    pub fn assign(&mut self, mean: &[f64], log_variance: &[f64]) -> Result<()> {
        for got in [mean.len(), log_variance.len()] {
            if got != self.no_weights {
                return Err(MfviError::ShapeMismatch {
                    context: "assign_weights",
                    expected: self.no_weights,
                    got,
                });
            }
        }
        self.m.copy_from_slice(mean);
        self.v.copy_from_slice(log_variance);
        Ok(())
    }

    /// Set every posterior log-variance to `value`.
    pub fn fill_log_variance(&mut self, value: f64) {
        self.v.fill(value);
    }

    pub fn set_prior(&mut self, prior: Prior) -> Result<()> {
        prior.validate(self.no_weights)?;
        self.prior = prior;
        Ok(())
    }

    /// The current posterior expressed as a prior for the next task.
    pub fn posterior_as_prior(&self) -> Prior {
        Prior {
            mean: self.m.clone(),
            variance: self.v.iter().map(|v| v.exp()).collect(),
        }
    }

    // --- Forward ---

    /// Stochastic forward pass.
    ///
    /// `inputs` has shape `(no_samples, batch, input_dim)`, already replicated
    /// over the sample axis. Returns raw last-layer pre-activations of shape
    /// `(no_samples, batch, output_dim)`.
    pub fn forward<N: NoiseSource + ?Sized>(
        &self,
        inputs: ArrayView3<f64>,
        no_samples: usize,
        noise: &mut N,
    ) -> Result<Array3<f64>> {
        let (k, batch, din) = inputs.dim();
        if k != no_samples {
            return Err(MfviError::ShapeMismatch {
                context: "forward samples",
                expected: no_samples,
                got: k,
            });
        }
        let rows = inputs.to_shape((k * batch, din))?;
        let trace = self.forward_trace(rows.view(), no_samples, noise)?;
        Ok(trace.output.into_shape_with_order((k, batch, self.output_dim()))?)
    }

    /// Plain forward pass through the posterior means.
    pub fn forward_mean(&self, inputs: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_input_dim(inputs.ncols())?;
        let w = self.unpacked()?;
        let mut act = inputs.to_owned();
        for i in 0..w.no_layers() {
            let pre = act.dot(&w.mw[i]) + &w.mb[i];
            act = if i + 1 < w.no_layers() {
                pre.mapv(|x| self.activation.apply(x))
            } else {
                pre
            };
        }
        Ok(act)
    }

    /// Stochastic forward pass over sample-major rows, keeping intermediates.
    pub(crate) fn forward_trace<N: NoiseSource + ?Sized>(
        &self,
        rows: ArrayView2<f64>,
        no_samples: usize,
        noise: &mut N,
    ) -> Result<ForwardTrace> {
        if no_samples == 0 {
            return Err(MfviError::InvalidConfig("no_samples must be at least 1".into()));
        }
        self.check_input_dim(rows.ncols())?;
        if rows.nrows() % no_samples != 0 {
            return Err(MfviError::ShapeMismatch {
                context: "forward rows (multiple of no_samples)",
                expected: no_samples * (rows.nrows() / no_samples + 1),
                got: rows.nrows(),
            });
        }
        let batch = rows.nrows() / no_samples;

        let w = self.unpacked()?;
        let no_layers = w.no_layers();
        let mut act = rows.to_owned();
        let mut layers = Vec::with_capacity(no_layers);

        for i in 0..no_layers {
            let n_rows = act.nrows();
            let dout = w.mw[i].ncols();

            let m_pre = act.dot(&w.mw[i]);
            let var_w = w.vw[i].mapv(f64::exp);
            let v_pre = act.mapv(|a| a * a).dot(&var_w);
            let std_w = v_pre.mapv(|s| (s + VARIANCE_FLOOR).sqrt());

            let eps_w =
                Array2::from_shape_vec((n_rows, dout), noise.standard_normal(n_rows * dout))?;
            let eps_b = Array2::from_shape_vec(
                (no_samples, dout),
                noise.standard_normal(no_samples * dout),
            )?;

            let bias = &eps_b * &w.vb[i].mapv(|x| (0.5 * x).exp()) + &w.mb[i];
            let mut pre = &eps_w * &std_w + &m_pre;
            if batch > 0 {
                let chunks = pre.axis_chunks_iter_mut(Axis(0), batch);
                for (mut chunk, b) in chunks.zip(bias.outer_iter()) {
                    chunk += &b;
                }
            }

            let next = if i + 1 < no_layers {
                pre.mapv(|x| self.activation.apply(x))
            } else {
                pre.clone()
            };
            layers.push(LayerTrace {
                input: act,
                eps_w,
                std_w,
                eps_b,
                pre,
            });
            act = next;
        }

        Ok(ForwardTrace {
            batch,
            layers,
            output: act,
        })
    }

    /// Backpropagate `grad_output` (w.r.t. the traced output) through the pass.
    ///
    /// Returns the posterior gradients and the gradient w.r.t. the traced input
    /// rows.
    pub(crate) fn backward(
        &self,
        trace: &ForwardTrace,
        grad_output: Array2<f64>,
    ) -> Result<(Gradients, Array2<f64>)> {
        let w = self.unpacked()?;
        let layouts = layer_layouts(&self.size);
        let mut grads = Gradients::zeros(self.no_weights);
        let mut g = grad_output;

        for i in (0..w.no_layers()).rev() {
            let layer = &trace.layers[i];
            let layout = layouts[i];
            let var_w = w.vw[i].mapv(f64::exp);

            // dL/dv_pre
            let g_var = &g * &layer.eps_w / &(&layer.std_w * 2.0);

            let d_mw = layer.input.t().dot(&g);
            let d_vw = layer.input.mapv(|a| a * a).t().dot(&g_var) * &var_w;

            let mut d_mb = Array1::<f64>::zeros(layout.dout);
            let mut d_vb = Array1::<f64>::zeros(layout.dout);
            if trace.batch > 0 {
                let chunks = g.axis_chunks_iter(Axis(0), trace.batch);
                for (chunk, eps) in chunks.zip(layer.eps_b.outer_iter()) {
                    let col = chunk.sum_axis(Axis(0));
                    d_vb += &(&col * &eps);
                    d_mb += &col;
                }
            }
            d_vb *= &w.vb[i].mapv(|x| 0.5 * (0.5 * x).exp());

            accumulate(&mut grads.m[layout.weights()], d_mw.iter());
            accumulate(&mut grads.m[layout.biases()], d_mb.iter());
            accumulate(&mut grads.v[layout.weights()], d_vw.iter());
            accumulate(&mut grads.v[layout.biases()], d_vb.iter());

            let d_input = g.dot(&w.mw[i].t()) + &(&layer.input * 2.0) * &g_var.dot(&var_w.t());
            g = if i > 0 {
                let act = self.activation;
                d_input * &trace.layers[i - 1].pre.mapv(|x| act.derivative(x))
            } else {
                d_input
            };
        }

        Ok((grads, g))
    }

    // --- KL ---

    /// Closed-form `KL(N(m, exp(v)) || N(m0, p0))` summed over all parameters.
    pub fn kl_term(&self) -> f64 {
        let const_term = -0.5 * self.no_weights as f64;
        let mut log_std_diff = 0.0;
        let mut mu_diff_term = 0.0;
        for (((&m, &v), &m0), &p0) in self
            .m
            .iter()
            .zip(&self.v)
            .zip(&self.prior.mean)
            .zip(&self.prior.variance)
        {
            log_std_diff += p0.ln() - v;
            mu_diff_term += (v.exp() + (m0 - m).powi(2)) / p0;
        }
        const_term + 0.5 * log_std_diff + 0.5 * mu_diff_term
    }

    /// Gradient of [`kl_term`](Self::kl_term) w.r.t. `(m, v)`.
    pub fn kl_gradient(&self) -> Gradients {
        let mut grads = Gradients::zeros(self.no_weights);
        for i in 0..self.no_weights {
            let p0 = self.prior.variance[i];
            grads.m[i] = (self.m[i] - self.prior.mean[i]) / p0;
            grads.v[i] = 0.5 * (self.v[i].exp() / p0 - 1.0);
        }
        grads
    }

    fn check_input_dim(&self, got: usize) -> Result<()> {
        if got != self.input_dim() {
            return Err(MfviError::ShapeMismatch {
                context: "input width",
                expected: self.input_dim(),
                got,
            });
        }
        Ok(())
    }
}

#[inline]
fn accumulate<'a>(dst: &mut [f64], src: impl Iterator<Item = &'a f64>) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::{GaussianNoise, ZeroNoise};
    use rstest::rstest;

    /// A net with non-trivial, reproducible posterior parameters.
    fn random_net(size: &[usize], seed: u64) -> HalfNet {
        let mut net = HalfNet::new(size).unwrap();
        let mut noise = GaussianNoise::with_seed(seed);
        let n = net.no_weights();
        let m: Vec<f64> = noise.standard_normal(n).iter().map(|x| 0.5 * x).collect();
        let v: Vec<f64> = noise.standard_normal(n).iter().map(|x| -2.0 + 0.3 * x).collect();
        net.assign(&m, &v).unwrap();
        net
    }

    fn random_inputs(k: usize, batch: usize, din: usize, seed: u64) -> Array3<f64> {
        let mut noise = GaussianNoise::with_seed(seed);
        let data = noise.standard_normal(k * batch * din);
        let one = Array2::from_shape_vec((batch, din), data[..batch * din].to_vec()).unwrap();
        // Replicated across the sample axis
        Array3::from_shape_fn((k, batch, din), |(_, n, d)| one[[n, d]])
    }

    #[rstest]
    #[case(vec![4, 5], 1, 3)]
    #[case(vec![4, 5, 3], 10, 7)]
    #[case(vec![2, 8, 8, 2], 3, 1)]
    fn test_forward_shape(#[case] size: Vec<usize>, #[case] k: usize, #[case] batch: usize) {
        let net = random_net(&size, 1);
        let x = random_inputs(k, batch, size[0], 2);
        let out = net.forward(x.view(), k, &mut GaussianNoise::with_seed(3)).unwrap();
        assert_eq!(out.dim(), (k, batch, *size.last().unwrap()));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_layer_net_is_identity() {
        let net = HalfNet::new(&[3]).unwrap();
        assert_eq!(net.no_weights(), 0);
        assert_eq!(net.kl_term(), 0.0);
        let x = random_inputs(2, 4, 3, 9);
        let out = net.forward(x.view(), 2, &mut GaussianNoise::with_seed(0)).unwrap();
        assert_eq!(out, x);
    }

    #[test]
    fn test_zero_noise_matches_mean_forward() {
        let net = random_net(&[3, 4, 2], 5);
        let k = 3;
        let x = random_inputs(k, 6, 3, 6);

        let out = net.forward(x.view(), k, &mut ZeroNoise).unwrap();
        let expected = net.forward_mean(x.index_axis(Axis(0), 0)).unwrap();

        for s in 0..k {
            let sample = out.index_axis(Axis(0), s);
            for (a, b) in sample.iter().zip(expected.iter()) {
                assert!((a - b).abs() < 1e-12, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_samples_differ_under_noise() {
        let net = random_net(&[3, 4, 2], 5);
        let x = random_inputs(2, 4, 3, 6);
        let out = net.forward(x.view(), 2, &mut GaussianNoise::with_seed(1)).unwrap();
        assert_ne!(out.index_axis(Axis(0), 0), out.index_axis(Axis(0), 1));
    }

    #[test]
    fn test_output_variance_matches_local_reparameterization() {
        // Single unit, single input x = 1, zero means:
        // pre = eps_w * sqrt(s2 + floor) + eps_b * s  =>  Var ≈ 2 * s2
        let mut net = HalfNet::new(&[1, 1]).unwrap();
        let s2: f64 = 0.25;
        net.assign(&[0.0, 0.0], &[s2.ln(), s2.ln()]).unwrap();

        let k = 20_000;
        let x = Array3::from_elem((k, 1, 1), 1.0);
        let out = net.forward(x.view(), k, &mut GaussianNoise::with_seed(11)).unwrap();

        let n = k as f64;
        let mean = out.sum() / n;
        let var = out.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.02, "mean {}", mean);
        assert!((var - 2.0 * s2).abs() < 0.05 * 2.0 * s2, "variance {}", var);
    }

    #[test]
    fn test_forward_rejects_bad_shapes() {
        let net = HalfNet::new(&[4, 2]).unwrap();
        let wrong_width = Array3::<f64>::zeros((2, 3, 5));
        assert!(matches!(
            net.forward(wrong_width.view(), 2, &mut ZeroNoise),
            Err(MfviError::ShapeMismatch { expected: 4, got: 5, .. })
        ));
        let wrong_k = Array3::<f64>::zeros((3, 3, 4));
        assert!(net.forward(wrong_k.view(), 2, &mut ZeroNoise).is_err());
    }

    #[rstest]
    #[case(vec![4, 5], 1.0)]
    #[case(vec![4, 5, 3], 0.5)]
    #[case(vec![10, 1], 3.7)]
    fn test_kl_zero_when_posterior_equals_prior(#[case] size: Vec<usize>, #[case] p0: f64) {
        let mut net = random_net(&size, 8);
        let n = net.no_weights();
        let prior_mean: Vec<f64> = net.mean().to_vec();
        net.set_prior(Prior {
            mean: prior_mean.clone(),
            variance: vec![p0; n],
        })
        .unwrap();
        net.assign(&prior_mean, &vec![p0.ln(); n]).unwrap();
        assert!(net.kl_term().abs() < 1e-9, "KL = {}", net.kl_term());
    }

    #[test]
    fn test_kl_known_value() {
        // Two parameters, m = 1, v = 0 against N(0, 1): 2 * 0.5 * (1 + 1 - 1 - 0) = 1
        let mut net = HalfNet::new(&[1, 1]).unwrap();
        net.assign(&[1.0, 1.0], &[0.0, 0.0]).unwrap();
        assert!((net.kl_term() - 1.0).abs() < 1e-12);

        // Against N(0, 2): per parameter 0.5 * (ln 2 + (1 + 1) / 2 - 1)
        net.set_prior(Prior::isotropic(2, 0.0, 2.0)).unwrap();
        let expected = 2.0 * 0.5 * 2f64.ln();
        assert!((net.kl_term() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_kl_non_negative() {
        for seed in 0..10 {
            let net = random_net(&[3, 4, 2], seed);
            assert!(net.kl_term() >= 0.0);
        }
    }

    #[test]
    fn test_kl_gradient_matches_finite_differences() {
        let mut net = random_net(&[2, 3], 4);
        net.set_prior(Prior::isotropic(net.no_weights(), 0.1, 0.7)).unwrap();
        let grads = net.kl_gradient();
        let h = 1e-6;
        for j in 0..net.no_weights() {
            for which in 0..2 {
                let mut plus = net.clone();
                let mut minus = net.clone();
                if which == 0 {
                    plus.m[j] += h;
                    minus.m[j] -= h;
                } else {
                    plus.v[j] += h;
                    minus.v[j] -= h;
                }
                let numeric = (plus.kl_term() - minus.kl_term()) / (2.0 * h);
                let analytic = if which == 0 { grads.m[j] } else { grads.v[j] };
                assert!((numeric - analytic).abs() < 1e-6, "{} vs {}", numeric, analytic);
            }
        }
    }

    /// L = Σ output ⊙ r under a fixed noise stream.
    fn weighted_output(net: &HalfNet, rows: ArrayView2<f64>, k: usize, r: &Array2<f64>) -> f64 {
        let trace = net
            .forward_trace(rows, k, &mut GaussianNoise::with_seed(21))
            .unwrap();
        (&trace.output * r).sum()
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        let net = random_net(&[3, 4, 2], 13);
        let k = 2;
        let x = random_inputs(k, 3, 3, 14);
        let rows = x.to_shape((k * 3, 3)).unwrap().to_owned();
        let r = Array2::from_shape_fn((k * 3, 2), |(i, j)| ((i * 2 + j) as f64 * 0.7).sin());

        let trace = net
            .forward_trace(rows.view(), k, &mut GaussianNoise::with_seed(21))
            .unwrap();
        let (grads, grad_in) = net.backward(&trace, r.clone()).unwrap();

        let h = 1e-5;
        let close = |numeric: f64, analytic: f64| {
            (numeric - analytic).abs() < 1e-6 * analytic.abs().max(1.0)
        };

        for j in 0..net.no_weights() {
            let mut plus = net.clone();
            let mut minus = net.clone();
            plus.m[j] += h;
            minus.m[j] -= h;
            let numeric = (weighted_output(&plus, rows.view(), k, &r)
                - weighted_output(&minus, rows.view(), k, &r))
                / (2.0 * h);
            assert!(close(numeric, grads.m[j]), "dm[{}]: {} vs {}", j, numeric, grads.m[j]);

            let mut plus = net.clone();
            let mut minus = net.clone();
            plus.v[j] += h;
            minus.v[j] -= h;
            let numeric = (weighted_output(&plus, rows.view(), k, &r)
                - weighted_output(&minus, rows.view(), k, &r))
                / (2.0 * h);
            assert!(close(numeric, grads.v[j]), "dv[{}]: {} vs {}", j, numeric, grads.v[j]);
        }

        for idx in [(0, 0), (2, 1), (5, 2)] {
            let mut plus = rows.clone();
            let mut minus = rows.clone();
            plus[idx] += h;
            minus[idx] -= h;
            let numeric = (weighted_output(&net, plus.view(), k, &r)
                - weighted_output(&net, minus.view(), k, &r))
                / (2.0 * h);
            assert!(close(numeric, grad_in[idx]), "dx{:?}: {} vs {}", idx, numeric, grad_in[idx]);
        }
    }

    #[test]
    fn test_assign_and_prior_validation() {
        let mut net = HalfNet::new(&[4, 5]).unwrap();
        assert!(net.assign(&[0.0; 3], &[0.0; 25]).is_err());
        assert!(net.set_prior(Prior::isotropic(24, 0.0, 1.0)).is_err());
        assert!(net.set_prior(Prior::isotropic(25, 0.0, 0.0)).is_err());
        assert!(net.set_prior(Prior::isotropic(25, 0.0, 0.1)).is_ok());
        assert!(matches!(HalfNet::new(&[]), Err(MfviError::EmptySize)));
    }

    #[test]
    fn test_posterior_as_prior() {
        let net = random_net(&[2, 2], 3);
        let prior = net.posterior_as_prior();
        assert_eq!(prior.mean, net.mean());
        for (p, v) in prior.variance.iter().zip(net.log_variance()) {
            assert!((p.ln() - v).abs() < 1e-12);
        }
    }
}

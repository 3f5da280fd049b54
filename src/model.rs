//! Multi-head MFVI network: one shared lower [`HalfNet`], one upper head per task.
//!
//! # Objective
//!
//! For task `t` the cost minimised during training is the negative ELBO
//! scaled per data point:
//!
//! ```text
//! cost_t = (KL_lower + KL_upper_t) / training_size - E_q[log p(y | x)]
//! ```
//!
//! The expectation is the mean softmax cross-entropy over `no_train_samples`
//! stochastic forward passes. Because the KL term does not depend on the
//! minibatch, dividing it by the full training set size keeps it on the same
//! scale as the per-example likelihood.
//!
//! # Sessions
//!
//! Training state (Adam moments) lives in a [`Session`] that mutably borrows
//! the model for one task. Dropping the session releases it; nothing can read
//! or assign weights while a session is open except through the session.

use crate::activation::Activation;
use crate::error::{MfviError, Result};
use crate::halfnet::{Gradients, HalfNet, Prior};
use crate::loss::{softmax, softmax_cross_entropy};
use crate::noise::{derive_seed, GaussianNoise, NoiseSource};
use crate::optimizer::Adam;
use ndarray::{concatenate, s, Array2, Array3, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// Rows per forward pass in [`MfviNn::predict`].
pub const PREDICT_BATCH_SIZE: usize = 100;

/// Model hyper-parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Monte-Carlo samples per training forward pass
    pub no_train_samples: usize,
    /// Monte-Carlo samples per prediction forward pass
    pub no_test_samples: usize,
    /// Seed for the noise and shuffling streams
    pub seed: u64,
    pub activation: Activation,
    /// Initial prior mean for every parameter
    pub prior_mean: f64,
    /// Initial prior variance for every parameter
    pub prior_variance: f64,
    /// Initial posterior log-variance for every parameter
    pub init_log_variance: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            no_train_samples: 10,
            no_test_samples: 100,
            seed: 0,
            activation: Activation::Tanh,
            prior_mean: 0.0,
            prior_variance: 1.0,
            init_log_variance: 0.0,
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        if self.no_train_samples == 0 || self.no_test_samples == 0 {
            return Err(MfviError::InvalidConfig("sample counts must be at least 1".into()));
        }
        if !(self.prior_variance.is_finite() && self.prior_variance > 0.0) {
            return Err(MfviError::InvalidConfig(format!(
                "prior variance must be positive, got {}",
                self.prior_variance
            )));
        }
        Ok(())
    }
}

/// Training loop settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    pub no_epochs: usize,
    /// Clamped to the dataset size.
    pub batch_size: usize,
    /// Log the running cost every `display_epoch` epochs (0 = never).
    pub display_epoch: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            no_epochs: 1000,
            batch_size: 100,
            display_epoch: 5,
        }
    }
}

/// A sub-network posterior: `(mean, log_variance)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    pub mean: Vec<f64>,
    pub log_variance: Vec<f64>,
}

impl Posterior {
    fn of(net: &HalfNet) -> Self {
        Self {
            mean: net.mean().to_vec(),
            log_variance: net.log_variance().to_vec(),
        }
    }
}

/// Multi-head Bayesian neural network trained by mean-field VI.
///
/// # Example
///
/// ```rust
/// use mfvi::{MfviNn, ModelConfig, TrainOptions};
/// use ndarray::Array2;
///
/// let config = ModelConfig { no_train_samples: 1, no_test_samples: 4, ..Default::default() };
/// let mut model = MfviNn::with_config(&[4, 5], &[vec![5, 3]], config).unwrap();
///
/// let x = Array2::from_shape_fn((10, 4), |(i, j)| ((i + j) as f64).sin());
/// let y = Array2::from_shape_fn((10, 3), |(i, j)| if i % 3 == j { 1.0 } else { 0.0 });
///
/// let mut session = model.init_session(0, 1e-3).unwrap();
/// let opts = TrainOptions { no_epochs: 2, batch_size: 10, display_epoch: 1 };
/// let costs = session.train(x.view(), y.view(), &opts).unwrap();
/// session.close();
///
/// assert_eq!(costs.len(), 2);
/// let logits = model.predict(x.view(), 0).unwrap();
/// assert_eq!(logits.dim(), (4, 10, 3));
/// ```
#[derive(Clone, Debug)]
pub struct MfviNn {
    lower_size: Vec<usize>,
    upper_sizes: Vec<Vec<usize>>,
    config: ModelConfig,
    lower_net: HalfNet,
    upper_nets: Vec<HalfNet>,
    noise: GaussianNoise,
    shuffle_rng: ChaCha8Rng,
}

impl MfviNn {
    /// Create with default configuration.
    pub fn new(lower_size: &[usize], upper_sizes: &[Vec<usize>]) -> Result<Self> {
        Self::with_config(lower_size, upper_sizes, ModelConfig::default())
    }

    /// Create with explicit configuration.
    ///
    /// Every upper size must start at the lower network's output width.
    pub fn with_config(
        lower_size: &[usize],
        upper_sizes: &[Vec<usize>],
        config: ModelConfig,
    ) -> Result<Self> {
        config.validate()?;
        if upper_sizes.is_empty() {
            return Err(MfviError::InvalidConfig("at least one task head is required".into()));
        }

        let lower_net = Self::build_net(lower_size, &config)?;
        let upper_nets = upper_sizes
            .iter()
            .map(|size| {
                let net = Self::build_net(size, &config)?;
                if net.input_dim() != lower_net.output_dim() {
                    return Err(MfviError::ShapeMismatch {
                        context: "upper head input width",
                        expected: lower_net.output_dim(),
                        got: net.input_dim(),
                    });
                }
                Ok(net)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            lower = ?lower_size,
            no_tasks = upper_nets.len(),
            seed = config.seed,
            "built MFVI network"
        );

        Ok(Self {
            lower_size: lower_size.to_vec(),
            upper_sizes: upper_sizes.to_vec(),
            noise: GaussianNoise::derived(config.seed, "mc_noise"),
            shuffle_rng: ChaCha8Rng::seed_from_u64(derive_seed(config.seed, "shuffle")),
            config,
            lower_net,
            upper_nets,
        })
    }

    fn build_net(size: &[usize], config: &ModelConfig) -> Result<HalfNet> {
        let mut net = HalfNet::with_activation(size, config.activation)?;
        net.fill_log_variance(config.init_log_variance);
        let prior = Prior::isotropic(net.no_weights(), config.prior_mean, config.prior_variance);
        net.set_prior(prior)?;
        Ok(net)
    }

    // --- Accessors ---

    pub fn no_tasks(&self) -> usize {
        self.upper_nets.len()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn lower_size(&self) -> &[usize] {
        &self.lower_size
    }

    pub fn upper_sizes(&self) -> &[Vec<usize>] {
        &self.upper_sizes
    }

    pub fn lower_net(&self) -> &HalfNet {
        &self.lower_net
    }

    pub fn upper_net(&self, task_idx: usize) -> Result<&HalfNet> {
        self.check_task(task_idx)?;
        Ok(&self.upper_nets[task_idx])
    }

    // --- Session ---

    /// Open a training session for `task_idx` with an Adam optimizer.
    pub fn init_session(&mut self, task_idx: usize, learning_rate: f64) -> Result<Session<'_>> {
        self.check_task(task_idx)?;
        let optimizer = Adam::new(learning_rate)?;
        debug!(task = task_idx, learning_rate, "session opened");
        Ok(Session {
            model: self,
            task_idx,
            optimizer,
        })
    }

    // --- Objective ---

    /// Evaluate `cost_t` once on `(x, y)` with `no_train_samples` passes.
    pub fn cost(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
        task_idx: usize,
        training_size: usize,
    ) -> Result<f64> {
        self.check_task(task_idx)?;
        self.check_data(x, y, task_idx)?;
        let k = self.config.no_train_samples;
        let Self {
            lower_net,
            upper_nets,
            noise,
            ..
        } = self;
        let upper_net = &upper_nets[task_idx];
        let objective = task_objective(lower_net, upper_net, x, y, training_size, k, noise)?;
        Ok(objective.cost)
    }

    // --- Prediction ---

    /// Sampled logits `(no_test_samples, N, classes)`, computed in batches of
    /// [`PREDICT_BATCH_SIZE`] rows and concatenated along the batch axis.
    pub fn predict(&mut self, x: ArrayView2<f64>, task_idx: usize) -> Result<Array3<f64>> {
        self.check_task(task_idx)?;
        let n = x.nrows();
        if n == 0 {
            return Err(MfviError::EmptyDataset);
        }
        let mut batches = Vec::with_capacity(n.div_ceil(PREDICT_BATCH_SIZE));
        for start in (0..n).step_by(PREDICT_BATCH_SIZE) {
            let end = (start + PREDICT_BATCH_SIZE).min(n);
            batches.push(self.sample_logits(x.slice(s![start..end, ..]), task_idx)?);
        }
        let views: Vec<_> = batches.iter().map(|b| b.view()).collect();
        Ok(concatenate(Axis(1), &views)?)
    }

    /// Softmax probabilities `(no_test_samples, N, classes)` from one
    /// full-batch pass.
    pub fn predict_prob(&mut self, x: ArrayView2<f64>, task_idx: usize) -> Result<Array3<f64>> {
        self.check_task(task_idx)?;
        if x.nrows() == 0 {
            return Err(MfviError::EmptyDataset);
        }
        let logits = self.sample_logits(x, task_idx)?;
        Ok(softmax(logits.view()))
    }

    fn sample_logits(&mut self, x: ArrayView2<f64>, task_idx: usize) -> Result<Array3<f64>> {
        let k = self.config.no_test_samples;
        let rows = replicate(x, k)?;
        let lower = self.lower_net.forward_trace(rows.view(), k, &mut self.noise)?;
        let upper_net = &self.upper_nets[task_idx];
        let upper = upper_net.forward_trace(lower.output.view(), k, &mut self.noise)?;
        let classes = upper.output.ncols();
        Ok(upper.output.into_shape_with_order((k, x.nrows(), classes))?)
    }

    // --- Weight exchange ---

    /// Current `(lower, upper_t)` posteriors.
    pub fn get_weights(&self, task_idx: usize) -> Result<(Posterior, Posterior)> {
        self.check_task(task_idx)?;
        Ok((
            Posterior::of(&self.lower_net),
            Posterior::of(&self.upper_nets[task_idx]),
        ))
    }

    /// Overwrite the lower and task-`t` upper posteriors.
    ///
    /// Both posteriors are validated before either network is modified.
    pub fn assign_weights(
        &mut self,
        task_idx: usize,
        lower: &Posterior,
        upper: &Posterior,
    ) -> Result<()> {
        self.check_task(task_idx)?;
        let mut lower_net = self.lower_net.clone();
        let mut upper_net = self.upper_nets[task_idx].clone();
        lower_net.assign(&lower.mean, &lower.log_variance)?;
        upper_net.assign(&upper.mean, &upper.log_variance)?;
        self.lower_net = lower_net;
        self.upper_nets[task_idx] = upper_net;
        debug!(task = task_idx, "assigned weights");
        Ok(())
    }

    // --- Priors ---

    /// Replace the priors of the lower network and the task-`t` head.
    pub fn set_priors(&mut self, task_idx: usize, lower: Prior, upper: Prior) -> Result<()> {
        self.check_task(task_idx)?;
        let mut lower_net = self.lower_net.clone();
        lower_net.set_prior(lower)?;
        self.upper_nets[task_idx].set_prior(upper)?;
        self.lower_net = lower_net;
        Ok(())
    }

    /// Make the current lower and task-`t` posteriors the priors for
    /// subsequent training.
    pub fn carry_posterior_to_prior(&mut self, task_idx: usize) -> Result<()> {
        self.check_task(task_idx)?;
        let lower = self.lower_net.posterior_as_prior();
        let upper = self.upper_nets[task_idx].posterior_as_prior();
        self.set_priors(task_idx, lower, upper)
    }

    // --- Persistence hooks ---

    pub(crate) fn parts(&self) -> (&HalfNet, &[HalfNet]) {
        (&self.lower_net, &self.upper_nets)
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut HalfNet, &mut [HalfNet]) {
        (&mut self.lower_net, &mut self.upper_nets)
    }

    // --- Validation ---

    fn check_task(&self, task_idx: usize) -> Result<()> {
        if task_idx >= self.upper_nets.len() {
            return Err(MfviError::TaskOutOfRange {
                task: task_idx,
                no_tasks: self.upper_nets.len(),
            });
        }
        Ok(())
    }

    fn check_data(&self, x: ArrayView2<f64>, y: ArrayView2<f64>, task_idx: usize) -> Result<()> {
        if x.nrows() == 0 {
            return Err(MfviError::EmptyDataset);
        }
        if y.nrows() != x.nrows() {
            return Err(MfviError::ShapeMismatch {
                context: "target rows",
                expected: x.nrows(),
                got: y.nrows(),
            });
        }
        let classes = self.upper_nets[task_idx].output_dim();
        if y.ncols() != classes {
            return Err(MfviError::ShapeMismatch {
                context: "target width",
                expected: classes,
                got: y.ncols(),
            });
        }
        Ok(())
    }
}

/// A training session for one task.
///
/// Holds the optimizer state; dropping the session (or calling
/// [`close`](Session::close)) releases it.
#[derive(Debug)]
pub struct Session<'a> {
    model: &'a mut MfviNn,
    task_idx: usize,
    optimizer: Adam,
}

impl Session<'_> {
    pub fn task_idx(&self) -> usize {
        self.task_idx
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.lr()
    }

    pub fn model(&self) -> &MfviNn {
        &*self.model
    }

    pub fn model_mut(&mut self) -> &mut MfviNn {
        &mut *self.model
    }

    /// Train the session's task and return the per-epoch average cost.
    ///
    /// Each epoch reshuffles the data; `batch_size` larger than the dataset
    /// is clamped to one full batch.
    pub fn train(
        &mut self,
        x_train: ArrayView2<f64>,
        y_train: ArrayView2<f64>,
        opts: &TrainOptions,
    ) -> Result<Vec<f64>> {
        let task_idx = self.task_idx;
        self.model.check_data(x_train, y_train, task_idx)?;
        if opts.batch_size == 0 {
            return Err(MfviError::InvalidConfig("batch size must be at least 1".into()));
        }

        let n = x_train.nrows();
        let batch_size = if opts.batch_size > n {
            warn!(requested = opts.batch_size, n, "batch size clamped to dataset size");
            n
        } else {
            opts.batch_size
        };
        let k = self.model.config.no_train_samples;

        let MfviNn {
            lower_net,
            upper_nets,
            noise,
            shuffle_rng,
            ..
        } = &mut *self.model;
        let upper_net = &mut upper_nets[task_idx];

        let mut costs = Vec::with_capacity(opts.no_epochs);
        let mut perm: Vec<usize> = (0..n).collect();

        for epoch in 0..opts.no_epochs {
            perm.shuffle(shuffle_rng);
            let cur_x = x_train.select(Axis(0), &perm);
            let cur_y = y_train.select(Axis(0), &perm);

            let mut avg_cost = 0.0;
            for start in (0..n).step_by(batch_size) {
                let end = (start + batch_size).min(n);
                let batch_x = cur_x.slice(s![start..end, ..]);
                let batch_y = cur_y.slice(s![start..end, ..]);

                let objective =
                    task_objective(lower_net, upper_net, batch_x, batch_y, n, k, noise)?;
                let (lower_m, lower_v) = lower_net.params_mut();
                let (upper_m, upper_v) = upper_net.params_mut();
                self.optimizer.step(&mut [
                    (lower_m, &objective.lower.m[..]),
                    (lower_v, &objective.lower.v[..]),
                    (upper_m, &objective.upper.m[..]),
                    (upper_v, &objective.upper.v[..]),
                ])?;

                trace!(epoch, start, cost = objective.cost, "minibatch step");
                avg_cost += objective.cost * (end - start) as f64 / n as f64;
            }

            if opts.display_epoch > 0 && epoch % opts.display_epoch == 0 {
                info!(task = task_idx, epoch = epoch + 1, cost = avg_cost, "epoch");
            }
            costs.push(avg_cost);
        }

        info!(task = task_idx, epochs = opts.no_epochs, "optimization finished");
        Ok(costs)
    }

    /// End the session.
    pub fn close(self) {}
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        debug!(
            task = self.task_idx,
            steps = self.optimizer.steps(),
            "session closed"
        );
    }
}

/// Task cost and its gradients for the two sub-networks involved.
struct Objective {
    cost: f64,
    lower: Gradients,
    upper: Gradients,
}

fn task_objective<N: NoiseSource + ?Sized>(
    lower_net: &HalfNet,
    upper_net: &HalfNet,
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    training_size: usize,
    no_samples: usize,
    noise: &mut N,
) -> Result<Objective> {
    if training_size == 0 {
        return Err(MfviError::InvalidConfig("training_size must be at least 1".into()));
    }
    let rows = replicate(x, no_samples)?;
    let targets = replicate(y, no_samples)?;

    let lower_trace = lower_net.forward_trace(rows.view(), no_samples, noise)?;
    let upper_trace = upper_net.forward_trace(lower_trace.output.view(), no_samples, noise)?;

    // -E_q[log p(y|x)]
    let (nll, d_logits) = softmax_cross_entropy(upper_trace.output.view(), targets.view())?;
    let kl_scale = 1.0 / training_size as f64;
    let kl = lower_net.kl_term() + upper_net.kl_term();

    let (mut upper, d_lower_out) = upper_net.backward(&upper_trace, d_logits)?;
    let (mut lower, _) = lower_net.backward(&lower_trace, d_lower_out)?;
    upper.add_scaled(&upper_net.kl_gradient(), kl_scale);
    lower.add_scaled(&lower_net.kl_gradient(), kl_scale);

    Ok(Objective {
        cost: kl * kl_scale + nll,
        lower,
        upper,
    })
}

/// Stack `no_samples` copies of `x` into sample-major rows.
fn replicate(x: ArrayView2<f64>, no_samples: usize) -> Result<Array2<f64>> {
    let copies = vec![x; no_samples];
    Ok(concatenate(Axis(0), &copies)?)
}

// =============================================================================
// Tests
// =============================================================================

//! # mfvi: Multi-head Bayesian Neural Networks by Mean-Field VI
//!
//! A fully connected network whose weights carry a factorised Gaussian
//! posterior `q(w) = N(m, exp(v))`, trained by minimising the negative ELBO
//! with the local reparameterization trick. A shared lower network feeds one
//! upper head per task, which is the setup used for continual learning.
//!
//! ## Quick Start
//!
//! ```rust
//! use mfvi::{MfviNn, ModelConfig, TrainOptions};
//! use ndarray::Array2;
//!
//! let config = ModelConfig { no_train_samples: 2, no_test_samples: 5, ..Default::default() };
//! let mut model = MfviNn::with_config(&[2, 8], &[vec![8, 2]], config)?;
//!
//! let x = Array2::from_shape_fn((20, 2), |(i, j)| if i % 2 == j { 1.0 } else { -1.0 });
//! let y = Array2::from_shape_fn((20, 2), |(i, j)| if i % 2 == j { 1.0 } else { 0.0 });
//!
//! // Training state lives in a session bound to one task
//! let mut session = model.init_session(0, 1e-2)?;
//! let opts = TrainOptions { no_epochs: 5, batch_size: 10, display_epoch: 0 };
//! let costs = session.train(x.view(), y.view(), &opts)?;
//! session.close();
//! assert_eq!(costs.len(), 5);
//!
//! // (no_test_samples, N, classes)
//! let probs = model.predict_prob(x.view(), 0)?;
//! assert_eq!(probs.dim(), (5, 20, 2));
//! # Ok::<(), mfvi::MfviError>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Packing**: each sub-network's `(m, v)` is one flat vector, layer by
//!   layer, weights (row-major `[din, dout]`) before biases
//! - **HalfNet**: one stochastic sub-network with its prior and closed-form KL
//! - **MfviNn**: lower net + per-task heads, ELBO cost, training, prediction
//! - **Session**: scoped Adam state for training one task

pub mod activation;
pub mod error;
pub mod halfnet;
pub mod loss;
pub mod model;
pub mod noise;
pub mod optimizer;
pub mod snapshot;
pub mod weights;

// Re-exports for convenience
pub use activation::Activation;
pub use error::{MfviError, Result};
pub use halfnet::{Gradients, HalfNet, Prior};
pub use model::{MfviNn, ModelConfig, Posterior, Session, TrainOptions};
pub use noise::{GaussianNoise, NoiseSource, ZeroNoise};
pub use optimizer::Adam;
pub use snapshot::{HalfNetSnapshot, ModelSnapshot};
pub use weights::{create_weights, no_weights, unpack_weights};

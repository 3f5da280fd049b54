//! Serializable model state for persistence and distribution.
//!
//! A snapshot carries the layer sizes, configuration, posteriors and priors
//! of every sub-network. Optimizer state is not part of a snapshot; the
//! restored model's noise and shuffling streams restart from the configured
//! seed.
//!
//! ```rust
//! use mfvi::{MfviNn, ModelSnapshot};
//!
//! let model = MfviNn::new(&[2, 4], &[vec![4, 3]]).unwrap();
//! let json = serde_json::to_string(&model.snapshot()).unwrap();
//!
//! let snap: ModelSnapshot = serde_json::from_str(&json).unwrap();
//! let restored = MfviNn::from_snapshot(snap).unwrap();
//! assert_eq!(restored.get_weights(0).unwrap(), model.get_weights(0).unwrap());
//! ```

use crate::activation::Activation;
use crate::error::{MfviError, Result};
use crate::halfnet::{HalfNet, Prior};
use crate::model::{MfviNn, ModelConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Serializable state of one [`HalfNet`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HalfNetSnapshot {
    pub size: Vec<usize>,
    pub activation: Activation,
    /// Flat packed posterior means.
    pub mean: Vec<f64>,
    /// Flat packed posterior log-variances.
    pub log_variance: Vec<f64>,
    pub prior: Prior,
}

impl HalfNet {
    /// Export state for persistence.
    pub fn snapshot(&self) -> HalfNetSnapshot {
        HalfNetSnapshot {
            size: self.size().to_vec(),
            activation: self.activation(),
            mean: self.mean().to_vec(),
            log_variance: self.log_variance().to_vec(),
            prior: self.prior().clone(),
        }
    }

    /// Restore from a snapshot, validating every length against `size`.
    pub fn from_snapshot(snap: HalfNetSnapshot) -> Result<Self> {
        let mut net = HalfNet::with_activation(&snap.size, snap.activation)?;
        net.assign(&snap.mean, &snap.log_variance)?;
        net.set_prior(snap.prior)?;
        Ok(net)
    }
}

/// Serializable state of an [`MfviNn`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub config: ModelConfig,
    pub lower: HalfNetSnapshot,
    /// One entry per task head.
    pub upper: Vec<HalfNetSnapshot>,
}

impl ModelSnapshot {
    /// Persist to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path.as_ref(), json)?;
        debug!(path = %path.as_ref().display(), "saved model snapshot");
        Ok(())
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl MfviNn {
    /// Export posteriors, priors and configuration.
    pub fn snapshot(&self) -> ModelSnapshot {
        let (lower, upper) = self.parts();
        ModelSnapshot {
            config: self.config().clone(),
            lower: lower.snapshot(),
            upper: upper.iter().map(HalfNet::snapshot).collect(),
        }
    }

    /// Rebuild a model from a snapshot.
    ///
    /// Every sub-network must use the activation named in the configuration.
    pub fn from_snapshot(snap: ModelSnapshot) -> Result<Self> {
        let activation = snap.config.activation;
        if let Some(net) = std::iter::once(&snap.lower)
            .chain(&snap.upper)
            .find(|net| net.activation != activation)
        {
            return Err(MfviError::InvalidConfig(format!(
                "sub-network activation {:?} differs from configured {:?}",
                net.activation, activation
            )));
        }
        let upper_sizes: Vec<Vec<usize>> = snap.upper.iter().map(|u| u.size.clone()).collect();
        let mut model = MfviNn::with_config(&snap.lower.size, &upper_sizes, snap.config)?;

        let lower = HalfNet::from_snapshot(snap.lower)?;
        let upper = snap
            .upper
            .into_iter()
            .map(HalfNet::from_snapshot)
            .collect::<Result<Vec<_>>>()?;

        let (lower_slot, upper_slots) = model.parts_mut();
        *lower_slot = lower;
        for (slot, net) in upper_slots.iter_mut().zip(upper) {
            *slot = net;
        }
        Ok(model)
    }
}

// =============================================================================
// Tests
// =============================================================================

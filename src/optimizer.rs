//! Adam over flat parameter vectors.

use crate::error::{MfviError, Result};

/// Adam (Kingma & Ba) with bias-corrected moment estimates.
///
/// Moment buffers are allocated lazily per parameter slot on the first step;
/// slots must be passed in the same order on every call.
#[derive(Clone, Debug)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
    t: usize,
}

impl Adam {
    pub fn new(lr: f64) -> Result<Self> {
        Self::with_params(lr, 0.9, 0.999, 1e-8)
    }

    pub fn with_params(lr: f64, beta1: f64, beta2: f64, epsilon: f64) -> Result<Self> {
        if !(lr.is_finite() && lr > 0.0) {
            return Err(MfviError::InvalidConfig(format!(
                "learning rate must be positive, got {lr}"
            )));
        }
        Ok(Self {
            lr,
            beta1,
            beta2,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        })
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> usize {
        self.t
    }

    /// Apply one update to every `(param, grad)` slot.
    ///
    /// Nothing is updated if any slot's parameter and gradient lengths differ,
    /// or if a slot changed length since its moments were allocated.
    pub fn step(&mut self, slots: &mut [(&mut [f64], &[f64])]) -> Result<()> {
        for (idx, (param, grad)) in slots.iter().enumerate() {
            let expected = self.m.get(idx).map_or(param.len(), Vec::len);
            for got in [param.len(), grad.len()] {
                if got != expected {
                    return Err(MfviError::ShapeMismatch {
                        context: "optimizer slot",
                        expected,
                        got,
                    });
                }
            }
        }

        self.t += 1;
        let bias1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias2 = 1.0 - self.beta2.powi(self.t as i32);

        for (idx, (param, grad)) in slots.iter_mut().enumerate() {
            if self.m.len() <= idx {
                self.m.push(vec![0.0; param.len()]);
                self.v.push(vec![0.0; param.len()]);
            }
            let (m, v) = (&mut self.m[idx], &mut self.v[idx]);
            for i in 0..param.len() {
                let g = grad[i];
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                param[i] -= self.lr * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_lr() {
        assert!(Adam::new(0.0).is_err());
        assert!(Adam::new(-1e-3).is_err());
        assert!(Adam::new(f64::NAN).is_err());
    }

    #[test]
    fn test_first_step_moves_by_lr() {
        // After bias correction the first step is lr * sign(grad).
        let mut adam = Adam::new(0.1).unwrap();
        let mut p = vec![1.0, -1.0];
        let g = vec![3.0, -0.5];
        adam.step(&mut [(&mut p[..], &g[..])]).unwrap();
        assert!((p[0] - 0.9).abs() < 1e-6);
        assert!((p[1] + 0.9).abs() < 1e-6);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn test_mismatched_slot_is_rejected_without_update() {
        let mut adam = Adam::new(0.1).unwrap();
        let mut p = vec![1.0, 2.0];
        let mut q = vec![0.5];
        let g = vec![1.0];
        let result = adam.step(&mut [(&mut q[..], &g[..]), (&mut p[..], &g[..])]);
        assert!(matches!(
            result,
            Err(MfviError::ShapeMismatch { expected: 2, got: 1, .. })
        ));
        assert_eq!(p, vec![1.0, 2.0]);
        assert_eq!(q, vec![0.5]);
        assert_eq!(adam.steps(), 0);

        // A slot may not change length after its moments exist
        adam.step(&mut [(&mut q[..], &g[..])]).unwrap();
        let mut wider = vec![0.0, 0.0];
        let g2 = vec![1.0, 1.0];
        assert!(adam.step(&mut [(&mut wider[..], &g2[..])]).is_err());
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    fn test_minimises_quadratic() {
        let mut adam = Adam::new(0.01).unwrap();
        let mut x = vec![3.0, -2.0];
        for _ in 0..3000 {
            let g: Vec<f64> = x.iter().map(|xi| 2.0 * (xi - 1.0)).collect();
            adam.step(&mut [(&mut x[..], &g[..])]).unwrap();
        }
        assert!((x[0] - 1.0).abs() < 5e-2, "x0 = {}", x[0]);
        assert!((x[1] - 1.0).abs() < 5e-2, "x1 = {}", x[1]);
    }
}

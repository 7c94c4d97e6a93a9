use ndarray::{Array1, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{check_len, Result};

/// Probabilities are clamped into `[EPSILON, 1 - EPSILON]` before logarithms.
const EPSILON: f64 = 1e-12;

/// Loss between the output layer's prediction and the one-hot target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LossFunction {
    /// `mean((p - t)^2)`, gradient `2 * (p - t) / N`.
    MeanSquaredError,
    /// `-mean(t * ln p + (1 - t) * ln(1 - p))` for outputs in `(0, 1)`.
    BinaryCrossEntropy,
}

impl LossFunction {
    pub fn compute(&self, predicted: &Array1<f64>, target: &Array1<f64>) -> Result<f64> {
        check_len("loss target", predicted.len(), target.len())?;
        let n = predicted.len() as f64;

        let total = match self {
            LossFunction::MeanSquaredError => Zip::from(predicted)
                .and(target)
                .fold(0.0, |loss, &p, &t| loss + (p - t).powi(2)),
            LossFunction::BinaryCrossEntropy => {
                Zip::from(predicted).and(target).fold(0.0, |loss, &p, &t| {
                    let p = p.clamp(EPSILON, 1.0 - EPSILON);
                    loss - (t * p.ln() + (1.0 - t) * (1.0 - p).ln())
                })
            }
        };
        Ok(total / n)
    }

    /// Derivative of [`LossFunction::compute`] with respect to `predicted`.
    ///
    /// Binary cross-entropy is flat outside `[EPSILON, 1 - EPSILON]` where its input
    /// is clamped, so the gradient there is zero.
    pub fn gradient(&self, predicted: &Array1<f64>, target: &Array1<f64>) -> Result<Array1<f64>> {
        check_len("loss target", predicted.len(), target.len())?;
        let n = predicted.len() as f64;

        let grad = match self {
            LossFunction::MeanSquaredError => Zip::from(predicted)
                .and(target)
                .map_collect(|&p, &t| 2.0 * (p - t) / n),
            LossFunction::BinaryCrossEntropy => {
                Zip::from(predicted).and(target).map_collect(|&p, &t| {
                    if (EPSILON..=1.0 - EPSILON).contains(&p) {
                        (p - t) / (p * (1.0 - p)) / n
                    } else {
                        0.0
                    }
                })
            }
        };
        Ok(grad)
    }
}

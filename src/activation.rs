use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Which cached vector an activation's derivative is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeBasis {
    /// The pre-activation value `W · x`.
    WeightedSum,
    /// The activated output `f(W · x)`.
    Output,
}

/// Elementwise activation applied after a layer's weighted sum.
///
/// NaN and infinite inputs are not trapped and propagate under IEEE rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activation {
    Identity,
    /// `1 / (1 + exp(-k * x))`.
    Sigmoid { steepness: f64 },
    Relu,
    /// `x` for `x >= 0`, `alpha * x` otherwise.
    LeakyRelu { alpha: f64 },
}

impl Activation {
    pub const DEFAULT_LEAKY_SLOPE: f64 = 0.01;

    pub fn sigmoid() -> Self {
        Activation::Sigmoid { steepness: 1.0 }
    }

    pub fn leaky_relu() -> Self {
        Activation::LeakyRelu {
            alpha: Self::DEFAULT_LEAKY_SLOPE,
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Activation::Identity => x,
            Activation::Sigmoid { steepness } => 1.0 / (1.0 + (-steepness * x).exp()),
            Activation::Relu => {
                if x > 0.0 {
                    x
                } else {
                    0.0
                }
            }
            Activation::LeakyRelu { alpha } => {
                if x >= 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
        }
    }

    /// Derivative at one point. `value` must be taken from the cache named by
    /// [`Activation::basis`].
    pub fn derivative_at(&self, value: f64) -> f64 {
        match *self {
            Activation::Identity => 1.0,
            Activation::Sigmoid { steepness } => steepness * value * (1.0 - value),
            Activation::Relu => {
                if value > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyRelu { alpha } => {
                if value >= 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
        }
    }

    /// Sigmoid is differentiated through its output to avoid another `exp`.
    pub fn basis(&self) -> DerivativeBasis {
        match self {
            Activation::Sigmoid { .. } => DerivativeBasis::Output,
            Activation::Identity | Activation::Relu | Activation::LeakyRelu { .. } => {
                DerivativeBasis::WeightedSum
            }
        }
    }

    pub fn compute(&self, x: &Array1<f64>) -> Array1<f64> {
        x.mapv(|v| self.apply(v))
    }

    /// Elementwise derivative given both caches of a forward pass.
    pub fn derivative(&self, weighted_sums: &Array1<f64>, outputs: &Array1<f64>) -> Array1<f64> {
        let basis = match self.basis() {
            DerivativeBasis::WeightedSum => weighted_sums,
            DerivativeBasis::Output => outputs,
        };
        basis.mapv(|v| self.derivative_at(v))
    }
}

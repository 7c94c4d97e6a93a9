//! A small multi-layer perceptron trained by per-sample backpropagation.
//!
//! ```no_run
//! use perceptron::{Activation, LayerSpec, LossFunction, NetworkBuilder};
//!
//! # fn main() -> perceptron::Result<()> {
//! let network = NetworkBuilder::new()
//!     .input_size(28 * 28)
//!     .layer(LayerSpec::new(128, Activation::leaky_relu(), 0.001))
//!     .layer(LayerSpec::new(10, Activation::Sigmoid { steepness: 2.0 }, 0.001))
//!     .max_epochs(30)
//!     .loss(LossFunction::MeanSquaredError)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod config;
pub mod data;
pub mod error;
pub mod layer;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod state;

pub use activation::{Activation, DerivativeBasis};
pub use config::NetworkConfig;
pub use data::Sample;
pub use error::{Error, Result};
pub use layer::Layer;
pub use loss::LossFunction;
pub use metrics::{evaluate, ConfusionMatrix, Evaluation};
pub use network::{EpochReport, LayerSpec, Network, NetworkBuilder, TrainingSummary};
pub use state::{LayerState, NetworkState};

/// Elementwise `assert_relative_eq!` over two 1D arrays of the same shape.
/// Extra arguments are forwarded to `assert_relative_eq!`; by default
/// `max_relative = 1e-12`.
#[macro_export]
macro_rules! assert_rel_eq_arr1 {
    ($actual:expr, $expected:expr) => {
        $crate::assert_rel_eq_arr1!($actual, $expected, max_relative = 1e-12)
    };
    ($actual:expr, $expected:expr, $($opt:tt)+) => {{
        let (actual, expected) = (&$actual, &$expected);
        assert_eq!(actual.shape(), expected.shape());
        ndarray::Zip::from(actual.view())
            .and(expected.view())
            .for_each(|v, w| {
                assert_relative_eq!(v, w, $($opt)+);
            });
    }};
}

/// Same as [`assert_rel_eq_arr1!`] for 2D arrays.
#[macro_export]
macro_rules! assert_rel_eq_arr2 {
    ($actual:expr, $expected:expr) => {
        $crate::assert_rel_eq_arr2!($actual, $expected, max_relative = 1e-12)
    };
    ($actual:expr, $expected:expr, $($opt:tt)+) => {{
        let (actual, expected) = (&$actual, &$expected);
        assert_eq!(actual.shape(), expected.shape());
        ndarray::Zip::from(actual.view())
            .and(expected.view())
            .for_each(|v, w| {
                assert_relative_eq!(v, w, $($opt)+);
            });
    }};
}

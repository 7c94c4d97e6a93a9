//! JSON configuration of a network's architecture and hyperparameters.
//!
//! ```json
//! {
//!   "input_size": 784,
//!   "layers": [
//!     { "neurons": 128, "activation": { "type": "leaky_relu", "alpha": 0.01 }, "learning_rate": 0.001 },
//!     { "neurons": 10, "activation": { "type": "sigmoid", "steepness": 2.0 }, "learning_rate": 0.001 }
//!   ],
//!   "max_epochs": 30,
//!   "loss": { "type": "mean_squared_error" },
//!   "save_on": "mlp-architecture.json"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::loss::LossFunction;
use crate::network::{LayerSpec, NetworkBuilder};

/// Deserialized form of a [`NetworkBuilder`]. Validation happens in
/// [`NetworkBuilder::build`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    pub input_size: usize,
    pub layers: Vec<LayerSpec>,
    pub max_epochs: usize,
    pub loss: LossFunction,
    /// Where the trained network is written.
    pub save_on: Option<PathBuf>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub shuffle: bool,
}

impl NetworkConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn into_builder(self) -> NetworkBuilder {
        let mut builder = NetworkBuilder::new()
            .input_size(self.input_size)
            .layers(self.layers)
            .max_epochs(self.max_epochs)
            .loss(self.loss)
            .shuffle(self.shuffle);
        if let Some(path) = self.save_on {
            builder = builder.save_on(path);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder
    }
}

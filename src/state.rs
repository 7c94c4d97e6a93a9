//! Structured form of layers and networks, persisted as JSON.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::loss::LossFunction;
use crate::network::Network;

/// Weights of one layer in row-major order; the last column holds the biases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub rows: usize,
    pub cols: usize,
    pub weights: Vec<f64>,
    pub activation: Activation,
    pub learning_rate: f64,
}

/// Architecture and weights of a network, layers keyed by their position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    pub input_size: usize,
    pub max_epochs: usize,
    pub loss: LossFunction,
    pub layers: BTreeMap<usize, LayerState>,
}

impl Layer {
    pub fn to_state(&self) -> LayerState {
        let (rows, cols) = self.weights().dim();
        LayerState {
            rows,
            cols,
            weights: self.weights().iter().copied().collect(),
            activation: self.activation(),
            learning_rate: self.learning_rate(),
        }
    }

    pub fn from_state(state: &LayerState) -> Result<Self> {
        let weights = Array2::from_shape_vec((state.rows, state.cols), state.weights.clone())
            .map_err(|err| {
                Error::State(format!(
                    "{} weights do not fill a {}x{} matrix: {}",
                    state.weights.len(),
                    state.rows,
                    state.cols,
                    err
                ))
            })?;
        Layer::with_weights(state.activation, state.learning_rate, weights)
            .map_err(|err| Error::State(err.to_string()))
    }
}

impl Network {
    pub fn to_state(&self) -> NetworkState {
        NetworkState {
            input_size: self.input_size(),
            max_epochs: self.max_epochs(),
            loss: self.loss_function(),
            layers: self
                .layers()
                .iter()
                .enumerate()
                .map(|(index, layer)| (index, layer.to_state()))
                .collect(),
        }
    }

    /// Rebuild a network, checking that layer indices are contiguous and that the
    /// layer dimensions chain from `input_size`.
    pub fn from_state(state: &NetworkState) -> Result<Self> {
        let mut layers = Vec::with_capacity(state.layers.len());
        for (expected, (&index, layer_state)) in state.layers.iter().enumerate() {
            if index != expected {
                return Err(Error::State(format!(
                    "layer indices must be contiguous from 0, found {} at position {}",
                    index, expected
                )));
            }
            layers.push(Layer::from_state(layer_state)?);
        }
        let network = Network::from_layers(layers, state.loss, state.max_epochs)?;
        if network.input_size() != state.input_size {
            return Err(Error::State(format!(
                "input size {} does not match the first layer's {} inputs",
                state.input_size,
                network.input_size()
            )));
        }
        Ok(network)
    }

    /// Write the network to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.to_state())?;
        writer.flush()?;
        tracing::info!(path = %path.display(), "saved network");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let state: NetworkState = serde_json::from_reader(reader)?;
        let network = Network::from_state(&state)?;
        tracing::info!(path = %path.display(), layers = state.layers.len(), "loaded network");
        Ok(network)
    }
}

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use ndarray::Array1;
use ndarray_rand::rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::data::{Sample, Sampler};
use crate::error::{check_len, Error, Result};
use crate::layer::Layer;
use crate::loss::LossFunction;

/// Size, activation and learning rate of one layer, consumed by [`NetworkBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub neurons: usize,
    pub activation: Activation,
    pub learning_rate: f64,
}

impl LayerSpec {
    pub fn new(neurons: usize, activation: Activation, learning_rate: f64) -> Self {
        Self {
            neurons,
            activation,
            learning_rate,
        }
    }
}

/// Fluent configuration of a [`Network`].
#[derive(Debug, Clone, Default)]
pub struct NetworkBuilder {
    input_size: Option<usize>,
    layers: Vec<LayerSpec>,
    max_epochs: Option<usize>,
    loss: Option<LossFunction>,
    save_on: Option<PathBuf>,
    seed: Option<u64>,
    shuffle: bool,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_size(mut self, input_size: usize) -> Self {
        self.input_size = Some(input_size);
        self
    }

    /// Append a layer. The last one appended is the output layer.
    pub fn layer(mut self, spec: LayerSpec) -> Self {
        self.layers.push(spec);
        self
    }

    pub fn layers(mut self, specs: impl IntoIterator<Item = LayerSpec>) -> Self {
        self.layers.extend(specs);
        self
    }

    pub fn max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = Some(max_epochs);
        self
    }

    pub fn loss(mut self, loss: LossFunction) -> Self {
        self.loss = Some(loss);
        self
    }

    /// Persist the network to `path` once training finishes.
    pub fn save_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_on = Some(path.into());
        self
    }

    /// Seed weight initialization and shuffling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// If enabled, visit training samples in a new random order each epoch.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn build(self) -> Result<Network> {
        let input_size = match self.input_size {
            Some(size) if size > 0 => size,
            Some(_) => return Err(Error::Config("input size must be positive".to_owned())),
            None => return Err(Error::Config("input size is required".to_owned())),
        };
        if self.layers.is_empty() {
            return Err(Error::Config("at least one layer is required".to_owned()));
        }
        let max_epochs = match self.max_epochs {
            Some(epochs) if epochs > 0 => epochs,
            Some(_) => return Err(Error::Config("max epochs must be positive".to_owned())),
            None => return Err(Error::Config("max epochs is required".to_owned())),
        };
        let loss = self
            .loss
            .ok_or_else(|| Error::Config("loss function is required".to_owned()))?;

        for (index, spec) in self.layers.iter().enumerate() {
            if spec.neurons == 0 {
                return Err(Error::Config(format!("layer {} has no neurons", index)));
            }
            if !(spec.learning_rate.is_finite() && spec.learning_rate > 0.0) {
                return Err(Error::Config(format!(
                    "layer {} has learning rate {}, expected a positive number",
                    index, spec.learning_rate
                )));
            }
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut layers = Vec::with_capacity(self.layers.len());
        let mut layer_input = input_size;
        for spec in &self.layers {
            layers.push(Layer::new(
                layer_input,
                spec.neurons,
                spec.activation,
                spec.learning_rate,
                &mut rng,
            )?);
            layer_input = spec.neurons;
        }

        let sampler = if self.shuffle {
            Sampler::Random(rng)
        } else {
            Sampler::Sequential
        };

        tracing::info!(
            input_size,
            layers = ?self.layers.iter().map(|spec| spec.neurons).collect::<Vec<_>>(),
            max_epochs,
            ?loss,
            "built network"
        );

        Ok(Network {
            layers,
            loss,
            max_epochs,
            save_on: self.save_on,
            sampler,
        })
    }
}

/// Progress handed to the epoch callback of [`Network::train`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// Zero-based index of the finished epoch.
    pub epoch: usize,
    /// Mean per-sample loss observed during the pass, before each sample's update.
    pub mean_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub last_epoch: Option<EpochReport>,
}

/// Multi-layer perceptron: an ordered chain of layers and the loss applied to the last.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    loss: LossFunction,
    max_epochs: usize,
    save_on: Option<PathBuf>,
    sampler: Sampler,
}

impl Network {
    /// Assemble a network from existing layers, checking that they chain.
    pub(crate) fn from_layers(
        layers: Vec<Layer>,
        loss: LossFunction,
        max_epochs: usize,
    ) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::State("a network needs at least one layer".to_owned()));
        }
        if max_epochs == 0 {
            return Err(Error::State("max epochs must be positive".to_owned()));
        }
        for (index, pair) in layers.windows(2).enumerate() {
            if pair[0].neuron_count() != pair[1].input_size() {
                return Err(Error::State(format!(
                    "layer {} outputs {} values but layer {} expects {}",
                    index,
                    pair[0].neuron_count(),
                    index + 1,
                    pair[1].input_size()
                )));
            }
        }
        Ok(Self {
            layers,
            loss,
            max_epochs,
            save_on: None,
            sampler: Sampler::Sequential,
        })
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> usize {
        self.output_layer().neuron_count()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn loss_function(&self) -> LossFunction {
        self.loss
    }

    pub fn max_epochs(&self) -> usize {
        self.max_epochs
    }

    pub fn set_max_epochs(&mut self, max_epochs: usize) -> Result<()> {
        if max_epochs == 0 {
            return Err(Error::Config("max epochs must be positive".to_owned()));
        }
        self.max_epochs = max_epochs;
        Ok(())
    }

    pub fn save_on(&self) -> Option<&Path> {
        self.save_on.as_deref()
    }

    fn output_layer(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Feed `input` through every layer, refreshing each layer's caches.
    pub fn forward(&mut self, input: &Array1<f64>) -> Result<Array1<f64>> {
        check_len("network input", self.input_size(), input.len())?;
        let mut output = input.clone();
        for layer in self.layers.iter_mut() {
            output = layer.forward(&output)?;
        }
        Ok(output)
    }

    /// Inference without touching any layer cache.
    pub fn predict(&self, input: &Array1<f64>) -> Result<Array1<f64>> {
        check_len("network input", self.input_size(), input.len())?;
        let mut output = input.clone();
        for layer in &self.layers {
            output = layer.compute(&output)?;
        }
        Ok(output)
    }

    /// Mean loss of the current weights over `samples`.
    pub fn loss(&self, samples: &[Sample]) -> Result<f64> {
        if samples.is_empty() {
            return Ok(0.0);
        }
        let mut total = 0.0;
        for sample in samples {
            let predicted = self.predict(sample.input())?;
            total += self.loss.compute(&predicted, sample.label())?;
        }
        Ok(total / samples.len() as f64)
    }

    /// Update every layer from the target of the last forward pass, output layer first.
    /// Returns the loss of that forward pass.
    ///
    /// No weights change unless every layer can be backpropagated.
    pub fn backpropagate(&mut self, target: &Array1<f64>) -> Result<f64> {
        let predicted = self.output_layer().cached_outputs();
        let value = self.loss.compute(predicted, target)?;
        let mut gradient = self.loss.gradient(predicted, target)?;

        let mut weights_derivatives = Vec::with_capacity(self.layers.len());
        for layer in self.layers.iter().rev() {
            let (inputs_derivative, weights_derivative) = layer.backward(&gradient)?;
            weights_derivatives.push(weights_derivative);
            gradient = inputs_derivative;
        }
        for (layer, weights_derivative) in self.layers.iter_mut().rev().zip(weights_derivatives) {
            layer.update_weights(weights_derivative);
        }
        Ok(value)
    }

    fn check_sample(&self, index: usize, sample: &Sample) -> Result<()> {
        let shape_error = |err: Error| {
            tracing::error!(sample = index, "rejected training sample: {}", err);
            err
        };
        check_len("sample input", self.input_size(), sample.input().len()).map_err(shape_error)?;
        check_len("sample label", self.output_size(), sample.label().len()).map_err(shape_error)
    }

    /// Train for up to `max_epochs` passes over `samples`.
    ///
    /// Each sample runs a forward pass followed by weight updates from the output
    /// layer back to the first. `on_epoch_end` is called once per finished epoch and
    /// may return `ControlFlow::Break(())` to stop early. Every sample is checked
    /// against the network's input and output sizes before any weight changes.
    /// If a save path was configured, the network is written there at the end.
    pub fn train<F>(&mut self, samples: &[Sample], mut on_epoch_end: F) -> Result<TrainingSummary>
    where
        F: FnMut(&EpochReport, &Network) -> ControlFlow<()>,
    {
        for (index, sample) in samples.iter().enumerate() {
            self.check_sample(index, sample)?;
        }

        tracing::info!(
            samples = samples.len(),
            max_epochs = self.max_epochs,
            "training started"
        );

        let mut summary = TrainingSummary {
            epochs_run: 0,
            last_epoch: None,
        };
        for epoch in 0..self.max_epochs {
            let mut total_loss = 0.0;
            for index in self.sampler.sample(samples.len()) {
                let sample = &samples[index];
                self.forward(sample.input())?;
                total_loss += self.backpropagate(sample.label())?;
            }

            let mean_loss = if samples.is_empty() {
                0.0
            } else {
                total_loss / samples.len() as f64
            };
            let report = EpochReport { epoch, mean_loss };
            tracing::debug!("epoch {}: mean loss = {:.6}", epoch, mean_loss);

            summary.epochs_run = epoch + 1;
            summary.last_epoch = Some(report);
            if on_epoch_end(&report, self).is_break() {
                tracing::info!(epoch, "training stopped by epoch callback");
                break;
            }
        }

        tracing::info!(epochs = summary.epochs_run, "training finished");
        if let Some(path) = self.save_on.clone() {
            self.save(path)?;
        }
        Ok(summary)
    }
}

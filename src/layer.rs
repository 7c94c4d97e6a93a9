use ndarray::{s, Array, Array1, Array2, Axis};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::activation::Activation;
use crate::error::{check_len, Error, Result};
use crate::loss::LossFunction;

/// Fully connected layer.
///
/// Biases live in the last column of `weights`, which therefore has the shape
/// `(neuron_count, input_size + 1)`. Every forward pass appends a constant `1.0`
/// to the input so the bias column is multiplied like any other weight.
#[derive(Debug, Clone)]
pub struct Layer {
    weights: Array2<f64>,
    activation: Activation,
    learning_rate: f64,
    // Caches of the most recent `forward` call.
    inputs: Option<Array1<f64>>,
    weighted_sums: Array1<f64>,
    outputs: Array1<f64>,
}

/// Draw Xavier weights: `U(-sqrt(1 / input_size), sqrt(1 / input_size))`, zero biases.
fn xavier_weights<R: Rng + ?Sized>(input_size: usize, neuron_count: usize, rng: &mut R) -> Array2<f64> {
    let limit = (1.0 / input_size as f64).sqrt();
    let mut weights = Array::random_using(
        (neuron_count, input_size + 1),
        Uniform::new(-limit, limit),
        rng,
    );
    weights.column_mut(input_size).fill(0.0);
    weights
}

fn check_learning_rate(learning_rate: f64) -> Result<()> {
    if learning_rate.is_finite() && learning_rate > 0.0 {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "learning rate must be positive and finite, got {}",
            learning_rate
        )))
    }
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        neuron_count: usize,
        activation: Activation,
        learning_rate: f64,
        rng: &mut R,
    ) -> Result<Self> {
        if input_size == 0 || neuron_count == 0 {
            return Err(Error::Config(format!(
                "layer sizes must be positive, got {} inputs and {} neurons",
                input_size, neuron_count
            )));
        }
        let weights = xavier_weights(input_size, neuron_count, rng);
        Layer::with_weights(activation, learning_rate, weights)
    }

    /// Build a layer from an explicit `(neuron_count, input_size + 1)` matrix whose
    /// last column holds the biases.
    pub fn with_weights(
        activation: Activation,
        learning_rate: f64,
        weights: Array2<f64>,
    ) -> Result<Self> {
        if weights.nrows() == 0 || weights.ncols() < 2 {
            return Err(Error::Config(format!(
                "weight matrix {:?} needs at least one neuron and one input besides the bias",
                weights.dim()
            )));
        }
        check_learning_rate(learning_rate)?;
        let neuron_count = weights.nrows();
        Ok(Self {
            weights,
            activation,
            learning_rate,
            inputs: None,
            weighted_sums: Array1::zeros(neuron_count),
            outputs: Array1::zeros(neuron_count),
        })
    }

    pub fn input_size(&self) -> usize {
        self.weights.ncols() - 1
    }

    pub fn neuron_count(&self) -> usize {
        self.weights.nrows()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        check_learning_rate(learning_rate)?;
        self.learning_rate = learning_rate;
        Ok(())
    }

    /// Redraw Xavier weights, keeping the shape.
    pub fn reinitialize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.weights = xavier_weights(self.input_size(), self.neuron_count(), rng);
        self.inputs = None;
    }

    #[cfg(test)]
    pub(crate) fn cached_inputs(&self) -> Option<&Array1<f64>> {
        self.inputs.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn cached_weighted_sums(&self) -> &Array1<f64> {
        &self.weighted_sums
    }

    pub(crate) fn cached_outputs(&self) -> &Array1<f64> {
        &self.outputs
    }

    fn augment(&self, input: &Array1<f64>) -> Result<Array1<f64>> {
        check_len("layer input", self.input_size(), input.len())?;
        Ok(input.iter().copied().chain(std::iter::once(1.0)).collect())
    }

    /// Compute the activated output, overwriting the caches used by the update rules.
    pub fn forward(&mut self, input: &Array1<f64>) -> Result<Array1<f64>> {
        let inputs = self.augment(input)?;
        self.weighted_sums = self.weights.dot(&inputs);
        self.outputs = self.activation.compute(&self.weighted_sums);
        self.inputs = Some(inputs);
        Ok(self.outputs.clone())
    }

    /// Same result as [`Layer::forward`] without touching the caches.
    pub fn compute(&self, input: &Array1<f64>) -> Result<Array1<f64>> {
        let inputs = self.augment(input)?;
        Ok(self.activation.compute(&self.weights.dot(&inputs)))
    }

    /// Chain rule through this layer for the last forward pass.
    ///
    /// Returns `(dLoss/dInput, dLoss/dWeights)`; the input gradient excludes the bias
    /// entry and is computed from the current weights.
    pub fn backward(&self, d_loss_d_activation: &Array1<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
        let inputs = self.inputs.as_ref().ok_or(Error::NoForwardPass)?;
        check_len("activation gradient", self.neuron_count(), d_loss_d_activation.len())?;

        let activation_derivative = self
            .activation
            .derivative(&self.weighted_sums, &self.outputs);
        let weighted_sums_derivative = activation_derivative * d_loss_d_activation;

        let inputs_derivative = self
            .weights
            .slice(s![.., ..self.input_size()])
            .t()
            .dot(&weighted_sums_derivative);
        let weights_derivative = weighted_sums_derivative
            .view()
            .insert_axis(Axis(1))
            .dot(&inputs.view().insert_axis(Axis(0)));

        Ok((inputs_derivative, weights_derivative))
    }

    pub fn update_weights(&mut self, mut weights_derivative: Array2<f64>) {
        weights_derivative *= self.learning_rate;
        self.weights -= &weights_derivative;
    }

    /// Backpropagate `loss` from this layer's output and update its weights.
    /// Returns the gradient with respect to the layer's input.
    pub fn update_output_layer_weights(
        &mut self,
        loss: &LossFunction,
        predicted: &Array1<f64>,
        target: &Array1<f64>,
    ) -> Result<Array1<f64>> {
        check_len("predicted output", self.neuron_count(), predicted.len())?;
        check_len("target", self.neuron_count(), target.len())?;
        let d_loss_d_activation = loss.gradient(predicted, target)?;
        self.update_hidden_layer_weights(&d_loss_d_activation)
    }

    /// Apply a gradient handed back by the downstream layer and update the weights.
    /// Returns the gradient with respect to the layer's input.
    pub fn update_hidden_layer_weights(
        &mut self,
        d_loss_d_activation: &Array1<f64>,
    ) -> Result<Array1<f64>> {
        let (inputs_derivative, weights_derivative) = self.backward(d_loss_d_activation)?;
        self.update_weights(weights_derivative);
        Ok(inputs_derivative)
    }
}

#[cfg(test)]
mod tests {
    use crate::{assert_rel_eq_arr1, assert_rel_eq_arr2};

    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};
    use ndarray_rand::rand::{rngs::StdRng, SeedableRng};

    fn sample_layer() -> Layer {
        let weights = arr2(&[[1.0, -1.0, 0.5, -2.0], [2.0, -1.0, 2.0, -0.5]]);
        Layer::with_weights(Activation::sigmoid(), 1.0, weights).unwrap()
    }

    #[test]
    fn layer_forward() {
        let mut layer = sample_layer();
        let outputs = layer.forward(&arr1(&[1.0, 0.5, -0.5])).unwrap();
        assert_rel_eq_arr1!(outputs, arr1(&[0.1480471980316895, 0.5]));
        assert_rel_eq_arr1!(layer.cached_weighted_sums(), arr1(&[-1.75, 0.0]));
        assert_rel_eq_arr1!(
            layer.cached_inputs().unwrap(),
            arr1(&[1.0, 0.5, -0.5, 1.0])
        );
    }

    #[test]
    fn layer_backward() {
        let mut layer = sample_layer();
        let outputs = layer.forward(&arr1(&[1.0, 0.5, -0.5])).unwrap();

        let train = arr1(&[1.0, 0.0]);
        let error = outputs - train;
        let (dz, dw) = layer.backward(&error).unwrap();

        assert_rel_eq_arr1!(
            dz,
            arr1(&[0.1425438531921371, -0.0175438531921371, 0.1962719265960686])
        );
        assert_rel_eq_arr2!(
            dw,
            arr2(&[
                [
                    -0.1074561468078629,
                    -0.0537280734039314,
                    0.0537280734039314,
                    -0.1074561468078629
                ],
                [0.125, 0.0625, -0.0625, 0.125],
            ])
        );
    }

    #[test]
    fn output_update_moves_against_gradient() {
        let mut layer = sample_layer();
        let before = layer.weights().clone();
        let predicted = layer.forward(&arr1(&[1.0, 0.5, -0.5])).unwrap();
        let target = arr1(&[1.0, 0.0]);

        let expected_dz = layer
            .backward(&LossFunction::MeanSquaredError.gradient(&predicted, &target).unwrap())
            .unwrap()
            .0;
        let dz = layer
            .update_output_layer_weights(&LossFunction::MeanSquaredError, &predicted, &target)
            .unwrap();
        assert_rel_eq_arr1!(dz, expected_dz);

        // MSE gradient over two outputs is (p - t), so with lr = 1 the update equals
        // the `dw` of `layer_backward` negated.
        assert_relative_eq!(layer.weights()[[0, 0]], before[[0, 0]] + 0.1074561468078629);
        assert_relative_eq!(layer.weights()[[1, 3]], before[[1, 3]] - 0.125);
    }

    #[test]
    fn zero_input_yields_bias_only_output() {
        let weights = arr2(&[[5.0, -3.0, 0.25], [-7.0, 9.0, -1.0]]);
        let mut layer = Layer::with_weights(Activation::leaky_relu(), 0.1, weights).unwrap();
        let outputs = layer.forward(&Array1::zeros(2)).unwrap();
        assert_rel_eq_arr1!(outputs, arr1(&[0.25, -0.01]));

        let mut rng = StdRng::seed_from_u64(7);
        let mut layer = Layer::new(6, 4, Activation::sigmoid(), 0.1, &mut rng).unwrap();
        let outputs = layer.forward(&Array1::zeros(6)).unwrap();
        assert_rel_eq_arr1!(outputs, Array1::from_elem(4, 0.5));
    }

    #[test]
    fn compute_matches_forward_without_caching() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = Layer::new(3, 2, Activation::leaky_relu(), 0.1, &mut rng).unwrap();
        let input = arr1(&[0.3, -1.2, 0.8]);
        let computed = layer.compute(&input).unwrap();
        assert!(layer.cached_inputs().is_none());
        assert_eq!(computed, layer.forward(&input).unwrap());
    }

    #[test]
    fn xavier_shape_and_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let layer = Layer::new(25, 8, Activation::sigmoid(), 0.1, &mut rng).unwrap();
        assert_eq!(layer.weights().dim(), (8, 26));
        assert_eq!(layer.input_size(), 25);
        assert_eq!(layer.neuron_count(), 8);
        assert!(layer
            .weights()
            .slice(s![.., ..25])
            .iter()
            .all(|w| w.abs() <= 0.2));
        assert!(layer.weights().column(25).iter().all(|&b| b == 0.0));
    }

    fn weight_variance(input_size: usize, rng: &mut StdRng) -> f64 {
        let mut layer = Layer::new(input_size, 32, Activation::sigmoid(), 0.1, rng).unwrap();
        let mut sum = 0.0;
        let mut count = 0.0;
        for _ in 0..10 {
            layer.reinitialize(rng);
            let w = layer.weights().slice(s![.., ..input_size]);
            sum += w.iter().map(|v| v * v).sum::<f64>();
            count += w.len() as f64;
        }
        sum / count
    }

    #[test]
    fn xavier_variance_shrinks_with_input_size() {
        let mut rng = StdRng::seed_from_u64(42);
        for input_size in [16, 64, 256] {
            let scaled = weight_variance(input_size, &mut rng) * input_size as f64;
            assert!(
                (scaled - 1.0 / 3.0).abs() < 0.03,
                "variance * n = {} for n = {}",
                scaled,
                input_size
            );
        }
    }

    #[test]
    fn rejects_wrong_input_length() {
        let mut layer = sample_layer();
        let err = layer.forward(&arr1(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn update_requires_forward() {
        let mut layer = sample_layer();
        let err = layer
            .update_hidden_layer_weights(&arr1(&[0.1, 0.2]))
            .unwrap_err();
        assert!(matches!(err, Error::NoForwardPass));
    }

    #[test]
    fn rejects_empty_layers() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Layer::new(0, 3, Activation::Relu, 0.1, &mut rng).is_err());
        assert!(Layer::new(3, 0, Activation::Relu, 0.1, &mut rng).is_err());
    }

    #[test]
    fn rejects_invalid_learning_rates() {
        let mut rng = StdRng::seed_from_u64(0);
        for learning_rate in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Layer::new(2, 2, Activation::Relu, learning_rate, &mut rng),
                Err(Error::Config(_))
            ));
        }

        let mut layer = sample_layer();
        assert!(matches!(layer.set_learning_rate(-0.5), Err(Error::Config(_))));
        assert_eq!(layer.learning_rate(), 1.0);
        layer.set_learning_rate(0.25).unwrap();
        assert_eq!(layer.learning_rate(), 0.25);
    }
}

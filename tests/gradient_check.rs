// Compare the weight updates of backpropagation with finite differences of the loss.

use perceptron::{Activation, LayerSpec, LossFunction, Network, NetworkBuilder, Sample};

const EPSILON: f64 = 1e-5;
const TOLERANCE: f64 = 1e-4;

fn small_network(hidden: Activation, loss: LossFunction) -> Network {
    NetworkBuilder::new()
        .input_size(2)
        .layer(LayerSpec::new(3, hidden, 0.1))
        .layer(LayerSpec::new(2, Activation::Sigmoid { steepness: 2.0 }, 0.1))
        .max_epochs(1)
        .loss(loss)
        .seed(2024)
        .build()
        .unwrap()
}

// dLoss/dW recovered from one update with a learning rate of 1.
fn analytic_gradients(network: &Network, sample: &Sample) -> Vec<Vec<f64>> {
    let mut trained = network.clone();
    for layer in trained.layers_mut() {
        layer.set_learning_rate(1.0).unwrap();
    }
    trained.forward(sample.input()).unwrap();
    trained.backpropagate(sample.label()).unwrap();

    network
        .layers()
        .iter()
        .zip(trained.layers())
        .map(|(before, after)| {
            (before.weights() - after.weights())
                .iter()
                .copied()
                .collect()
        })
        .collect()
}

fn numerical_gradients(network: &Network, sample: &Sample) -> Vec<Vec<f64>> {
    let state = network.to_state();
    let samples = std::slice::from_ref(sample);
    let loss_with = |layer: usize, index: usize, delta: f64| {
        let mut state = state.clone();
        state.layers.get_mut(&layer).unwrap().weights[index] += delta;
        Network::from_state(&state).unwrap().loss(samples).unwrap()
    };

    (0..network.layers().len())
        .map(|layer| {
            (0..state.layers[&layer].weights.len())
                .map(|index| {
                    (loss_with(layer, index, EPSILON) - loss_with(layer, index, -EPSILON))
                        / (2.0 * EPSILON)
                })
                .collect()
        })
        .collect()
}

fn check(hidden: Activation, loss: LossFunction) {
    let network = small_network(hidden, loss);
    let samples = vec![
        Sample::from_class(vec![0.7, -0.4], 0, 2).unwrap(),
        Sample::from_class(vec![-1.3, 0.25], 1, 2).unwrap(),
    ];
    for sample in &samples {
        let analytic = analytic_gradients(&network, sample);
        let numerical = numerical_gradients(&network, sample);
        for (layer, (a, n)) in analytic.iter().zip(numerical.iter()).enumerate() {
            assert_eq!(a.len(), n.len());
            for (index, (a, n)) in a.iter().zip(n.iter()).enumerate() {
                assert!(
                    (a - n).abs() < TOLERANCE,
                    "layer {} weight {}: analytic {} vs numerical {}",
                    layer,
                    index,
                    a,
                    n
                );
            }
        }
    }
}

#[test]
fn sigmoid_hidden_layer_with_mse() {
    check(Activation::sigmoid(), LossFunction::MeanSquaredError);
}

#[test]
fn leaky_relu_hidden_layer_with_mse() {
    check(Activation::leaky_relu(), LossFunction::MeanSquaredError);
}

#[test]
fn sigmoid_hidden_layer_with_cross_entropy() {
    check(Activation::sigmoid(), LossFunction::BinaryCrossEntropy);
}

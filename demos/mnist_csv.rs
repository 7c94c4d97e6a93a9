// Train the reference 784-128-10 network on MNIST stored as CSV rows of
// `label,pixel0,...,pixel783`, e.g. the files at https://www.kaggle.com/oddrationale/mnist-in-csv
//
//     cargo run --release --example mnist_csv -- mnist_train.csv mnist_test.csv

use std::error::Error;
use std::ops::ControlFlow;
use std::path::Path;

use csv::ReaderBuilder;
use perceptron::{evaluate, Activation, LayerSpec, LossFunction, NetworkBuilder, Sample};

const CLASSES: usize = 10;
const PIXELS: usize = 28 * 28;

fn load_mnist(file_path: impl AsRef<Path>) -> Result<Vec<Sample>, Box<dyn Error>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(file_path)?;
    let mut samples = Vec::new();
    for row in reader.records() {
        let row = row?;
        let class: usize = row[0].parse()?;
        let pixels = row
            .iter()
            .skip(1)
            .map(|value| value.parse::<f64>().map(|v| v / 255.0))
            .collect::<Result<Vec<_>, _>>()?;
        if pixels.len() != PIXELS {
            return Err(format!("expected {} pixels, got {}", PIXELS, pixels.len()).into());
        }
        samples.push(Sample::from_class(pixels, class, CLASSES)?);
    }
    Ok(samples)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let train_path = args.next().unwrap_or_else(|| "mnist_train.csv".to_owned());
    let test_path = args.next().unwrap_or_else(|| "mnist_test.csv".to_owned());

    let train_set = load_mnist(&train_path)?;
    let test_set = load_mnist(&test_path)?;
    println!(
        "loaded {} training and {} test samples",
        train_set.len(),
        test_set.len()
    );

    let mut network = NetworkBuilder::new()
        .input_size(PIXELS)
        .layer(LayerSpec::new(128, Activation::leaky_relu(), 0.001))
        .layer(LayerSpec::new(10, Activation::Sigmoid { steepness: 2.0 }, 0.001))
        .max_epochs(30)
        .loss(LossFunction::MeanSquaredError)
        .save_on("mlp-architecture.json")
        .build()?;

    // epoch, training accuracy, test accuracy
    let mut history = Vec::new();
    network.train(&train_set, |report, network| {
        let (train, test) = match (evaluate(network, &train_set), evaluate(network, &test_set)) {
            (Ok(train), Ok(test)) => (train, test),
            (Err(err), _) | (_, Err(err)) => {
                eprintln!("evaluation failed: {}", err);
                return ControlFlow::Break(());
            }
        };

        println!("\n------------------ epoch: {} ------------------\n", report.epoch);
        println!("Mean loss: {:.6}\n", report.mean_loss);
        println!("Training Accuracy: {}\n", train.accuracy);
        println!("{}", train.confusion);
        println!("Test Accuracy: {}\n", test.accuracy);
        println!("{}", test.confusion);

        history.push((report.epoch, train.accuracy, test.accuracy));
        ControlFlow::Continue(())
    })?;

    println!("epoch train test");
    for (epoch, train, test) in history {
        println!("{} {:.4} {:.4}", epoch, train, test);
    }
    Ok(())
}

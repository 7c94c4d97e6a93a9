use ndarray::Array1;
use ndarray_rand::rand::{rngs::StdRng, seq::SliceRandom, Rng};

use crate::error::{Error, Result};

/// One labeled example: a flattened input vector and its one-hot label.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    input: Array1<f64>,
    label: Array1<f64>,
}

impl Sample {
    /// Fails with `InvalidLabel` unless exactly one entry of `label` is `1.0` and the
    /// rest are `0.0`.
    pub fn new(input: impl Into<Array1<f64>>, label: impl Into<Array1<f64>>) -> Result<Self> {
        let label = label.into();
        let ones = label.iter().filter(|&&v| v == 1.0).count();
        let zeros = label.iter().filter(|&&v| v == 0.0).count();
        if ones != 1 || ones + zeros != label.len() {
            return Err(Error::InvalidLabel(format!(
                "expected a one-hot vector, got {}",
                label
            )));
        }
        Ok(Self {
            input: input.into(),
            label,
        })
    }

    pub fn from_class(input: impl Into<Array1<f64>>, class: usize, classes: usize) -> Result<Self> {
        Ok(Self {
            input: input.into(),
            label: one_hot(class, classes)?,
        })
    }

    pub fn input(&self) -> &Array1<f64> {
        &self.input
    }

    pub fn label(&self) -> &Array1<f64> {
        &self.label
    }

    /// Index of the `1.0` entry of the label.
    pub fn class(&self) -> usize {
        self.label.iter().position(|&v| v == 1.0).unwrap_or_default()
    }
}

pub fn one_hot(class: usize, classes: usize) -> Result<Array1<f64>> {
    if class >= classes {
        return Err(Error::InvalidLabel(format!(
            "class {} is out of range for {} classes",
            class, classes
        )));
    }
    let mut label = Array1::zeros(classes);
    label[class] = 1.0;
    Ok(label)
}

/// Parse the class index encoded as the prefix before the first `_` of a dataset
/// file name, e.g. `"7_00042.png"` is class 7.
pub fn class_from_file_name(file_name: &str) -> Result<usize> {
    let prefix = file_name.split('_').next().unwrap_or_default();
    prefix.parse().map_err(|_| {
        Error::InvalidLabel(format!(
            "file name {:?} does not start with a class index",
            file_name
        ))
    })
}

/// Sampler decides the order in which samples are visited in each epoch.
#[derive(Debug, Clone)]
pub enum Sampler {
    /// Visit samples in the order given.
    Sequential,
    /// Visit a fresh permutation every epoch.
    Random(StdRng),
}

impl Sampler {
    pub fn sample(&mut self, size: usize) -> Vec<usize> {
        let mut indices = (0..size).collect::<Vec<_>>();
        if let Self::Random(rng) = self {
            indices.shuffle(rng);
        }
        indices
    }
}

/// Shuffle `samples` and split them into train and test sets.
/// `test_ratio` is a ratio of the number of test data to the whole dataset.
pub fn train_test_split<R: Rng + ?Sized>(
    mut samples: Vec<Sample>,
    test_ratio: f64,
    rng: &mut R,
) -> Result<(Vec<Sample>, Vec<Sample>)> {
    if !(0.0..=1.0).contains(&test_ratio) {
        return Err(Error::Config(format!(
            "test ratio must be within [0, 1], got {}",
            test_ratio
        )));
    }
    let n_trains = (samples.len() as f64 * (1.0 - test_ratio)).round() as usize;
    samples.shuffle(rng);
    let test = samples.split_off(n_trains);
    Ok((samples, test))
}

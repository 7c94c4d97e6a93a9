use std::fmt;

use ndarray::{Array1, Array2};

use crate::data::Sample;
use crate::error::{check_len, Result};
use crate::network::Network;

/// Index of the largest element. The first occurrence wins ties and NaN entries
/// never win; an empty or all-NaN vector yields `0`.
pub fn argmax(values: &Array1<f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(max_index, max_elem), (index, &elem)| {
            if elem > max_elem {
                (index, elem)
            } else {
                (max_index, max_elem)
            }
        })
        .0
}

/// Counts of (predicted class, true class) pairs, indexed `[predicted][true]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn new(classes: usize) -> Self {
        Self {
            counts: Array2::zeros((classes, classes)),
        }
    }

    pub fn classes(&self) -> usize {
        self.counts.nrows()
    }

    /// Record one prediction against its one-hot label.
    /// Returns `(predicted_index, true_index)`.
    pub fn record(&mut self, predicted: &Array1<f64>, label: &Array1<f64>) -> Result<(usize, usize)> {
        check_len("prediction", self.classes(), predicted.len())?;
        check_len("label", self.classes(), label.len())?;
        let predicted_index = argmax(predicted);
        let true_index = argmax(label);
        self.counts[[predicted_index, true_index]] += 1;
        Ok((predicted_index, true_index))
    }

    /// # Panics
    ///
    /// Panics if either index is not below [`ConfusionMatrix::classes`].
    pub fn get(&self, predicted: usize, actual: usize) -> usize {
        self.counts[[predicted, actual]]
    }

    pub fn as_array(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn mismatches(&self) -> usize {
        self.total() - self.counts.diag().sum()
    }

    /// `1 - mismatches / total`, or `0.0` when nothing was recorded.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        1.0 - self.mismatches() as f64 / total as f64
    }

    /// Calculate the number of tp, fp, fn for `class`.
    fn counts_for_one_class(&self, class: usize) -> (usize, usize, usize) {
        let true_pos = self.counts[[class, class]];
        let false_pos = self.counts.row(class).sum() - true_pos;
        let false_neg = self.counts.column(class).sum() - true_pos;
        (true_pos, false_pos, false_neg)
    }

    /// Ratio of correct predictions among those predicting `class`; 0 when undefined.
    ///
    /// # Panics
    ///
    /// Panics if `class` is not below [`ConfusionMatrix::classes`].
    pub fn precision(&self, class: usize) -> f64 {
        let (true_pos, false_pos, _) = self.counts_for_one_class(class);
        zero_if_nan(true_pos as f64 / (true_pos + false_pos) as f64)
    }

    /// Ratio of samples of `class` that were predicted as such; 0 when undefined.
    ///
    /// # Panics
    ///
    /// Panics if `class` is not below [`ConfusionMatrix::classes`].
    pub fn recall(&self, class: usize) -> f64 {
        let (true_pos, _, false_neg) = self.counts_for_one_class(class);
        zero_if_nan(true_pos as f64 / (true_pos + false_neg) as f64)
    }

    /// Macro-averaged precision, recall and F1 score.
    pub fn precision_recall_fscore(&self) -> (f64, f64, f64) {
        let classes = self.classes();
        if classes == 0 {
            return (0.0, 0.0, 0.0);
        }
        let (precision_sum, recall_sum, f1_sum) = (0..classes)
            .map(|class| {
                let precision = self.precision(class);
                let recall = self.recall(class);
                let f1 = zero_if_nan(2.0 * precision * recall / (precision + recall));
                (precision, recall, f1)
            })
            .fold((0.0, 0.0, 0.0), |(precision, recall, f1), (p, r, f)| {
                (precision + p, recall + r, f1 + f)
            });
        let n = classes as f64;
        (precision_sum / n, recall_sum / n, f1_sum / n)
    }
}

fn zero_if_nan(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.counts.iter().max().copied().unwrap_or(0).to_string().len();
        for row in self.counts.rows() {
            let cells = row
                .iter()
                .map(|count| format!("{:>width$}", count, width = width))
                .collect::<Vec<_>>();
            writeln!(f, "{}", cells.join(" "))?;
        }
        Ok(())
    }
}

/// Result of running [`evaluate`] over a labeled set.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
}

/// Run inference over `samples` and compare the argmax of each prediction with the
/// argmax of its label. An empty set yields accuracy `0.0`.
pub fn evaluate(network: &Network, samples: &[Sample]) -> Result<Evaluation> {
    let mut confusion = ConfusionMatrix::new(network.output_size());
    if samples.is_empty() {
        tracing::warn!("evaluating on an empty set, reporting accuracy 0");
    }
    for sample in samples {
        let predicted = network.predict(sample.input())?;
        confusion.record(&predicted, sample.label())?;
    }
    let accuracy = confusion.accuracy();
    Ok(Evaluation {
        confusion,
        accuracy,
    })
}

//! Classification metrics.
//!
//! [`EvalCounters`] accumulates raw per-class counts (true/false positives,
//! false negatives, support) plus loss and accuracy tallies. Counters from
//! independent shards merge by summation, so multi-worker evaluation is
//! shard-then-merge rather than a collective reduction.
//! [`EvaluationReport`] derives precision/recall/F1 from a finished set of
//! counters.

use std::path::Path;

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// Per-class threshold below which the report prints every class; at or
/// above it only the lowest-precision classes are shown
const FULL_TABLE_LIMIT: usize = 10;

/// Number of worst classes shown for large class counts
const WORST_CLASSES_SHOWN: usize = 5;

/// Raw evaluation counts, mergeable across shards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCounters {
    num_classes: usize,
    true_positives: Vec<u64>,
    false_positives: Vec<u64>,
    false_negatives: Vec<u64>,
    support: Vec<u64>,
    correct: u64,
    total: u64,
    loss_sum: f64,
    num_batches: u64,
}

impl EvalCounters {
    /// Create zeroed counters for `num_classes` classes.
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            true_positives: vec![0; num_classes],
            false_positives: vec![0; num_classes],
            false_negatives: vec![0; num_classes],
            support: vec![0; num_classes],
            correct: 0,
            total: 0,
            loss_sum: 0.0,
            num_batches: 0,
        }
    }

    /// Record one batch of predictions against targets.
    ///
    /// `predictions` and `targets` must have equal length; labels outside
    /// `[0, num_classes)` are a caller contract violation.
    pub fn record_batch(&mut self, predictions: &[i64], targets: &[i64], loss: f64) {
        assert_eq!(predictions.len(), targets.len());

        self.total += predictions.len() as u64;
        self.loss_sum += loss;
        self.num_batches += 1;

        for (&pred, &target) in predictions.iter().zip(targets.iter()) {
            let pred = pred as usize;
            let target = target as usize;

            self.support[target] += 1;
            if pred == target {
                self.correct += 1;
                self.true_positives[target] += 1;
            } else {
                self.false_negatives[target] += 1;
                self.false_positives[pred] += 1;
            }
        }
    }

    /// Sum another set of counters into this one.
    ///
    /// Both sides must describe the same class space.
    pub fn merge(&mut self, other: EvalCounters) {
        assert_eq!(self.num_classes, other.num_classes);

        for c in 0..self.num_classes {
            self.true_positives[c] += other.true_positives[c];
            self.false_positives[c] += other.false_positives[c];
            self.false_negatives[c] += other.false_negatives[c];
            self.support[c] += other.support[c];
        }
        self.correct += other.correct;
        self.total += other.total;
        self.loss_sum += other.loss_sum;
        self.num_batches += other.num_batches;
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Total recorded samples
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Overall accuracy, 0 when nothing was recorded
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// Mean loss over recorded batches
    pub fn avg_loss(&self) -> f64 {
        if self.num_batches == 0 {
            0.0
        } else {
            self.loss_sum / self.num_batches as f64
        }
    }
}

/// Precision/recall/F1 for one class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_id: usize,
    pub class_name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: u64,
}

/// Final evaluation report derived from counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub avg_loss: f64,
    pub total_samples: u64,
    pub per_class: Vec<ClassMetrics>,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
}

impl EvaluationReport {
    /// Derive the report from counters and class names.
    ///
    /// `class_names` must cover the counters' class space.
    pub fn from_counters(counters: &EvalCounters, class_names: &[String]) -> Self {
        let per_class: Vec<ClassMetrics> = (0..counters.num_classes)
            .map(|c| {
                let tp = counters.true_positives[c] as f64;
                let fp = counters.false_positives[c] as f64;
                let fn_ = counters.false_negatives[c] as f64;

                let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
                let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    class_id: c,
                    class_name: class_names.get(c).cloned().unwrap_or_default(),
                    precision,
                    recall,
                    f1_score,
                    support: counters.support[c],
                }
            })
            .collect();

        let n = per_class.len().max(1) as f64;
        let macro_precision = per_class.iter().map(|m| m.precision).sum::<f64>() / n;
        let macro_recall = per_class.iter().map(|m| m.recall).sum::<f64>() / n;
        let macro_f1 = per_class.iter().map(|m| m.f1_score).sum::<f64>() / n;

        Self {
            accuracy: counters.accuracy(),
            avg_loss: counters.avg_loss(),
            total_samples: counters.total(),
            per_class,
            macro_precision,
            macro_recall,
            macro_f1,
        }
    }

    /// Print the report to the console.
    ///
    /// Small class spaces get the full per-class table; larger ones only the
    /// lowest-precision classes, which is where attention is needed.
    pub fn print_summary(&self) {
        println!();
        println!("{}", "Evaluation Results".cyan().bold());
        println!("{}", "=".repeat(72));
        println!("  Samples:   {}", self.total_samples);
        println!("  Loss:      {:.4}", self.avg_loss);
        println!("  Accuracy:  {:.4}", self.accuracy);
        println!(
            "  Macro:     pre {:.4} | rec {:.4} | F1 {:.4}",
            self.macro_precision, self.macro_recall, self.macro_f1
        );
        println!();

        let rows: Vec<&ClassMetrics> = if self.per_class.len() < FULL_TABLE_LIMIT {
            self.per_class.iter().collect()
        } else {
            println!(
                "{}",
                format!("{} lowest-precision classes:", WORST_CLASSES_SHOWN).yellow()
            );
            let mut sorted: Vec<&ClassMetrics> = self.per_class.iter().collect();
            sorted.sort_by(|a, b| a.precision.partial_cmp(&b.precision).unwrap());
            sorted.truncate(WORST_CLASSES_SHOWN);
            sorted
        };

        println!(
            "{:<40} {:>8} {:>8} {:>8} {:>8}",
            "Class", "Support", "Pre", "Rec", "F1"
        );
        println!("{}", "-".repeat(72));
        for m in rows {
            println!(
                "{:<40} {:>8} {:>8.4} {:>8.4} {:>8.4}",
                m.class_name, m.support, m.precision, m.recall, m.f1_score
            );
        }
        println!("{}", "=".repeat(72));
    }

    /// Write the report as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

//! Evaluation: metric counters, reports, and the batched evaluation loop.

pub mod evaluator;
pub mod metrics;

pub use evaluator::Evaluator;
pub use metrics::{ClassMetrics, EvalCounters, EvaluationReport};

//! # densecls
//!
//! A convolutional image-classification pipeline built on the Burn framework.
//! The architectural core is the [`model::DenseBlock`]: a channel-split block
//! that concatenates an identity-or-projected copy of its input with a
//! bottlenecked depthwise transformation, growing representational width
//! while keeping gradient paths short.
//!
//! ## Modules
//!
//! - `model`: the dense block, its conv/norm/act unit, and a classifier
//!   assembled from them
//! - `dataset`: image-folder loading and Burn dataset/batcher adapters
//! - `eval`: mergeable metric counters and the batched evaluation loop
//! - `utils`: error types and logging setup
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use densecls::dataset::{ClassificationDataset, LazyImageDataset};
//! use densecls::eval::{Evaluator, EvaluationReport};
//! use densecls::model::DenseClassifierConfig;
//!
//! let dataset = ClassificationDataset::new("data/val")?;
//! let model = DenseClassifierConfig::new(dataset.num_classes()).init(&device)?;
//! let counters = Evaluator::new(model, 224, 64).run(&images, &device)?;
//! let report = EvaluationReport::from_counters(&counters, &dataset.class_names);
//! ```

pub mod backend;
pub mod dataset;
pub mod eval;
pub mod model;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{ClassificationBatcher, ClassificationDataset, ImageItem, LazyImageDataset};
pub use eval::{EvalCounters, EvaluationReport, Evaluator};
pub use model::{ConvNormAct, DenseBlock, DenseBlockConfig, DenseClassifier, DenseClassifierConfig};
pub use utils::error::{Error, Result};

/// Default square image size for evaluation
pub const DEFAULT_IMAGE_SIZE: usize = 224;

/// Default evaluation batch size
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

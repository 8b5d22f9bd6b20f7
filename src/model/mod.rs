//! Network modules built with the Burn framework.
//!
//! The dense block is the architectural core; [`ConvNormAct`] is its basic
//! unit and [`DenseClassifier`] composes blocks into a full classifier.

pub mod classifier;
pub mod conv_norm_act;
pub mod dense_block;

pub use classifier::{DenseClassifier, DenseClassifierConfig};
pub use conv_norm_act::{ConvNormAct, ConvNormActConfig};
pub use dense_block::{DenseBlock, DenseBlockConfig, DownsamplePath};

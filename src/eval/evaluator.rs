//! Batched model evaluation.
//!
//! Runs a classifier over a labeled dataset without gradient tracking,
//! accumulating loss and per-class counts. The dataset can be evaluated in
//! one pass or sharded across worker threads; shards produce independent
//! [`EvalCounters`] that merge into the same result as a single pass.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::backend::Backend;
use burn::tensor::ElementConversion;
use tracing::{debug, info};

use crate::dataset::{ClassificationBatch, ClassificationBatcher, ImageItem, LazyImageDataset};
use crate::eval::metrics::EvalCounters;
use crate::model::DenseClassifier;
use crate::utils::error::{Error, Result};

/// Model evaluator.
///
/// Holds the model and batching configuration; each `run` is a pure read of
/// the learned parameters, so one evaluator can serve several datasets or
/// shards concurrently.
#[derive(Clone)]
pub struct Evaluator<B: Backend> {
    model: DenseClassifier<B>,
    batcher: ClassificationBatcher,
    batch_size: usize,
}

impl<B: Backend> Evaluator<B> {
    /// Create an evaluator for the given model.
    pub fn new(model: DenseClassifier<B>, image_size: usize, batch_size: usize) -> Self {
        Self {
            model,
            batcher: ClassificationBatcher::new(image_size),
            batch_size: batch_size.max(1),
        }
    }

    /// Evaluate a dataset in a single pass.
    pub fn run<D>(&self, dataset: &D, device: &B::Device) -> Result<EvalCounters>
    where
        D: Dataset<ImageItem>,
    {
        let mut counters = EvalCounters::new(self.model.num_classes());
        let loss_fn = CrossEntropyLossConfig::new().init(device);

        let len = dataset.len();
        let num_batches = len.div_ceil(self.batch_size);

        for (batch_idx, start) in (0..len).step_by(self.batch_size).enumerate() {
            let end = (start + self.batch_size).min(len);
            let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();

            if items.is_empty() {
                continue;
            }

            let batch: ClassificationBatch<B> = self.batcher.batch(items, device);
            let logits = self.model.forward(batch.images);

            let loss = loss_fn.forward(logits.clone(), batch.targets.clone());
            let loss_value: f64 = loss.into_scalar().elem();

            let predictions = logits.argmax(1).squeeze::<1>(1);
            let preds: Vec<i64> = predictions.into_data().iter::<i64>().collect();
            let targets: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();

            counters.record_batch(&preds, &targets, loss_value);

            if (batch_idx + 1) % 10 == 0 || batch_idx + 1 == num_batches {
                debug!(
                    "batch {:>4}/{}: loss = {:.4}, acc = {:.4}",
                    batch_idx + 1,
                    num_batches,
                    counters.avg_loss(),
                    counters.accuracy()
                );
            }
        }

        Ok(counters)
    }

    /// Evaluate the dataset sharded across `workers` threads.
    ///
    /// Each worker runs an independent pass over its index range; the
    /// per-shard counters are summed. Worker counts of 0 or 1 fall back to
    /// the sequential pass. Batch partitioning differs between worker
    /// counts, so the batch-averaged loss may differ slightly; the count
    /// totals do not.
    pub fn run_parallel(
        &self,
        dataset: &LazyImageDataset,
        device: &B::Device,
        workers: usize,
    ) -> Result<EvalCounters>
    where
        Self: Sync,
        B::Device: Sync,
    {
        if workers <= 1 || dataset.len() <= self.batch_size {
            return self.run(dataset, device);
        }

        let len = dataset.len();
        let chunk = len.div_ceil(workers);
        let shards: Vec<LazyImageDataset> = (0..workers)
            .map(|w| dataset.shard(w * chunk, (w + 1) * chunk))
            .filter(|shard| shard.len() > 0)
            .collect();

        info!("Evaluating {} samples across {} workers", len, shards.len());

        let mut merged = EvalCounters::new(self.model.num_classes());
        std::thread::scope(|scope| {
            let handles: Vec<_> = shards
                .iter()
                .map(|shard| scope.spawn(move || self.run(shard, device)))
                .collect();

            for handle in handles {
                let counters = handle
                    .join()
                    .map_err(|_| Error::Other("evaluation worker panicked".to_string()))??;
                merged.merge(counters);
            }

            Ok::<(), Error>(())
        })?;

        Ok(merged)
    }

    /// Access the wrapped model
    pub fn model(&self) -> &DenseClassifier<B> {
        &self.model
    }
}

//! Burn dataset and batcher for labeled images.
//!
//! Images are decoded lazily, resized to a square target, converted to CHW
//! float data in `[0, 1]`, and normalized with ImageNet statistics at batch
//! time.

use std::path::PathBuf;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::{backend::Backend, Int, Tensor, TensorData};
use image::imageops::FilterType;
use image::ImageReader;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

/// ImageNet normalization mean values (RGB)
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A single decoded image ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageItem {
    /// Image data as flattened CHW float array [3 * H * W], scaled to [0, 1]
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
    /// Image path (for debugging/logging)
    pub path: String,
}

impl ImageItem {
    /// Load and preprocess an image from disk.
    pub fn from_path(path: &PathBuf, label: usize, image_size: usize) -> Result<Self> {
        let img = ImageReader::open(path)?
            .decode()?
            .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
            .to_rgb8();

        let (width, height) = (image_size, image_size);
        let mut image = vec![0.0f32; 3 * height * width];

        // CHW layout: all R values, then all G, then all B.
        for y in 0..height {
            for x in 0..width {
                let pixel = img.get_pixel(x as u32, y as u32);
                image[y * width + x] = pixel[0] as f32 / 255.0;
                image[height * width + y * width + x] = pixel[1] as f32 / 255.0;
                image[2 * height * width + y * width + x] = pixel[2] as f32 / 255.0;
            }
        }

        Ok(Self {
            image,
            label,
            path: path.to_string_lossy().to_string(),
        })
    }

    /// Create from pre-loaded image data.
    pub fn from_data(image: Vec<f32>, label: usize, path: String) -> Self {
        Self { image, label, path }
    }
}

/// Burn dataset over `(path, label)` pairs, decoding images on demand.
#[derive(Debug, Clone)]
pub struct LazyImageDataset {
    samples: Vec<(PathBuf, usize)>,
    image_size: usize,
}

impl LazyImageDataset {
    /// Create a new dataset from a list of samples.
    pub fn new(samples: Vec<(PathBuf, usize)>, image_size: usize) -> Self {
        Self {
            samples,
            image_size,
        }
    }

    /// Keep at most `max_samples` samples, chosen by a seeded shuffle.
    ///
    /// Used for quick evaluation runs on a subset of the data.
    pub fn subsample(mut self, max_samples: usize, seed: u64) -> Self {
        if max_samples < self.samples.len() {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            self.samples.shuffle(&mut rng);
            self.samples.truncate(max_samples);
        }
        self
    }

    /// Restrict the dataset to the index range `[start, end)`.
    ///
    /// Shards for parallel evaluation; counters from shards merge back into
    /// one result.
    pub fn shard(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        Self {
            samples: self.samples[start..end].to_vec(),
            image_size: self.image_size,
        }
    }

    /// Target square image size
    pub fn image_size(&self) -> usize {
        self.image_size
    }
}

impl Dataset<ImageItem> for LazyImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        let (path, label) = self.samples.get(index)?;
        ImageItem::from_path(path, *label, self.image_size).ok()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of labeled images
#[derive(Clone, Debug)]
pub struct ClassificationBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher stacking items into normalized tensors
#[derive(Clone, Debug)]
pub struct ClassificationBatcher {
    image_size: usize,
}

impl ClassificationBatcher {
    /// Create a new batcher for the given square image size.
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ClassificationBatch<B>> for ClassificationBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ClassificationBatch<B> {
        let batch_size = items.len();
        let channels = 3;
        let height = self.image_size;
        let width = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            device,
        );

        // ImageNet normalization: (x - mean) / std, broadcast over [1, 3, 1, 1]
        let mean = Tensor::<B, 4>::from_data(
            TensorData::new(IMAGENET_MEAN.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let std = Tensor::<B, 4>::from_data(
            TensorData::new(IMAGENET_STD.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let images = (images - mean) / std;

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        ClassificationBatch { images, targets }
    }
}

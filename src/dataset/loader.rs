//! Labeled image-folder dataset.
//!
//! Scans a directory laid out as one subdirectory per class:
//!
//! ```text
//! root/
//! ├── cat/
//! │   ├── image1.jpg
//! │   └── image2.jpg
//! ├── dog/
//! │   └── ...
//! └── ...
//! ```
//!
//! Class directories are sorted by name so label indices are stable across
//! runs and machines.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{Error, Result};

/// Image extensions recognized by the scan
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single labeled image sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class name (directory name)
    pub class_name: String,
}

/// A labeled image-folder dataset with lazy image loading.
#[derive(Debug)]
pub struct ClassificationDataset {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// All samples in the dataset
    pub samples: Vec<ImageSample>,
    /// Class names in label order
    pub class_names: Vec<String>,
    /// Mapping from class name to label index
    pub class_to_idx: HashMap<String, usize>,
}

impl ClassificationDataset {
    /// Scan `root_dir` and build the sample list.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading classification dataset from: {:?}", root_dir);

        if !root_dir.exists() {
            return Err(Error::Dataset(format!(
                "Dataset directory does not exist: {}",
                root_dir.display()
            )));
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(Error::Dataset(format!(
                "No class directories found under: {}",
                root_dir.display()
            )));
        }

        info!("Found {} classes", class_names.len());

        let class_to_idx: HashMap<String, usize> = class_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let mut samples = Vec::new();
        for class_name in &class_names {
            let class_dir = root_dir.join(class_name);
            let label = class_to_idx[class_name];
            let before = samples.len();

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                        samples.push(ImageSample {
                            path,
                            label,
                            class_name: class_name.clone(),
                        });
                    }
                }
            }

            debug!(
                "Class {:3} {:40} {} samples",
                label,
                class_name,
                samples.len() - before
            );
        }

        if samples.is_empty() {
            return Err(Error::Dataset(format!(
                "No image files found under: {}",
                root_dir.display()
            )));
        }

        info!("Loaded {} samples", samples.len());

        Ok(Self {
            root_dir,
            samples,
            class_names,
            class_to_idx,
        })
    }

    /// Number of classes
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Samples as `(path, label)` pairs for the Burn dataset wrapper
    pub fn sample_pairs(&self) -> Vec<(PathBuf, usize)> {
        self.samples
            .iter()
            .map(|s| (s.path.clone(), s.label))
            .collect()
    }

    /// Compute dataset statistics
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.class_names.clone(),
        }
    }
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("\nDataset Statistics:");
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        for (idx, name) in self.class_names.iter().enumerate() {
            let count = self.class_counts[idx];
            let bar_len = (count as f32 / self.total_samples as f32 * 40.0) as usize;
            let bar: String = "█".repeat(bar_len);
            println!("    {:3}. {:40} {:5} {}", idx, name, count, bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_fake_image(dir: &Path, name: &str) {
        // A 1x1 PNG is enough for the scan; decoding happens lazily elsewhere.
        let img = image::RgbImage::new(1, 1);
        img.save(dir.join(name)).unwrap();
    }

    fn build_dataset_dir() -> TempDir {
        let temp = TempDir::new().unwrap();
        for (class, count) in [("cat", 3), ("dog", 2)] {
            let dir = temp.path().join(class);
            std::fs::create_dir(&dir).unwrap();
            for i in 0..count {
                write_fake_image(&dir, &format!("img{i}.png"));
            }
        }
        temp
    }

    #[test]
    fn test_scan_discovers_sorted_classes() {
        let temp = build_dataset_dir();
        let dataset = ClassificationDataset::new(temp.path()).unwrap();

        assert_eq!(dataset.num_classes(), 2);
        assert_eq!(dataset.class_names, vec!["cat", "dog"]);
        assert_eq!(dataset.samples.len(), 5);
        assert_eq!(dataset.class_to_idx["dog"], 1);
    }

    #[test]
    fn test_stats_class_counts() {
        let temp = build_dataset_dir();
        let dataset = ClassificationDataset::new(temp.path()).unwrap();
        let stats = dataset.stats();

        assert_eq!(stats.total_samples, 5);
        assert_eq!(stats.class_counts, vec![3, 2]);
    }

    #[test]
    fn test_missing_root_is_dataset_error() {
        let result = ClassificationDataset::new("/nonexistent/dataset/path");
        assert!(matches!(result, Err(Error::Dataset(_))));
    }

    #[test]
    fn test_empty_root_is_dataset_error() {
        let temp = TempDir::new().unwrap();
        let result = ClassificationDataset::new(temp.path());
        assert!(matches!(result, Err(Error::Dataset(_))));
    }

    #[test]
    fn test_non_image_files_ignored() {
        let temp = build_dataset_dir();
        std::fs::write(temp.path().join("cat").join("notes.txt"), "ignored").unwrap();

        let dataset = ClassificationDataset::new(temp.path()).unwrap();
        assert_eq!(dataset.samples.len(), 5);
    }
}

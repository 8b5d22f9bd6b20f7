//! Image classifier assembled from dense blocks.
//!
//! A strided stem followed by alternating growing (stride 2, doubled
//! channels) and non-growing (stride 1) dense blocks, global average pooling
//! and a linear head.

use burn::{
    config::Config,
    module::Module,
    nn::{
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Tensor},
};

use super::conv_norm_act::{ConvNormAct, ConvNormActConfig};
use super::dense_block::{DenseBlock, DenseBlockConfig};

/// Configuration for [`DenseClassifier`]
#[derive(Config, Debug)]
pub struct DenseClassifierConfig {
    /// Number of output classes
    pub num_classes: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Channel width after the stem; later stages double it twice
    #[config(default = "32")]
    pub base_channels: usize,

    /// Dropout rate before the linear head
    #[config(default = "0.3")]
    pub drop_rate: f64,

    /// Dropout rate inside each dense block
    #[config(default = "0.5")]
    pub block_drop_rate: f64,
}

impl DenseClassifierConfig {
    /// Initialize the classifier on the given device.
    ///
    /// Propagates configuration errors from the dense blocks.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> crate::utils::error::Result<DenseClassifier<B>> {
        let base = self.base_channels;

        let stem = ConvNormActConfig::new(self.in_channels, base, 3)
            .with_stride(2)
            .init(device);

        // base -> 2b -> 2b -> 4b -> 4b -> 8b, spatial /2 at each growing block
        let block1 = self.block(base, base * 2, 2, device)?;
        let block2 = self.block(base * 2, base * 2, 1, device)?;
        let block3 = self.block(base * 2, base * 4, 2, device)?;
        let block4 = self.block(base * 4, base * 4, 1, device)?;
        let block5 = self.block(base * 4, base * 8, 2, device)?;

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let dropout = DropoutConfig::new(self.drop_rate).init();
        let head = LinearConfig::new(base * 8, self.num_classes).init(device);

        Ok(DenseClassifier {
            stem,
            block1,
            block2,
            block3,
            block4,
            block5,
            global_pool,
            dropout,
            head,
            num_classes: self.num_classes,
        })
    }

    fn block<B: Backend>(
        &self,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        device: &B::Device,
    ) -> crate::utils::error::Result<DenseBlock<B>> {
        DenseBlockConfig::new(in_channels, out_channels)
            .with_stride(stride)
            .with_drop_rate(self.block_drop_rate)
            .init(device)
    }
}

/// Dense-block image classifier.
#[derive(Module, Debug)]
pub struct DenseClassifier<B: Backend> {
    stem: ConvNormAct<B>,
    block1: DenseBlock<B>,
    block2: DenseBlock<B>,
    block3: DenseBlock<B>,
    block4: DenseBlock<B>,
    block5: DenseBlock<B>,
    global_pool: AdaptiveAvgPool2d,
    dropout: Dropout,
    head: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> DenseClassifier<B> {
    /// Forward pass.
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, in_channels, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stem.forward(x);
        let x = self.block1.forward(x);
        let x = self.block2.forward(x);
        let x = self.block3.forward(x);
        let x = self.block4.forward(x);
        let x = self.block5.forward(x);

        // [B, C, H, W] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.dropout.forward(x);
        self.head.forward(x)
    }

    /// Forward pass with softmax for inference.
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let config = DenseClassifierConfig::new(10).with_block_drop_rate(0.0);
        let model = config.init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 64, 64], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 10]);
        assert_eq!(model.num_classes(), 10);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let config = DenseClassifierConfig::new(5)
            .with_base_channels(16)
            .with_block_drop_rate(0.0);
        let model = config.init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [2, 3, 32, 32],
            burn::tensor::Distribution::Default,
            &device,
        );
        let probs = model.forward_softmax(input);
        let sums: Vec<f32> = probs.sum_dim(1).into_data().iter::<f32>().collect();

        for sum in sums {
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_rejects_odd_base_channels() {
        let device: <TestBackend as burn::tensor::backend::Backend>::Device = Default::default();
        // An odd base width violates the dense-block parity invariant.
        let result = DenseClassifierConfig::new(10)
            .with_base_channels(9)
            .init::<TestBackend>(&device);
        assert!(result.is_err());
    }
}

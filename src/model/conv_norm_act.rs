//! Convolution + batch normalization + activation unit.
//!
//! The basic building unit shared by the stem and the dense blocks. Padding
//! is derived from kernel size and dilation so that spatial size is preserved
//! at stride 1 and halved (rounding up) at stride 2.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, LeakyRelu, LeakyReluConfig, PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};

/// Negative slope of the leaky ReLU activation used throughout the network
const LEAKY_SLOPE: f64 = 0.1;

/// Configuration for [`ConvNormAct`]
#[derive(Config, Debug)]
pub struct ConvNormActConfig {
    /// Number of input channels
    pub in_channels: usize,

    /// Number of output channels
    pub out_channels: usize,

    /// Square kernel size
    pub kernel_size: usize,

    /// Convolution stride
    #[config(default = "1")]
    pub stride: usize,

    /// Convolution dilation
    #[config(default = "1")]
    pub dilation: usize,

    /// Number of convolution groups; equal to the channel count this becomes
    /// a depthwise filter
    #[config(default = "1")]
    pub groups: usize,
}

impl ConvNormActConfig {
    /// Initialize the unit on the given device.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvNormAct<B> {
        // Same-style padding: stride 1 preserves H/W, stride 2 yields ceil(H/2).
        let padding = (self.kernel_size - 1) / 2 * self.dilation;

        let conv = Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_dilation([self.dilation, self.dilation])
        .with_groups(self.groups)
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(false)
        .init(device);

        let norm = BatchNormConfig::new(self.out_channels).init(device);
        let act = LeakyReluConfig::new()
            .with_negative_slope(LEAKY_SLOPE)
            .init();

        ConvNormAct { conv, norm, act }
    }
}

/// Convolution followed by batch normalization and leaky ReLU.
///
/// The convolution carries no bias since normalization follows it.
#[derive(Module, Debug)]
pub struct ConvNormAct<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    act: LeakyRelu,
}

impl<B: Backend> ConvNormAct<B> {
    /// Forward pass: conv -> norm -> activation.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);
        self.act.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_stride_one_preserves_spatial_size() {
        let device = Default::default();
        let unit = ConvNormActConfig::new(8, 16, 3).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 8, 15, 15], &device);
        let output = unit.forward(input);

        assert_eq!(output.dims(), [2, 16, 15, 15]);
    }

    #[test]
    fn test_stride_two_halves_rounding_up() {
        let device = Default::default();
        let unit = ConvNormActConfig::new(8, 8, 3)
            .with_stride(2)
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 8, 15, 15], &device);
        let output = unit.forward(input);

        assert_eq!(output.dims(), [1, 8, 8, 8]);
    }

    #[test]
    fn test_dilation_keeps_spatial_size_at_stride_one() {
        let device = Default::default();
        let unit = ConvNormActConfig::new(4, 4, 3)
            .with_dilation(2)
            .with_groups(4)
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 4, 12, 12], &device);
        let output = unit.forward(input);

        assert_eq!(output.dims(), [1, 4, 12, 12]);
    }

    #[test]
    fn test_pointwise_projection() {
        let device = Default::default();
        let unit = ConvNormActConfig::new(16, 8, 1)
            .with_stride(2)
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 16, 9, 9], &device);
        let output = unit.forward(input);

        assert_eq!(output.dims(), [1, 8, 5, 5]);
    }
}

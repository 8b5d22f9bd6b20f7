//! Dense block: the channel-split building block of the backbone.
//!
//! The block runs its input through two independent paths and concatenates
//! the results along the channel axis:
//!
//! - a downsample path producing the first half of the output channels:
//!   at stride 1 an identity slice of the leading input channels, at stride 2
//!   a learned pointwise projection;
//! - a main path producing the second half: a 1x1 reduction, a depthwise
//!   spatial convolution carrying the block's stride and dilation, a 1x1
//!   expansion, and optional dropout.
//!
//! Both paths apply the same stride, so their spatial shapes always match and
//! the output is `[batch, out_channels, ceil(H / stride), ceil(W / stride)]`.

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig},
    tensor::{backend::Backend, Tensor},
};

use super::conv_norm_act::{ConvNormAct, ConvNormActConfig};
use crate::utils::error::Error;

/// Configuration for [`DenseBlock`]
#[derive(Config, Debug)]
pub struct DenseBlockConfig {
    /// Number of input channels; must be even
    pub in_channels: usize,

    /// Number of output channels; must equal `in_channels` or
    /// `2 * in_channels`
    pub out_channels: usize,

    /// Spatial stride, 1 or 2
    #[config(default = "1")]
    pub stride: usize,

    /// Dilation of the spatial convolution
    #[config(default = "1")]
    pub dilation: usize,

    /// Dropout probability on the main path; 0 disables the dropout stage
    #[config(default = "0.5")]
    pub drop_rate: f64,

    /// Reserved squeeze-excitation flag; accepted but currently unused
    #[config(default = "false")]
    pub se_block: bool,
}

impl DenseBlockConfig {
    /// Check the construction invariants without building the block.
    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if self.out_channels != self.in_channels && self.out_channels != 2 * self.in_channels {
            return Err(Error::Config(format!(
                "out_channels must equal in_channels or 2 * in_channels, got in={} out={}",
                self.in_channels, self.out_channels
            )));
        }

        if self.in_channels % 2 != 0 {
            return Err(Error::Config(format!(
                "in_channels must be even, got {}",
                self.in_channels
            )));
        }

        if self.stride != 1 && self.stride != 2 {
            return Err(Error::Config(format!(
                "stride must be 1 or 2, got {}",
                self.stride
            )));
        }

        if !(0.0..1.0).contains(&self.drop_rate) {
            return Err(Error::Config(format!(
                "drop_rate must be in [0, 1), got {}",
                self.drop_rate
            )));
        }

        // Widths below derive from out_channels by repeated integer halving.
        if self.out_channels / 4 == 0 {
            return Err(Error::Config(format!(
                "out_channels {} leaves no width for the bottleneck",
                self.out_channels
            )));
        }

        Ok(())
    }

    /// Initialize the block on the given device.
    ///
    /// Fails with [`Error::Config`] when the channel, stride or dropout
    /// invariants are violated; nothing is silently coerced.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> crate::utils::error::Result<DenseBlock<B>> {
        self.validate()?;

        // Each path contributes half of the nominal output width. Widths
        // floor-truncate when out_channels is not divisible by 4.
        let half_out = self.out_channels / 2;
        let mid = half_out / 2;

        let downsample = if self.stride == 1 {
            DownsamplePath::Cut(half_out)
        } else {
            DownsamplePath::Projection(
                ConvNormActConfig::new(self.in_channels, half_out, 1)
                    .with_stride(2)
                    .init(device),
            )
        };

        let reduce = ConvNormActConfig::new(self.in_channels, mid, 1).init(device);
        let spatial = ConvNormActConfig::new(mid, mid, 3)
            .with_stride(self.stride)
            .with_dilation(self.dilation)
            .with_groups(mid)
            .init(device);
        let expand = ConvNormActConfig::new(mid, half_out, 1).init(device);

        let dropout = if self.drop_rate > 0.0 {
            Some(DropoutConfig::new(self.drop_rate).init())
        } else {
            None
        };

        Ok(DenseBlock {
            downsample,
            reduce,
            spatial,
            expand,
            dropout,
        })
    }
}

/// Downsample path variant, selected once at construction.
#[derive(Module, Debug)]
pub enum DownsamplePath<B: Backend> {
    /// Identity slice of the leading channels; the payload is the slice
    /// width. Parameter-free, stride 1 only.
    Cut(usize),
    /// Learned pointwise stride-2 projection.
    Projection(ConvNormAct<B>),
}

impl<B: Backend> DownsamplePath<B> {
    /// Apply the selected variant.
    ///
    /// The `Cut` variant requires at least as many input channels as its
    /// slice width; fewer is a caller contract violation and fails in the
    /// tensor backend.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            DownsamplePath::Cut(channels) => x.narrow(1, 0, *channels),
            DownsamplePath::Projection(conv) => conv.forward(x),
        }
    }
}

/// Channel-split dense block.
///
/// Stateless across calls apart from learned parameters; safe to invoke
/// concurrently on independent inputs. Dropout is active only on an autodiff
/// backend, so inference through the plain backend is fully deterministic.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    downsample: DownsamplePath<B>,
    reduce: ConvNormAct<B>,
    spatial: ConvNormAct<B>,
    expand: ConvNormAct<B>,
    dropout: Option<Dropout>,
}

impl<B: Backend> DenseBlock<B> {
    /// Forward pass.
    ///
    /// Input must carry the configured `in_channels`. The output holds the
    /// downsample path in its first `out_channels / 2` channels and the main
    /// path in the rest.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let down = self.downsample.forward(x.clone());

        let main = self.reduce.forward(x);
        let main = self.spatial.forward(main);
        let main = self.expand.forward(main);
        let main = match &self.dropout {
            Some(dropout) => dropout.forward(main),
            None => main,
        };

        Tensor::cat(vec![down, main], 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    fn block(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
    ) -> DenseBlock<TestBackend> {
        let device = Default::default();
        DenseBlockConfig::new(in_channels, out_channels)
            .with_stride(stride)
            .with_drop_rate(0.0)
            .init(&device)
            .unwrap()
    }

    #[test]
    fn test_output_shape_all_valid_configs() {
        let device = Default::default();
        let cases = [
            (64, 64, 1),
            (64, 128, 1),
            (64, 64, 2),
            (64, 128, 2),
        ];

        for (in_ch, out_ch, stride) in cases {
            let block = block(in_ch, out_ch, stride);
            let input = Tensor::<TestBackend, 4>::zeros([2, in_ch, 16, 16], &device);
            let output = block.forward(input);

            let expected_spatial = 16usize.div_ceil(stride);
            assert_eq!(
                output.dims(),
                [2, out_ch, expected_spatial, expected_spatial],
                "config in={in_ch} out={out_ch} stride={stride}"
            );
        }
    }

    #[test]
    fn test_odd_spatial_size_rounds_up() {
        let device = Default::default();
        let block = block(16, 32, 2);

        let input = Tensor::<TestBackend, 4>::zeros([1, 16, 7, 7], &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [1, 32, 4, 4]);
    }

    #[test]
    fn test_dilation_preserves_shape_contract() {
        let device = Default::default();
        let block = DenseBlockConfig::new(32, 32)
            .with_dilation(2)
            .with_drop_rate(0.0)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([1, 32, 13, 13], &device);
        assert_eq!(block.forward(input).dims(), [1, 32, 13, 13]);
    }

    #[test]
    fn test_rejects_invalid_out_channels() {
        let device: <TestBackend as burn::tensor::backend::Backend>::Device = Default::default();
        let result = DenseBlockConfig::new(64, 96).init::<TestBackend>(&device);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_odd_in_channels() {
        let device: <TestBackend as burn::tensor::backend::Backend>::Device = Default::default();
        let result = DenseBlockConfig::new(63, 126).init::<TestBackend>(&device);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_invalid_stride() {
        let device: <TestBackend as burn::tensor::backend::Backend>::Device = Default::default();
        let result = DenseBlockConfig::new(64, 64)
            .with_stride(3)
            .init::<TestBackend>(&device);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_drop_rate() {
        let device: <TestBackend as burn::tensor::backend::Backend>::Device = Default::default();
        let result = DenseBlockConfig::new(64, 64)
            .with_drop_rate(1.0)
            .init::<TestBackend>(&device);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_degenerate_width() {
        let device: <TestBackend as burn::tensor::backend::Backend>::Device = Default::default();
        let result = DenseBlockConfig::new(2, 2).init::<TestBackend>(&device);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_stride_one_downsample_is_exact_channel_slice() {
        let device = Default::default();
        let block = block(64, 64, 1);

        let input = Tensor::<TestBackend, 4>::random(
            [2, 64, 8, 8],
            burn::tensor::Distribution::Default,
            &device,
        );
        let output = block.forward(input.clone());

        // First half of the output is the untouched leading input channels.
        output
            .narrow(1, 0, 32)
            .into_data()
            .assert_eq(&input.narrow(1, 0, 32).into_data(), true);
    }

    #[test]
    fn test_growing_stride_one_slices_full_input() {
        let device = Default::default();
        let block = block(16, 32, 1);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 16, 6, 6],
            burn::tensor::Distribution::Default,
            &device,
        );
        let output = block.forward(input.clone());

        assert_eq!(output.dims(), [1, 32, 6, 6]);
        output
            .narrow(1, 0, 16)
            .into_data()
            .assert_eq(&input.into_data(), true);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let device = Default::default();
        // Non-zero drop rate: dropout must still be inert outside autodiff.
        let block = DenseBlockConfig::new(16, 32)
            .with_stride(2)
            .with_drop_rate(0.5)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [1, 16, 8, 8],
            burn::tensor::Distribution::Default,
            &device,
        );

        let first = block.forward(input.clone());
        let second = block.forward(input);

        first.into_data().assert_eq(&second.into_data(), true);
    }

    #[test]
    fn test_dropout_is_stochastic_in_training() {
        type TrainBackend = Autodiff<NdArray>;

        let device = Default::default();
        let block = DenseBlockConfig::new(16, 32)
            .with_drop_rate(0.5)
            .init::<TrainBackend>(&device)
            .unwrap();

        let input = Tensor::<TrainBackend, 4>::random(
            [1, 16, 8, 8],
            burn::tensor::Distribution::Default,
            &device,
        );

        let first = block.forward(input.clone()).into_data();
        let second = block.forward(input).into_data();

        // Independent dropout masks make identical outputs vanishingly
        // unlikely. Compare the main-path half only; the downsample half is
        // identical by construction.
        let a: Vec<f32> = first.iter::<f32>().collect();
        let b: Vec<f32> = second.iter::<f32>().collect();
        assert_eq!(a.len(), b.len());
        assert!(a[a.len() / 2..] != b[b.len() / 2..]);
    }

    #[test]
    fn test_validate_accepts_floored_widths() {
        // 6 -> 6 halves to 3 and floors the bottleneck width to 1.
        let config = DenseBlockConfig::new(6, 6).with_drop_rate(0.0);
        assert!(config.validate().is_ok());

        let device = Default::default();
        let block = config.init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 4>::zeros([1, 6, 8, 8], &device);
        assert_eq!(block.forward(input).dims(), [1, 6, 8, 8]);
    }
}

//! CNN architecture for mask-wearing classification
//!
//! A configurable convolutional network built with the Burn framework. The
//! filter ladder comes from [`ModelConfig`](super::config::ModelConfig), so
//! the `base`, `wide` and `lite` presets all share one `Module` type and the
//! optimizer generics stay simple.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::config::ModelConfig;

/// A CNN block with Conv2d, BatchNorm, ReLU, and optional MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
    pub pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        with_pool: bool,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        let pool = if with_pool {
            Some(MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init())
        } else {
            None
        };

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);

        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }
}

/// Mask-wearing classifier CNN
///
/// Architecture:
/// - Convolutional blocks per the config filter ladder, each with BatchNorm,
///   ReLU and MaxPooling
/// - Global average pooling, so non-square inputs need no special casing
/// - Fully connected head with dropout
#[derive(Module, Debug)]
pub struct MaskClassifier<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub global_pool: AdaptiveAvgPool2d,
    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> MaskClassifier<B> {
    /// Create a new classifier from configuration
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.conv_filters.len());
        let mut in_channels = config.input_channels;

        for &out_channels in &config.conv_filters {
            blocks.push(ConvBlock::new(
                in_channels,
                out_channels,
                config.kernel_size,
                true,
                device,
            ));
            in_channels = out_channels;
        }

        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();

        let fc1 = LinearConfig::new(in_channels, config.fc_units).init(device);
        let dropout = DropoutConfig::new(config.dropout_rate).init();
        let fc2 = LinearConfig::new(config.fc_units, config.num_classes).init(device);

        Self {
            blocks,
            global_pool,
            fc1,
            dropout,
            fc2,
            num_classes: config.num_classes,
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = x;
        for block in &self.blocks {
            x = block.forward(x);
        }

        // Global pooling: [B, C, H, W] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass with softmax for inference
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

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let config = ModelConfig::base();
        let model = MaskClassifier::<TestBackend>::new(&config, &device);

        // [batch=2, channels=3, height=128, width=96]
        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 128, 96], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 18]);
    }

    #[test]
    fn test_lite_classifier_output_shape() {
        let device = Default::default();
        let config = ModelConfig::lite();
        let model = MaskClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 48], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [1, 18]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let config = ModelConfig::lite();
        let model = MaskClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 64, 48], &device);
        let probs = model.forward_softmax(input);

        let sum: f32 = probs.sum().into_scalar();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}

//! CNN Architectures for Scene Classification
//!
//! Three size variants of the same stacked conv/pool/fully-connected
//! architecture, built with the Burn framework. All variants take
//! 224x224 RGB input; the fully-connected layer sizes are derived from
//! that input size.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{relu, softmax},
};

/// Capability consumed by evaluation and inference: a batch of
/// channel-first images in, raw per-class scores out.
pub trait SceneModel<B: Backend> {
    /// Compute logits for a batch of shape `[batch, 3, 224, 224]`
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

fn conv3x3<B: Backend>(channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(channels, [3, 3])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init(device)
}

fn pool2x2() -> MaxPool2d {
    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init()
}

/// Full-size network: five conv stages, VGG-16 filter counts
///
/// 224 -> 112 -> 56 -> 28 -> 14 -> 7 spatial, 512 * 7 * 7 = 25088
/// features into the classifier head.
#[derive(Module, Debug)]
pub struct SceneNet<B: Backend> {
    conv1_1: Conv2d<B>,
    conv1_2: Conv2d<B>,
    conv2_1: Conv2d<B>,
    conv2_2: Conv2d<B>,
    conv3_1: Conv2d<B>,
    conv3_2: Conv2d<B>,
    conv3_3: Conv2d<B>,
    conv4_1: Conv2d<B>,
    conv4_2: Conv2d<B>,
    conv4_3: Conv2d<B>,
    conv5_1: Conv2d<B>,
    conv5_2: Conv2d<B>,
    conv5_3: Conv2d<B>,
    pool: MaxPool2d,
    fc6: Linear<B>,
    fc7: Linear<B>,
    fc8: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> SceneNet<B> {
    /// Create the full-size network
    pub fn new(num_classes: usize, device: &B::Device) -> Self {
        Self {
            conv1_1: conv3x3([3, 64], device),
            conv1_2: conv3x3([64, 64], device),
            conv2_1: conv3x3([64, 128], device),
            conv2_2: conv3x3([128, 128], device),
            conv3_1: conv3x3([128, 256], device),
            conv3_2: conv3x3([256, 256], device),
            conv3_3: conv3x3([256, 256], device),
            conv4_1: conv3x3([256, 512], device),
            conv4_2: conv3x3([512, 512], device),
            conv4_3: conv3x3([512, 512], device),
            conv5_1: conv3x3([512, 512], device),
            conv5_2: conv3x3([512, 512], device),
            conv5_3: conv3x3([512, 512], device),
            pool: pool2x2(),
            fc6: LinearConfig::new(25088, 4096).init(device),
            fc7: LinearConfig::new(4096, 4096).init(device),
            fc8: LinearConfig::new(4096, num_classes).init(device),
            dropout: DropoutConfig::new(0.5).init(),
        }
    }

    /// Forward pass returning logits of shape `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1_1.forward(x));
        let x = relu(self.conv1_2.forward(x));
        let x = self.pool.forward(x);

        let x = relu(self.conv2_1.forward(x));
        let x = relu(self.conv2_2.forward(x));
        let x = self.pool.forward(x);

        let x = relu(self.conv3_1.forward(x));
        let x = relu(self.conv3_2.forward(x));
        let x = relu(self.conv3_3.forward(x));
        let x = self.pool.forward(x);

        let x = relu(self.conv4_1.forward(x));
        let x = relu(self.conv4_2.forward(x));
        let x = relu(self.conv4_3.forward(x));
        let x = self.pool.forward(x);

        let x = relu(self.conv5_1.forward(x));
        let x = relu(self.conv5_2.forward(x));
        let x = relu(self.conv5_3.forward(x));
        let x = self.pool.forward(x);

        let x = x.flatten::<2>(1, 3);
        let x = self.dropout.forward(relu(self.fc6.forward(x)));
        let x = self.dropout.forward(relu(self.fc7.forward(x)));
        self.fc8.forward(x)
    }

    /// Forward pass with softmax, for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }
}

impl<B: Backend> SceneModel<B> for SceneNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        SceneNet::forward(self, images)
    }
}

/// Small network: three conv stages, the default training target
///
/// 224 -> 112 -> 56 -> 28 spatial, 32 * 28 * 28 = 25088 features into
/// the classifier head.
#[derive(Module, Debug)]
pub struct SceneNetSmall<B: Backend> {
    conv1_1: Conv2d<B>,
    conv1_2: Conv2d<B>,
    conv2_1: Conv2d<B>,
    conv2_2: Conv2d<B>,
    conv3_1: Conv2d<B>,
    conv3_2: Conv2d<B>,
    conv3_3: Conv2d<B>,
    pool: MaxPool2d,
    fc6: Linear<B>,
    fc7: Linear<B>,
    fc8: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> SceneNetSmall<B> {
    /// Create the small network
    pub fn new(num_classes: usize, device: &B::Device) -> Self {
        Self {
            conv1_1: conv3x3([3, 16], device),
            conv1_2: conv3x3([16, 16], device),
            conv2_1: conv3x3([16, 32], device),
            conv2_2: conv3x3([32, 32], device),
            conv3_1: conv3x3([32, 64], device),
            conv3_2: conv3x3([64, 64], device),
            conv3_3: conv3x3([64, 32], device),
            pool: pool2x2(),
            fc6: LinearConfig::new(25088, 1024).init(device),
            fc7: LinearConfig::new(1024, 128).init(device),
            fc8: LinearConfig::new(128, num_classes).init(device),
            dropout: DropoutConfig::new(0.3).init(),
        }
    }

    /// Forward pass returning logits of shape `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1_1.forward(x));
        let x = relu(self.conv1_2.forward(x));
        let x = self.pool.forward(x);

        let x = relu(self.conv2_1.forward(x));
        let x = relu(self.conv2_2.forward(x));
        let x = self.pool.forward(x);

        let x = relu(self.conv3_1.forward(x));
        let x = relu(self.conv3_2.forward(x));
        let x = relu(self.conv3_3.forward(x));
        let x = self.pool.forward(x);

        let x = x.flatten::<2>(1, 3);
        let x = self.dropout.forward(relu(self.fc6.forward(x)));
        let x = self.dropout.forward(relu(self.fc7.forward(x)));
        self.fc8.forward(x)
    }

    /// Forward pass with softmax, for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }
}

impl<B: Backend> SceneModel<B> for SceneNetSmall<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        SceneNetSmall::forward(self, images)
    }
}

/// Smallest network: three conv stages with halved filter counts
///
/// 224 -> 112 -> 56 -> 28 spatial, 16 * 28 * 28 = 12544 features into
/// the classifier head.
#[derive(Module, Debug)]
pub struct SceneNetSmall2<B: Backend> {
    conv1_1: Conv2d<B>,
    conv1_2: Conv2d<B>,
    conv2_1: Conv2d<B>,
    conv2_2: Conv2d<B>,
    conv3_1: Conv2d<B>,
    conv3_2: Conv2d<B>,
    conv3_3: Conv2d<B>,
    pool: MaxPool2d,
    fc6: Linear<B>,
    fc7: Linear<B>,
    fc8: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> SceneNetSmall2<B> {
    /// Create the smallest network
    pub fn new(num_classes: usize, device: &B::Device) -> Self {
        Self {
            conv1_1: conv3x3([3, 8], device),
            conv1_2: conv3x3([8, 8], device),
            conv2_1: conv3x3([8, 16], device),
            conv2_2: conv3x3([16, 16], device),
            conv3_1: conv3x3([16, 32], device),
            conv3_2: conv3x3([32, 32], device),
            conv3_3: conv3x3([32, 16], device),
            pool: pool2x2(),
            fc6: LinearConfig::new(12544, 1024).init(device),
            fc7: LinearConfig::new(1024, 128).init(device),
            fc8: LinearConfig::new(128, num_classes).init(device),
            dropout: DropoutConfig::new(0.3).init(),
        }
    }

    /// Forward pass returning logits of shape `[batch, num_classes]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1_1.forward(x));
        let x = relu(self.conv1_2.forward(x));
        let x = self.pool.forward(x);

        let x = relu(self.conv2_1.forward(x));
        let x = relu(self.conv2_2.forward(x));
        let x = self.pool.forward(x);

        let x = relu(self.conv3_1.forward(x));
        let x = relu(self.conv3_2.forward(x));
        let x = relu(self.conv3_3.forward(x));
        let x = self.pool.forward(x);

        let x = x.flatten::<2>(1, 3);
        let x = self.dropout.forward(relu(self.fc6.forward(x)));
        let x = self.dropout.forward(relu(self.fc7.forward(x)));
        self.fc8.forward(x)
    }

    /// Forward pass with softmax, for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }
}

impl<B: Backend> SceneModel<B> for SceneNetSmall2<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        SceneNetSmall2::forward(self, images)
    }
}

/// Expected input side length for all variants
pub const MODEL_INPUT_SIZE: usize = 224;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::NUM_CLASSES;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_small2_output_shape() {
        let device = Default::default();
        let model = SceneNetSmall2::<TestBackend>::new(NUM_CLASSES, &device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 224, 224], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [1, NUM_CLASSES]);
    }

    #[test]
    fn test_small2_softmax_sums_to_one() {
        let device = Default::default();
        let model = SceneNetSmall2::<TestBackend>::new(NUM_CLASSES, &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 224, 224], &device);
        let probs: Vec<f32> = model
            .forward_softmax(input)
            .into_data()
            .to_vec()
            .unwrap();

        assert_eq!(probs.len(), NUM_CLASSES);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_variants_construct() {
        let device = Default::default();
        let _full = SceneNet::<TestBackend>::new(NUM_CLASSES, &device);
        let _small = SceneNetSmall::<TestBackend>::new(NUM_CLASSES, &device);
        let _small2 = SceneNetSmall2::<TestBackend>::new(NUM_CLASSES, &device);
    }
}

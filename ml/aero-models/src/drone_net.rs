//! Convolutional image classifier.

use aero_types::{Batch, Matrix};
use burn::module::Module;
use burn::nn;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::Backend;
use burn::tensor::activation::{relu, softmax};
use burn::tensor::{Tensor, TensorData};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Topology of a [`DroneNet`].
///
/// # Example
///
/// ```
/// use aero_models::DroneNetConfig;
///
/// let config = DroneNetConfig::new(2);
/// assert_eq!(config.input_height, 224);
/// assert_eq!(config.filters, 32);
/// assert!(config.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneNetConfig {
    /// Input image height.
    pub input_height: usize,
    /// Input image width.
    pub input_width: usize,
    /// Input channels (3 for RGB).
    pub input_channels: usize,
    /// Convolution filters.
    pub filters: usize,
    /// Square convolution kernel size, valid padding.
    pub kernel_size: usize,
    /// Square max-pool window, stride equal to the window.
    pub pool_size: usize,
    /// Hidden dense units.
    pub hidden: usize,
    /// Output classes.
    pub num_classes: usize,
}

impl Default for DroneNetConfig {
    fn default() -> Self {
        Self::new(2)
    }
}

impl DroneNetConfig {
    /// Creates the standard 224x224 RGB topology with `num_classes` outputs.
    #[must_use]
    pub const fn new(num_classes: usize) -> Self {
        Self {
            input_height: 224,
            input_width: 224,
            input_channels: 3,
            filters: 32,
            kernel_size: 3,
            pool_size: 2,
            hidden: 64,
            num_classes,
        }
    }

    /// Sets the input image size.
    #[must_use]
    pub const fn with_input_size(mut self, height: usize, width: usize) -> Self {
        self.input_height = height;
        self.input_width = width;
        self
    }

    /// Sets the number of convolution filters.
    #[must_use]
    pub const fn with_filters(mut self, filters: usize) -> Self {
        self.filters = filters;
        self
    }

    /// Sets the number of hidden units.
    #[must_use]
    pub const fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    /// Spatial size after convolution and pooling, `(height, width)`.
    #[must_use]
    pub const fn pooled_size(&self) -> (usize, usize) {
        if self.pool_size == 0 {
            return (0, 0);
        }
        let shrink = self.kernel_size.saturating_sub(1);
        let conv_h = self.input_height.saturating_sub(shrink);
        let conv_w = self.input_width.saturating_sub(shrink);
        (conv_h / self.pool_size, conv_w / self.pool_size)
    }

    /// Number of features entering the hidden layer.
    #[must_use]
    pub const fn flattened_features(&self) -> usize {
        let (h, w) = self.pooled_size();
        h * w * self.filters
    }

    /// Returns `true` if every dimension is positive and the image survives
    /// convolution and pooling.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.input_channels > 0
            && self.filters > 0
            && self.kernel_size > 0
            && self.pool_size > 0
            && self.hidden > 0
            && self.num_classes > 0
            && self.flattened_features() > 0
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if [`Self::is_valid`] is false.
    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ModelError::invalid_config(format!("{self:?}")))
        }
    }

    /// Input shape for a batch of `n` images.
    #[must_use]
    pub const fn input_shape(&self, n: usize) -> [usize; 4] {
        [n, self.input_height, self.input_width, self.input_channels]
    }

    /// Checks that a batch matches the model input.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] if height, width or channels differ.
    pub fn check_batch(&self, batch: &Batch) -> Result<()> {
        let expected = self.input_shape(batch.batch_size());
        if batch.shape() == expected {
            Ok(())
        } else {
            Err(ModelError::shape_mismatch(
                format!("{expected:?}"),
                format!("{:?}", batch.shape()),
            ))
        }
    }

    /// Builds a model with freshly initialized weights.
    #[must_use]
    pub fn init<B: Backend>(&self, device: &B::Device) -> DroneNet<B> {
        DroneNet::new(*self, device)
    }
}

/// Image classifier.
///
/// Architecture: Conv2d (`ReLU`) -> `MaxPool2d` -> Flatten -> Linear (`ReLU`) -> Linear.
/// Input is NHWC; [`DroneNet::forward`] returns logits and
/// [`DroneNet::forward_probs`] softmax probabilities.
#[derive(Debug, Module)]
pub struct DroneNet<B: Backend> {
    conv: Conv2d<B>,
    pool: MaxPool2d,
    hidden: nn::Linear<B>,
    output: nn::Linear<B>,
}

impl<B: Backend> DroneNet<B> {
    /// Creates a model with freshly initialized weights.
    #[must_use]
    pub fn new(config: DroneNetConfig, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new(
            [config.input_channels, config.filters],
            [config.kernel_size, config.kernel_size],
        )
        .init(device);
        let pool = MaxPool2dConfig::new([config.pool_size, config.pool_size])
            .with_strides([config.pool_size, config.pool_size])
            .init();
        let hidden = nn::LinearConfig::new(config.flattened_features(), config.hidden).init(device);
        let output = nn::LinearConfig::new(config.hidden, config.num_classes).init(device);
        Self {
            conv,
            pool,
            hidden,
            output,
        }
    }

    /// Runs the forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: Images of shape `[batch, height, width, channels]`
    ///
    /// # Returns
    ///
    /// Logits of shape `[batch, num_classes]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = input.permute([0, 3, 1, 2]);
        let x = relu(self.conv.forward(x));
        let x = self.pool.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = relu(self.hidden.forward(x));
        self.output.forward(x)
    }

    /// Runs the forward pass and applies softmax over classes.
    pub fn forward_probs(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(input), 1)
    }

    /// Returns `true` if the weight shapes match `config`.
    #[must_use]
    pub fn matches_config(&self, config: &DroneNetConfig) -> bool {
        self.conv.weight.val().dims()
            == [
                config.filters,
                config.input_channels,
                config.kernel_size,
                config.kernel_size,
            ]
            && self.hidden.weight.val().dims() == [config.flattened_features(), config.hidden]
            && self.output.weight.val().dims() == [config.hidden, config.num_classes]
    }

    /// Computes class probabilities for a batch.
    ///
    /// An empty batch yields an empty `[0, num_classes]` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ShapeMismatch`] if the batch does not match
    /// `config`, or [`ModelError::Inference`] if readback fails.
    pub fn predict(&self, config: &DroneNetConfig, batch: &Batch, device: &B::Device) -> Result<Matrix> {
        config.check_batch(batch)?;
        if batch.is_empty() {
            return Ok(Matrix::new(0, config.num_classes, Vec::new())?);
        }
        let probs = self.forward_probs(batch_to_tensor(batch, device));
        tensor_to_matrix(probs)
    }
}

/// Copies a [`Batch`] into a 4-D tensor.
#[must_use]
pub fn batch_to_tensor<B: Backend>(batch: &Batch, device: &B::Device) -> Tensor<B, 4> {
    Tensor::from_data(TensorData::new(batch.data().to_vec(), batch.shape()), device)
}

/// Copies a [`Matrix`] into a 2-D tensor.
#[must_use]
pub fn matrix_to_tensor<B: Backend>(matrix: &Matrix, device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(
        TensorData::new(matrix.data().to_vec(), [matrix.rows(), matrix.cols()]),
        device,
    )
}

/// Reads a 2-D tensor back into a [`Matrix`].
///
/// # Errors
///
/// Returns [`ModelError::Inference`] if the tensor data cannot be read as `f32`.
pub fn tensor_to_matrix<B: Backend>(tensor: Tensor<B, 2>) -> Result<Matrix> {
    let [rows, cols] = tensor.dims();
    let data = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ModelError::inference(format!("{e:?}")))?;
    Ok(Matrix::new(rows, cols, data)?)
}

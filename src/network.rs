//! Fully-connected feed-forward network trained with backpropagation.
//!
//! Layer `i` holds a weight matrix of shape `[size(i), size(i-1)]` and a bias
//! vector of shape `[size(i)]`. The forward pass keeps every pre-activation
//! `z[i]` and activation `a[i]` so the backward pass can apply the chain rule
//! one layer at a time:
//!
//! ```text
//! z[i] = W[i]·a[i-1] + b[i]          a[i] = act(z[i])
//! δ[last] = (a[last] - y) ⊙ σ'(z[last])
//! δ[i]    = (W[i+1]ᵀ·δ[i+1]) ⊙ act'(z[i])
//! ∂W[i]   = δ[i]·a[i-1]ᵀ                ∂b[i] = δ[i]
//! ```

pub mod activation;
pub mod loss;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PrefnetError, Result};

pub use activation::{Activation, sigmoid};
pub use loss::{BatchScore, is_correct, squared_error};

/// Half-width of the uniform range used for parameter initialization.
const INIT_RANGE: f64 = 0.5;

/// Ordered layer sizes `[D, h1, ..., 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkArchitecture(Vec<usize>);

impl NetworkArchitecture {
    /// Validate and wrap a full list of layer sizes.
    pub fn new(layer_sizes: Vec<usize>) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(PrefnetError::invalid_config(
                "architecture",
                "needs at least an input and an output layer",
            ));
        }
        if layer_sizes.contains(&0) {
            return Err(PrefnetError::invalid_config(
                "architecture",
                "layer sizes must be greater than 0",
            ));
        }
        if layer_sizes.last() != Some(&1) {
            return Err(PrefnetError::invalid_config(
                "architecture",
                "the output layer must have exactly one unit",
            ));
        }
        Ok(Self(layer_sizes))
    }

    /// Build `[input_size, ...hidden_layers, 1]`.
    pub fn with_hidden(input_size: usize, hidden_layers: &[usize]) -> Result<Self> {
        let mut sizes = Vec::with_capacity(hidden_layers.len() + 2);
        sizes.push(input_size);
        sizes.extend_from_slice(hidden_layers);
        sizes.push(1);
        Self::new(sizes)
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.0
    }

    /// Expected feature dimensionality.
    pub fn input_size(&self) -> usize {
        self.0[0]
    }

    /// Number of weight layers (layer sizes minus the input).
    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }
}

/// Weights and biases of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParameters {
    /// Shape `[outputs, inputs]`.
    pub weights: Array2<f64>,
    /// Shape `[outputs]`.
    pub biases: Array1<f64>,
}

impl LayerParameters {
    fn zeros(outputs: usize, inputs: usize) -> Self {
        Self {
            weights: Array2::zeros((outputs, inputs)),
            biases: Array1::zeros(outputs),
        }
    }
}

/// All trainable parameters of a network, first hidden layer first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub layers: Vec<LayerParameters>,
}

impl ModelParameters {
    /// Uniform random parameters in `[-0.5, 0.5]` drawn from a seeded generator.
    pub fn random(architecture: &NetworkArchitecture, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let layers = architecture
            .layer_sizes()
            .windows(2)
            .map(|pair| {
                let (inputs, outputs) = (pair[0], pair[1]);
                LayerParameters {
                    weights: Array2::from_shape_fn((outputs, inputs), |_| {
                        rng.random_range(-INIT_RANGE..=INIT_RANGE)
                    }),
                    biases: Array1::from_shape_fn(outputs, |_| {
                        rng.random_range(-INIT_RANGE..=INIT_RANGE)
                    }),
                }
            })
            .collect();
        Self { layers }
    }

    /// Check that every matrix and vector matches `architecture`.
    pub fn validate(&self, architecture: &NetworkArchitecture) -> Result<()> {
        if self.layers.len() != architecture.depth() {
            return Err(PrefnetError::invalid_config(
                "parameters",
                format!(
                    "expected {} layers, got {}",
                    architecture.depth(),
                    self.layers.len()
                ),
            ));
        }
        for (i, (layer, pair)) in self
            .layers
            .iter()
            .zip(architecture.layer_sizes().windows(2))
            .enumerate()
        {
            let expected = (pair[1], pair[0]);
            if layer.weights.dim() != expected || layer.biases.len() != pair[1] {
                return Err(PrefnetError::invalid_config(
                    "parameters",
                    format!(
                        "layer {i}: expected weights {:?} and {} biases, got {:?} and {}",
                        expected,
                        pair[1],
                        layer.weights.dim(),
                        layer.biases.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Whether every parameter is a finite number.
    pub fn is_finite(&self) -> bool {
        self.layers.iter().all(|layer| {
            layer.weights.iter().all(|w| w.is_finite()) && layer.biases.iter().all(|b| b.is_finite())
        })
    }
}

/// Intermediate values of one forward pass.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// `a[0]` is the input, `a[last]` the output.
    pub activations: Vec<Array1<f64>>,
    /// Pre-activations of each weight layer.
    pub z_values: Vec<Array1<f64>>,
}

impl ForwardPass {
    /// The scalar engagement score.
    pub fn output(&self) -> f64 {
        self.activations
            .last()
            .and_then(|a| a.get(0).copied())
            .unwrap_or(0.0)
    }
}

/// Per-layer loss gradients, shaped like [`ModelParameters`].
#[derive(Debug, Clone)]
pub struct Gradients {
    pub layers: Vec<LayerParameters>,
}

/// A feed-forward network exclusively owning its parameters.
///
/// Deserialization re-validates the architecture and every parameter shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NetworkRecord")]
pub struct NeuralNetwork {
    architecture: NetworkArchitecture,
    activation: Activation,
    parameters: ModelParameters,
}

#[derive(Deserialize)]
struct NetworkRecord {
    architecture: NetworkArchitecture,
    activation: Activation,
    parameters: ModelParameters,
}

impl TryFrom<NetworkRecord> for NeuralNetwork {
    type Error = PrefnetError;

    fn try_from(record: NetworkRecord) -> Result<Self> {
        let architecture = NetworkArchitecture::new(record.architecture.0)?;
        NeuralNetwork::from_parameters(architecture, record.activation, record.parameters)
    }
}

impl NeuralNetwork {
    /// Create a network with seeded random parameters.
    pub fn new(architecture: NetworkArchitecture, activation: Activation, seed: u64) -> Self {
        let parameters = ModelParameters::random(&architecture, seed);
        Self {
            architecture,
            activation,
            parameters,
        }
    }

    /// Rebuild a network from stored parameters, checking their shapes.
    pub fn from_parameters(
        architecture: NetworkArchitecture,
        activation: Activation,
        parameters: ModelParameters,
    ) -> Result<Self> {
        parameters.validate(&architecture)?;
        Ok(Self {
            architecture,
            activation,
            parameters,
        })
    }

    pub fn architecture(&self) -> &NetworkArchitecture {
        &self.architecture
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.parameters
    }

    pub fn into_parameters(self) -> ModelParameters {
        self.parameters
    }

    /// Activation used by layer `index`; the output layer is always sigmoid.
    fn layer_activation(&self, index: usize) -> Activation {
        if index + 1 == self.parameters.layers.len() {
            Activation::Sigmoid
        } else {
            self.activation
        }
    }

    /// Run `input` through every layer, keeping intermediate values.
    pub fn forward(&self, input: &[f64]) -> Result<ForwardPass> {
        let expected = self.architecture.input_size();
        if input.len() != expected {
            return Err(PrefnetError::dimension_mismatch(expected, input.len()));
        }

        let depth = self.parameters.layers.len();
        let mut activations = Vec::with_capacity(depth + 1);
        let mut z_values = Vec::with_capacity(depth);
        activations.push(Array1::from(input.to_vec()));

        for (i, layer) in self.parameters.layers.iter().enumerate() {
            let z = layer.weights.dot(&activations[i]) + &layer.biases;
            let act = self.layer_activation(i);
            activations.push(z.mapv(|x| act.apply(x)));
            z_values.push(z);
        }

        Ok(ForwardPass {
            activations,
            z_values,
        })
    }

    /// Predicted engagement score in (0, 1).
    pub fn predict(&self, input: &[f64]) -> Result<f64> {
        Ok(self.forward(input)?.output())
    }

    /// Gradients of `½(a[last] − label)²` for one example.
    pub fn backward(&self, pass: &ForwardPass, label: f64) -> Gradients {
        let depth = self.parameters.layers.len();
        let mut layers: Vec<LayerParameters> = self
            .architecture
            .layer_sizes()
            .windows(2)
            .map(|pair| LayerParameters::zeros(pair[1], pair[0]))
            .collect();

        let output = &pass.activations[depth];
        let mut delta: Array1<f64> = output
            .mapv(|a| loss::squared_error_gradient(a, label))
            * pass.z_values[depth - 1].mapv(|z| Activation::Sigmoid.derivative(z));

        for i in (0..depth).rev() {
            let previous = pass.activations[i].view().insert_axis(Axis(0));
            layers[i].weights = delta.view().insert_axis(Axis(1)).dot(&previous);
            layers[i].biases = delta.clone();

            if i > 0 {
                let act = self.layer_activation(i - 1);
                delta = self.parameters.layers[i].weights.t().dot(&delta)
                    * pass.z_values[i - 1].mapv(|z| act.derivative(z));
            }
        }

        Gradients { layers }
    }

    /// In-place gradient step `W -= η·∂W`, `b -= η·∂b`.
    pub fn apply_gradients(&mut self, gradients: &Gradients, learning_rate: f64) {
        for (layer, grad) in self.parameters.layers.iter_mut().zip(&gradients.layers) {
            layer.weights.scaled_add(-learning_rate, &grad.weights);
            layer.biases.scaled_add(-learning_rate, &grad.biases);
        }
    }

    /// One stochastic gradient descent step; returns the example's loss
    /// before the update.
    pub fn train_example(&mut self, input: &[f64], label: f64, learning_rate: f64) -> Result<f64> {
        let pass = self.forward(input)?;
        let loss = squared_error(pass.output(), label);
        let gradients = self.backward(&pass, label);
        self.apply_gradients(&gradients, learning_rate);
        Ok(loss)
    }
}

//! Recurrent Network Primitives
//!
//! LSTM layer with cached forward pass and full backpropagation through
//! time, a time-distributed dense head, inverted dropout, and an Adam
//! optimizer. Everything runs in f64 on ndarray; sequences are
//! `(timesteps x features)` matrices processed one at a time.
//!
//! Gate layout in the stacked weight matrices is `[i, f, g, o]` (input,
//! forget, candidate, output). The forget-gate bias initializes to 1.0.

use ndarray::{s, Array1, Array2, ArrayView1, Axis, Dimension};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Glorot-uniform sample in `[-limit, limit]`.
fn glorot(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> impl FnMut() -> f64 + '_ {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    move || rng.gen_range(-limit..limit)
}

// ============================================================================
// LSTM LAYER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayer {
    input_dim: usize,
    hidden_dim: usize,
    /// Input weights, `(4*hidden x input)`.
    w_ih: Array2<f64>,
    /// Recurrent weights, `(4*hidden x hidden)`.
    w_hh: Array2<f64>,
    /// Bias, `(4*hidden)`.
    b: Array1<f64>,
}

/// Per-timestep forward state retained for BPTT.
struct StepCache {
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    tanh_c: Array1<f64>,
}

pub struct LstmCache {
    inputs: Array2<f64>,
    steps: Vec<StepCache>,
}

/// Parameter gradients mirroring [`LstmLayer`].
#[derive(Debug, Clone)]
pub struct LstmGrads {
    pub w_ih: Array2<f64>,
    pub w_hh: Array2<f64>,
    pub b: Array1<f64>,
}

impl LstmGrads {
    fn zeros(layer: &LstmLayer) -> Self {
        Self {
            w_ih: Array2::zeros(layer.w_ih.raw_dim()),
            w_hh: Array2::zeros(layer.w_hh.raw_dim()),
            b: Array1::zeros(layer.b.raw_dim()),
        }
    }

    pub fn accumulate(&mut self, other: &Self) {
        self.w_ih += &other.w_ih;
        self.w_hh += &other.w_hh;
        self.b += &other.b;
    }

    pub fn scale(&mut self, factor: f64) {
        self.w_ih *= factor;
        self.w_hh *= factor;
        self.b *= factor;
    }
}

impl LstmLayer {
    pub fn new(input_dim: usize, hidden_dim: usize, rng: &mut StdRng) -> Self {
        let w_ih = {
            let mut sample = glorot(input_dim, 4 * hidden_dim, rng);
            Array2::from_shape_fn((4 * hidden_dim, input_dim), |_| sample())
        };
        let w_hh = {
            let mut sample = glorot(hidden_dim, 4 * hidden_dim, rng);
            Array2::from_shape_fn((4 * hidden_dim, hidden_dim), |_| sample())
        };
        let mut b = Array1::zeros(4 * hidden_dim);
        // Unit forget-gate bias keeps early memory open.
        b.slice_mut(s![hidden_dim..2 * hidden_dim]).fill(1.0);

        Self {
            input_dim,
            hidden_dim,
            w_ih,
            w_hh,
            b,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Run the layer over a `(T x input)` sequence from zero state.
    /// Returns per-timestep hidden states `(T x hidden)` and the cache
    /// required for [`Self::backward`].
    pub fn forward(&self, inputs: &Array2<f64>) -> (Array2<f64>, LstmCache) {
        let t_len = inputs.nrows();
        let h_dim = self.hidden_dim;

        let mut outputs = Array2::zeros((t_len, h_dim));
        let mut steps = Vec::with_capacity(t_len);

        let mut h = Array1::<f64>::zeros(h_dim);
        let mut c = Array1::<f64>::zeros(h_dim);

        for t in 0..t_len {
            let x_t = inputs.row(t);
            let z = self.w_ih.dot(&x_t) + self.w_hh.dot(&h) + &self.b;

            let i = z.slice(s![0..h_dim]).mapv(sigmoid);
            let f = z.slice(s![h_dim..2 * h_dim]).mapv(sigmoid);
            let g = z.slice(s![2 * h_dim..3 * h_dim]).mapv(f64::tanh);
            let o = z.slice(s![3 * h_dim..4 * h_dim]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            steps.push(StepCache {
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
            });

            outputs.row_mut(t).assign(&h_next);
            h = h_next;
            c = c_next;
        }

        (
            outputs,
            LstmCache {
                inputs: inputs.clone(),
                steps,
            },
        )
    }

    /// Backpropagate through time. `grad_outputs` holds dL/dh_t for every
    /// timestep (zero rows where the loss does not touch an output).
    /// Returns dL/dX `(T x input)` and the parameter gradients.
    pub fn backward(&self, cache: &LstmCache, grad_outputs: &Array2<f64>) -> (Array2<f64>, LstmGrads) {
        let t_len = cache.steps.len();
        let h_dim = self.hidden_dim;

        let mut grads = LstmGrads::zeros(self);
        let mut grad_inputs = Array2::zeros((t_len, self.input_dim));

        let mut dh_next = Array1::<f64>::zeros(h_dim);
        let mut dc_next = Array1::<f64>::zeros(h_dim);

        for t in (0..t_len).rev() {
            let step = &cache.steps[t];
            let dh = &grad_outputs.row(t) + &dh_next;

            let d_o = &dh * &step.tanh_c;
            let dc = &dc_next + &(&dh * &step.o * step.tanh_c.mapv(|v| 1.0 - v * v));

            let d_i = &dc * &step.g;
            let d_f = &dc * &step.c_prev;
            let d_g = &dc * &step.i;

            // Pre-activation gradients.
            let dz_i = &d_i * &step.i.mapv(|v| v * (1.0 - v));
            let dz_f = &d_f * &step.f.mapv(|v| v * (1.0 - v));
            let dz_g = &d_g * &step.g.mapv(|v| 1.0 - v * v);
            let dz_o = &d_o * &step.o.mapv(|v| v * (1.0 - v));

            let mut dz = Array1::zeros(4 * h_dim);
            dz.slice_mut(s![0..h_dim]).assign(&dz_i);
            dz.slice_mut(s![h_dim..2 * h_dim]).assign(&dz_f);
            dz.slice_mut(s![2 * h_dim..3 * h_dim]).assign(&dz_g);
            dz.slice_mut(s![3 * h_dim..4 * h_dim]).assign(&dz_o);

            grads.w_ih += &outer(dz.view(), cache.inputs.row(t));
            grads.w_hh += &outer(dz.view(), step.h_prev.view());
            grads.b += &dz;

            grad_inputs.row_mut(t).assign(&self.w_ih.t().dot(&dz));
            dh_next = self.w_hh.t().dot(&dz);
            dc_next = &dc * &step.f;
        }

        (grad_inputs, grads)
    }

    pub fn params_mut(&mut self) -> (&mut Array2<f64>, &mut Array2<f64>, &mut Array1<f64>) {
        (&mut self.w_ih, &mut self.w_hh, &mut self.b)
    }
}

fn outer(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Array2<f64> {
    let a2 = a.insert_axis(Axis(1));
    let b2 = b.insert_axis(Axis(0));
    a2.dot(&b2)
}

// ============================================================================
// TIME-DISTRIBUTED DENSE HEAD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weights `(output x input)`.
    w: Array2<f64>,
    b: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub w: Array2<f64>,
    pub b: Array1<f64>,
}

impl DenseGrads {
    pub fn accumulate(&mut self, other: &Self) {
        self.w += &other.w;
        self.b += &other.b;
    }

    pub fn scale(&mut self, factor: f64) {
        self.w *= factor;
        self.b *= factor;
    }
}

impl DenseLayer {
    pub fn new(input_dim: usize, output_dim: usize, rng: &mut StdRng) -> Self {
        let mut sample = glorot(input_dim, output_dim, rng);
        Self {
            w: Array2::from_shape_fn((output_dim, input_dim), |_| sample()),
            b: Array1::zeros(output_dim),
        }
    }

    /// Apply the same affine map to every timestep row.
    pub fn forward(&self, inputs: &Array2<f64>) -> Array2<f64> {
        inputs.dot(&self.w.t()) + &self.b
    }

    pub fn backward(&self, inputs: &Array2<f64>, grad_outputs: &Array2<f64>) -> (Array2<f64>, DenseGrads) {
        let grads = DenseGrads {
            w: grad_outputs.t().dot(inputs),
            b: grad_outputs.sum_axis(Axis(0)),
        };
        (grad_outputs.dot(&self.w), grads)
    }

    pub fn params_mut(&mut self) -> (&mut Array2<f64>, &mut Array1<f64>) {
        (&mut self.w, &mut self.b)
    }
}

// ============================================================================
// DROPOUT
// ============================================================================

/// Inverted dropout mask; identity when `rate == 0` or at inference.
pub fn dropout_mask(shape: (usize, usize), rate: f64, rng: &mut StdRng) -> Array2<f64> {
    if rate <= 0.0 {
        return Array2::ones(shape);
    }
    let keep = 1.0 - rate;
    Array2::from_shape_fn(shape, |_| {
        if rng.gen::<f64>() < keep {
            1.0 / keep
        } else {
            0.0
        }
    })
}

// ============================================================================
// ADAM OPTIMIZER
// ============================================================================

/// First/second moment state for one parameter tensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamState<D: Dimension> {
    m: ndarray::Array<f64, D>,
    v: ndarray::Array<f64, D>,
}

impl<D: Dimension> AdamState<D> {
    pub fn zeros(shape: D) -> Self {
        Self {
            m: ndarray::Array::zeros(shape.clone()),
            v: ndarray::Array::zeros(shape),
        }
    }
}

/// Adam with bias correction; the learning rate is adjusted externally
/// by the plateau scheduler.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    /// Global step, shared across all parameters of one network.
    step: u64,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            step: 0,
        }
    }

    /// Advance the shared step counter; call once per optimizer step,
    /// before updating the individual tensors.
    pub fn tick(&mut self) {
        self.step += 1;
    }

    pub fn update<D: Dimension>(
        &self,
        param: &mut ndarray::Array<f64, D>,
        grad: &ndarray::Array<f64, D>,
        state: &mut AdamState<D>,
    ) {
        let t = self.step as i32;
        state.m.zip_mut_with(grad, |m, &g| *m = self.beta1 * *m + (1.0 - self.beta1) * g);
        state.v.zip_mut_with(grad, |v, &g| *v = self.beta2 * *v + (1.0 - self.beta2) * g * g);

        let m_correction = 1.0 - self.beta1.powi(t);
        let v_correction = 1.0 - self.beta2.powi(t);

        ndarray::Zip::from(param)
            .and(&state.m)
            .and(&state.v)
            .for_each(|p, &m, &v| {
                let m_hat = m / m_correction;
                let v_hat = v / v_correction;
                *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.eps);
            });
    }
}

//! Single-layer LSTM regressor trained with backpropagation through time
//!
//! Gates are stacked in the order input, forget, candidate, output: the
//! input kernel `w` is `(4H, D)`, the recurrent kernel `u` is `(4H, H)` and
//! the bias `b` is `(4H)`. The last hidden state feeds a dense scalar head.

use super::SequenceModel;
use crate::error::{ForecastError, Result};
use crate::sequence::Sequences;
use growth_math::metrics::ErrorMetrics;
use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array, Array1, Array2, ArrayView2, ArrayView3, Axis, Dimension, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Architecture and regularisation of an [`LstmRegressor`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LstmConfig {
    /// Features per time step
    pub input_size: usize,
    /// Hidden units
    pub hidden_size: usize,
    /// Probability of dropping an input feature during training
    pub dropout: f64,
    /// Adam step size
    pub learning_rate: f64,
    /// L2 penalty on the input and recurrent kernels
    pub l2_reg: f64,
}

impl LstmConfig {
    /// Check sizes and rates
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 || self.hidden_size == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "LSTM sizes must be positive: input {}, hidden {}",
                self.input_size, self.hidden_size
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ForecastError::InvalidParameter(format!(
                "Dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.learning_rate > 0.0) || !(self.l2_reg >= 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Invalid learning rate {} or l2 penalty {}",
                self.learning_rate, self.l2_reg
            )));
        }
        Ok(())
    }
}

/// Trainable tensors; also used for gradients and Adam moments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmParams {
    w: Array2<f64>,
    u: Array2<f64>,
    b: Array1<f64>,
    w_out: Array1<f64>,
    b_out: f64,
}

impl LstmParams {
    fn zeros(input_size: usize, hidden_size: usize) -> Self {
        Self {
            w: Array2::zeros((4 * hidden_size, input_size)),
            u: Array2::zeros((4 * hidden_size, hidden_size)),
            b: Array1::zeros(4 * hidden_size),
            w_out: Array1::zeros(hidden_size),
            b_out: 0.0,
        }
    }

    /// Glorot-uniform kernels, forget-gate bias of one
    fn initialise(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let gates = 4 * hidden_size;
        let glorot = |fan_in: usize, fan_out: usize| {
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            Uniform::new_inclusive(-limit, limit)
        };

        let w_dist = glorot(input_size, gates);
        let u_dist = glorot(hidden_size, gates);
        let out_dist = glorot(hidden_size, 1);

        let w = Array2::from_shape_fn((gates, input_size), |_| rng.sample(w_dist));
        let u = Array2::from_shape_fn((gates, hidden_size), |_| rng.sample(u_dist));
        let mut b = Array1::zeros(gates);
        b.slice_mut(s![hidden_size..2 * hidden_size]).fill(1.0);
        let w_out = Array1::from_shape_fn(hidden_size, |_| rng.sample(out_dist));

        Self {
            w,
            u,
            b,
            w_out,
            b_out: 0.0,
        }
    }

    fn is_finite(&self) -> bool {
        self.w
            .iter()
            .chain(self.u.iter())
            .chain(self.b.iter())
            .chain(self.w_out.iter())
            .all(|v| v.is_finite())
            && self.b_out.is_finite()
    }
}

/// Activations of one time step kept for the backward pass
struct StepCache {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    tanh_c: Array1<f64>,
}

fn adam_update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    step_size: f64,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
            *p -= step_size * *m / (v.sqrt() + ADAM_EPSILON);
        });
}

/// Adam optimiser state
struct Adam {
    learning_rate: f64,
    t: i32,
    m: LstmParams,
    v: LstmParams,
}

impl Adam {
    fn new(learning_rate: f64, input_size: usize, hidden_size: usize) -> Self {
        Self {
            learning_rate,
            t: 0,
            m: LstmParams::zeros(input_size, hidden_size),
            v: LstmParams::zeros(input_size, hidden_size),
        }
    }

    fn step(&mut self, params: &mut LstmParams, grads: &LstmParams) {
        self.t += 1;
        let step_size = self.learning_rate * (1.0 - ADAM_BETA2.powi(self.t)).sqrt()
            / (1.0 - ADAM_BETA1.powi(self.t));

        adam_update(&mut params.w, &grads.w, &mut self.m.w, &mut self.v.w, step_size);
        adam_update(&mut params.u, &grads.u, &mut self.m.u, &mut self.v.u, step_size);
        adam_update(&mut params.b, &grads.b, &mut self.m.b, &mut self.v.b, step_size);
        adam_update(
            &mut params.w_out,
            &grads.w_out,
            &mut self.m.w_out,
            &mut self.v.w_out,
            step_size,
        );

        let g = grads.b_out;
        self.m.b_out = ADAM_BETA1 * self.m.b_out + (1.0 - ADAM_BETA1) * g;
        self.v.b_out = ADAM_BETA2 * self.v.b_out + (1.0 - ADAM_BETA2) * g * g;
        params.b_out -= step_size * self.m.b_out / (self.v.b_out.sqrt() + ADAM_EPSILON);
    }
}

/// Epochs, batching and shuffling of one training run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitOptions {
    /// Passes over the training windows
    pub epochs: usize,
    /// Windows per gradient step
    pub batch_size: usize,
}

/// Metrics of one epoch, measured in inference mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    /// Error on the training windows
    pub train: ErrorMetrics,
    /// Error on the validation windows
    pub val: ErrorMetrics,
}

/// Outcome of [`LstmRegressor::fit`]
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Epoch with the lowest validation MSE, whose weights were kept
    pub best: EpochMetrics,
    /// Every epoch in order
    pub history: Vec<EpochMetrics>,
}

/// LSTM followed by a dense scalar output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmRegressor {
    config: LstmConfig,
    params: LstmParams,
}

impl LstmRegressor {
    /// Create a model with randomly initialised weights
    pub fn new(config: LstmConfig, rng: &mut StdRng) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            params: LstmParams::initialise(config.input_size, config.hidden_size, rng),
        })
    }

    /// Architecture of the model
    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    fn check_windows(&self, windows: &ArrayView3<f64>) -> Result<()> {
        let (_, _, features) = windows.dim();
        if features != self.config.input_size {
            return Err(ForecastError::InvalidParameter(format!(
                "Model expects {} features per step, got {}",
                self.config.input_size, features
            )));
        }
        Ok(())
    }

    /// Run one sequence, returning the output and, when `keep` is set, the step caches
    fn run(
        &self,
        sequence: ArrayView2<f64>,
        mask: Option<&Array1<f64>>,
        keep: bool,
    ) -> (f64, Vec<StepCache>) {
        let hidden = self.config.hidden_size;
        let p = &self.params;
        let mut h = Array1::zeros(hidden);
        let mut c = Array1::zeros(hidden);
        let mut steps = Vec::with_capacity(if keep { sequence.nrows() } else { 0 });

        for row in sequence.rows() {
            let x = match mask {
                Some(mask) => &row * mask,
                None => row.to_owned(),
            };
            let z = p.w.dot(&x) + p.u.dot(&h) + &p.b;

            let i = z.slice(s![0..hidden]).mapv(sigmoid);
            let f = z.slice(s![hidden..2 * hidden]).mapv(sigmoid);
            let g = z.slice(s![2 * hidden..3 * hidden]).mapv(f64::tanh);
            let o = z.slice(s![3 * hidden..]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            if keep {
                steps.push(StepCache {
                    x,
                    h_prev: std::mem::replace(&mut h, h_next),
                    c_prev: std::mem::replace(&mut c, c_next),
                    i,
                    f,
                    g,
                    o,
                    tanh_c,
                });
            } else {
                h = h_next;
                c = c_next;
            }
        }

        (p.w_out.dot(&h) + p.b_out, steps)
    }

    /// Accumulate gradients of one sequence given `d_out = dL/dy`
    fn backward(&self, steps: &[StepCache], d_out: f64, grads: &mut LstmParams) {
        let hidden = self.config.hidden_size;
        let p = &self.params;

        let Some(last) = steps.last() else {
            grads.b_out += d_out;
            return;
        };
        let h_last = &last.o * &last.tanh_c;
        grads.w_out.scaled_add(d_out, &h_last);
        grads.b_out += d_out;

        let mut dh = &p.w_out * d_out;
        let mut dc = Array1::<f64>::zeros(hidden);
        let mut dz = Array1::<f64>::zeros(4 * hidden);

        for step in steps.iter().rev() {
            dc += &(&dh * &step.o * &step.tanh_c.mapv(|t| 1.0 - t * t));

            let dz_i = &dc * &step.g * &step.i.mapv(|v| v * (1.0 - v));
            let dz_f = &dc * &step.c_prev * &step.f.mapv(|v| v * (1.0 - v));
            let dz_g = &dc * &step.i * &step.g.mapv(|v| 1.0 - v * v);
            let dz_o = &dh * &step.tanh_c * &step.o.mapv(|v| v * (1.0 - v));

            dz.slice_mut(s![0..hidden]).assign(&dz_i);
            dz.slice_mut(s![hidden..2 * hidden]).assign(&dz_f);
            dz.slice_mut(s![2 * hidden..3 * hidden]).assign(&dz_g);
            dz.slice_mut(s![3 * hidden..]).assign(&dz_o);

            let dz_col = dz.view().insert_axis(Axis(1));
            general_mat_mul(1.0, &dz_col, &step.x.view().insert_axis(Axis(0)), 1.0, &mut grads.w);
            general_mat_mul(1.0, &dz_col, &step.h_prev.view().insert_axis(Axis(0)), 1.0, &mut grads.u);
            grads.b += &dz;

            dh = p.u.t().dot(&dz);
            dc = &dc * &step.f;
        }
    }

    fn dropout_mask(&self, rng: &mut StdRng) -> Option<Array1<f64>> {
        let rate = self.config.dropout;
        if rate <= 0.0 {
            return None;
        }
        let keep = 1.0 / (1.0 - rate);
        Some(Array1::from_shape_fn(self.config.input_size, |_| {
            if rng.gen::<f64>() < rate {
                0.0
            } else {
                keep
            }
        }))
    }

    /// MSE and MAE on a set of windows, in inference mode
    pub fn evaluate(&self, data: &Sequences) -> Result<ErrorMetrics> {
        let predicted = self.predict(data.windows.view())?;
        Ok(ErrorMetrics::evaluate(&predicted.to_vec(), &data.targets.to_vec())?)
    }

    /// Train on `train`, tracking `val` every epoch and keeping the best weights
    pub fn fit(
        &mut self,
        train: &Sequences,
        val: &Sequences,
        options: &FitOptions,
        rng: &mut StdRng,
    ) -> Result<FitReport> {
        if train.is_empty() {
            return Err(ForecastError::InsufficientData(
                "No training windows".to_string(),
            ));
        }
        if options.epochs == 0 || options.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Epochs and batch size must be positive: {:?}",
                options
            )));
        }
        self.check_windows(&train.windows.view())?;
        self.check_windows(&val.windows.view())?;

        let LstmConfig {
            input_size,
            hidden_size,
            l2_reg,
            learning_rate,
            ..
        } = self.config;
        let mut adam = Adam::new(learning_rate, input_size, hidden_size);
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut history = Vec::with_capacity(options.epochs);
        let mut best: Option<(EpochMetrics, LstmParams)> = None;

        for epoch in 1..=options.epochs {
            order.shuffle(rng);
            for batch in order.chunks(options.batch_size) {
                let mut grads = LstmParams::zeros(input_size, hidden_size);
                for &idx in batch {
                    let mask = self.dropout_mask(rng);
                    let (output, steps) =
                        self.run(train.windows.index_axis(Axis(0), idx), mask.as_ref(), true);
                    let d_out = 2.0 * (output - train.targets[idx]) / batch.len() as f64;
                    self.backward(&steps, d_out, &mut grads);
                }
                if l2_reg > 0.0 {
                    grads.w.scaled_add(2.0 * l2_reg, &self.params.w);
                    grads.u.scaled_add(2.0 * l2_reg, &self.params.u);
                }
                adam.step(&mut self.params, &grads);
            }

            let metrics = EpochMetrics {
                epoch,
                train: self.evaluate(train)?,
                val: self.evaluate(val)?,
            };
            let improved = match &best {
                None => true,
                Some((current, _)) => {
                    (current.val.mse.is_nan() && !metrics.val.mse.is_nan())
                        || metrics.val.mse < current.val.mse
                }
            };
            if improved {
                best = Some((metrics, self.params.clone()));
            }
            history.push(metrics);

            if !self.params.is_finite() {
                tracing::warn!(epoch, "LSTM weights diverged, stopping early");
                break;
            }
        }

        let (best, params) = best.ok_or_else(|| {
            ForecastError::Training("Training finished without a single epoch".to_string())
        })?;
        self.params = params;

        Ok(FitReport { best, history })
    }
}

impl SequenceModel for LstmRegressor {
    fn input_size(&self) -> usize {
        self.config.input_size
    }

    fn predict(&self, windows: ArrayView3<f64>) -> Result<Array1<f64>> {
        self.check_windows(&windows)?;
        Ok(windows
            .outer_iter()
            .map(|sequence| self.run(sequence, None, false).0)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;
    use rand::SeedableRng;

    fn config(dropout: f64) -> LstmConfig {
        LstmConfig {
            input_size: 2,
            hidden_size: 3,
            dropout,
            learning_rate: 0.01,
            l2_reg: 0.0,
        }
    }

    fn loss(model: &LstmRegressor, sequence: ArrayView2<f64>, target: f64) -> f64 {
        let (y, _) = model.run(sequence, None, false);
        (y - target).powi(2)
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut model = LstmRegressor::new(config(0.0), &mut rng).unwrap();
        let sequence = Array2::from_shape_vec((3, 2), vec![0.5, -0.2, 0.1, 0.7, -0.4, 0.3]).unwrap();
        let target = 0.25;

        let (y, steps) = model.run(sequence.view(), None, true);
        let mut grads = LstmParams::zeros(2, 3);
        model.backward(&steps, 2.0 * (y - target), &mut grads);

        let eps = 1e-6;
        for (row, col) in [(0, 0), (4, 1), (7, 0), (11, 1)] {
            let original = model.params.w[[row, col]];
            model.params.w[[row, col]] = original + eps;
            let plus = loss(&model, sequence.view(), target);
            model.params.w[[row, col]] = original - eps;
            let minus = loss(&model, sequence.view(), target);
            model.params.w[[row, col]] = original;

            let numeric = (plus - minus) / (2.0 * eps);
            assert_relative_eq!(grads.w[[row, col]], numeric, epsilon = 1e-6, max_relative = 1e-4);
        }

        for (row, col) in [(1, 2), (5, 0), (10, 1)] {
            let original = model.params.u[[row, col]];
            model.params.u[[row, col]] = original + eps;
            let plus = loss(&model, sequence.view(), target);
            model.params.u[[row, col]] = original - eps;
            let minus = loss(&model, sequence.view(), target);
            model.params.u[[row, col]] = original;

            let numeric = (plus - minus) / (2.0 * eps);
            assert_relative_eq!(grads.u[[row, col]], numeric, epsilon = 1e-6, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_fit_reduces_error_and_keeps_best_epoch() {
        let mut rng = StdRng::seed_from_u64(42);
        let windows = Array3::from_shape_fn((24, 3, 2), |(i, t, j)| {
            ((i + t) as f64 * 0.1 + j as f64 * 0.05).sin()
        });
        let targets = windows.map_axis(Axis(1), |steps| steps.sum()).column(0).to_owned();
        let train = Sequences {
            windows: windows.slice(s![..18, .., ..]).to_owned(),
            targets: targets.slice(s![..18]).to_owned(),
        };
        let val = Sequences {
            windows: windows.slice(s![18.., .., ..]).to_owned(),
            targets: targets.slice(s![18..]).to_owned(),
        };

        let mut model = LstmRegressor::new(config(0.0), &mut rng).unwrap();
        let before = model.evaluate(&train).unwrap();
        let options = FitOptions {
            epochs: 60,
            batch_size: 4,
        };
        let report = model.fit(&train, &val, &options, &mut rng).unwrap();

        assert_eq!(report.history.len(), 60);
        let min_val = report
            .history
            .iter()
            .map(|m| m.val.mse)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(report.best.val.mse, min_val);
        assert_relative_eq!(model.evaluate(&val).unwrap().mse, report.best.val.mse, max_relative = 1e-12);
        assert!(report.best.train.mse < before.mse);
    }

    #[test]
    fn test_empty_validation_reports_nan() {
        let mut rng = StdRng::seed_from_u64(1);
        let train = Sequences {
            windows: Array3::ones((4, 2, 2)),
            targets: Array1::ones(4),
        };
        let val = Sequences {
            windows: Array3::zeros((0, 2, 2)),
            targets: Array1::zeros(0),
        };
        let mut model = LstmRegressor::new(config(0.2), &mut rng).unwrap();
        let options = FitOptions {
            epochs: 2,
            batch_size: 32,
        };
        let report = model.fit(&train, &val, &options, &mut rng).unwrap();
        assert!(report.best.val.mse.is_nan());
        assert_eq!(report.best.epoch, 1);
    }

    #[test]
    fn test_no_training_windows() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty = Sequences {
            windows: Array3::zeros((0, 2, 2)),
            targets: Array1::zeros(0),
        };
        let mut model = LstmRegressor::new(config(0.0), &mut rng).unwrap();
        let options = FitOptions {
            epochs: 1,
            batch_size: 1,
        };
        assert!(matches!(
            model.fit(&empty, &empty, &options, &mut rng),
            Err(ForecastError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(3);
        let model = LstmRegressor::new(config(0.5), &mut rng).unwrap();
        let windows = Array3::from_shape_fn((2, 4, 2), |(i, t, j)| (i + t + j) as f64 * 0.1);
        let first = model.predict(windows.view()).unwrap();
        let second = model.predict(windows.view()).unwrap();
        assert_eq!(first, second);
        assert!(model.predict(Array3::zeros((1, 4, 3)).view()).is_err());
    }
}

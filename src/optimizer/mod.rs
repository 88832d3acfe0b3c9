use ndarray::{Array, ArrayD, Dimension};
use serde::{Serialize, Deserialize};

/// Gradient-descent update rule applied to the network's parameter tensors.
///
/// A parameter is identified across steps by its `slot`, so stateful
/// optimizers can keep per-tensor statistics.
pub trait Optimizer {
    /// Start a new optimization step. Called once before the updates of one fit.
    fn begin_step(&mut self);

    /// Update a single parameter tensor in place.
    fn update<D: Dimension>(
        &mut self,
        slot: usize,
        param: &mut Array<f32, D>,
        gradient: &Array<f32, D>,
        learning_rate: f32,
    );
}

/// Serializable description of the optimizer to build.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd,
    Adam { beta1: f32, beta2: f32, epsilon: f32 },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam { beta1: 0.9, beta2: 0.999, epsilon: 1e-7 }
    }
}

impl OptimizerConfig {
    pub fn build(&self) -> OptimizerWrapper {
        match *self {
            OptimizerConfig::Sgd => OptimizerWrapper::SGD(SGD::new()),
            OptimizerConfig::Adam { beta1, beta2, epsilon } => {
                OptimizerWrapper::Adam(Adam::new(beta1, beta2, epsilon))
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl Optimizer for OptimizerWrapper {
    fn begin_step(&mut self) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.begin_step(),
            OptimizerWrapper::Adam(optimizer) => optimizer.begin_step(),
        }
    }

    fn update<D: Dimension>(
        &mut self,
        slot: usize,
        param: &mut Array<f32, D>,
        gradient: &Array<f32, D>,
        learning_rate: f32,
    ) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.update(slot, param, gradient, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update(slot, param, gradient, learning_rate),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Optimizer for SGD {
    fn begin_step(&mut self) {}

    fn update<D: Dimension>(
        &mut self,
        _slot: usize,
        param: &mut Array<f32, D>,
        gradient: &Array<f32, D>,
        learning_rate: f32,
    ) {
        param.zip_mut_with(gradient, |w, &g| *w -= learning_rate * g);
    }
}

/// Adam with bias-corrected first and second moment estimates.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m: Vec<Option<ArrayD<f32>>>,
    v: Vec<Option<ArrayD<f32>>>,
    /// Number of steps taken so far
    pub t: u32,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    fn moments(&mut self, slot: usize, shape: &[usize]) -> (&mut ArrayD<f32>, &mut ArrayD<f32>) {
        if self.m.len() <= slot {
            self.m.resize_with(slot + 1, || None);
            self.v.resize_with(slot + 1, || None);
        }
        // A reshaped parameter restarts its statistics
        if self.m[slot].as_ref().map_or(false, |m| m.shape() != shape) {
            self.m[slot] = None;
            self.v[slot] = None;
        }
        let m = self.m[slot].get_or_insert_with(|| ArrayD::zeros(shape));
        let v = self.v[slot].get_or_insert_with(|| ArrayD::zeros(shape));
        (m, v)
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-7)
    }
}

impl Optimizer for Adam {
    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn update<D: Dimension>(
        &mut self,
        slot: usize,
        param: &mut Array<f32, D>,
        gradient: &Array<f32, D>,
        learning_rate: f32,
    ) {
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let t = self.t.max(1) as i32;
        let gradient = gradient.view().into_dyn();
        let (m, v) = self.moments(slot, gradient.shape());

        m.zip_mut_with(&gradient, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        v.zip_mut_with(&gradient, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        let m_correction = 1.0 - beta1.powi(t);
        let v_correction = 1.0 - beta2.powi(t);
        let step = ndarray::Zip::from(&*m)
            .and(&*v)
            .map_collect(|&m, &v| learning_rate * (m / m_correction) / ((v / v_correction).sqrt() + epsilon));

        let mut param = param.view_mut().into_dyn();
        param -= &step;
    }
}

//! Parameter creation driven by our own rng, so that a configured seed gives
//! the same initial weights on every run.

use std::sync::Mutex;

use candle_core::{DType, Device, Shape, Tensor, Var};
use candle_nn::{init::NormalOrUniform, var_builder::SimpleBackend, Init, VarBuilder, VarMap};
use rand::Rng;

use crate::dataset::RngType;

/// Backend that creates missing variables in `vars` using the layer's
/// initialization hint, drawing from `rng` instead of the device rng.
pub struct SeededVarMap<'a> {
    vars: &'a VarMap,
    rng: Mutex<RngType>,
}

impl<'a> SeededVarMap<'a> {
    pub fn new(vars: &'a VarMap, rng: RngType) -> Self {
        Self {
            vars,
            rng: Mutex::new(rng),
        }
    }

    pub fn into_var_builder(self, dtype: DType, device: &Device) -> VarBuilder<'a> {
        VarBuilder::from_backend(Box::new(self), dtype, device.clone())
    }
}

impl SimpleBackend for SeededVarMap<'_> {
    fn get(
        &self,
        shape: Shape,
        name: &str,
        init: Init,
        dtype: DType,
        device: &Device,
    ) -> candle_core::Result<Tensor> {
        let mut vars = self
            .vars
            .data()
            .lock()
            .map_err(|_| candle_core::Error::Msg("parameter map lock poisoned".into()))?;
        if let Some(var) = vars.get(name) {
            if var.shape() != &shape {
                candle_core::bail!("shape mismatch on {name}: {shape:?} <> {:?}", var.shape())
            }
            return Ok(var.as_tensor().clone());
        }

        let values = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| candle_core::Error::Msg("init rng lock poisoned".into()))?;
            init_values(&init, &shape, &mut rng)
        };
        let tensor = Tensor::from_vec(values, shape, device)?.to_dtype(dtype)?;
        let var = Var::from_tensor(&tensor)?;
        let tensor = var.as_tensor().clone();
        vars.insert(name.to_string(), var);
        Ok(tensor)
    }

    fn contains_tensor(&self, name: &str) -> bool {
        self.vars
            .data()
            .lock()
            .map(|vars| vars.contains_key(name))
            .unwrap_or(false)
    }
}

/// Same distributions as [`Init::var`].
fn init_values(init: &Init, shape: &Shape, rng: &mut RngType) -> Vec<f32> {
    let count = shape.elem_count();
    match *init {
        Init::Const(value) => vec![value as f32; count],
        Init::Uniform { lo, up } => uniform(rng, lo, up, count),
        Init::Randn { mean, stdev } => normal(rng, mean, stdev, count),
        Init::Kaiming {
            dist,
            fan,
            non_linearity,
        } => {
            let std = non_linearity.gain() / (fan.for_shape(shape) as f64).sqrt();
            match dist {
                NormalOrUniform::Uniform => {
                    let bound = 3f64.sqrt() * std;
                    uniform(rng, -bound, bound, count)
                }
                NormalOrUniform::Normal => normal(rng, 0., std, count),
            }
        }
    }
}

fn uniform(rng: &mut RngType, lo: f64, up: f64, count: usize) -> Vec<f32> {
    (0..count)
        .map(|_| (lo + (up - lo) * rng.gen::<f64>()) as f32)
        .collect()
}

// Box-Muller, u1 kept in (0, 1] so the log stays finite.
fn normal(rng: &mut RngType, mean: f64, stdev: f64, count: usize) -> Vec<f32> {
    (0..count)
        .map(|_| {
            let u1 = 1.0 - rng.gen::<f64>();
            let u2 = rng.gen::<f64>();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            (mean + stdev * z) as f32
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_nn::{init::DEFAULT_KAIMING_UNIFORM, linear};
    use rand::SeedableRng;

    fn weights(seed: u64) -> Vec<Vec<f32>> {
        let vars = VarMap::new();
        let vb = SeededVarMap::new(&vars, RngType::seed_from_u64(seed))
            .into_var_builder(DType::F32, &Device::Cpu);
        let layer = linear(4, 3, vb.push_prefix("layer")).unwrap();
        layer.weight().to_vec2::<f32>().unwrap()
    }

    #[test]
    fn test_same_seed_same_weights() {
        assert_eq!(weights(1337), weights(1337));
        assert_ne!(weights(1337), weights(42));
    }

    #[test]
    fn test_vars_are_registered() {
        let vars = VarMap::new();
        let vb = SeededVarMap::new(&vars, RngType::seed_from_u64(1337))
            .into_var_builder(DType::F32, &Device::Cpu);
        linear(4, 3, vb.push_prefix("layer")).unwrap();

        let names = vars.data().lock().unwrap();
        assert!(names.contains_key("layer.weight"));
        assert!(names.contains_key("layer.bias"));
        drop(names);
        assert_eq!(vars.all_vars().len(), 2);
    }

    #[test]
    fn test_init_bounds() {
        let mut rng = RngType::seed_from_u64(1337);
        let shape = Shape::from((8, 16));

        assert_eq!(init_values(&Init::Const(0.5), &shape, &mut rng), vec![0.5; 128]);

        let values = init_values(&Init::Uniform { lo: -0.1, up: 0.1 }, &shape, &mut rng);
        assert!(values.iter().all(|v| (-0.1..=0.1).contains(v)));

        // fan in 16, ReLU gain: bound = sqrt(3) * sqrt(2) / 4
        let bound = (6f32).sqrt() / 4.0;
        let values = init_values(&DEFAULT_KAIMING_UNIFORM, &shape, &mut rng);
        assert!(values.iter().all(|v| v.abs() <= bound + 1e-6));

        let randn = Init::Randn {
            mean: 0.,
            stdev: 1.,
        };
        let values = init_values(&randn, &Shape::from(4000), &mut rng);
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        assert!(mean.abs() < 0.1, "mean {mean}");
        assert!(values.iter().all(|v| v.is_finite()));
    }
}

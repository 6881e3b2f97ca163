//! Search strategies over parsed dimensions.
//!
//! Strategies propose positional value vectors, aligned with the order of the
//! dimensions they were built from. Use
//! [`ParameterSpace::zip_values`](crate::ParameterSpace::zip_values) to turn a
//! proposal into named parameters.

use qopt_types::{ParamValue, QoptError, QoptResult};
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::dimension::{Categories, Dimension, DimensionKind, Encoding};
use crate::space::{ParameterSpace, SearchMethod};
use crate::trial::OptimizationSettings;

/// Prior keyword that makes range sampling happen in log space.
pub const LOG_UNIFORM: &str = "log-uniform";

/// One proposed point, one value per dimension.
pub type Proposal = Vec<ParamValue>;

/// Common trait for all search strategies.
pub trait SearchStrategy: Send + Sync {
    /// Generate the next batch of proposals. An empty batch means the
    /// strategy is exhausted.
    fn suggest(&mut self, count: usize) -> Vec<Proposal>;

    /// Report a completed trial so adaptive strategies can learn. Higher
    /// scores are better.
    fn report(&mut self, _proposal: &[ParamValue], _score: f64) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// Build the strategy selected for `space`.
pub fn build_strategy(
    space: &ParameterSpace,
    settings: &OptimizationSettings,
) -> QoptResult<Box<dyn SearchStrategy>> {
    let strategy: Box<dyn SearchStrategy> = match space.select_method() {
        SearchMethod::Grid => Box::new(GridSearch::new(space.dimensions())?),
        SearchMethod::Bayesian => Box::new(BayesianSearch::new(
            space.dimensions().to_vec(),
            settings.exploration_weight,
            settings.seed,
        )),
    };
    debug!("Built {} strategy for space {}", strategy.name(), space.name());
    Ok(strategy)
}

// ---- Grid search ----

/// Exhaustive grid search over categorical dimensions.
///
/// Points are enumerated in row-major order: the last dimension varies
/// fastest. Points are decoded from a cursor on demand, so large grids are
/// never materialized.
#[derive(Debug, Clone)]
pub struct GridSearch {
    axes: Vec<Vec<ParamValue>>,
    total: u64,
    cursor: u64,
}

impl GridSearch {
    pub fn new(dimensions: &[Dimension]) -> QoptResult<Self> {
        let axes = dimensions
            .iter()
            .map(|dim| match &dim.kind {
                DimensionKind::Categorical(categories) => Ok(categories.values()),
                _ => Err(QoptError::dimension_kind(
                    dim.name(),
                    "grid search requires categorical dimensions",
                )),
            })
            .collect::<QoptResult<Vec<_>>>()?;

        let total = if axes.is_empty() {
            0
        } else {
            axes.iter()
                .fold(1u64, |total, axis| total.saturating_mul(axis.len() as u64))
        };

        Ok(Self {
            axes,
            total,
            cursor: 0,
        })
    }

    /// Total number of grid points.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Points not yet handed out.
    pub fn remaining(&self) -> u64 {
        self.total - self.cursor
    }

    fn point(&self, mut index: u64) -> Proposal {
        let mut point = vec![ParamValue::Int(0); self.axes.len()];
        for (slot, axis) in point.iter_mut().zip(&self.axes).rev() {
            let size = axis.len() as u64;
            *slot = axis[(index % size) as usize].clone();
            index /= size;
        }
        point
    }
}

impl SearchStrategy for GridSearch {
    fn suggest(&mut self, count: usize) -> Vec<Proposal> {
        let end = self.cursor.saturating_add(count as u64).min(self.total);
        let batch = (self.cursor..end).map(|i| self.point(i)).collect();
        self.cursor = end;
        batch
    }

    fn name(&self) -> &str {
        "grid"
    }
}

// ---- Bayesian search (explore/exploit around the best point) ----

/// Sequential model-based search.
///
/// Tracks reported (proposal, score) pairs and biases future proposals
/// toward the best one seen. With probability `exploration_weight` (and
/// always before the first report) a proposal is sampled from the priors of
/// the dimensions; otherwise the best point is perturbed.
#[derive(Debug, Clone)]
pub struct BayesianSearch {
    dimensions: Vec<Dimension>,
    observations: Vec<(Proposal, f64)>,
    exploration_weight: f64,
    rng: StdRng,
}

impl BayesianSearch {
    pub fn new(dimensions: Vec<Dimension>, exploration_weight: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            dimensions,
            observations: Vec::new(),
            exploration_weight,
            rng,
        }
    }

    pub fn observations(&self) -> &[(Proposal, f64)] {
        &self.observations
    }

    fn best(&self) -> Option<&Proposal> {
        self.observations
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(proposal, _)| proposal)
    }

    /// Pure exploration sample.
    fn explore(&mut self) -> Proposal {
        let dimensions = &self.dimensions;
        let rng = &mut self.rng;
        dimensions.iter().map(|dim| sample(dim, rng)).collect()
    }

    /// Exploitation: perturb the best-known point.
    fn exploit(&mut self) -> Proposal {
        let base = match self.best() {
            Some(best) => best.clone(),
            None => return self.explore(),
        };

        let dimensions = &self.dimensions;
        let rng = &mut self.rng;
        dimensions
            .iter()
            .zip(base)
            .map(|(dim, value)| perturb(dim, value, rng))
            .collect()
    }
}

impl SearchStrategy for BayesianSearch {
    fn suggest(&mut self, count: usize) -> Vec<Proposal> {
        (0..count)
            .map(|_| {
                if self.observations.is_empty() || self.rng.random::<f64>() < self.exploration_weight {
                    self.explore()
                } else {
                    self.exploit()
                }
            })
            .collect()
    }

    fn report(&mut self, proposal: &[ParamValue], score: f64) {
        self.observations.push((proposal.to_vec(), score));
    }

    fn name(&self) -> &str {
        "bayesian"
    }
}

/// Bounds in ascending order. Inverted bounds are not validated at parse
/// time, so sampling must not assume `low <= high`.
fn ordered<T: PartialOrd>(low: T, high: T) -> (T, T) {
    if low <= high {
        (low, high)
    } else {
        (high, low)
    }
}

fn sample_real(low: f64, high: f64, prior: &str, base: i64, rng: &mut StdRng) -> f64 {
    let (low, high) = ordered(low, high);
    if prior == LOG_UNIFORM && low > 0.0 && base > 1 {
        let base = base as f64;
        let exponent = rng.random_range(low.log(base)..=high.log(base));
        base.powf(exponent).clamp(low, high)
    } else {
        sample_uniform(low, high, rng)
    }
}

/// Uniform draw from `[low, high]` that stays finite when `high - low`
/// overflows `f64`.
fn sample_uniform(low: f64, high: f64, rng: &mut StdRng) -> f64 {
    match Uniform::new_inclusive(low, high) {
        Ok(uniform) => uniform.sample(rng),
        Err(_) => {
            let half = high / 2.0 - low / 2.0;
            let u: f64 = rng.random();
            (low + half * u + half * u).clamp(low, high)
        }
    }
}

fn sample(dim: &Dimension, rng: &mut StdRng) -> ParamValue {
    match &dim.kind {
        DimensionKind::Categorical(categories) => {
            let idx = rng.random_range(0..categories.len());
            categories.get(idx).unwrap_or(ParamValue::Int(0))
        }
        DimensionKind::Integer {
            low,
            high,
            prior,
            base,
        } => {
            let (low, high) = ordered(*low, *high);
            if prior == LOG_UNIFORM {
                let v = sample_real(low as f64, high as f64, prior, *base, rng);
                ParamValue::Int((v.round() as i64).clamp(low, high))
            } else {
                ParamValue::Int(rng.random_range(low..=high))
            }
        }
        DimensionKind::Real {
            low,
            high,
            prior,
            base,
        } => ParamValue::Float(sample_real(*low, *high, prior, *base, rng)),
    }
}

fn perturb(dim: &Dimension, value: ParamValue, rng: &mut StdRng) -> ParamValue {
    match (&dim.kind, value) {
        (DimensionKind::Real { low, high, .. }, ParamValue::Float(v)) => {
            let (low, high) = ordered(*low, *high);
            let half = high / 2.0 - low / 2.0;
            let noise = rng.random_range(-0.2..0.2) * half;
            ParamValue::Float((v + noise).clamp(low, high))
        }
        (DimensionKind::Integer { low, high, .. }, ParamValue::Int(v)) => {
            let (low, high) = ordered(*low, *high);
            let step = i64::try_from(high.abs_diff(low) / 10)
                .unwrap_or(i64::MAX)
                .max(1);
            let delta = rng.random_range(-step..=step);
            ParamValue::Int(v.saturating_add(delta).clamp(low, high))
        }
        (DimensionKind::Categorical(categories), value)
            if categories.encoding() == Encoding::Identity =>
        {
            // ordinal: move to a neighbouring category
            let current = match (categories, &value) {
                (Categories::Int(values), ParamValue::Int(v)) => values.iter().position(|c| c == v),
                _ => None,
            };
            match current {
                Some(idx) => {
                    let last = categories.len() - 1;
                    let next = match rng.random_range(-1i64..=1) {
                        -1 => idx.saturating_sub(1),
                        1 => (idx + 1).min(last),
                        _ => idx,
                    };
                    categories.get(next).unwrap_or(value)
                }
                None => sample(dim, rng),
            }
        }
        // one-hot categories have no neighbourhood
        _ => sample(dim, rng),
    }
}

use super::constraints::Problem;
use super::error::EngineError;
use crate::core::expr::Bindings;
use rand::Rng;
use tracing::{debug, instrument};

/// A batch of candidate design points stored row-major in one flat buffer.
///
/// Every point has one coordinate per problem unknown, in problem order.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    dimension: usize,
    data: Vec<f64>,
}

impl PointCloud {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Builds a cloud from explicit rows, each of which must have `dimension` coordinates.
    pub fn from_rows<R: AsRef<[f64]>>(dimension: usize, rows: &[R]) -> Result<Self, EngineError> {
        let mut cloud = Self::new(dimension);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dimension {
                return Err(EngineError::Internal(format!(
                    "Row {} has {} coordinates, expected {}",
                    i,
                    row.len(),
                    dimension
                )));
            }
            cloud.data.extend_from_slice(row);
        }
        Ok(cloud)
    }

    /// Draws `count` points uniformly inside the problem bounds.
    #[instrument(level = "debug", skip_all, fields(count = count))]
    pub fn generate(problem: &Problem, count: usize, rng: &mut impl Rng) -> Self {
        let dimension = problem.dimension();
        let mut data = Vec::with_capacity(count * dimension);
        for _ in 0..count {
            for (lo, hi) in problem.lower().iter().zip(problem.upper()) {
                data.push(rng.gen_range(*lo..=*hi));
            }
        }
        Self { dimension, data }
    }

    /// A single-point cloud holding `seed` restricted to the problem unknowns.
    pub fn from_seed(problem: &Problem, seed: &impl Bindings) -> Result<Self, EngineError> {
        let mut point = Vec::with_capacity(problem.dimension());
        for name in problem.unknowns() {
            let value = seed.value_of(name).ok_or_else(|| {
                EngineError::Configuration(format!("Seed design has no value for '{}'", name))
            })?;
            if !value.is_finite() {
                return Err(EngineError::Configuration(format!(
                    "Seed value of '{}' is not finite",
                    name
                )));
            }
            point.push(value);
        }
        problem.clamp(&mut point);
        Ok(Self {
            dimension: problem.dimension(),
            data: point,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len().checked_div(self.dimension).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn point(&self, index: usize) -> &[f64] {
        let start = index * self.dimension;
        &self.data[start..start + self.dimension]
    }

    pub fn points(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.dimension.max(1))
    }

    /// Row-major coordinates of every point.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn push(&mut self, point: &[f64]) {
        debug_assert_eq!(point.len(), self.dimension);
        self.data.extend_from_slice(point);
    }

    /// Keeps only the points whose flag in `keep` is set.
    pub fn retain_mask(self, keep: &[bool]) -> Self {
        let mut kept = Self::new(self.dimension);
        for (point, &flag) in self.points().zip(keep) {
            if flag {
                kept.data.extend_from_slice(point);
            }
        }
        kept
    }

    /// Appends `count` jittered copies of existing points.
    ///
    /// Each copy starts from a uniformly chosen existing point (with replacement) and moves
    /// every coordinate by a uniform offset within ±`resolution × multiplier`, clamped to the
    /// bounds. An empty cloud stays empty.
    #[instrument(level = "debug", skip_all, fields(count = count, multiplier = multiplier))]
    pub fn add_mutations(
        &mut self,
        problem: &Problem,
        count: usize,
        multiplier: f64,
        rng: &mut impl Rng,
    ) {
        let sources = self.len();
        if sources == 0 || count == 0 {
            return;
        }
        self.data.reserve(count * self.dimension);
        let mut mutant = vec![0.0; self.dimension];
        for _ in 0..count {
            let source = rng.gen_range(0..sources);
            mutant.copy_from_slice(self.point(source));
            for (x, step) in mutant.iter_mut().zip(problem.resolutions()) {
                let span = step * multiplier;
                *x += rng.gen_range(-span..=span);
            }
            problem.clamp(&mut mutant);
            self.data.extend_from_slice(&mutant);
        }
        debug!(sources, added = count, total = self.len(), "Cloud mutated.");
    }
}

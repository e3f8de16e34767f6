use crate::engine::cloud::PointCloud;
use crate::engine::context::SolveContext;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Keeps the points whose worst absolute residual is within `threshold`.
///
/// A point whose residuals fail to evaluate or are not finite is always dropped.
#[instrument(skip_all, name = "tolerance_task", fields(threshold = threshold))]
pub fn run(cloud: PointCloud, context: &SolveContext, threshold: f64) -> PointCloud {
    let problem = context.problem;
    let before = cloud.len();
    let dimension = cloud.dimension().max(1);

    #[cfg(not(feature = "parallel"))]
    let iterator = cloud.as_slice().chunks_exact(dimension);

    #[cfg(feature = "parallel")]
    let iterator = cloud.as_slice().par_chunks_exact(dimension);

    let keep: Vec<bool> = iterator
        .map(|point| {
            problem
                .worst_residual(point)
                .is_ok_and(|worst| worst <= threshold)
        })
        .collect();

    let pruned = cloud.retain_mask(&keep);
    info!(
        points = before,
        survivors = pruned.len(),
        "Tolerance pruning complete."
    );
    pruned
}

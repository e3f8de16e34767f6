use crate::engine::cloud::PointCloud;
use crate::engine::constraints::Problem;
use crate::engine::context::SolveContext;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// `a` dominates `b` when it is no worse in every score and strictly better in at least one.
///
/// Scores are oriented so that smaller is better.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Flags the members of `scores` that no other member dominates.
pub fn non_dominated(scores: &[Vec<f64>]) -> Vec<bool> {
    #[cfg(not(feature = "parallel"))]
    let iterator = scores.iter();

    #[cfg(feature = "parallel")]
    let iterator = scores.par_iter();

    iterator
        .map(|candidate| !scores.iter().any(|other| dominates(other, candidate)))
        .collect()
}

/// Oriented objective scores of one point, or `None` if any objective fails to evaluate.
fn score(problem: &Problem, point: &[f64]) -> Option<Vec<f64>> {
    let view = problem.view(point);
    let mut scores = Vec::with_capacity(problem.objectives().len());
    for objective in problem.objectives() {
        let value = objective.expr.eval(&view).ok()?;
        if !value.is_finite() {
            return None;
        }
        if let Some(oriented) = objective.direction.oriented(value) {
            scores.push(oriented);
        }
    }
    Some(scores)
}

/// Keeps the non-dominated points of the cloud.
///
/// Without objectives the cloud is returned unchanged. Points whose objectives cannot be
/// evaluated are dropped: a point without scores has no place in the domination order, so it
/// can never be shown to be non-dominated.
#[instrument(skip_all, name = "pareto_task")]
pub fn run(cloud: PointCloud, context: &SolveContext) -> PointCloud {
    let problem = context.problem;
    if problem.objectives().is_empty() || cloud.is_empty() {
        return cloud;
    }
    let before = cloud.len();
    let dimension = cloud.dimension().max(1);

    #[cfg(not(feature = "parallel"))]
    let iterator = cloud.as_slice().chunks_exact(dimension);

    #[cfg(feature = "parallel")]
    let iterator = cloud.as_slice().par_chunks_exact(dimension);

    let scored: Vec<Option<Vec<f64>>> = iterator.map(|point| score(problem, point)).collect();

    let (evaluated, scores): (Vec<usize>, Vec<Vec<f64>>) = scored
        .into_iter()
        .enumerate()
        .filter_map(|(i, s)| s.map(|s| (i, s)))
        .unzip();
    if evaluated.len() < before {
        debug!(
            failed = before - evaluated.len(),
            "Dropping points whose objectives failed to evaluate."
        );
    }

    let front = non_dominated(&scores);
    let mut keep = vec![false; before];
    for (index, on_front) in evaluated.into_iter().zip(front) {
        keep[index] = on_front;
    }

    let pruned = cloud.retain_mask(&keep);
    info!(
        points = before,
        survivors = pruned.len(),
        "Pareto pruning complete."
    );
    pruned
}

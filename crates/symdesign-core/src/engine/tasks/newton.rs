use crate::engine::cloud::PointCloud;
use crate::engine::config::SolverConfig;
use crate::engine::constraints::Problem;
use crate::engine::context::SolveContext;
use crate::engine::progress::Progress;
use nalgebra::{DMatrix, DVector, SVD};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const SVD_EPSILON: f64 = 1e-12;

/// How the residual minimization of one point ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonOutcome {
    /// The worst residual fell below the configured epsilon.
    Converged,
    /// The iteration budget ran out first.
    Exhausted,
    /// A residual, Jacobian or step became non-finite or failed to evaluate.
    Diverged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewtonSummary {
    pub converged: usize,
    pub exhausted: usize,
    pub diverged: usize,
}

impl NewtonSummary {
    fn record(mut self, outcome: NewtonOutcome) -> Self {
        match outcome {
            NewtonOutcome::Converged => self.converged += 1,
            NewtonOutcome::Exhausted => self.exhausted += 1,
            NewtonOutcome::Diverged => self.diverged += 1,
        }
        self
    }
}

#[instrument(skip_all, name = "newton_task")]
pub fn run(cloud: &mut PointCloud, context: &SolveContext) -> NewtonSummary {
    let problem = context.problem;
    let config = context.config;
    let dimension = cloud.dimension().max(1);

    context.reporter.report(Progress::TaskStart {
        total_steps: cloud.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = cloud.as_mut_slice().chunks_exact_mut(dimension);

    #[cfg(feature = "parallel")]
    let iterator = cloud.as_mut_slice().par_chunks_exact_mut(dimension);

    let outcomes: Vec<NewtonOutcome> = iterator
        .map(|point| {
            let outcome = refine_point(problem, config, point);
            context.reporter.report(Progress::TaskIncrement);
            outcome
        })
        .collect();

    context.reporter.report(Progress::TaskFinish);

    let summary = outcomes
        .into_iter()
        .fold(NewtonSummary::default(), NewtonSummary::record);
    info!(
        converged = summary.converged,
        exhausted = summary.exhausted,
        diverged = summary.diverged,
        "Residual minimization complete."
    );
    summary
}

fn residual_vector(problem: &Problem, point: &[f64]) -> Option<DVector<f64>> {
    let residuals = problem.residuals(point).ok()?;
    if residuals.iter().all(|r| r.is_finite()) {
        Some(DVector::from_vec(residuals))
    } else {
        None
    }
}

/// Central finite-difference Jacobian of the residual vector.
fn jacobian(problem: &Problem, point: &[f64], rows: usize, relative_step: f64) -> Option<DMatrix<f64>> {
    let mut jac = DMatrix::zeros(rows, point.len());
    let mut shifted = point.to_vec();
    for j in 0..point.len() {
        let h = relative_step * point[j].abs().max(1.0);
        shifted[j] = point[j] + h;
        let forward = residual_vector(problem, &shifted)?;
        shifted[j] = point[j] - h;
        let backward = residual_vector(problem, &shifted)?;
        shifted[j] = point[j];
        jac.set_column(j, &((forward - backward) / (2.0 * h)));
    }
    Some(jac)
}

/// Newton–Raphson with minimum-norm least-squares steps, clamped to the bounds after each step.
pub fn refine_point(problem: &Problem, config: &SolverConfig, point: &mut [f64]) -> NewtonOutcome {
    for _ in 0..config.newton_iterations {
        let Some(residuals) = residual_vector(problem, point) else {
            return NewtonOutcome::Diverged;
        };
        if residuals.amax() <= config.newton_epsilon {
            return NewtonOutcome::Converged;
        }
        let Some(jac) = jacobian(problem, point, residuals.len(), config.finite_difference_step)
        else {
            return NewtonOutcome::Diverged;
        };
        let svd = SVD::new(jac, true, true);
        let step = match svd.solve(&residuals, SVD_EPSILON) {
            Ok(step) if step.iter().all(|v| v.is_finite()) => step,
            Ok(_) | Err(_) => {
                debug!("Newton step could not be computed.");
                return NewtonOutcome::Diverged;
            }
        };
        for (x, dx) in point.iter_mut().zip(step.iter()) {
            *x -= dx;
        }
        problem.clamp(point);
    }
    match residual_vector(problem, point) {
        Some(r) if r.amax() <= config.newton_epsilon => NewtonOutcome::Converged,
        Some(_) => NewtonOutcome::Exhausted,
        None => NewtonOutcome::Diverged,
    }
}

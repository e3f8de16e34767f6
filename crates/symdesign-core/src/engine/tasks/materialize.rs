use crate::core::record::DesignRecord;
use crate::engine::cloud::PointCloud;
use crate::engine::constraints::Problem;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Converts surviving points into records of unknowns followed by derived values.
///
/// A derived value that fails to evaluate, or evaluates to a non-finite number, is omitted
/// from that record only.
#[instrument(skip_all, name = "materialize_task")]
pub fn run(cloud: &PointCloud, problem: &Problem) -> Vec<DesignRecord> {
    let dimension = cloud.dimension().max(1);

    #[cfg(not(feature = "parallel"))]
    let iterator = cloud.as_slice().chunks_exact(dimension);

    #[cfg(feature = "parallel")]
    let iterator = cloud.as_slice().par_chunks_exact(dimension);

    let records: Vec<DesignRecord> = iterator.map(|point| record(problem, point)).collect();
    debug!(records = records.len(), "Design records materialized.");
    records
}

fn record(problem: &Problem, point: &[f64]) -> DesignRecord {
    let mut record = DesignRecord::with_capacity(problem.dimension() + problem.derived().len());
    for (name, value) in problem.unknowns().iter().zip(point) {
        record.insert(name.as_str(), *value);
    }
    let view = problem.view(point);
    for (name, expr) in problem.derived() {
        match expr.eval(&view) {
            Ok(value) if value.is_finite() => record.insert(name.as_str(), value),
            Ok(_) => debug!(derived = %name, "Derived value is not finite; omitted."),
            Err(e) => debug!(derived = %name, error = %e, "Derived value failed; omitted."),
        }
    }
    record
}

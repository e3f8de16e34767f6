use crate::core::record::DesignRecord;
use crate::engine::cloud::PointCloud;
use crate::engine::config::SolverConfig;
use crate::engine::constraints::Problem;
use crate::engine::context::SolveContext;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct ExploreResult {
    /// Column order of every record: unknowns, then derived values.
    pub columns: Vec<String>,
    pub records: Vec<DesignRecord>,
    /// Points whose residual minimization diverged, summed over all rounds.
    pub diverged: usize,
}

#[instrument(skip_all, name = "explore_workflow")]
pub fn run(
    problem: &Problem,
    config: &SolverConfig,
    seed: Option<&DesignRecord>,
    reporter: &ProgressReporter,
) -> Result<ExploreResult, EngineError> {
    let context = SolveContext::new(problem, config, reporter);
    let mut rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    // === Phase 1: Seeding ===
    reporter.report(Progress::PhaseStart { name: "Seeding" });
    let mut cloud = match seed {
        Some(design) => {
            let mut cloud = PointCloud::from_seed(problem, design)?;
            cloud.add_mutations(
                problem,
                config.sample_size,
                config.seed_multiplier,
                &mut rng,
            );
            cloud
        }
        None => PointCloud::generate(problem, config.sample_size, &mut rng),
    };
    info!(
        points = cloud.len(),
        seeded = seed.is_some(),
        "Initial point cloud generated."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Residual minimization ===
    let mut diverged = reporter.phase("Residual Minimization", || {
        tasks::newton::run(&mut cloud, &context).diverged
    });

    // === Phase 3: Tolerance pruning ===
    cloud = reporter.phase("Tolerance Pruning", || {
        tasks::tolerance::run(cloud, &context, config.initial_tolerance)
    });

    // === Phase 4: Pareto pruning ===
    cloud = reporter.phase("Pareto Pruning", || tasks::pareto::run(cloud, &context));

    // === Phase 5: Refinement rounds ===
    for round in 0..config.refinement_rounds {
        reporter.report(Progress::PhaseStart {
            name: "Refinement Round",
        });
        cloud.add_mutations(
            problem,
            config.mutation_count,
            config.mutation_multiplier,
            &mut rng,
        );
        diverged += tasks::newton::run(&mut cloud, &context).diverged;
        cloud = tasks::tolerance::run(cloud, &context, config.round_tolerance(round));
        cloud = tasks::dedup::run(cloud, problem);
        cloud = tasks::pareto::run(cloud, &context);
        info!(round, survivors = cloud.len(), "Refinement round complete.");
        reporter.report(Progress::PhaseFinish);
    }

    // === Phase 6: Materialization ===
    let records = reporter.phase("Materialization", || {
        tasks::materialize::run(&cloud, problem)
    });

    info!(
        designs = records.len(),
        diverged, "Exploration complete."
    );
    Ok(ExploreResult {
        columns: problem.columns(),
        records,
        diverged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::Expr;
    use crate::engine::config::SolverConfigBuilder;
    use crate::engine::constraints::{Bounds, ConstraintSet, Direction, Resolutions};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bounds(entries: &[(&str, f64, f64)]) -> Bounds {
        entries
            .iter()
            .map(|(n, lo, hi)| (n.to_string(), (*lo, *hi)))
            .collect()
    }

    fn resolutions(entries: &[(&str, f64)]) -> Resolutions {
        entries.iter().map(|(n, r)| (n.to_string(), *r)).collect()
    }

    fn small_config(seed: u64) -> SolverConfig {
        SolverConfigBuilder::with_defaults()
            .sample_size(300)
            .mutation_count(300)
            .refinement_rounds(3)
            .tight_after_round(1)
            .tight_tolerance(0.01)
            .rng_seed(Some(seed))
            .build()
            .unwrap()
    }

    fn sum_problem() -> Problem {
        let mut set = ConstraintSet::new();
        set.add_equation("sum", (Expr::unknown("x") + Expr::unknown("y")).eq_to(10.0))
            .unwrap();
        set.add_derived("product", Expr::unknown("x") * Expr::unknown("y"))
            .unwrap();
        set.prepare(
            &bounds(&[("x", 0.0, 10.0), ("y", 0.0, 10.0)]),
            &resolutions(&[("x", 0.1), ("y", 0.1)]),
        )
        .unwrap()
    }

    #[test]
    fn every_survivor_satisfies_the_equation() {
        let problem = sum_problem();
        let result = run(&problem, &small_config(5), None, &ProgressReporter::new()).unwrap();

        assert!(!result.records.is_empty());
        assert_eq!(result.columns, vec!["x", "y", "product"]);
        for record in &result.records {
            let x = record.get("x").unwrap();
            let y = record.get("y").unwrap();
            assert!((x + y - 10.0).abs() <= 0.01);
            assert!(record.contains("product"));
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let problem = sum_problem();
        let config = small_config(42);
        let a = run(&problem, &config, None, &ProgressReporter::new()).unwrap();
        let b = run(&problem, &config, None, &ProgressReporter::new()).unwrap();
        assert_eq!(a.records, b.records);
    }

    #[test]
    fn exact_seed_design_survives() {
        let problem = sum_problem();
        let config = SolverConfigBuilder::with_defaults()
            .sample_size(50)
            .refinement_rounds(0)
            .rng_seed(Some(3))
            .build()
            .unwrap();
        let seed: DesignRecord = [("x", 4.0), ("y", 6.0)].into_iter().collect();

        let result = run(&problem, &config, Some(&seed), &ProgressReporter::new()).unwrap();

        assert!(!result.records.is_empty());
        assert!(result.records.iter().any(|r| {
            (r.get("x").unwrap() - 4.0).abs() < 1e-9 && (r.get("y").unwrap() - 6.0).abs() < 1e-9
        }));
    }

    #[test]
    fn objectives_leave_only_non_dominated_designs() {
        let mut set = ConstraintSet::new();
        set.add_equation("sum", (Expr::unknown("x") + Expr::unknown("y")).ge(10.0))
            .unwrap();
        set.add_objective("x", Expr::unknown("x"), Direction::Minimize)
            .unwrap();
        set.add_objective("y", Expr::unknown("y"), Direction::Minimize)
            .unwrap();
        let problem = set
            .prepare(
                &bounds(&[("x", 0.0, 10.0), ("y", 0.0, 10.0)]),
                &resolutions(&[("x", 0.1), ("y", 0.1)]),
            )
            .unwrap();

        let result = run(&problem, &small_config(8), None, &ProgressReporter::new()).unwrap();

        let points: Vec<(f64, f64)> = result
            .records
            .iter()
            .map(|r| (r.get("x").unwrap(), r.get("y").unwrap()))
            .collect();
        for (i, a) in points.iter().enumerate() {
            for (j, b) in points.iter().enumerate() {
                if i != j {
                    let dominated = b.0 <= a.0 && b.1 <= a.1 && (b.0 < a.0 || b.1 < a.1);
                    assert!(!dominated);
                }
            }
        }
    }

    #[test]
    fn empty_cloud_propagates_to_empty_result() {
        let problem = sum_problem();
        let config = SolverConfigBuilder::with_defaults()
            .sample_size(0)
            .rng_seed(Some(1))
            .build()
            .unwrap();
        let result = run(&problem, &config, None, &ProgressReporter::new()).unwrap();
        assert!(result.records.is_empty());
    }

    #[test]
    fn progress_reports_every_phase() {
        let problem = sum_problem();
        let config = small_config(2);
        let phases = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if matches!(event, Progress::PhaseStart { .. }) {
                phases.fetch_add(1, Ordering::Relaxed);
            }
        }));

        run(&problem, &config, None, &reporter).unwrap();

        assert_eq!(phases.load(Ordering::Relaxed), 5 + config.refinement_rounds);
    }
}

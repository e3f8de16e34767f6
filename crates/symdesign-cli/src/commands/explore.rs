use crate::cli::ExploreArgs;
use crate::config::{LoadedProblem, PartialProblemFile, load_seed};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use symdesign::engine::progress::ProgressReporter;
use symdesign::workflows::session::DesignStore;
use tracing::{info, warn};

pub fn run(args: ExploreArgs) -> Result<()> {
    let partial = PartialProblemFile::from_file(&args.problem)?;
    info!("Merging problem file with CLI overrides...");
    let LoadedProblem {
        constraints,
        bounds,
        resolutions,
        config,
        mission,
    } = partial.merge_with_cli(&args.set_values, args.rng_seed)?;

    let seed = match &args.seed_file {
        Some(path) => {
            info!("Loading seed design from {:?}", path);
            Some(load_seed(path)?)
        }
        None => None,
    };

    let mut store = DesignStore::new();
    let id = store.create();
    let session = store
        .get_mut(&id)
        .ok_or_else(|| CliError::Other(anyhow::anyhow!("Session '{}' vanished", id)))?;
    session.constraints = constraints;
    session.bounds = bounds;
    session.resolutions = resolutions;
    session.config = config;
    if let Some(mission) = mission {
        let resolved = session.set_mission(mission)?;
        info!(
            stages = resolved.stages.len(),
            unknowns = resolved.unknowns.len(),
            "Mission resolved."
        );
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Exploring design space...");
    let result = session.explore(seed.as_ref(), &reporter)?;
    let (count, diverged) = (result.records.len(), result.diverged);
    info!(
        designs = count,
        diverged,
        phases = progress_handler.completed_phases().len(),
        "Exploration finished."
    );

    if count == 0 {
        warn!("Exploration completed but no design satisfied the constraints.");
        println!("Warning: no design satisfied the constraints.");
    }
    if diverged > 0 {
        println!("  {} point(s) diverged during residual minimization.", diverged);
    }

    session.export(&args.output)?;
    println!(
        "✓ {} design(s) written to: {}",
        count,
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use symdesign::core::io::table::read_records;
    use tempfile::tempdir;

    fn args(problem: PathBuf, output: PathBuf) -> ExploreArgs {
        ExploreArgs {
            problem,
            output,
            seed_file: None,
            rng_seed: Some(11),
            set_values: vec![
                "solver.sample-size=300".to_string(),
                "solver.mutation-count=300".to_string(),
                "solver.refinement-rounds=1".to_string(),
            ],
        }
    }

    #[test]
    fn explore_writes_designs_on_the_constraint_line() {
        let dir = tempdir().unwrap();
        let problem = dir.path().join("problem.toml");
        fs::write(
            &problem,
            r#"
[unknowns.x]
min = 0.0
max = 10.0
resolution = 0.1

[unknowns.y]
min = 0.0
max = 10.0
resolution = 0.1

[equations]
sum = "x + y = 10"

[derived]
product = "x * y"
"#,
        )
        .unwrap();
        let output = dir.path().join("designs.csv");

        run(args(problem, output.clone())).unwrap();

        let records = read_records(&output).unwrap();
        assert!(!records.is_empty());
        for record in &records {
            let x = record.get("x").unwrap();
            let y = record.get("y").unwrap();
            assert!((x + y - 10.0).abs() <= 0.1 + 1e-9);
            assert!((record.get("product").unwrap() - x * y).abs() < 1e-6);
        }
    }

    #[test]
    fn missing_problem_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let result = run(args(
            dir.path().join("absent.toml"),
            dir.path().join("out.csv"),
        ));
        assert!(matches!(result, Err(CliError::Io(_))));
    }

    #[test]
    fn unbounded_unknown_is_reported_before_solving() {
        let dir = tempdir().unwrap();
        let problem = dir.path().join("problem.toml");
        fs::write(
            &problem,
            "[unknowns.x]\nresolution = 0.1\n[equations]\nfix = \"x = 1\"\n",
        )
        .unwrap();
        let output = dir.path().join("out.csv");
        let result = run(args(problem, output.clone()));
        assert!(matches!(result, Err(CliError::SymDesignCore(_))));
        assert!(!output.exists());
    }
}

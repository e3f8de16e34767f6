use super::read_toml;
use super::PartialMissionFile;
use crate::error::{CliError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use symdesign::core::expr::SurrogateRegistry;
use symdesign::core::expr::parse::parse;
use symdesign::core::io::table;
use symdesign::core::mission::Mission;
use symdesign::core::ocean::register_ocean_models;
use symdesign::core::record::DesignRecord;
use symdesign::engine::config::{SolverConfig, SolverConfigBuilder};
use symdesign::engine::constraints::{Bounds, ConstraintSet, Direction, Resolutions};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSolverConfig {
    sample_size: Option<usize>,
    mutation_count: Option<usize>,
    seed_multiplier: Option<f64>,
    mutation_multiplier: Option<f64>,
    newton_iterations: Option<usize>,
    newton_epsilon: Option<f64>,
    finite_difference_step: Option<f64>,
    initial_tolerance: Option<f64>,
    refinement_rounds: Option<usize>,
    loose_tolerance: Option<f64>,
    tight_tolerance: Option<f64>,
    tight_after_round: Option<usize>,
    rng_seed: Option<u64>,
}

impl PartialSolverConfig {
    fn into_config(self) -> Result<SolverConfig> {
        let defaults = SolverConfig::default();
        SolverConfigBuilder::new()
            .sample_size(self.sample_size.unwrap_or(defaults.sample_size))
            .mutation_count(self.mutation_count.unwrap_or(defaults.mutation_count))
            .seed_multiplier(self.seed_multiplier.unwrap_or(defaults.seed_multiplier))
            .mutation_multiplier(
                self.mutation_multiplier
                    .unwrap_or(defaults.mutation_multiplier),
            )
            .newton_iterations(self.newton_iterations.unwrap_or(defaults.newton_iterations))
            .newton_epsilon(self.newton_epsilon.unwrap_or(defaults.newton_epsilon))
            .finite_difference_step(
                self.finite_difference_step
                    .unwrap_or(defaults.finite_difference_step),
            )
            .initial_tolerance(self.initial_tolerance.unwrap_or(defaults.initial_tolerance))
            .refinement_rounds(self.refinement_rounds.unwrap_or(defaults.refinement_rounds))
            .loose_tolerance(self.loose_tolerance.unwrap_or(defaults.loose_tolerance))
            .tight_tolerance(self.tight_tolerance.unwrap_or(defaults.tight_tolerance))
            .tight_after_round(self.tight_after_round.unwrap_or(defaults.tight_after_round))
            .rng_seed(self.rng_seed)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct PartialUnknown {
    min: Option<f64>,
    max: Option<f64>,
    resolution: f64,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct PartialObjective {
    expression: String,
    direction: Direction,
}

/// A problem file as written on disk, before expressions are parsed.
///
/// Equations and derived values are keyed by name; derived columns come out in name order.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialProblemFile {
    /// Mission file, relative to the problem file unless absolute.
    mission: Option<PathBuf>,
    solver: Option<PartialSolverConfig>,
    #[serde(default)]
    unknowns: BTreeMap<String, PartialUnknown>,
    #[serde(default)]
    equations: BTreeMap<String, String>,
    #[serde(default)]
    derived: BTreeMap<String, String>,
    #[serde(default)]
    objectives: BTreeMap<String, PartialObjective>,
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Everything a design session needs from a problem file.
#[derive(Debug)]
pub struct LoadedProblem {
    pub constraints: ConstraintSet,
    pub bounds: Bounds,
    pub resolutions: Resolutions,
    pub config: SolverConfig,
    pub mission: Option<Mission>,
}

impl PartialProblemFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file: Self = read_toml(path)?;
        file.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(file)
    }

    /// Applies `-S` overrides and the CLI seed, then parses every expression.
    pub fn merge_with_cli(
        mut self,
        set_values: &[String],
        rng_seed: Option<u64>,
    ) -> Result<LoadedProblem> {
        self.apply_set_values(set_values)?;

        let mut solver = self.solver.take().unwrap_or_default();
        if rng_seed.is_some() {
            solver.rng_seed = rng_seed;
        }
        let config = solver.into_config()?;

        let mut registry = SurrogateRegistry::new();
        register_ocean_models(&mut registry);
        let parse_named = |name: &str, text: &str| {
            parse(text, &registry).map_err(|source| CliError::Expression {
                name: name.to_string(),
                source,
            })
        };

        let mut constraints = ConstraintSet::new();
        for (name, text) in &self.equations {
            let expr = parse_named(name, text)?;
            if !expr.is_relation() {
                return Err(CliError::Config(format!(
                    "Equation '{}' must be a relation using '=', '<=' or '>='",
                    name
                )));
            }
            constraints.add_equation(name.as_str(), expr)?;
        }
        for (name, text) in &self.derived {
            constraints.add_derived(name.as_str(), parse_named(name, text)?)?;
        }
        for (name, objective) in &self.objectives {
            let expr = parse_named(name, &objective.expression)?;
            constraints.add_objective(name.as_str(), expr, objective.direction)?;
        }

        let mut bounds = Bounds::new();
        let mut resolutions = Resolutions::new();
        for (name, unknown) in &self.unknowns {
            match (unknown.min, unknown.max) {
                (Some(min), Some(max)) => {
                    bounds.insert(name.clone(), (min, max));
                }
                (None, None) => debug!(unknown = %name, "Bounds left to the mission."),
                _ => {
                    return Err(CliError::Config(format!(
                        "Unknown '{}' must set both `min` and `max`, or neither",
                        name
                    )));
                }
            }
            resolutions.insert(name.clone(), unknown.resolution);
        }

        let mission = match &self.mission {
            Some(path) => {
                let path = self.base_dir.join(path);
                Some(PartialMissionFile::from_file(&path)?.into_mission()?)
            }
            None => None,
        };

        Ok(LoadedProblem {
            constraints,
            bounds,
            resolutions,
            config,
            mission,
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        if set_values.is_empty() {
            return Ok(());
        }
        for kv_pair in set_values {
            let parts: Vec<_> = kv_pair.splitn(2, '=').collect();
            if parts.len() != 2 {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            }
            let key = parts[0];
            let value_str = parts[1];
            let solver = self.solver.get_or_insert_with(Default::default);

            match key {
                "solver.sample-size" => solver.sample_size = Some(parse_value(key, value_str)?),
                "solver.mutation-count" => {
                    solver.mutation_count = Some(parse_value(key, value_str)?)
                }
                "solver.seed-multiplier" => {
                    solver.seed_multiplier = Some(parse_value(key, value_str)?)
                }
                "solver.mutation-multiplier" => {
                    solver.mutation_multiplier = Some(parse_value(key, value_str)?)
                }
                "solver.newton-iterations" => {
                    solver.newton_iterations = Some(parse_value(key, value_str)?)
                }
                "solver.newton-epsilon" => {
                    solver.newton_epsilon = Some(parse_value(key, value_str)?)
                }
                "solver.finite-difference-step" => {
                    solver.finite_difference_step = Some(parse_value(key, value_str)?)
                }
                "solver.initial-tolerance" => {
                    solver.initial_tolerance = Some(parse_value(key, value_str)?)
                }
                "solver.refinement-rounds" => {
                    solver.refinement_rounds = Some(parse_value(key, value_str)?)
                }
                "solver.loose-tolerance" => {
                    solver.loose_tolerance = Some(parse_value(key, value_str)?)
                }
                "solver.tight-tolerance" => {
                    solver.tight_tolerance = Some(parse_value(key, value_str)?)
                }
                "solver.tight-after-round" => {
                    solver.tight_after_round = Some(parse_value(key, value_str)?)
                }
                "solver.rng-seed" => solver.rng_seed = Some(parse_value(key, value_str)?),
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value_str: &str) -> Result<T> {
    value_str
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value_str)))
}

/// Loads a seed design from a flat TOML table of `name = value`, or from the first row of a
/// CSV design table.
pub fn load_seed(path: &Path) -> Result<DesignRecord> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        return table::read_records(path)?.into_iter().next().ok_or_else(|| {
            CliError::Config(format!("Seed table {:?} has no design rows", path))
        });
    }
    let values: BTreeMap<String, f64> = read_toml(path)?;
    Ok(values.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use symdesign::core::expr::Bindings;
    use tempfile::{TempDir, tempdir};

    const RECTANGLE: &str = r#"
[solver]
sample-size = 500
refinement-rounds = 2

[unknowns.width]
min = 0.0
max = 10.0
resolution = 0.1

[unknowns.height]
min = 0.0
max = 10.0
resolution = 0.1

[equations]
perimeter = "2 * width + 2 * height = 20"

[derived]
area = "width * height"

[objectives.area]
expression = "width * height"
direction = "maximize"
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn problem_file_loads_into_constraints_and_config() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "problem.toml", RECTANGLE);
        let loaded = PartialProblemFile::from_file(&path)
            .unwrap()
            .merge_with_cli(&[], None)
            .unwrap();

        assert_eq!(loaded.config.sample_size, 500);
        assert_eq!(loaded.config.refinement_rounds, 2);
        assert_eq!(loaded.config.mutation_count, 10_000);
        assert_eq!(loaded.constraints.equations().len(), 1);
        assert_eq!(loaded.constraints.derived().len(), 1);
        assert_eq!(loaded.constraints.objectives()[0].direction, Direction::Maximize);
        assert_eq!(loaded.bounds["width"], (0.0, 10.0));
        assert_eq!(loaded.resolutions["height"], 0.1);
        assert!(loaded.mission.is_none());

        let problem = loaded
            .constraints
            .prepare(&loaded.bounds, &loaded.resolutions)
            .unwrap();
        assert_eq!(problem.unknowns(), &["height", "width"]);
    }

    #[test]
    fn set_values_and_cli_seed_override_the_file() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "problem.toml", RECTANGLE);
        let set = vec![
            "solver.sample-size=42".to_string(),
            "solver.tight-tolerance=0.05".to_string(),
            "solver.rng-seed=1".to_string(),
        ];
        let loaded = PartialProblemFile::from_file(&path)
            .unwrap()
            .merge_with_cli(&set, Some(99))
            .unwrap();
        assert_eq!(loaded.config.sample_size, 42);
        assert_eq!(loaded.config.tight_tolerance, 0.05);
        assert_eq!(loaded.config.rng_seed, Some(99));
    }

    #[test]
    fn unsupported_or_malformed_set_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "problem.toml", RECTANGLE);
        for bad in ["solver.unknown-key=1", "solver.sample-size", "solver.sample-size=many"] {
            let result = PartialProblemFile::from_file(&path)
                .unwrap()
                .merge_with_cli(&[bad.to_string()], None);
            assert!(matches!(result, Err(CliError::Config(_))), "{}", bad);
        }
    }

    #[test]
    fn equation_must_be_a_relation() {
        let dir = tempdir().unwrap();
        let path = write(
            &dir,
            "problem.toml",
            "[equations]\nloose = \"x + y\"\n[unknowns.x]\nmin = 0.0\nmax = 1.0\nresolution = 0.1\n",
        );
        let result = PartialProblemFile::from_file(&path)
            .unwrap()
            .merge_with_cli(&[], None);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("loose")));
    }

    #[test]
    fn malformed_expression_names_its_entry() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "problem.toml", "[derived]\nbroken = \"x * (y\"\n");
        let result = PartialProblemFile::from_file(&path)
            .unwrap()
            .merge_with_cli(&[], None);
        assert!(matches!(result, Err(CliError::Expression { name, .. }) if name == "broken"));
    }

    #[test]
    fn half_specified_bounds_are_rejected() {
        let dir = tempdir().unwrap();
        let path = write(
            &dir,
            "problem.toml",
            "[unknowns.x]\nmin = 0.0\nresolution = 0.1\n",
        );
        let result = PartialProblemFile::from_file(&path)
            .unwrap()
            .merge_with_cli(&[], None);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn mission_path_is_relative_to_the_problem_file() {
        let dir = tempdir().unwrap();
        write(
            &dir,
            "mission.toml",
            r#"
[[stages]]
name = "survey"
targets = ["exact-distance"]
target-distance = 10.0
"#,
        );
        let path = write(
            &dir,
            "problem.toml",
            r#"
mission = "mission.toml"

[unknowns.survey_duration]
resolution = 60.0

[unknowns.survey_average_speed]
min = 0.5
max = 3.0
resolution = 0.01

[equations]
endurance = "survey_duration <= 36000"
"#,
        );
        let loaded = PartialProblemFile::from_file(&path)
            .unwrap()
            .merge_with_cli(&[], None)
            .unwrap();
        let mission = loaded.mission.unwrap();
        assert_eq!(mission.stages()[0].name, "survey");
        assert!(!loaded.bounds.contains_key("survey_duration"));
        assert_eq!(loaded.bounds["survey_average_speed"], (0.5, 3.0));
    }

    #[test]
    fn seed_loads_from_toml_or_csv() {
        let dir = tempdir().unwrap();
        let toml_path = write(&dir, "seed.toml", "width = 4.0\nheight = 6.0\n");
        let seed = load_seed(&toml_path).unwrap();
        assert_eq!(seed.value_of("width"), Some(4.0));
        assert_eq!(seed.value_of("height"), Some(6.0));

        let csv_path = write(&dir, "seed.csv", "width,height\n3,7\n8,2\n");
        let seed = load_seed(&csv_path).unwrap();
        assert_eq!(seed.value_of("width"), Some(3.0));
        assert_eq!(seed.value_of("height"), Some(7.0));

        let empty_path = write(&dir, "empty.csv", "width,height\n");
        assert!(matches!(load_seed(&empty_path), Err(CliError::Config(_))));
    }
}

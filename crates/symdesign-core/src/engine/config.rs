use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Constants steering the point-cloud solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Points drawn uniformly when no seed design is given.
    pub sample_size: usize,
    /// Points added by each mutation step.
    pub mutation_count: usize,
    /// Jitter multiplier applied around a seed design.
    pub seed_multiplier: f64,
    /// Jitter multiplier applied during refinement rounds.
    pub mutation_multiplier: f64,
    pub newton_iterations: usize,
    pub newton_epsilon: f64,
    /// Relative step of the central-difference Jacobian.
    pub finite_difference_step: f64,
    pub initial_tolerance: f64,
    pub refinement_rounds: usize,
    pub loose_tolerance: f64,
    pub tight_tolerance: f64,
    /// First refinement round (zero-based) that prunes with `tight_tolerance`.
    pub tight_after_round: usize,
    pub rng_seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            sample_size: 10_000,
            mutation_count: 10_000,
            seed_multiplier: 2.0,
            mutation_multiplier: 1.0,
            newton_iterations: 10,
            newton_epsilon: 1e-6,
            finite_difference_step: 1e-6,
            initial_tolerance: 0.5,
            refinement_rounds: 5,
            loose_tolerance: 0.5,
            tight_tolerance: 0.1,
            tight_after_round: 3,
            rng_seed: None,
        }
    }
}

impl SolverConfig {
    /// Tolerance used by refinement round `round`.
    pub fn round_tolerance(&self, round: usize) -> f64 {
        if round < self.tight_after_round {
            self.loose_tolerance
        } else {
            self.tight_tolerance
        }
    }
}

#[derive(Default)]
pub struct SolverConfigBuilder {
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

impl SolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-filled with [`SolverConfig::default`].
    pub fn with_defaults() -> Self {
        let defaults = SolverConfig::default();
        Self {
            sample_size: Some(defaults.sample_size),
            mutation_count: Some(defaults.mutation_count),
            seed_multiplier: Some(defaults.seed_multiplier),
            mutation_multiplier: Some(defaults.mutation_multiplier),
            newton_iterations: Some(defaults.newton_iterations),
            newton_epsilon: Some(defaults.newton_epsilon),
            finite_difference_step: Some(defaults.finite_difference_step),
            initial_tolerance: Some(defaults.initial_tolerance),
            refinement_rounds: Some(defaults.refinement_rounds),
            loose_tolerance: Some(defaults.loose_tolerance),
            tight_tolerance: Some(defaults.tight_tolerance),
            tight_after_round: Some(defaults.tight_after_round),
            rng_seed: defaults.rng_seed,
        }
    }

    pub fn sample_size(mut self, n: usize) -> Self {
        self.sample_size = Some(n);
        self
    }
    pub fn mutation_count(mut self, n: usize) -> Self {
        self.mutation_count = Some(n);
        self
    }
    pub fn seed_multiplier(mut self, multiplier: f64) -> Self {
        self.seed_multiplier = Some(multiplier);
        self
    }
    pub fn mutation_multiplier(mut self, multiplier: f64) -> Self {
        self.mutation_multiplier = Some(multiplier);
        self
    }
    pub fn newton_iterations(mut self, iterations: usize) -> Self {
        self.newton_iterations = Some(iterations);
        self
    }
    pub fn newton_epsilon(mut self, epsilon: f64) -> Self {
        self.newton_epsilon = Some(epsilon);
        self
    }
    pub fn finite_difference_step(mut self, step: f64) -> Self {
        self.finite_difference_step = Some(step);
        self
    }
    pub fn initial_tolerance(mut self, tolerance: f64) -> Self {
        self.initial_tolerance = Some(tolerance);
        self
    }
    pub fn refinement_rounds(mut self, rounds: usize) -> Self {
        self.refinement_rounds = Some(rounds);
        self
    }
    pub fn loose_tolerance(mut self, tolerance: f64) -> Self {
        self.loose_tolerance = Some(tolerance);
        self
    }
    pub fn tight_tolerance(mut self, tolerance: f64) -> Self {
        self.tight_tolerance = Some(tolerance);
        self
    }
    pub fn tight_after_round(mut self, round: usize) -> Self {
        self.tight_after_round = Some(round);
        self
    }
    pub fn rng_seed(mut self, seed: Option<u64>) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn build(self) -> Result<SolverConfig, ConfigError> {
        let config = SolverConfig {
            sample_size: self
                .sample_size
                .ok_or(ConfigError::MissingParameter("sample_size"))?,
            mutation_count: self
                .mutation_count
                .ok_or(ConfigError::MissingParameter("mutation_count"))?,
            seed_multiplier: self
                .seed_multiplier
                .ok_or(ConfigError::MissingParameter("seed_multiplier"))?,
            mutation_multiplier: self
                .mutation_multiplier
                .ok_or(ConfigError::MissingParameter("mutation_multiplier"))?,
            newton_iterations: self
                .newton_iterations
                .ok_or(ConfigError::MissingParameter("newton_iterations"))?,
            newton_epsilon: self
                .newton_epsilon
                .ok_or(ConfigError::MissingParameter("newton_epsilon"))?,
            finite_difference_step: self
                .finite_difference_step
                .ok_or(ConfigError::MissingParameter("finite_difference_step"))?,
            initial_tolerance: self
                .initial_tolerance
                .ok_or(ConfigError::MissingParameter("initial_tolerance"))?,
            refinement_rounds: self
                .refinement_rounds
                .ok_or(ConfigError::MissingParameter("refinement_rounds"))?,
            loose_tolerance: self
                .loose_tolerance
                .ok_or(ConfigError::MissingParameter("loose_tolerance"))?,
            tight_tolerance: self
                .tight_tolerance
                .ok_or(ConfigError::MissingParameter("tight_tolerance"))?,
            tight_after_round: self
                .tight_after_round
                .ok_or(ConfigError::MissingParameter("tight_after_round"))?,
            rng_seed: self.rng_seed,
        };
        validate(&config)?;
        Ok(config)
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be a positive finite number, got {}", value),
        })
    }
}

fn validate(config: &SolverConfig) -> Result<(), ConfigError> {
    require_positive("seed_multiplier", config.seed_multiplier)?;
    require_positive("mutation_multiplier", config.mutation_multiplier)?;
    require_positive("newton_epsilon", config.newton_epsilon)?;
    require_positive("finite_difference_step", config.finite_difference_step)?;
    require_positive("initial_tolerance", config.initial_tolerance)?;
    require_positive("loose_tolerance", config.loose_tolerance)?;
    require_positive("tight_tolerance", config.tight_tolerance)?;
    Ok(())
}

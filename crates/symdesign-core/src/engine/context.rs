use super::config::SolverConfig;
use super::constraints::Problem;
use super::progress::ProgressReporter;

#[derive(Clone, Copy)]
pub struct SolveContext<'a> {
    pub problem: &'a Problem,
    pub config: &'a SolverConfig,
    pub reporter: &'a ProgressReporter<'a>,
}

impl<'a> SolveContext<'a> {
    pub fn new(
        problem: &'a Problem,
        config: &'a SolverConfig,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            problem,
            config,
            reporter,
        }
    }
}

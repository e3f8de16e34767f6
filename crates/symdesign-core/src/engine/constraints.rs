use super::error::EngineError;
use crate::core::expr::{Bindings, EvalError, Expr};
use crate::core::mission::ResolvedMission;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, instrument};

/// Inclusive `(min, max)` range of each unknown.
pub type Bounds = BTreeMap<String, (f64, f64)>;
/// Smallest meaningful step of each unknown.
pub type Resolutions = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Minimize,
    Maximize,
    Neutral,
}

impl Direction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "minimize" | "min" => Some(Self::Minimize),
            "maximize" | "max" => Some(Self::Maximize),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }

    /// Maps an objective value so that smaller is always better, or `None` when ignored.
    pub(crate) fn oriented(self, value: f64) -> Option<f64> {
        match self {
            Self::Minimize => Some(value),
            Self::Maximize => Some(-value),
            Self::Neutral => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Objective {
    pub name: String,
    pub expr: Expr,
    pub direction: Direction,
}

/// Named equations, derived values and objectives of one design.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    equations: Vec<(String, Expr)>,
    derived: Vec<(String, Expr)>,
    objectives: Vec<Objective>,
}

fn ensure_unique<'a>(
    mut names: impl Iterator<Item = &'a str>,
    name: &str,
    kind: &str,
) -> Result<(), EngineError> {
    if names.any(|n| n == name) {
        Err(EngineError::Configuration(format!(
            "{} '{}' is defined more than once",
            kind, name
        )))
    } else {
        Ok(())
    }
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_equation(&mut self, name: impl Into<String>, expr: Expr) -> Result<(), EngineError> {
        let name = name.into();
        ensure_unique(self.equations.iter().map(|(n, _)| n.as_str()), &name, "Equation")?;
        self.equations.push((name, expr));
        Ok(())
    }

    pub fn add_derived(&mut self, name: impl Into<String>, expr: Expr) -> Result<(), EngineError> {
        let name = name.into();
        ensure_unique(self.derived.iter().map(|(n, _)| n.as_str()), &name, "Derived value")?;
        self.derived.push((name, expr));
        Ok(())
    }

    pub fn add_objective(
        &mut self,
        name: impl Into<String>,
        expr: Expr,
        direction: Direction,
    ) -> Result<(), EngineError> {
        let name = name.into();
        ensure_unique(self.objectives.iter().map(|o| o.name.as_str()), &name, "Objective")?;
        self.objectives.push(Objective {
            name,
            expr,
            direction,
        });
        Ok(())
    }

    /// Adds the kinematic equation of every mission stage that still has unknown targets.
    pub fn add_mission(&mut self, mission: &ResolvedMission) -> Result<(), EngineError> {
        for (name, equation) in mission.kinematic_equations() {
            self.add_equation(name, equation)?;
        }
        Ok(())
    }

    pub fn equations(&self) -> &[(String, Expr)] {
        &self.equations
    }

    pub fn derived(&self) -> &[(String, Expr)] {
        &self.derived
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// Every unknown referenced by the equations, in sorted order.
    pub fn unknowns(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for (_, expr) in &self.equations {
            expr.collect_unknowns(&mut names);
        }
        names
    }

    /// Freezes the constraint set against bounds and resolutions.
    ///
    /// Fails before any sampling if an unknown lacks a bound or resolution, if a bound is
    /// inverted or a resolution is not strictly positive, or if a derived value or objective
    /// references an unknown the equations do not. Derived values may not share a name with an
    /// unknown.
    #[instrument(skip_all, name = "problem_preparation")]
    pub fn prepare(
        &self,
        bounds: &Bounds,
        resolutions: &Resolutions,
    ) -> Result<Problem, EngineError> {
        if self.equations.is_empty() {
            return Err(EngineError::Configuration(
                "At least one equation is required".to_string(),
            ));
        }
        let unknowns: Vec<String> = self.unknowns().into_iter().collect();
        if unknowns.is_empty() {
            return Err(EngineError::Configuration(
                "The equations do not reference any unknown".to_string(),
            ));
        }

        let mut lower = Vec::with_capacity(unknowns.len());
        let mut upper = Vec::with_capacity(unknowns.len());
        let mut steps = Vec::with_capacity(unknowns.len());
        for name in &unknowns {
            let &(lo, hi) = bounds.get(name).ok_or_else(|| {
                EngineError::Configuration(format!("Unknown '{}' has no bounds", name))
            })?;
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                return Err(EngineError::Configuration(format!(
                    "Bounds of '{}' are invalid: [{}, {}]",
                    name, lo, hi
                )));
            }
            let &step = resolutions.get(name).ok_or_else(|| {
                EngineError::Configuration(format!("Unknown '{}' has no resolution", name))
            })?;
            if !(step.is_finite() && step > 0.0) {
                return Err(EngineError::Configuration(format!(
                    "Resolution of '{}' must be strictly positive, got {}",
                    name, step
                )));
            }
            lower.push(lo);
            upper.push(hi);
            steps.push(step);
        }

        let universe: BTreeSet<&str> = unknowns.iter().map(String::as_str).collect();
        if let Some((name, _)) = self.derived.iter().find(|(n, _)| universe.contains(n.as_str())) {
            return Err(EngineError::Configuration(format!(
                "Derived value '{}' has the same name as an unknown",
                name
            )));
        }
        let extra = self
            .derived
            .iter()
            .map(|(name, expr)| ("Derived value", name, expr))
            .chain(
                self.objectives
                    .iter()
                    .map(|o| ("Objective", &o.name, &o.expr)),
            );
        for (kind, name, expr) in extra {
            if let Some(missing) = expr.unknowns().iter().find(|u| !universe.contains(u.as_str())) {
                return Err(EngineError::Configuration(format!(
                    "{} '{}' references '{}', which no equation constrains",
                    kind, name, missing
                )));
            }
        }

        for name in bounds.keys().filter(|n| !universe.contains(n.as_str())) {
            debug!(unknown = %name, "Ignoring bound of an unknown no equation references.");
        }

        let index = unknowns
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();

        info!(
            unknowns = unknowns.len(),
            equations = self.equations.len(),
            derived = self.derived.len(),
            objectives = self.objectives.len(),
            "Problem prepared."
        );

        Ok(Problem {
            unknowns,
            index,
            lower,
            upper,
            resolutions: steps,
            equations: self.equations.clone(),
            derived: self.derived.clone(),
            objectives: self.objectives.clone(),
        })
    }
}

/// A constraint set frozen against its bounds and resolutions.
#[derive(Debug, Clone)]
pub struct Problem {
    unknowns: Vec<String>,
    index: HashMap<String, usize>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    resolutions: Vec<f64>,
    equations: Vec<(String, Expr)>,
    derived: Vec<(String, Expr)>,
    objectives: Vec<Objective>,
}

impl Problem {
    pub fn unknowns(&self) -> &[String] {
        &self.unknowns
    }

    pub fn dimension(&self) -> usize {
        self.unknowns.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    pub fn equations(&self) -> &[(String, Expr)] {
        &self.equations
    }

    pub fn derived(&self) -> &[(String, Expr)] {
        &self.derived
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// Output column order: unknowns, then derived values.
    pub fn columns(&self) -> Vec<String> {
        self.unknowns
            .iter()
            .chain(self.derived.iter().map(|(name, _)| name))
            .cloned()
            .collect()
    }

    pub fn clamp(&self, point: &mut [f64]) {
        for ((x, lo), hi) in point.iter_mut().zip(&self.lower).zip(&self.upper) {
            *x = x.clamp(*lo, *hi);
        }
    }

    pub fn view<'a>(&'a self, point: &'a [f64]) -> PointView<'a> {
        PointView {
            problem: self,
            values: point,
        }
    }

    /// Residual of every equation at `point`, in equation order.
    pub fn residuals(&self, point: &[f64]) -> Result<Vec<f64>, EvalError> {
        let view = self.view(point);
        self.equations
            .iter()
            .map(|(_, expr)| expr.residual(&view))
            .collect()
    }

    /// Largest absolute residual at `point`.
    pub fn worst_residual(&self, point: &[f64]) -> Result<f64, EvalError> {
        let residuals = self.residuals(point)?;
        let worst = residuals.iter().fold(0.0_f64, |acc, r| acc.max(r.abs()));
        if residuals.iter().all(|r| r.is_finite()) {
            Ok(worst)
        } else {
            Err(EvalError::NonFinite)
        }
    }
}

/// Binds the unknowns of a problem to the coordinates of one point.
#[derive(Clone, Copy)]
pub struct PointView<'a> {
    problem: &'a Problem,
    values: &'a [f64],
}

impl Bindings for PointView<'_> {
    fn value_of(&self, name: &str) -> Option<f64> {
        self.problem
            .index_of(name)
            .and_then(|i| self.values.get(i).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_is_ten() -> ConstraintSet {
        let mut set = ConstraintSet::new();
        set.add_equation(
            "sum",
            (Expr::unknown("x") + Expr::unknown("y")).eq_to(10.0),
        )
        .unwrap();
        set
    }

    fn table(entries: &[(&str, (f64, f64))]) -> Bounds {
        entries
            .iter()
            .map(|(n, b)| (n.to_string(), *b))
            .collect()
    }

    fn steps(entries: &[(&str, f64)]) -> Resolutions {
        entries.iter().map(|(n, s)| (n.to_string(), *s)).collect()
    }

    #[test]
    fn duplicate_equation_names_are_rejected() {
        let mut set = sum_is_ten();
        let result = set.add_equation("sum", Expr::unknown("x"));
        assert!(matches!(result, Err(EngineError::Configuration(_))));
        set.add_derived("sum", Expr::unknown("x")).unwrap();
    }

    #[test]
    fn prepare_orders_unknowns_and_columns() {
        let mut set = sum_is_ten();
        set.add_derived("area", Expr::unknown("x") * Expr::unknown("y"))
            .unwrap();
        let problem = set
            .prepare(
                &table(&[("y", (0.0, 10.0)), ("x", (0.0, 10.0))]),
                &steps(&[("x", 0.1), ("y", 0.1)]),
            )
            .unwrap();
        assert_eq!(problem.unknowns(), ["x", "y"]);
        assert_eq!(problem.columns(), vec!["x", "y", "area"]);
        assert_eq!(problem.index_of("y"), Some(1));
        assert_eq!(problem.worst_residual(&[4.0, 5.0]).unwrap(), 1.0);
    }

    #[test]
    fn unknown_without_bounds_fails_before_sampling() {
        let mut set = sum_is_ten();
        set.add_equation("limit", Expr::unknown("z").le(3.0))
            .unwrap();
        let result = set.prepare(
            &table(&[("x", (0.0, 10.0)), ("y", (0.0, 10.0))]),
            &steps(&[("x", 0.1), ("y", 0.1), ("z", 0.1)]),
        );
        match result {
            Err(EngineError::Configuration(message)) => assert!(message.contains("'z'")),
            other => panic!("unexpected result: {:?}", other.map(|p| p.dimension())),
        }
    }

    #[test]
    fn inverted_bounds_and_zero_resolution_are_rejected() {
        let set = sum_is_ten();
        assert!(set
            .prepare(
                &table(&[("x", (5.0, 1.0)), ("y", (0.0, 10.0))]),
                &steps(&[("x", 0.1), ("y", 0.1)]),
            )
            .is_err());
        assert!(set
            .prepare(
                &table(&[("x", (0.0, 10.0)), ("y", (0.0, 10.0))]),
                &steps(&[("x", 0.1), ("y", 0.0)]),
            )
            .is_err());
    }

    #[test]
    fn objective_on_unconstrained_unknown_is_rejected() {
        let mut set = sum_is_ten();
        set.add_objective("mass", Expr::unknown("w"), Direction::Minimize)
            .unwrap();
        let result = set.prepare(
            &table(&[("x", (0.0, 10.0)), ("y", (0.0, 10.0)), ("w", (0.0, 1.0))]),
            &steps(&[("x", 0.1), ("y", 0.1), ("w", 0.1)]),
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn derived_value_named_like_an_unknown_is_rejected() {
        let mut set = sum_is_ten();
        set.add_derived("x", Expr::unknown("x") * 100.0).unwrap();
        let result = set.prepare(
            &table(&[("x", (0.0, 10.0)), ("y", (0.0, 10.0))]),
            &steps(&[("x", 0.1), ("y", 0.1)]),
        );
        match result {
            Err(EngineError::Configuration(message)) => assert!(message.contains("'x'")),
            other => panic!("unexpected result: {:?}", other.map(|p| p.columns())),
        }
    }

    #[test]
    fn empty_constraint_set_cannot_be_prepared() {
        let result = ConstraintSet::new().prepare(&Bounds::new(), &Resolutions::new());
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn direction_orientation_makes_smaller_better() {
        assert_eq!(Direction::Minimize.oriented(2.0), Some(2.0));
        assert_eq!(Direction::Maximize.oriented(2.0), Some(-2.0));
        assert_eq!(Direction::Neutral.oriented(2.0), None);
        assert_eq!(Direction::from_name("Maximize"), Some(Direction::Maximize));
    }
}

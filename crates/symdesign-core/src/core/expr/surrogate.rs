use super::EvalError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An opaque numeric model usable inside expressions.
///
/// Implementations receive a fixed-arity input vector and return a single scalar. Trained
/// regressors, closed-form drag or power relationships and environment models all sit behind
/// this interface so the solver never depends on how a value is produced.
pub trait Surrogate: Send + Sync {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    fn evaluate(&self, inputs: &[f64]) -> Result<f64, EvalError>;
}

/// Adapts a plain closure into a [`Surrogate`].
pub struct FnSurrogate<F> {
    name: String,
    arity: usize,
    func: F,
}

impl<F> FnSurrogate<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    pub fn new(name: impl Into<String>, arity: usize, func: F) -> Self {
        Self {
            name: name.into(),
            arity,
            func,
        }
    }
}

impl<F> Surrogate for FnSurrogate<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn evaluate(&self, inputs: &[f64]) -> Result<f64, EvalError> {
        if inputs.len() != self.arity {
            return Err(EvalError::Arity {
                name: self.name.clone(),
                expected: self.arity,
                actual: inputs.len(),
            });
        }
        let value = (self.func)(inputs);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::Surrogate {
                name: self.name.clone(),
                message: format!("non-finite output {}", value),
            })
        }
    }
}

impl<F> fmt::Debug for FnSurrogate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSurrogate")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Maps physical inputs into the unit range a trained model expects before delegating.
///
/// Each input `x` with range `(lo, hi)` is passed on as `(x - lo) / (hi - lo)`.
pub struct NormalizedSurrogate {
    inner: Arc<dyn Surrogate>,
    ranges: Vec<(f64, f64)>,
}

impl NormalizedSurrogate {
    pub fn new(inner: Arc<dyn Surrogate>, ranges: Vec<(f64, f64)>) -> Result<Self, EvalError> {
        if ranges.len() != inner.arity() {
            return Err(EvalError::Arity {
                name: inner.name().to_string(),
                expected: inner.arity(),
                actual: ranges.len(),
            });
        }
        if let Some(&(lo, hi)) = ranges.iter().find(|(lo, hi)| hi <= lo) {
            return Err(EvalError::Surrogate {
                name: inner.name().to_string(),
                message: format!("empty normalization range [{}, {}]", lo, hi),
            });
        }
        Ok(Self { inner, ranges })
    }
}

impl Surrogate for NormalizedSurrogate {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn arity(&self) -> usize {
        self.inner.arity()
    }

    fn evaluate(&self, inputs: &[f64]) -> Result<f64, EvalError> {
        let normalized: Vec<f64> = inputs
            .iter()
            .zip(&self.ranges)
            .map(|(x, (lo, hi))| (x - lo) / (hi - lo))
            .collect();
        self.inner.evaluate(&normalized)
    }
}

/// Named surrogates available to the expression parser.
#[derive(Default, Clone)]
pub struct SurrogateRegistry {
    surrogates: HashMap<String, Arc<dyn Surrogate>>,
}

impl SurrogateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a surrogate under its own name, replacing any previous entry.
    pub fn register(&mut self, surrogate: Arc<dyn Surrogate>) {
        self.surrogates
            .insert(surrogate.name().to_string(), surrogate);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Surrogate>> {
        self.surrogates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.surrogates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.surrogates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surrogates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fn_surrogate_rejects_wrong_arity() {
        let s = FnSurrogate::new("sum", 2, |v: &[f64]| v.iter().sum());
        assert_eq!(s.evaluate(&[1.0, 2.0]).unwrap(), 3.0);
        assert!(matches!(
            s.evaluate(&[1.0]),
            Err(EvalError::Arity { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn fn_surrogate_reports_non_finite_output() {
        let s = FnSurrogate::new("inv", 1, |v: &[f64]| 1.0 / v[0]);
        assert!(matches!(
            s.evaluate(&[0.0]),
            Err(EvalError::Surrogate { .. })
        ));
    }

    #[test]
    fn normalized_surrogate_maps_inputs_into_unit_range() {
        let identity: Arc<dyn Surrogate> =
            Arc::new(FnSurrogate::new("first", 2, |v: &[f64]| v[0] + 10.0 * v[1]));
        let s = NormalizedSurrogate::new(identity, vec![(0.0, 4.0), (10.0, 20.0)]).unwrap();
        let value = s.evaluate(&[1.0, 15.0]).unwrap();
        assert!((value - (0.25 + 5.0)).abs() < 1e-12);
    }

    #[test]
    fn normalized_surrogate_rejects_mismatched_or_empty_ranges() {
        let inner: Arc<dyn Surrogate> = Arc::new(FnSurrogate::new("f", 1, |v: &[f64]| v[0]));
        assert!(NormalizedSurrogate::new(inner.clone(), vec![]).is_err());
        assert!(NormalizedSurrogate::new(inner, vec![(1.0, 1.0)]).is_err());
    }

    #[test]
    fn registry_looks_up_by_name() {
        let mut registry = SurrogateRegistry::new();
        registry.register(Arc::new(FnSurrogate::new("drag", 1, |v: &[f64]| v[0])));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("drag").is_some());
        assert!(registry.get("lift").is_none());
    }
}

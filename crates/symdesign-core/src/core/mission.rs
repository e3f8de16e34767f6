//! Mission stages and the mission-parameter resolver.
//!
//! A [`MissionStage`] carries minimum/target/maximum duration (s), transit distance (km) and
//! average horizontal speed (m/s), any of which may be unset. Resolution derives every value it
//! can from `distance = 0.001 × duration × speed`, collapses exact targets, and finally turns
//! each remaining gap into a named symbolic unknown for the constraint model to solve for.

use crate::core::expr::Expr;
use crate::core::ocean;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Converts `duration [s] × speed [m/s]` into a distance in km.
pub const DISTANCE_SCALE: f64 = 0.001;
pub const DEFAULT_EXPECTED_TRANSIT_SLOPE_DEG: f64 = 35.0;

const CONSISTENCY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MissionError {
    #[error("Mission stage '{stage}' must declare at least one mission target")]
    NoTargets { stage: String },

    #[error("Mission stage '{stage}' is missing '{quantity}', which is neither specified nor derivable")]
    MissingQuantity {
        stage: String,
        quantity: &'static str,
    },

    #[error("Mission stage '{stage}' has inconsistent '{quantity}': {detail}")]
    Inconsistent {
        stage: String,
        quantity: &'static str,
        detail: String,
    },

    #[error("Mission stage '{0}' is defined more than once")]
    DuplicateStage(String),
}

/// Set of performance targets for a mission stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MissionTarget(u8);

impl MissionTarget {
    pub const MINIMUM_DISTANCE: Self = Self(1 << 0);
    pub const EXACT_DISTANCE: Self = Self(1 << 1);
    pub const MAXIMUM_DISTANCE: Self = Self(1 << 2);
    pub const MINIMUM_DURATION: Self = Self(1 << 3);
    pub const EXACT_DURATION: Self = Self(1 << 4);
    pub const MAXIMUM_DURATION: Self = Self(1 << 5);
    pub const HORIZONTAL_SPEED: Self = Self(1 << 6);

    const NAMES: [(&'static str, MissionTarget); 7] = [
        ("minimum-distance", Self::MINIMUM_DISTANCE),
        ("exact-distance", Self::EXACT_DISTANCE),
        ("maximum-distance", Self::MAXIMUM_DISTANCE),
        ("minimum-duration", Self::MINIMUM_DURATION),
        ("exact-duration", Self::EXACT_DURATION),
        ("maximum-duration", Self::MAXIMUM_DURATION),
        ("horizontal-speed", Self::HORIZONTAL_SPEED),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parses a kebab-case target name such as `exact-distance`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name) || n.replace('-', "_") == name)
            .map(|(_, target)| *target)
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, target)| self.contains(*target))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl BitOr for MissionTarget {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MissionTarget {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<MissionTarget> for MissionTarget {
    fn from_iter<I: IntoIterator<Item = MissionTarget>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |acc, t| acc | t)
    }
}

/// Minimum, target and maximum of one stage quantity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuantityRange {
    pub minimum: Option<f64>,
    pub target: Option<f64>,
    pub maximum: Option<f64>,
}

impl QuantityRange {
    pub fn exact(value: f64) -> Self {
        Self {
            minimum: Some(value),
            target: Some(value),
            maximum: Some(value),
        }
    }

    fn lower(&self) -> Option<f64> {
        self.target.or(self.minimum)
    }

    fn upper(&self) -> Option<f64> {
        self.target.or(self.maximum)
    }

    fn is_exact(&self) -> bool {
        matches!(
            (self.minimum, self.target, self.maximum),
            (Some(lo), Some(t), Some(hi)) if lo == t && t == hi
        )
    }

    fn fill_bounds(&mut self, value: f64) {
        self.minimum.get_or_insert(value);
        self.maximum.get_or_insert(value);
    }

    fn collapse(&mut self, value: f64) {
        self.minimum = Some(value);
        self.target = Some(value);
        self.maximum = Some(value);
    }
}

/// Environmental requirements of a stage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StageEnvironment {
    pub maximum_depth: Option<f64>,
    pub maximum_pitch_angle: Option<f64>,
    pub maximum_roll_angle: Option<f64>,
    pub maximum_net_buoyancy: Option<f64>,
    pub average_latitude: Option<f64>,
    pub minimum_salinity: Option<f64>,
    pub maximum_salinity: Option<f64>,
    pub minimum_temperature: Option<f64>,
    pub maximum_temperature: Option<f64>,
    pub minimum_density: Option<f64>,
    pub maximum_density: Option<f64>,
    pub maximum_ocean_current_speed: Option<f64>,
}

/// Fully resolved environment of a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEnvironment {
    pub maximum_depth: f64,
    pub maximum_pitch_angle: f64,
    pub maximum_roll_angle: f64,
    pub maximum_net_buoyancy: f64,
    pub average_latitude: Option<f64>,
    pub minimum_density: f64,
    pub maximum_density: f64,
    pub maximum_ocean_current_speed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissionStage {
    pub name: String,
    pub targets: MissionTarget,
    pub duration: QuantityRange,
    pub distance: QuantityRange,
    pub average_speed: QuantityRange,
    pub expected_transit_slope: f64,
    pub environment: Option<StageEnvironment>,
}

fn product(duration: Option<f64>, speed: Option<f64>) -> Option<f64> {
    Some(DISTANCE_SCALE * duration? * speed?)
}

fn quotient(distance: Option<f64>, rate: Option<f64>) -> Option<f64> {
    let rate = rate?;
    if rate <= 0.0 {
        return None;
    }
    Some(distance? / (DISTANCE_SCALE * rate))
}

impl MissionStage {
    pub fn new(name: impl Into<String>, targets: MissionTarget) -> Self {
        Self {
            name: name.into(),
            targets,
            duration: QuantityRange::default(),
            distance: QuantityRange::default(),
            average_speed: QuantityRange::default(),
            expected_transit_slope: DEFAULT_EXPECTED_TRANSIT_SLOPE_DEG,
            environment: None,
        }
    }

    fn missing(&self, quantity: &'static str) -> MissionError {
        MissionError::MissingQuantity {
            stage: self.name.clone(),
            quantity,
        }
    }

    /// Derives every value obtainable from the specified ones.
    ///
    /// Safe to call repeatedly: only unset fields are filled, apart from exact targets which
    /// always collapse their minimum and maximum onto the target.
    pub fn resolve(&mut self) -> Result<(), MissionError> {
        if self.targets.is_empty() {
            return Err(MissionError::NoTargets {
                stage: self.name.clone(),
            });
        }
        self.resolve_distance()?;
        self.resolve_duration()?;
        self.resolve_speed()?;
        self.close_targets();
        if let Some(environment) = self.environment.take() {
            let resolved = self.resolve_environment(environment);
            self.environment = Some(resolved?);
        }
        Ok(())
    }

    fn resolve_distance(&mut self) -> Result<(), MissionError> {
        if self.targets.contains(MissionTarget::EXACT_DISTANCE) {
            let target = self
                .distance
                .target
                .ok_or_else(|| self.missing("target_distance"))?;
            self.distance.collapse(target);
            return Ok(());
        }
        if self.targets.contains(MissionTarget::MINIMUM_DISTANCE) && self.distance.minimum.is_none()
        {
            let derived = product(self.duration.lower(), self.average_speed.lower())
                .ok_or_else(|| self.missing("minimum_distance"))?;
            self.distance.minimum = Some(derived);
        }
        if self.targets.contains(MissionTarget::MAXIMUM_DISTANCE) && self.distance.maximum.is_none()
        {
            let derived = product(self.duration.upper(), self.average_speed.upper())
                .ok_or_else(|| self.missing("maximum_distance"))?;
            self.distance.maximum = Some(derived);
        }
        Ok(())
    }

    fn resolve_duration(&mut self) -> Result<(), MissionError> {
        if self.targets.contains(MissionTarget::EXACT_DURATION) {
            let target = self
                .duration
                .target
                .ok_or_else(|| self.missing("target_duration"))?;
            self.duration.collapse(target);
            return Ok(());
        }
        if self.targets.contains(MissionTarget::MINIMUM_DURATION) && self.duration.minimum.is_none()
        {
            let derived = quotient(self.distance.lower(), self.average_speed.upper())
                .ok_or_else(|| self.missing("minimum_duration"))?;
            self.duration.minimum = Some(derived);
        }
        if self.targets.contains(MissionTarget::MAXIMUM_DURATION) && self.duration.maximum.is_none()
        {
            let derived = quotient(self.distance.upper(), self.average_speed.lower())
                .ok_or_else(|| self.missing("maximum_duration"))?;
            self.duration.maximum = Some(derived);
        }
        Ok(())
    }

    fn resolve_speed(&mut self) -> Result<(), MissionError> {
        if self.targets.contains(MissionTarget::HORIZONTAL_SPEED) {
            let target = self
                .average_speed
                .target
                .ok_or_else(|| self.missing("target_average_speed"))?;
            self.average_speed.collapse(target);
            return Ok(());
        }
        if let Some(speed) = quotient(self.distance.target, self.duration.target) {
            self.average_speed.collapse(speed);
        }
        if self.average_speed.minimum.is_none() {
            self.average_speed.minimum = quotient(self.distance.lower(), self.duration.upper());
        }
        if self.average_speed.maximum.is_none() {
            self.average_speed.maximum = quotient(self.distance.upper(), self.duration.lower());
        }
        Ok(())
    }

    fn close_targets(&mut self) {
        if self.distance.target.is_none() {
            self.distance.target = product(self.duration.target, self.average_speed.target);
        }
        if self.duration.target.is_none() {
            self.duration.target = quotient(self.distance.target, self.average_speed.target);
        }
        if self.distance.is_exact() && self.average_speed.is_exact() {
            if let Some(duration) = self.duration.target {
                self.duration.fill_bounds(duration);
            }
        }
        if self.duration.is_exact() && self.average_speed.is_exact() {
            if let Some(distance) = self.distance.target {
                self.distance.fill_bounds(distance);
            }
        }
    }

    fn resolve_environment(
        &self,
        mut env: StageEnvironment,
    ) -> Result<StageEnvironment, MissionError> {
        let maximum_depth = env
            .maximum_depth
            .ok_or_else(|| self.missing("maximum_depth"))?;
        if env.maximum_pitch_angle.is_none() {
            return Err(self.missing("maximum_pitch_angle"));
        }
        if env.maximum_roll_angle.is_none() {
            return Err(self.missing("maximum_roll_angle"));
        }
        if env.minimum_density.is_none() {
            let (salinity, temperature) = env
                .minimum_salinity
                .zip(env.maximum_temperature)
                .ok_or_else(|| self.missing("minimum_density"))?;
            env.minimum_density = Some(ocean::water_density(
                temperature,
                salinity,
                ocean::pressure_at_depth(0.0),
            ));
        }
        if env.maximum_density.is_none() {
            let (salinity, temperature) = env
                .maximum_salinity
                .zip(env.minimum_temperature)
                .ok_or_else(|| self.missing("maximum_density"))?;
            env.maximum_density = Some(ocean::water_density(
                temperature,
                salinity,
                ocean::pressure_at_depth(maximum_depth),
            ));
        }
        if env.maximum_ocean_current_speed.is_none() {
            env.maximum_ocean_current_speed = Some(0.0);
        }
        if let (Some(min_density), Some(max_density)) = (env.minimum_density, env.maximum_density)
        {
            let density_buoyancy = max_density / min_density - 1.0;
            env.maximum_net_buoyancy = match env.maximum_net_buoyancy {
                None => Some(density_buoyancy),
                Some(fraction) if fraction < 1.0 => Some(fraction.max(density_buoyancy)),
                newtons => newtons,
            };
        }
        Ok(env)
    }

    /// Symbolic unknowns for every kinematic field still unset.
    pub fn pending_unknowns(&self) -> Vec<String> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(field, _)| unknown_name(&self.name, field))
            .collect()
    }

    fn fields(&self) -> [(&'static str, Option<f64>); 9] {
        [
            ("minimum_duration", self.duration.minimum),
            ("duration", self.duration.target),
            ("maximum_duration", self.duration.maximum),
            ("minimum_distance", self.distance.minimum),
            ("distance", self.distance.target),
            ("maximum_distance", self.distance.maximum),
            ("minimum_average_speed", self.average_speed.minimum),
            ("average_speed", self.average_speed.target),
            ("maximum_average_speed", self.average_speed.maximum),
        ]
    }

    fn check_consistency(&self) -> Result<(), MissionError> {
        for (quantity, range) in [
            ("duration", &self.duration),
            ("distance", &self.distance),
            ("average_speed", &self.average_speed),
        ] {
            let ordered = [range.minimum, range.target, range.maximum];
            let known: Vec<f64> = ordered.iter().flatten().copied().collect();
            for pair in known.windows(2) {
                let slack = CONSISTENCY_TOLERANCE * pair[0].abs().max(pair[1].abs()).max(1.0);
                if pair[0] > pair[1] + slack {
                    return Err(MissionError::Inconsistent {
                        stage: self.name.clone(),
                        quantity,
                        detail: format!(
                            "minimum {:?}, target {:?}, maximum {:?} are out of order",
                            range.minimum, range.target, range.maximum
                        ),
                    });
                }
            }
            if known.iter().any(|v| *v < 0.0) {
                return Err(MissionError::Inconsistent {
                    stage: self.name.clone(),
                    quantity,
                    detail: "values must not be negative".to_string(),
                });
            }
        }
        if let (Some(distance), Some(travelled)) = (
            self.distance.target,
            product(self.duration.target, self.average_speed.target),
        ) {
            let slack = CONSISTENCY_TOLERANCE * distance.abs().max(travelled.abs()).max(1.0);
            if (distance - travelled).abs() > slack {
                return Err(MissionError::Inconsistent {
                    stage: self.name.clone(),
                    quantity: "distance",
                    detail: format!(
                        "target distance {} differs from duration × speed = {}",
                        distance, travelled
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Deterministic unknown name for an unresolved stage field.
pub fn unknown_name(stage: &str, field: &str) -> String {
    format!("{}_{}", stage, field)
}

/// A resolved stage value: either a concrete number or a symbolic unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantity {
    Known(f64),
    Unknown(String),
}

impl Quantity {
    pub fn value(&self) -> Option<f64> {
        match self {
            Quantity::Known(v) => Some(*v),
            Quantity::Unknown(_) => None,
        }
    }

    pub fn to_expr(&self) -> Expr {
        match self {
            Quantity::Known(v) => Expr::Literal(*v),
            Quantity::Unknown(name) => Expr::Unknown(name.clone()),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Known(v) => write!(f, "{}", v),
            Quantity::Unknown(name) => write!(f, "<{}>", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRange {
    pub minimum: Quantity,
    pub target: Quantity,
    pub maximum: Quantity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStage {
    pub name: String,
    pub targets: MissionTarget,
    pub duration: ResolvedRange,
    pub distance: ResolvedRange,
    pub average_speed: ResolvedRange,
    pub expected_transit_slope: f64,
    pub environment: Option<ResolvedEnvironment>,
}

impl ResolvedStage {
    /// `distance = 0.001 × duration × speed` over the stage targets.
    pub fn kinematic_equation(&self) -> Expr {
        let rhs = DISTANCE_SCALE * self.duration.target.to_expr() * self.average_speed.target.to_expr();
        self.distance.target.to_expr().eq_to(rhs)
    }

    pub fn has_unknown_targets(&self) -> bool {
        [
            &self.duration.target,
            &self.distance.target,
            &self.average_speed.target,
        ]
        .iter()
        .any(|q| matches!(q, Quantity::Unknown(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMission {
    pub stages: Vec<ResolvedStage>,
    pub unknowns: Vec<String>,
    pub minimum_duration: Option<f64>,
    pub maximum_duration: Option<f64>,
    pub minimum_distance: Option<f64>,
    pub maximum_average_speed: Option<f64>,
}

impl ResolvedMission {
    pub fn stage(&self, name: &str) -> Option<&ResolvedStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// One kinematic equation per stage whose targets still involve an unknown.
    pub fn kinematic_equations(&self) -> Vec<(String, Expr)> {
        self.stages
            .iter()
            .filter(|stage| stage.has_unknown_targets())
            .map(|stage| (format!("{}_kinematics", stage.name), stage.kinematic_equation()))
            .collect()
    }

    /// Bounds for unknown stage targets whose minimum and maximum are both concrete.
    pub fn suggested_bounds(&self) -> BTreeMap<String, (f64, f64)> {
        let mut bounds = BTreeMap::new();
        for stage in &self.stages {
            for range in [&stage.duration, &stage.distance, &stage.average_speed] {
                if let (Quantity::Unknown(name), Some(lo), Some(hi)) =
                    (&range.target, range.minimum.value(), range.maximum.value())
                {
                    bounds.insert(name.clone(), (lo, hi));
                }
            }
        }
        bounds
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mission {
    stages: Vec<MissionStage>,
    pub minimum_duration: Option<f64>,
    pub maximum_duration: Option<f64>,
    pub minimum_distance: Option<f64>,
    pub maximum_average_speed: Option<f64>,
}

impl Mission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the stage on its own and appends it.
    pub fn add_stage(&mut self, mut stage: MissionStage) -> Result<(), MissionError> {
        if self.stages.iter().any(|s| s.name == stage.name) {
            return Err(MissionError::DuplicateStage(stage.name));
        }
        stage.resolve()?;
        debug!(stage = %stage.name, "Mission stage added.");
        self.stages.push(stage);
        Ok(())
    }

    pub fn stages(&self) -> &[MissionStage] {
        &self.stages
    }

    fn inconsistent(quantity: &'static str, detail: String) -> MissionError {
        MissionError::Inconsistent {
            stage: "mission".to_string(),
            quantity,
            detail,
        }
    }

    /// Propagates mission-wide bounds into the stages and symbolizes what remains.
    ///
    /// Exactly one propagation pass is made; if the stages are not consistent afterwards the
    /// mission is rejected rather than iterated further.
    #[instrument(skip_all, name = "mission_finalize")]
    pub fn finalize(mut self) -> Result<ResolvedMission, MissionError> {
        for stage in &mut self.stages {
            stage.resolve()?;
        }

        if let Some(cap) = self.maximum_average_speed {
            for stage in &mut self.stages {
                if let Some(lower) = stage.average_speed.lower().filter(|v| *v > cap) {
                    return Err(MissionError::Inconsistent {
                        stage: stage.name.clone(),
                        quantity: "average_speed",
                        detail: format!("speed {} exceeds the mission cap {}", lower, cap),
                    });
                }
                if stage.average_speed.maximum.is_none_or(|max| max > cap) {
                    stage.average_speed.maximum = Some(cap);
                    stage.resolve()?;
                }
            }
        }

        self.minimum_distance = self.propagate_sum(
            self.minimum_distance,
            |s| &mut s.distance.minimum,
            f64::max,
            "minimum_distance",
        )?;
        self.minimum_duration = self.propagate_sum(
            self.minimum_duration,
            |s| &mut s.duration.minimum,
            f64::max,
            "minimum_duration",
        )?;
        self.maximum_duration = self.propagate_sum(
            self.maximum_duration,
            |s| &mut s.duration.maximum,
            f64::min,
            "maximum_duration",
        )?;

        let stage_min_durations: f64 = self.stages.iter().filter_map(|s| s.duration.minimum).sum();
        if let Some(min) = self.minimum_duration {
            if min < stage_min_durations {
                self.minimum_duration = Some(stage_min_durations);
            }
        }
        if let Some(max) = self.maximum_duration {
            if max + CONSISTENCY_TOLERANCE < stage_min_durations {
                return Err(Self::inconsistent(
                    "maximum_duration",
                    format!(
                        "mission maximum {} is below the sum of stage minimums {}",
                        max, stage_min_durations
                    ),
                ));
            }
        }

        if let (Some(distance), Some(duration)) = (self.minimum_distance, self.maximum_duration) {
            if duration > 0.0 {
                let floor = distance / (DISTANCE_SCALE * duration);
                for stage in &mut self.stages {
                    if let Some(upper) = stage.average_speed.upper().filter(|v| *v < floor) {
                        return Err(MissionError::Inconsistent {
                            stage: stage.name.clone(),
                            quantity: "average_speed",
                            detail: format!(
                                "speed {} is below the mission floor {}",
                                upper, floor
                            ),
                        });
                    }
                    if stage.average_speed.minimum.is_none_or(|min| min < floor) {
                        stage.average_speed.minimum = Some(floor);
                        stage.resolve()?;
                    }
                }
            }
        }

        for stage in &self.stages {
            stage.check_consistency()?;
        }

        let mut unknowns = Vec::new();
        let stages = self
            .stages
            .iter()
            .map(|stage| {
                unknowns.extend(stage.pending_unknowns());
                symbolize(stage)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            stages = stages.len(),
            unknowns = unknowns.len(),
            "Mission finalized."
        );

        Ok(ResolvedMission {
            stages,
            unknowns,
            minimum_duration: self.minimum_duration,
            maximum_duration: self.maximum_duration,
            minimum_distance: self.minimum_distance,
            maximum_average_speed: self.maximum_average_speed,
        })
    }

    /// Reconciles a mission-wide total with the per-stage values of one field.
    ///
    /// An unset total is the sum of the stages when all are known. A set total back-fills the
    /// single missing stage value, or is refined with `refine` when every stage is known.
    fn propagate_sum(
        &mut self,
        total: Option<f64>,
        field: impl Fn(&mut MissionStage) -> &mut Option<f64>,
        refine: fn(f64, f64) -> f64,
        quantity: &'static str,
    ) -> Result<Option<f64>, MissionError> {
        let known: Vec<f64> = self.stages.iter_mut().filter_map(|s| *field(s)).collect();
        let missing = self.stages.len() - known.len();
        let sum: f64 = known.iter().sum();

        match (total, missing) {
            (None, 0) => Ok(Some(sum)),
            (None, _) => Ok(None),
            (Some(total), 0) => Ok(Some(refine(total, sum))),
            (Some(total), 1) => {
                let remainder = total - sum;
                if remainder < 0.0 {
                    return Err(Self::inconsistent(
                        quantity,
                        format!(
                            "mission total {} is below the sum of the other stages {}",
                            total, sum
                        ),
                    ));
                }
                if let Some(index) = self.stages.iter_mut().position(|s| field(s).is_none()) {
                    let stage = &mut self.stages[index];
                    *field(stage) = Some(remainder);
                    debug!(stage = %stage.name, quantity, value = remainder, "Back-filled stage value.");
                    stage.resolve()?;
                }
                Ok(Some(total))
            }
            (Some(total), _) => Ok(Some(total)),
        }
    }
}

fn symbolize(stage: &MissionStage) -> Result<ResolvedStage, MissionError> {
    let quantity = |field: &str, value: Option<f64>| match value {
        Some(v) => Quantity::Known(v),
        None => Quantity::Unknown(unknown_name(&stage.name, field)),
    };
    let range = |prefix: &str, r: &QuantityRange| ResolvedRange {
        minimum: quantity(&format!("minimum_{}", prefix), r.minimum),
        target: quantity(prefix, r.target),
        maximum: quantity(&format!("maximum_{}", prefix), r.maximum),
    };
    let environment = match &stage.environment {
        None => None,
        Some(env) => {
            let require = |value: Option<f64>, quantity: &'static str| {
                value.ok_or_else(|| MissionError::MissingQuantity {
                    stage: stage.name.clone(),
                    quantity,
                })
            };
            Some(ResolvedEnvironment {
                maximum_depth: require(env.maximum_depth, "maximum_depth")?,
                maximum_pitch_angle: require(env.maximum_pitch_angle, "maximum_pitch_angle")?,
                maximum_roll_angle: require(env.maximum_roll_angle, "maximum_roll_angle")?,
                maximum_net_buoyancy: require(env.maximum_net_buoyancy, "maximum_net_buoyancy")?,
                average_latitude: env.average_latitude,
                minimum_density: require(env.minimum_density, "minimum_density")?,
                maximum_density: require(env.maximum_density, "maximum_density")?,
                maximum_ocean_current_speed: env.maximum_ocean_current_speed.unwrap_or(0.0),
            })
        }
    };
    Ok(ResolvedStage {
        name: stage.name.clone(),
        targets: stage.targets,
        duration: range("duration", &stage.duration),
        distance: range("distance", &stage.distance),
        average_speed: range("average_speed", &stage.average_speed),
        expected_transit_slope: stage.expected_transit_slope,
        environment,
    })
}

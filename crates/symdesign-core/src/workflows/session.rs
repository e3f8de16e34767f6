use super::explore::{self, ExploreResult};
use crate::core::io::table;
use crate::core::mission::{Mission, ResolvedMission};
use crate::core::record::DesignRecord;
use crate::engine::config::SolverConfig;
use crate::engine::constraints::{Bounds, ConstraintSet, Resolutions};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument};

/// One in-progress design: its mission, constraints, search space and latest results.
#[derive(Debug, Clone)]
pub struct DesignSession {
    id: String,
    mission: Option<ResolvedMission>,
    pub constraints: ConstraintSet,
    pub bounds: Bounds,
    pub resolutions: Resolutions,
    pub config: SolverConfig,
    results: Option<ExploreResult>,
}

impl DesignSession {
    fn new(id: String) -> Self {
        Self {
            id,
            mission: None,
            constraints: ConstraintSet::new(),
            bounds: Bounds::new(),
            resolutions: Resolutions::new(),
            config: SolverConfig::default(),
            results: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mission(&self) -> Option<&ResolvedMission> {
        self.mission.as_ref()
    }

    /// Resolves the mission and adds its kinematic equations to the constraints.
    ///
    /// Unknown stage targets with concrete minimum and maximum get those as bounds unless a
    /// bound is already set.
    pub fn set_mission(&mut self, mission: Mission) -> Result<&ResolvedMission, EngineError> {
        if self.mission.is_some() {
            return Err(EngineError::Configuration(format!(
                "Session '{}' already has a mission",
                self.id
            )));
        }
        let resolved = mission.finalize()?;
        self.constraints.add_mission(&resolved)?;
        for (name, range) in resolved.suggested_bounds() {
            self.bounds.entry(name).or_insert(range);
        }
        info!(
            session = %self.id,
            unknowns = resolved.unknowns.len(),
            "Mission attached to session."
        );
        Ok(self.mission.insert(resolved))
    }

    pub fn set_bound(&mut self, name: impl Into<String>, min: f64, max: f64) {
        self.bounds.insert(name.into(), (min, max));
    }

    pub fn set_resolution(&mut self, name: impl Into<String>, step: f64) {
        self.resolutions.insert(name.into(), step);
    }

    /// Prepares the problem and runs the exploration workflow, replacing earlier results.
    #[instrument(skip_all, name = "session_explore", fields(session = %self.id))]
    pub fn explore(
        &mut self,
        seed: Option<&DesignRecord>,
        reporter: &ProgressReporter,
    ) -> Result<&ExploreResult, EngineError> {
        let problem = self.constraints.prepare(&self.bounds, &self.resolutions)?;
        let result = explore::run(&problem, &self.config, seed, reporter)?;
        Ok(self.results.insert(result))
    }

    pub fn results(&self) -> Option<&ExploreResult> {
        self.results.as_ref()
    }

    /// Writes the latest results as a CSV design table.
    pub fn export(&self, path: &Path) -> Result<(), EngineError> {
        let result = self.results.as_ref().ok_or_else(|| {
            EngineError::Configuration(format!("Session '{}' has no results to export", self.id))
        })?;
        table::write_records(path, &result.columns, &result.records)?;
        Ok(())
    }
}

/// Caller-owned registry of design sessions keyed by sequential ids.
#[derive(Debug, Default)]
pub struct DesignStore {
    next_id: u64,
    sessions: BTreeMap<String, DesignSession>,
}

impl DesignStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new empty session and returns its id (`design-1`, `design-2`, ...).
    pub fn create(&mut self) -> String {
        self.next_id += 1;
        let id = format!("design-{}", self.next_id);
        self.sessions
            .insert(id.clone(), DesignSession::new(id.clone()));
        id
    }

    pub fn get(&self, id: &str) -> Option<&DesignSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DesignSession> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<DesignSession> {
        self.sessions.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::Expr;
    use crate::core::mission::{MissionStage, MissionTarget};
    use crate::engine::config::SolverConfigBuilder;
    use std::fs;
    use tempfile::tempdir;

    fn quick_config() -> SolverConfig {
        SolverConfigBuilder::with_defaults()
            .sample_size(200)
            .mutation_count(200)
            .refinement_rounds(1)
            .rng_seed(Some(17))
            .build()
            .unwrap()
    }

    #[test]
    fn session_ids_are_sequential_and_not_reused() {
        let mut store = DesignStore::new();
        let a = store.create();
        let b = store.create();
        assert_eq!(a, "design-1");
        assert_eq!(b, "design-2");
        assert!(store.remove(&a).is_some());
        assert_eq!(store.create(), "design-3");
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["design-2", "design-3"]);
        assert!(store.get("design-1").is_none());
    }

    #[test]
    fn explore_stores_results_and_exports_them() {
        let mut store = DesignStore::new();
        let id = store.create();
        let session = store.get_mut(&id).unwrap();
        session
            .constraints
            .add_equation("sum", (Expr::unknown("x") + Expr::unknown("y")).eq_to(10.0))
            .unwrap();
        session.set_bound("x", 0.0, 10.0);
        session.set_bound("y", 0.0, 10.0);
        session.set_resolution("x", 0.1);
        session.set_resolution("y", 0.1);
        session.config = quick_config();

        let count = session
            .explore(None, &ProgressReporter::new())
            .unwrap()
            .records
            .len();
        assert!(count > 0);

        let dir = tempdir().unwrap();
        let path = dir.path().join("designs.csv");
        store.get(&id).unwrap().export(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("x,y\n"));
        assert_eq!(text.lines().count(), count + 1);
    }

    #[test]
    fn exporting_without_results_is_an_error() {
        let mut store = DesignStore::new();
        let id = store.create();
        let dir = tempdir().unwrap();
        let result = store.get(&id).unwrap().export(&dir.path().join("none.csv"));
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn mission_adds_kinematics_and_target_bounds() {
        let mut mission = Mission::new();
        let mut stage = MissionStage::new(
            "transit",
            MissionTarget::EXACT_DISTANCE | MissionTarget::HORIZONTAL_SPEED,
        );
        stage.distance.target = Some(36.0);
        stage.average_speed.target = Some(2.0);
        mission.add_stage(stage).unwrap();

        let mut store = DesignStore::new();
        let id = store.create();
        let session = store.get_mut(&id).unwrap();
        let resolved = session.set_mission(mission).unwrap();
        assert!(resolved.unknowns.is_empty());
        assert!(session.constraints.equations().is_empty());

        let mut second = Mission::new();
        let mut open = MissionStage::new("survey", MissionTarget::EXACT_DISTANCE);
        open.distance.target = Some(10.0);
        second.add_stage(open).unwrap();
        assert!(session.set_mission(second).is_err());
    }

    #[test]
    fn mission_with_open_targets_contributes_an_equation() {
        let mut mission = Mission::new();
        let mut stage = MissionStage::new("survey", MissionTarget::EXACT_DISTANCE);
        stage.distance.target = Some(10.0);
        mission.add_stage(stage).unwrap();

        let mut store = DesignStore::new();
        let id = store.create();
        let session = store.get_mut(&id).unwrap();
        session.set_mission(mission).unwrap();

        let equations = session.constraints.equations();
        assert_eq!(equations.len(), 1);
        assert_eq!(equations[0].0, "survey_kinematics");
        let unknowns = session.constraints.unknowns();
        assert!(unknowns.contains("survey_duration"));
        assert!(unknowns.contains("survey_average_speed"));
    }
}

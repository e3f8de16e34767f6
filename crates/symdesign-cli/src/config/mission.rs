use super::read_toml;
use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use symdesign::core::mission::{
    DEFAULT_EXPECTED_TRANSIT_SLOPE_DEG, Mission, MissionStage, MissionTarget, QuantityRange,
    StageEnvironment,
};

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMissionTotals {
    minimum_duration: Option<f64>,
    maximum_duration: Option<f64>,
    minimum_distance: Option<f64>,
    maximum_average_speed: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialEnvironment {
    maximum_depth: Option<f64>,
    maximum_pitch_angle: Option<f64>,
    maximum_roll_angle: Option<f64>,
    maximum_net_buoyancy: Option<f64>,
    average_latitude: Option<f64>,
    minimum_salinity: Option<f64>,
    maximum_salinity: Option<f64>,
    minimum_temperature: Option<f64>,
    maximum_temperature: Option<f64>,
    minimum_density: Option<f64>,
    maximum_density: Option<f64>,
    maximum_ocean_current_speed: Option<f64>,
}

impl From<PartialEnvironment> for StageEnvironment {
    fn from(p: PartialEnvironment) -> Self {
        Self {
            maximum_depth: p.maximum_depth,
            maximum_pitch_angle: p.maximum_pitch_angle,
            maximum_roll_angle: p.maximum_roll_angle,
            maximum_net_buoyancy: p.maximum_net_buoyancy,
            average_latitude: p.average_latitude,
            minimum_salinity: p.minimum_salinity,
            maximum_salinity: p.maximum_salinity,
            minimum_temperature: p.minimum_temperature,
            maximum_temperature: p.maximum_temperature,
            minimum_density: p.minimum_density,
            maximum_density: p.maximum_density,
            maximum_ocean_current_speed: p.maximum_ocean_current_speed,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialStage {
    name: String,
    targets: Vec<String>,
    minimum_duration: Option<f64>,
    target_duration: Option<f64>,
    maximum_duration: Option<f64>,
    minimum_distance: Option<f64>,
    target_distance: Option<f64>,
    maximum_distance: Option<f64>,
    minimum_average_speed: Option<f64>,
    target_average_speed: Option<f64>,
    maximum_average_speed: Option<f64>,
    expected_transit_slope: Option<f64>,
    environment: Option<PartialEnvironment>,
}

impl PartialStage {
    fn into_stage(self) -> Result<MissionStage> {
        let mut targets = MissionTarget::empty();
        for name in &self.targets {
            targets |= MissionTarget::from_name(name).ok_or_else(|| {
                CliError::Config(format!(
                    "Stage '{}' has an unknown target '{}'",
                    self.name, name
                ))
            })?;
        }

        let mut stage = MissionStage::new(self.name, targets);
        stage.duration = QuantityRange {
            minimum: self.minimum_duration,
            target: self.target_duration,
            maximum: self.maximum_duration,
        };
        stage.distance = QuantityRange {
            minimum: self.minimum_distance,
            target: self.target_distance,
            maximum: self.maximum_distance,
        };
        stage.average_speed = QuantityRange {
            minimum: self.minimum_average_speed,
            target: self.target_average_speed,
            maximum: self.maximum_average_speed,
        };
        stage.expected_transit_slope = self
            .expected_transit_slope
            .unwrap_or(DEFAULT_EXPECTED_TRANSIT_SLOPE_DEG);
        stage.environment = self.environment.map(Into::into);
        Ok(stage)
    }
}

/// A mission file: optional `[mission]` totals and one `[[stages]]` entry per stage.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialMissionFile {
    mission: Option<PartialMissionTotals>,
    #[serde(default)]
    stages: Vec<PartialStage>,
}

impl PartialMissionFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        read_toml(path)
    }

    /// Builds the mission, resolving each stage as it is added.
    pub fn into_mission(self) -> Result<Mission> {
        if self.stages.is_empty() {
            return Err(CliError::Config(
                "A mission needs at least one `[[stages]]` entry.".to_string(),
            ));
        }
        let totals = self.mission.unwrap_or_default();
        let mut mission = Mission::new();
        mission.minimum_duration = totals.minimum_duration;
        mission.maximum_duration = totals.maximum_duration;
        mission.minimum_distance = totals.minimum_distance;
        mission.maximum_average_speed = totals.maximum_average_speed;

        for stage in self.stages {
            mission
                .add_stage(stage.into_stage()?)
                .map_err(|e| CliError::SymDesignCore(e.into()))?;
        }
        Ok(mission)
    }
}

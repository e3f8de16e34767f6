use crate::cli::MissionArgs;
use crate::config::PartialMissionFile;
use crate::error::Result;
use std::fmt::Write;
use symdesign::core::mission::{ResolvedMission, ResolvedRange};
use symdesign::engine::error::EngineError;
use tracing::info;

pub fn run(args: MissionArgs) -> Result<()> {
    let mission = PartialMissionFile::from_file(&args.mission)?.into_mission()?;
    let resolved = mission.finalize().map_err(EngineError::from)?;
    info!(
        stages = resolved.stages.len(),
        unknowns = resolved.unknowns.len(),
        "Mission resolved."
    );
    print!("{}", render(&resolved));
    Ok(())
}

fn range_line(out: &mut String, label: &str, range: &ResolvedRange) {
    let _ = writeln!(
        out,
        "  {:<14} min {:<28} target {:<28} max {}",
        label, range.minimum, range.target, range.maximum
    );
}

/// Formats every stage quantity, with unknowns shown as `<name>`.
fn render(mission: &ResolvedMission) -> String {
    let mut out = String::new();
    for stage in &mission.stages {
        let _ = writeln!(out, "Stage '{}' [{}]", stage.name, stage.targets.names().join(", "));
        range_line(&mut out, "duration", &stage.duration);
        range_line(&mut out, "distance", &stage.distance);
        range_line(&mut out, "average-speed", &stage.average_speed);
        if let Some(env) = &stage.environment {
            let _ = writeln!(
                out,
                "  environment    depth {} m, pitch {}°, roll {}°, density {:.2}..{:.2} kg/m³",
                env.maximum_depth,
                env.maximum_pitch_angle,
                env.maximum_roll_angle,
                env.minimum_density,
                env.maximum_density
            );
        }
    }

    if mission.unknowns.is_empty() {
        out.push_str("All stage quantities are concrete.\n");
    } else {
        let _ = writeln!(out, "Unknowns: {}", mission.unknowns.join(", "));
    }
    for (name, (lo, hi)) in mission.suggested_bounds() {
        let _ = writeln!(out, "  bound {} in [{}, {}]", name, lo, hi);
    }
    for (name, equation) in mission.kinematic_equations() {
        let _ = writeln!(out, "  {}: {}", name, equation);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use std::fs;
    use tempfile::tempdir;

    fn resolve(content: &str) -> ResolvedMission {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mission.toml");
        fs::write(&path, content).unwrap();
        PartialMissionFile::from_file(&path)
            .unwrap()
            .into_mission()
            .unwrap()
            .finalize()
            .unwrap()
    }

    #[test]
    fn open_stage_renders_symbolic_quantities() {
        let resolved = resolve(
            r#"
[[stages]]
name = "survey"
targets = ["exact-distance"]
target-distance = 10.0
"#,
        );
        let text = render(&resolved);
        assert!(text.contains("Stage 'survey' [exact-distance]"));
        assert!(text.contains("<survey_duration>"));
        assert!(text.contains("<survey_average_speed>"));
        assert!(text.contains("Unknowns:"));
        assert!(text.contains("survey_kinematics"));
    }

    #[test]
    fn concrete_stage_renders_numbers_only() {
        let resolved = resolve(
            r#"
[[stages]]
name = "transit"
targets = ["exact-distance", "horizontal-speed"]
target-distance = 36.0
target-average-speed = 2.0
"#,
        );
        let text = render(&resolved);
        assert!(text.contains("All stage quantities are concrete."));
        assert!(!text.contains('<'));
    }

    #[test]
    fn run_reports_unreadable_mission_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mission.toml");
        fs::write(&path, "[[stages]]\nname = 1\n").unwrap();
        let result = run(MissionArgs { mission: path });
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }
}

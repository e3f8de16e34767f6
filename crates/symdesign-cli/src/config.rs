mod mission;
mod problem;

pub use mission::PartialMissionFile;
pub use problem::{LoadedProblem, PartialProblemFile, load_seed};

use crate::error::{CliError, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading configuration from file: {:?}", path);
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::table::TableError;
use crate::core::mission::MissionError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid problem configuration: {0}")]
    Configuration(String),

    #[error("Mission resolution failed: {source}")]
    Mission {
        #[from]
        source: MissionError,
    },

    #[error("Invalid solver configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Design table error: {source}")]
    Table {
        #[from]
        source: TableError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

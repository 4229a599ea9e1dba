//! Classified failures and the process exit codes they map to.
//!
//! Anything not listed here (gateway, I/O) travels as a plain
//! `anyhow::Error` and exits with [`EXIT_FAILURE`].

use std::path::PathBuf;

use thiserror::Error;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_NOT_FOUND: u8 = 10;
pub const EXIT_CONFIG_MALFORMED: u8 = 11;
pub const EXIT_MISSING_FOLDER: u8 = 12;
pub const EXIT_MISSING_URL: u8 = 13;
pub const EXIT_MISSING_OUTPUT_FOLDER: u8 = 14;
pub const EXIT_SOURCE_NOT_FOUND: u8 = 15;
pub const EXIT_MISSING_SETTING: u8 = 16;

/// A required command line argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Argument {
    #[strum(serialize = "folder")]
    Folder,
    #[strum(serialize = "url")]
    Url,
    #[strum(serialize = "output folder")]
    OutputFolder,
}

#[derive(Debug, Error)]
pub enum BoupyError {
    #[error("can't load config, tried {}", join_paths(.candidates))]
    ConfigNotFound { candidates: Vec<PathBuf> },

    #[error("config {path:?} is malformed: {reason}")]
    ConfigMalformed { path: PathBuf, reason: String },

    #[error("{0} is not defined")]
    MissingArgument(Argument),

    #[error("source folder {0:?} does not exist or is not readable")]
    SourceNotFound(PathBuf),

    #[error("config setting `{0}` is required for this operation")]
    MissingSetting(&'static str),
}

impl BoupyError {
    pub fn exit_code(&self) -> u8 {
        match self {
            BoupyError::ConfigNotFound { .. } => EXIT_CONFIG_NOT_FOUND,
            BoupyError::ConfigMalformed { .. } => EXIT_CONFIG_MALFORMED,
            BoupyError::MissingArgument(Argument::Folder) => EXIT_MISSING_FOLDER,
            BoupyError::MissingArgument(Argument::Url) => EXIT_MISSING_URL,
            BoupyError::MissingArgument(Argument::OutputFolder) => EXIT_MISSING_OUTPUT_FOLDER,
            BoupyError::SourceNotFound(_) => EXIT_SOURCE_NOT_FOUND,
            BoupyError::MissingSetting(_) => EXIT_MISSING_SETTING,
        }
    }
}

/// Exit code for any error surfacing from a workflow.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<BoupyError>()
        .map_or(EXIT_FAILURE, BoupyError::exit_code)
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Configuration file discovery for the CLI.
//!
//! An explicit `--config` path wins. Otherwise the first existing file of
//! `ontolink/config.toml` (relative to the working directory) and the
//! platform configuration directory is used. With no file at all, every
//! setting keeps its default.

use std::{
    fs, io, iter,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use ontolink::{OntologyError, config::AppConfig};

const LOCAL_CONFIG: &str = "ontolink/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration `{}`: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("configuration file `{}` does not exist", .0.display())]
    MissingFile(PathBuf),
}

impl From<ConfigError> for OntologyError {
    fn from(err: ConfigError) -> Self {
        OntologyError::Io(io::Error::other(err))
    }
}

/// Load the configuration for this run.
///
/// # Errors
///
/// Returns an error if an explicit path does not exist, or if the chosen
/// file cannot be read or is not a valid configuration.
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, OntologyError> {
    let path = match explicit_path {
        Some(path) => path.as_ref().to_path_buf(),
        None => match discover() {
            Some(path) => path,
            None => {
                debug!("No configuration file found, using defaults");
                return Ok(AppConfig::default());
            }
        },
    };

    info!(path:? = path; "Loading configuration");
    let content = fs::read_to_string(&path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ConfigError::MissingFile(path.clone()).into(),
        _ => OntologyError::Io(err),
    })?;

    toml::from_str(&content).map_err(|err| {
        ConfigError::Parse {
            path,
            message: err.message().to_string(),
        }
        .into()
    })
}

fn discover() -> Option<PathBuf> {
    let system = ProjectDirs::from("com", "ontolink", "ontolink")
        .map(|dirs| dirs.config_dir().join("config.toml"));

    iter::once(PathBuf::from(LOCAL_CONFIG))
        .chain(system)
        .inspect(|path| debug!(path:? = path; "Looking for configuration"))
        .find(|path| path.is_file())
}

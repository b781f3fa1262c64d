//! Engine configuration

use crate::RunOptions;
use config::{Config, ConfigError, Environment, File};
use rule_model::{LoadOptions, Params, UnitSystem};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `FDD_UNITS=metric`
pub const ENV_PREFIX: &str = "FDD";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Unit system for bounds
    pub units: UnitSystem,

    /// Abort the run on the first failing rule
    pub strict: bool,

    /// Skip rules whose required columns are missing
    pub skip_missing_columns: bool,

    /// Debounce window for rules that declare none
    pub rolling_window: Option<usize>,

    /// Evaluate rules on the rayon pool
    pub parallel: bool,

    /// Rule declaration directory
    pub rules_dir: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit logs as JSON
    pub log_json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            units: UnitSystem::Imperial,
            strict: true,
            skip_missing_columns: false,
            rolling_window: None,
            parallel: false,
            rules_dir: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl EngineConfig {
    /// Layer an optional file (`fdd.toml`, `fdd.yaml`, ... in the working
    /// directory when no path is given) under `FDD_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("fdd").required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            units: self.units,
            strict: self.strict,
            skip_missing_columns: self.skip_missing_columns,
            rolling_window: self.rolling_window,
            parallel: self.parallel,
            params: Params::new(),
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions { units: self.units }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.units, UnitSystem::Imperial);
        assert!(config.strict);
        assert!(!config.skip_missing_columns);

        let options = config.run_options();
        assert!(options.strict);
        assert_eq!(options.rolling_window, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "units = \"metric\"\nstrict = false\nrolling_window = 5\nrules_dir = \"rules\""
        )
        .unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.units, UnitSystem::Metric);
        assert!(!config.strict);
        assert_eq!(config.rolling_window, Some(5));
        assert_eq!(config.rules_dir, Some(PathBuf::from("rules")));
        // unset keys keep their defaults
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(EngineConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}

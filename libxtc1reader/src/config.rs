use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::assembler::AssemblyOptions;
use super::constants::{DEFAULT_MAX_DEPTH, DEFAULT_PIXEL_SCALE_SIZE_UM};
use super::error::ConfigError;
use super::xtc_stack::run_number_from_path;

/// Structure representing the application configuration. Contains pathing and processing options
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Either a single .xtc file or a directory of chunk files
    pub xtc_path: PathBuf,
    /// Selects the chunk files of one run when xtc_path is a directory
    pub run_number: Option<u32>,
    /// None uses the bundled Epix10ka2M geometry
    pub geometry_path: Option<PathBuf>,
    pub max_events: Option<u64>,
    pub max_depth: usize,
    pub pixel_scale_size_um: f64,
    pub do_tilt: bool,
    pub summary_path: Option<PathBuf>,
    /// Directory for decoded arrays and assembled images (.npy); None writes nothing
    pub output_path: Option<PathBuf>,
}

impl Default for Config {
    /// Generate a new Config object. The xtc path will be invalid
    fn default() -> Self {
        Self {
            xtc_path: PathBuf::from("None"),
            run_number: None,
            geometry_path: None,
            max_events: None,
            max_depth: DEFAULT_MAX_DEPTH,
            pixel_scale_size_um: DEFAULT_PIXEL_SCALE_SIZE_UM,
            do_tilt: true,
            summary_path: None,
            output_path: None,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration as YAML
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    pub fn does_xtc_path_exist(&self) -> bool {
        self.xtc_path.exists()
    }

    /// True once the event limit has been reached
    pub fn is_event_limit_reached(&self, n_events: u64) -> bool {
        self.max_events.is_some_and(|max| n_events >= max)
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            pixel_scale_size_um: self.pixel_scale_size_um,
            do_tilt: self.do_tilt,
            ..Default::default()
        }
    }

    /// The configured run, else the run in a chunk file name, else 0
    pub fn resolved_run_number(&self) -> u32 {
        self.run_number
            .or_else(|| run_number_from_path(&self.xtc_path))
            .unwrap_or(0)
    }

    pub fn is_pixel_scale_valid(&self) -> bool {
        self.pixel_scale_size_um.is_finite() && self.pixel_scale_size_um > 0.0
    }
}

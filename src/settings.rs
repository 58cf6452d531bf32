/// run settings for polyhill
/// read from a JSON file, then overridden field by field from the command line
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// fewest vertices a polygon can have and still enclose area
pub const MIN_VERTICES: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // io
    /// image to reconstruct
    pub base_image: PathBuf,
    /// where the final render is written (format from the extension)
    pub output: PathBuf,
    /// directory for improving frames; `None` disables frame output
    pub frames_dir: Option<PathBuf>,
    /// with frames enabled, write only frames that beat the last saved loss
    pub min_save: bool,
    /// also render every generation snapshot next to the output
    pub save_generations: bool,

    // search
    /// hard cap on the scene size
    pub max_polygons: usize,
    /// non-improving steps tolerated before a growth decision
    pub stagnation_limit: u32,
    /// total evaluation steps for the run
    pub evaluations: u64,
    /// vertices per polygon, fixed at creation
    pub vertices: usize,
    pub seed: u64,

    // rendering
    pub anti_alias: bool,

    /// raise log verbosity to debug
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_image: PathBuf::from("base.png"),
            output: PathBuf::from("output.png"),
            frames_dir: None,
            min_save: false,
            save_generations: false,
            max_polygons: 50,
            stagnation_limit: 100,
            evaluations: 10_000,
            vertices: MIN_VERTICES,
            seed: 0,
            anti_alias: true,
            debug: false,
        }
    }
}

impl Settings {
    /// reject settings the search cannot run with
    pub fn validate(&self) -> Result<()> {
        EngineInit::from(self).validate()?;
        if self.base_image.as_os_str().is_empty() {
            return Err(Error::Configuration("base image path is empty".to_owned()));
        }
        if self.output.as_os_str().is_empty() {
            return Err(Error::Configuration("output path is empty".to_owned()));
        }
        Ok(())
    }

    /// save settings to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("cannot serialize settings: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// load settings from a JSON file. missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Configuration(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// where the resolved settings of a run are saved: `<stem>_settings.json` beside the output
    pub fn sidecar_path(&self) -> PathBuf {
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_owned());
        self.output.with_file_name(format!("{stem}_settings.json"))
    }
}

/// engine construction data derived from Settings.
/// only the search parameters; paths and output flags stay with the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineInit {
    pub max_polygons: usize,
    pub stagnation_limit: u32,
    pub evaluations: u64,
    pub vertices: usize,
    pub seed: u64,
}

impl Default for EngineInit {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for EngineInit {
    fn from(settings: &Settings) -> Self {
        Self {
            max_polygons: settings.max_polygons,
            stagnation_limit: settings.stagnation_limit,
            evaluations: settings.evaluations,
            vertices: settings.vertices,
            seed: settings.seed,
        }
    }
}

impl EngineInit {
    pub fn validate(&self) -> Result<()> {
        if self.max_polygons == 0 {
            return Err(Error::Configuration("max polygon count must be positive".to_owned()));
        }
        if self.evaluations == 0 {
            return Err(Error::Configuration("evaluation budget must be positive".to_owned()));
        }
        if self.vertices < MIN_VERTICES {
            return Err(Error::Configuration(format!(
                "polygons need at least {} vertices, got {}",
                MIN_VERTICES, self.vertices
            )));
        }
        Ok(())
    }
}

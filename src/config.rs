/// Service configuration.
///
/// Loaded from a TOML file (default `./defmon.toml`, or the path in
/// `DEFMON_CONFIG`). Data file paths are resolved against the directory the
/// configuration file lives in.
///
/// ```toml
/// [analysis]
/// tail_window = 60
/// confidence_levels = [95, 99]
/// band_mode = "precomputed"
///
/// [[geolocation]]
/// path = "data/mos_1.csv"
///
/// [[displacement]]
/// path = "data/mz2_10.csv"
/// label = "Descending 175"
/// ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::anomaly::bands::BandMode;
use crate::model::{
    DefmonError, SignificanceLevel, DEFAULT_DEGREES_OF_FREEDOM, DEFAULT_RUN_LENGTH_THRESHOLD,
    DEFAULT_TAIL_WINDOW,
};

pub const DEFAULT_CONFIG_PATH: &str = "./defmon.toml";
pub const CONFIG_PATH_ENV: &str = "DEFMON_CONFIG";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub geolocation: Vec<GeolocationSource>,
    #[serde(default)]
    pub displacement: Vec<DisplacementSource>,
    #[serde(default)]
    pub prediction: Vec<LabelledSource>,
    #[serde(default)]
    pub anomaly: Vec<LabelledSource>,
    /// Directory relative data paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Tunables of the fusion and anomaly pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Trailing observations an overlay is aligned onto.
    pub tail_window: usize,
    /// Runs of anomalies longer than this are confirmed.
    pub run_length_threshold: usize,
    /// Degrees of freedom for the Student-t margin.
    pub degrees_of_freedom: f64,
    /// Band levels, narrowest first. The first is the primary band.
    pub confidence_levels: Vec<SignificanceLevel>,
    pub band_mode: BandMode,
    /// Mean velocity range (mm/year) mapped onto the speed colour scale.
    pub speed_color_range: [f64; 2],
    /// Degrees added around the plotted points for the map bounds.
    pub viewport_padding_deg: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            tail_window: DEFAULT_TAIL_WINDOW,
            run_length_threshold: DEFAULT_RUN_LENGTH_THRESHOLD,
            degrees_of_freedom: DEFAULT_DEGREES_OF_FREEDOM,
            confidence_levels: vec![SignificanceLevel::P95, SignificanceLevel::P99],
            band_mode: BandMode::Precomputed,
            speed_color_range: [-5.0, 5.0],
            viewport_padding_deg: 2.0,
        }
    }
}

impl AnalysisSettings {
    pub fn primary_level(&self) -> SignificanceLevel {
        self.confidence_levels
            .first()
            .copied()
            .unwrap_or(SignificanceLevel::P95)
    }

    pub fn secondary_level(&self) -> SignificanceLevel {
        self.confidence_levels
            .get(1)
            .copied()
            .unwrap_or(SignificanceLevel::P99)
    }

    pub fn validate(&self) -> Result<(), DefmonError> {
        if self.tail_window == 0 {
            return Err(DefmonError::Config("tail_window must be positive".into()));
        }
        if !(self.degrees_of_freedom.is_finite() && self.degrees_of_freedom > 0.0) {
            return Err(DefmonError::Config(
                "degrees_of_freedom must be a positive number".into(),
            ));
        }
        if self.confidence_levels.is_empty() {
            return Err(DefmonError::Config(
                "confidence_levels must name at least one level".into(),
            ));
        }
        if let Some(bad) = self
            .confidence_levels
            .iter()
            .find(|l| l.0 == 0 || l.0 >= 100)
        {
            return Err(DefmonError::Config(format!(
                "confidence level {} is outside 1..=99",
                bad.0
            )));
        }
        let [lo, hi] = self.speed_color_range;
        if !(lo < hi) {
            return Err(DefmonError::Config(format!(
                "speed_color_range [{}, {}] must be increasing",
                lo, hi
            )));
        }
        if self.viewport_padding_deg < 0.0 {
            return Err(DefmonError::Config(
                "viewport_padding_deg must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    /// Extra `target=level` directives appended to the filter.
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    pub fn filter_directive(&self) -> String {
        std::iter::once(self.level.as_str())
            .chain(self.directives.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeolocationSource {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DisplacementSource {
    pub path: PathBuf,
    /// Orbit / provenance label, e.g. "Ascending 124".
    pub label: String,
    #[serde(default = "default_date_column")]
    pub date_column: String,
}

fn default_date_column() -> String {
    "Date".to_string()
}

/// A prediction or anomaly file with the label its rows are tagged with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelledSource {
    pub path: PathBuf,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Parses configuration text. `base_dir` anchors relative data paths.
    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self, DefmonError> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| DefmonError::Config(e.to_string()))?;
        config.base_dir = base_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DefmonError> {
        self.analysis.validate()?;
        if self.geolocation.is_empty() {
            return Err(DefmonError::Config(
                "at least one [[geolocation]] source is required".into(),
            ));
        }
        if self.displacement.is_empty() {
            return Err(DefmonError::Config(
                "at least one [[displacement]] source is required".into(),
            ));
        }
        Ok(())
    }

    /// Resolves a configured data path against the config directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Reads and validates the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<Config, DefmonError> {
    let text = std::fs::read_to_string(path).map_err(|e| DefmonError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Config::from_toml_str(&text, &base_dir)
}

/// Config path from `DEFMON_CONFIG` (a `.env` file is honoured), falling
/// back to `./defmon.toml`.
pub fn config_path_from_env() -> PathBuf {
    dotenv::dotenv().ok();
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

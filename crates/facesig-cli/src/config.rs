use std::path::{Path, PathBuf};

use facesig_core::QualityConfig;
use facesig_image::loader::DEFAULT_MAX_DIMENSION;
use serde::Deserialize;
use thiserror::Error;

/// Default cosine similarity for a positive gallery match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.40;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// CLI configuration: defaults, then an optional TOML file, then `FACESIG_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Blur gate tunables (`blurVarianceThreshold`, `workingWidth`).
    pub quality: QualityConfig,
    /// Largest side kept when decoding a photo.
    pub max_dimension: u32,
    /// Cosine similarity threshold for `match`.
    pub similarity_threshold: f32,
}

/// On-disk TOML layout. Every key is optional; unknown keys are rejected so a
/// misspelled option cannot silently fall back to its default.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    blur_variance_threshold: Option<f64>,
    working_width: Option<u32>,
    max_dimension: Option<u32>,
    similarity_threshold: Option<f32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality: QualityConfig::default(),
            max_dimension: DEFAULT_MAX_DIMENSION,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl Config {
    /// Load from `path` (or `FACESIG_CONFIG` when `path` is `None`) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FACESIG_CONFIG").ok().map(PathBuf::from));

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), ?config, "loaded config file");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut config = Self::default();
        let q = &mut config.quality;
        q.blur_variance_threshold = file
            .blur_variance_threshold
            .unwrap_or(q.blur_variance_threshold);
        q.working_width = file.working_width.unwrap_or(q.working_width);
        config.max_dimension = file.max_dimension.unwrap_or(config.max_dimension);
        config.similarity_threshold = file
            .similarity_threshold
            .unwrap_or(config.similarity_threshold);
        Ok(config)
    }

    /// Apply `FACESIG_*` overrides. Unparseable values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let q = &mut self.quality;
        q.blur_variance_threshold = parsed(
            &lookup,
            "FACESIG_BLUR_VARIANCE_THRESHOLD",
            q.blur_variance_threshold,
        );
        q.working_width = parsed(&lookup, "FACESIG_WORKING_WIDTH", q.working_width);
        self.max_dimension = parsed(&lookup, "FACESIG_MAX_DIMENSION", self.max_dimension);
        self.similarity_threshold = parsed(
            &lookup,
            "FACESIG_SIMILARITY_THRESHOLD",
            self.similarity_threshold,
        );
        self
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub geokg: GeokgConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Paths and process-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeokgConfig {
    /// Root directory holding the Markdown documents to extract.
    pub docs_folder: PathBuf,
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Thresholds used by the extraction pipeline.
///
/// The defaults are the values the geology rule set was tuned with; changing
/// them changes which candidates survive, not how they are found.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Confidence of entities found in heading lines.
    pub heading_confidence: f64,
    /// Confidence of entities found in body sentences.
    pub body_confidence: f64,
    /// Sentences with fewer characters are treated as noise.
    pub min_sentence_chars: usize,
    pub min_term_chars: usize,
    pub max_term_chars: usize,
    /// Body entities keep at most this many characters of their sentence.
    pub description_chars: usize,
    /// Pairs seen together in at least this many sentences become `related_to`.
    pub cooccurrence_min_count: usize,
    pub cooccurrence_max_examples: usize,
    /// Optional TOML rule set replacing the built-in geology rules.
    pub rules_path: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            heading_confidence: 0.8,
            body_confidence: 0.6,
            min_sentence_chars: 6,
            min_term_chars: 2,
            max_term_chars: 10,
            description_chars: 100,
            cooccurrence_min_count: 3,
            cooccurrence_max_examples: 3,
            rules_path: None,
        }
    }
}

impl ExtractionConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("heading_confidence", self.heading_confidence),
            ("body_confidence", self.body_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("extraction.{} must be between 0.0 and 1.0", name);
            }
        }

        if self.min_term_chars == 0 {
            anyhow::bail!("extraction.min_term_chars must be greater than 0");
        }

        if self.min_term_chars > self.max_term_chars {
            anyhow::bail!("extraction.min_term_chars must not exceed max_term_chars");
        }

        if self.cooccurrence_min_count == 0 {
            anyhow::bail!("extraction.cooccurrence_min_count must be greater than 0");
        }

        if let Some(path) = &self.rules_path {
            if !path.is_file() {
                anyhow::bail!("extraction.rules_path does not exist: {}", path.display());
            }
        }

        Ok(())
    }
}

/// Graph store query settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub max_path_depth: usize,
    pub search_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_path_depth: 5,
            search_limit: 20,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in GEOKG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Config file location: GEOKG_CONFIG, else ./config.toml
    pub fn config_path() -> PathBuf {
        // .env is optional
        let _ = dotenv::dotenv();

        std::env::var("GEOKG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    /// Extraction settings of the config file at `config_path`, or the
    /// defaults when there is no such file. A file that exists must be valid.
    pub fn extraction_from(config_path: &Path) -> Result<ExtractionConfig> {
        if !config_path.exists() {
            log::debug!("No config at {}, using default extraction settings", config_path.display());
            return Ok(ExtractionConfig::default());
        }
        Ok(Self::load_from(config_path)?.extraction)
    }

    /// Load and validate configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !self.geokg.docs_folder.exists() {
            anyhow::bail!(
                "docs_folder path does not exist: {}. Set docs_folder in config.toml to your Markdown directory.",
                self.geokg.docs_folder.display()
            );
        }

        if !self.geokg.docs_folder.is_dir() {
            anyhow::bail!(
                "docs_folder must be a directory, not a file: {}",
                self.geokg.docs_folder.display()
            );
        }

        self.extraction.validate()?;

        if self.store.max_path_depth == 0 {
            anyhow::bail!("store.max_path_depth must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.geokg.db_path
    }

    /// Get the Markdown root folder
    pub fn docs_folder(&self) -> &Path {
        &self.geokg.docs_folder
    }
}

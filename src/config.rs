//! Translator configuration.
//!
//! ```toml
//! mapping = "mappings/site.toml"   # optional, relative to this file
//!
//! [output]
//! indent = 4
//! wrap = "function"                # or "block"
//! annotate_raw = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{TranslateError, TranslateResult};
use crate::transpiler::{DialectMapping, GenerateOptions, WrapMode};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "plsql2pg.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Mapping TOML; the built-in Oracle table when unset.
    #[serde(default)]
    pub mapping: Option<PathBuf>,

    #[serde(default)]
    pub output: GenerateOptions,

    /// Directory of the file this was loaded from.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn from_toml_str(content: &str) -> TranslateResult<Self> {
        toml::from_str(content).map_err(|e| TranslateError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> TranslateResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslateError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Lookup order: `explicit`, then `./plsql2pg.toml`, then
    /// `<config dir>/plsql2pg/config.toml`, else defaults.
    pub fn discover(explicit: Option<&Path>) -> TranslateResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidates = [
            Some(PathBuf::from(LOCAL_CONFIG)),
            dirs::config_dir().map(|d| d.join("plsql2pg").join("config.toml")),
        ];
        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                return Self::load(&path);
            }
        }
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Mapping path resolved against the config file's directory.
    pub fn mapping_path(&self) -> Option<PathBuf> {
        let path = self.mapping.as_ref()?;
        match &self.base_dir {
            Some(base) if path.is_relative() => Some(base.join(path)),
            _ => Some(path.clone()),
        }
    }

    /// Effective dialect mapping.
    pub fn dialect_mapping(&self) -> TranslateResult<DialectMapping> {
        match self.mapping_path() {
            Some(path) => DialectMapping::load(&path),
            None => Ok(DialectMapping::oracle_defaults()),
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mapping = Some(path.into());
        self
    }

    pub fn indent(mut self, indent: usize) -> Self {
        self.config.output.indent = indent;
        self
    }

    pub fn wrap(mut self, wrap: WrapMode) -> Self {
        self.config.output.wrap = wrap;
        self
    }

    pub fn annotate_raw(mut self, annotate: bool) -> Self {
        self.config.output.annotate_raw = annotate;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

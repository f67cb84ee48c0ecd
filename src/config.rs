//! Project configuration, read from `controllers.json` or a YAML equivalent.
//!
//! Every field has a default, so a partial file only overrides what it names.
//! Arrays given in the file replace the default array rather than extending it.

use crate::error::{Error, Result};
use crate::extractor::UrlRules;
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "controllers.json";
pub const DEFAULT_PREFIX: &str = "(?:.*src)?/?(?:routes/?)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directory holding the type declarations, relative to the project.
    pub source: PathBuf,
    pub controllers: ControllersConfig,
    /// Provider alias -> `path/to/file.rs::function`.
    #[serde(alias = "params")]
    pub providers: IndexMap<String, String>,
    pub routes: RoutesConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openapi: Option<OpenApiConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllersConfig {
    pub glob: Vec<String>,
    pub prefix: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub output: PathBuf,
    pub format: ManifestFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenApiConfig {
    pub output: PathBuf,
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::from("src"),
            controllers: ControllersConfig::default(),
            providers: IndexMap::new(),
            routes: RoutesConfig::default(),
            openapi: None,
        }
    }
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            glob: vec!["src/routes/**/*.rs".to_string(), "routes/**/*.rs".to_string()],
            prefix: DEFAULT_PREFIX.to_string(),
            root: PathBuf::from("."),
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("routes.json"),
            format: ManifestFormat::Json,
        }
    }
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("openapi.json"),
            title: "API Reference".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults when it does not exist.
    ///
    /// `.yaml`/`.yml` files are read as YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let config: Config = if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        };
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn url_rules(&self) -> Result<UrlRules> {
        UrlRules::new(self.controllers.root.clone(), &self.controllers.prefix)
    }
}

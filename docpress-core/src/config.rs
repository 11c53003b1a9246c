//! Configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Main configuration struct matching the docpress.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub paths: PathsConfig,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// File extensions treated as source documents
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Regexes matched against paths relative to the content root
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    #[serde(default = "default_highlight_theme")]
    pub highlight_theme: String,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    String::from("/")
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "markdown".to_string()]
}

fn default_highlight_theme() -> String {
    String::from("InspiredGitHub")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub title: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub content: PathBuf,
    pub output: PathBuf,

    /// Root for image references; defaults to the content directory
    #[serde(default)]
    pub assets: Option<PathBuf>,

    /// Root substituted for `{snippets}` in include directives
    #[serde(default)]
    pub snippets: Option<PathBuf>,
}

impl Config {
    /// Build a config rooted at `content` with default settings.
    pub fn new(title: impl Into<String>, content: PathBuf, output: PathBuf) -> Self {
        Self {
            site: SiteConfig {
                title: title.into(),
                author: String::new(),
                description: String::new(),
                url: String::new(),
            },
            paths: PathsConfig {
                content,
                output,
                assets: None,
                snippets: None,
            },
            base_url: default_base_url(),
            extensions: default_extensions(),
            ignore_patterns: Vec::new(),
            highlight_theme: default_highlight_theme(),
            config_path: None,
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        // Surface bad ignore patterns at load time rather than mid-run
        config.compiled_ignore_patterns()?;

        Ok(config)
    }

    /// Get the content directory, resolved relative to config file
    pub fn content_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.content)
    }

    /// Get the output directory, resolved relative to config file
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.output)
    }

    /// Asset root for images (falls back to the content directory)
    pub fn assets_dir(&self) -> PathBuf {
        match &self.paths.assets {
            Some(p) => self.resolve_path(p),
            None => self.content_dir(),
        }
    }

    pub fn snippets_dir(&self) -> Option<PathBuf> {
        self.paths.snippets.as_ref().map(|p| self.resolve_path(p))
    }

    pub fn compiled_ignore_patterns(&self) -> Result<Vec<regex::Regex>, ConfigError> {
        self.ignore_patterns
            .iter()
            .map(|pattern| {
                regex::Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.config_path.as_ref().and_then(|p| p.parent()) {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Normalized base URL with leading and trailing slash ("/foo/" or "/")
    pub fn normalized_base_url(&self) -> String {
        normalize_base_url(&self.base_url)
    }
}

/// Ensure base URLs have a leading and trailing slash
pub fn normalize_base_url(raw: &str) -> String {
    let segments: Vec<&str> = raw
        .trim()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

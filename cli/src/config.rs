use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use printer::HtmlOptions;

pub const DEFAULT_CONFIG: &str = "tsdoc.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {}: {source}", .config_path.display())]
    Read {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file at {}: {source}", .config_path.display())]
    Parse {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to read HTML template {}: {source}", .template_path.display())]
    Template {
        template_path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub html: HtmlConfig,
    pub book: BookConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HtmlConfig {
    pub tab_stops: usize,
    pub image_prefix: String,
    pub title: String,
    /// Template file, relative to the config file.
    pub template: Option<PathBuf>,
    /// Overrides of the default incut classes.
    pub incut_classes: BTreeMap<String, String>,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        let options = HtmlOptions::default();
        HtmlConfig {
            tab_stops: options.tab_stops,
            image_prefix: options.image_prefix,
            title: options.title,
            template: None,
            incut_classes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookConfig {
    /// Suffix of generated files; the output format decides when unset.
    pub suffix: Option<String>,
}

impl Config {
    /// Load `config_path`. A missing file gives the defaults.
    pub fn load_from_path(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            log::debug!("no config at {}, using defaults", config_path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            config_path: config_path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            config_path: config_path.to_path_buf(),
            source,
        })?;

        if let Some(template) = config.html.template.take() {
            let base = config_path.parent().unwrap_or(Path::new("."));
            config.html.template = Some(base.join(template));
        }
        log::info!("loaded config from {}", config_path.display());
        Ok(config)
    }

    /// HTML printer options with this config applied over the defaults.
    pub fn html_options(&self) -> Result<HtmlOptions, ConfigError> {
        let mut options = HtmlOptions {
            tab_stops: self.html.tab_stops,
            image_prefix: self.html.image_prefix.clone(),
            title: self.html.title.clone(),
            ..HtmlOptions::default()
        };
        options.incut_classes.extend(self.html.incut_classes.clone());
        if let Some(path) = &self.html.template {
            options.template =
                std::fs::read_to_string(path).map_err(|source| ConfigError::Template {
                    template_path: path.clone(),
                    source,
                })?;
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_path(&dir.path().join(DEFAULT_CONFIG)).unwrap();
        assert_eq!(config.html.tab_stops, 4);
        assert_eq!(config.html.image_prefix, "../images/");
        assert_eq!(config.book.suffix, None);
    }

    #[test]
    fn values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);
        std::fs::write(
            &path,
            "[html]\ntab_stops = 8\ntemplate = \"page.html\"\n\n[html.incut_classes]\nDEF = \"definition\"\n\n[book]\nsuffix = \".htm\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("page.html"), "<h1>$TITLE</h1>").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.book.suffix.as_deref(), Some(".htm"));

        let options = config.html_options().unwrap();
        assert_eq!(options.tab_stops, 8);
        assert_eq!(options.template, "<h1>$TITLE</h1>");
        assert_eq!(options.incut_classes["DEF"], "definition");
        assert_eq!(options.incut_classes["WARN"], "alert");
    }

    #[test]
    fn malformed_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG);
        std::fs::write(&path, "[html]\ntab_stops = \"wide\"\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("tsdoc.toml"));
    }
}

//! Application configuration.
//!
//! Built once at startup from defaults, an optional config file
//! (`application.properties` or TOML) and CLI flags, then passed by
//! reference. Relative paths in a config file resolve against its directory.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ExtractionError;
use crate::export::OutputFormat;
use crate::tickers::mapping::{decode_properties, property_lines};

pub const DEFAULT_CONFIG_CANDIDATES: [&str; 2] =
    ["resources/application.properties", "application.properties"];

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub pdf_password: Option<String>,
    pub logging_level: String,
    pub output_format: OutputFormat,
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub logs_folder: PathBuf,
    pub mapping_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pdf_password: None,
            logging_level: "INFO".to_string(),
            output_format: OutputFormat::Csv,
            input_folder: PathBuf::from("resources/inputNotasCorretagem"),
            output_folder: PathBuf::from("resources/output"),
            logs_folder: PathBuf::from("resources/output/logs"),
            mapping_file: PathBuf::from("resources/tickerMapping.properties"),
        }
    }
}

/// Raw values as they appear in a config file; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub pdf_password: Option<String>,
    pub logging_level: Option<String>,
    pub output_format: Option<String>,
    pub input_folder: Option<String>,
    pub output_folder: Option<String>,
    pub logs_folder: Option<String>,
    pub mapping_file: Option<String>,
}

impl ConfigFile {
    /// `pdf.password=...` style keys. Unknown keys are ignored.
    pub fn from_properties(content: &str) -> Self {
        let mut file = ConfigFile::default();
        for (key, value) in property_lines(content) {
            let slot = match key.as_str() {
                "pdf.password" => &mut file.pdf_password,
                "logging.level" => &mut file.logging_level,
                "output.format" => &mut file.output_format,
                "input.folder" => &mut file.input_folder,
                "output.folder" => &mut file.output_folder,
                "logs.folder" => &mut file.logs_folder,
                "mapping.file" => &mut file.mapping_file,
                other => {
                    debug!("Ignoring unknown config key '{}'", other);
                    continue;
                }
            };
            *slot = Some(value);
        }
        file
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| anyhow!(ExtractionError::Config(e.to_string())))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read config {:?}", path))?;
        let content = decode_properties(&bytes);
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            Self::from_toml(&content).with_context(|| format!("Invalid config {:?}", path))
        } else {
            Ok(Self::from_properties(&content))
        }
    }
}

/// Flags given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub password: Option<String>,
    pub output_format: Option<OutputFormat>,
    pub input: Option<PathBuf>,
}

impl AppConfig {
    /// Defaults overlaid with `file`. Relative paths from the file are joined
    /// onto `base`; unset keys keep their working-directory defaults.
    pub fn from_file(file: ConfigFile, base: &Path) -> Result<Self> {
        let mut config = AppConfig::default();

        if let Some(password) = file.pdf_password {
            config.pdf_password = non_empty(password);
        }
        if let Some(level) = file.logging_level.and_then(non_empty) {
            config.logging_level = level;
        }
        if let Some(format) = file.output_format.and_then(non_empty) {
            config.output_format = format.parse()?;
        }
        config.input_folder = resolve(file.input_folder, base, &config.input_folder);
        config.output_folder = resolve(file.output_folder, base, &config.output_folder);
        config.logs_folder = resolve(file.logs_folder, base, &config.logs_folder);
        config.mapping_file = resolve(file.mapping_file, base, &config.mapping_file);
        Ok(config)
    }

    /// Load from `explicit`, else from the first default location that
    /// exists, else built-in defaults. Returns the file used, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(anyhow!(ExtractionError::Config(format!(
                    "config file not found: {}",
                    path.display()
                ))))
            }
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };

        match path {
            Some(path) => {
                let file = ConfigFile::read(&path)?;
                let base = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                Ok((Self::from_file(file, &base)?, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(password) = overrides.password {
            self.pdf_password = non_empty(password);
        }
        if let Some(format) = overrides.output_format {
            self.output_format = format;
        }
        if let Some(input) = overrides.input {
            self.input_folder = input;
        }
        self
    }

    /// Level understood by `EnvFilter` (`INFO` → `info`, `WARNING` → `warn`).
    pub fn filter_level(&self) -> &'static str {
        match self.logging_level.trim().to_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" | "CRITICAL" => "error",
            "OFF" => "off",
            _ => "info",
        }
    }
}

fn resolve(raw: Option<String>, base: &Path, default: &Path) -> PathBuf {
    let path = raw.and_then(non_empty).map(PathBuf::from);
    match path {
        Some(path) if path.is_absolute() => path,
        Some(path) => base.join(path),
        None => default.to_path_buf(),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// First existing default location, the user config file last.
pub fn default_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .chain(user_config_path())
        .find(|path| path.is_file())
}

/// `<config_home>/corretagem/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dir_spec::config_home().map(|dir| dir.join("corretagem").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn properties_keys_and_relative_paths() {
        let content = "# comentário\n\
                       pdf.password=\n\
                       logging.level=DEBUG\n\
                       output.format=xlsx\n\
                       input.folder=notas\n\
                       output.folder=/tmp/saida\n\
                       unknown.key=1\n";
        let file = ConfigFile::from_properties(content);
        assert_eq!(file.pdf_password.as_deref(), Some(""));

        let config = AppConfig::from_file(file, Path::new("/etc/corretagem")).unwrap();
        assert_eq!(config.pdf_password, None);
        assert_eq!(config.filter_level(), "debug");
        assert_eq!(config.output_format, OutputFormat::Xlsx);
        assert_eq!(config.input_folder, PathBuf::from("/etc/corretagem/notas"));
        assert_eq!(config.output_folder, PathBuf::from("/tmp/saida"));
        assert_eq!(config.mapping_file, PathBuf::from("resources/tickerMapping.properties"));
    }

    #[test]
    fn toml_file_is_read_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "pdf_password = \"123\"\noutput_format = \"json\"\n").unwrap();

        let (config, used) = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(used.as_deref(), Some(path.as_path()));
        assert_eq!(config.pdf_password.as_deref(), Some("123"));
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.logging_level, "INFO");
        assert_eq!(config.input_folder, PathBuf::from("resources/inputNotasCorretagem"));
    }

    #[test]
    fn bad_values_are_config_errors() {
        let file = ConfigFile::from_properties("output.format=pdf\n");
        assert!(AppConfig::from_file(file, Path::new(".")).is_err());
        assert!(ConfigFile::from_toml("nope = 1").is_err());
        assert!(AppConfig::load(Some(Path::new("/nao/existe.properties"))).is_err());
    }

    #[test]
    fn overrides_win_and_empty_password_is_none() {
        let config = AppConfig::default().with_overrides(Overrides {
            password: Some("  ".to_string()),
            output_format: Some(OutputFormat::Json),
            input: Some(PathBuf::from("outra")),
        });
        assert_eq!(config.pdf_password, None);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.input_folder, PathBuf::from("outra"));
    }

    #[test]
    fn logging_level_names() {
        let mut config = AppConfig::default();
        for (raw, level) in [("INFO", "info"), ("warning", "warn"), ("CRITICAL", "error"), ("xyz", "info")] {
            config.logging_level = raw.to_string();
            assert_eq!(config.filter_level(), level);
        }
    }
}

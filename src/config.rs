use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::generator::IdentifierMode;
use crate::script::IdentifierQuoting;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub imgmigrate: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const IMGMIGRATE_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            imgmigrate: Self::IMGMIGRATE_LEVEL.to_string(),
        }
    }

    /// Log specification handed to flexi_logger. Other crates stay at warn.
    pub fn log_spec(&self) -> String {
        format!("warn, imgmigrate={}", self.imgmigrate)
    }

    fn ensure_valid(&mut self) {
        let str_original = self.imgmigrate.clone();
        self.imgmigrate = self.imgmigrate.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.imgmigrate.as_str()) {
            eprintln!(
                "Config error: imgmigrate log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::IMGMIGRATE_LEVEL
            );
            self.imgmigrate = Self::IMGMIGRATE_LEVEL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScriptConfig {
    pub output: PathBuf,
    pub table: String,
    pub identifier: IdentifierMode,
    pub quoting: IdentifierQuoting,
}

impl ScriptConfig {
    const OUTPUT: &str = "image_migration.sql";
    pub const TABLE: &str = "Image";

    fn default() -> Self {
        ScriptConfig {
            output: PathBuf::from(Self::OUTPUT),
            table: Self::TABLE.to_owned(),
            identifier: IdentifierMode::Filename,
            quoting: IdentifierQuoting::Escaped,
        }
    }

    /// True for a bare SQL identifier: ASCII letters, digits and underscores,
    /// not starting with a digit.
    pub fn is_valid_table(table: &str) -> bool {
        let mut chars = table.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn ensure_valid(&mut self) {
        let str_original = self.table.clone();
        self.table = self.table.trim().to_owned();
        if !Self::is_valid_table(&self.table) {
            eprintln!(
                "Config error: table name of '{}' is invalid - using default of '{}'",
                str_original,
                Self::TABLE
            );
            self.table = Self::TABLE.to_owned();
        }

        if self.output.as_os_str().is_empty() {
            eprintln!(
                "Config error: output path is empty - using default of '{}'",
                Self::OUTPUT
            );
            self.output = PathBuf::from(Self::OUTPUT);
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct WalkConfig {
    pub sorted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub script: ScriptConfig,
    pub walk: WalkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: LoggingConfig::default(),
            script: ScriptConfig::default(),
            walk: WalkConfig::default(),
        }
    }
}

impl Config {
    const ENV_PREFIX: &str = "IMGMIGRATE_";
    const CONFIG_FILE: &str = "config.toml";

    /// Loads the configuration, layering the TOML file and `IMGMIGRATE_*`
    /// environment variables over the built-in defaults.
    ///
    /// With no explicit path the file lives in the platform config directory,
    /// and a default file is written there if none exists yet.
    pub fn load_config(explicit_path: Option<&Path>) -> Self {
        let config_path = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_path().inspect(|path| Self::write_default_if_missing(path)),
        };

        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(config_path: Option<&Path>) -> Self {
        let default_config = Config::default();

        let mut figment = Figment::from(Serialized::defaults(default_config.clone()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        let figment = figment.merge(Env::prefixed(Self::ENV_PREFIX).split("_"));

        let mut config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load configuration{}: {}. Using default configuration.",
                config_path
                    .map(|p| format!(" from {}", p.display()))
                    .unwrap_or_default(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "imgmigrate")
            .map(|dirs| dirs.config_dir().join(Self::CONFIG_FILE))
    }

    fn write_default_if_missing(config_path: &Path) {
        if config_path.exists() {
            return;
        }

        if let Some(parent) = config_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!(
                    "Failed to create configuration directory {}: {}",
                    parent.display(),
                    e
                );
                return;
            }
        }

        match Config::default().to_toml() {
            Ok(toml_string) => {
                if let Err(e) = fs::write(config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            }
            Err(_) => eprintln!("Failed to serialize default config."),
        }
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
        self.script.ensure_valid();
    }
}

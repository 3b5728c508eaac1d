use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use flexi_logger::{Logger, LoggerHandle};
use log::{debug, info};

use crate::config::{Config, ScriptConfig};
use crate::error::ImgMigrateError;
use crate::generator::{GenerateOptions, Generator, IdentifierMode};
use crate::script::IdentifierQuoting;

#[derive(Parser)]
#[command(
    name = "imgmigrate",
    version,
    about = "imgmigrate: generate a SQL script that loads an image tree into a bytea table"
)]
pub struct Cli {
    /// Configuration file (default: config.toml in the platform config directory)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Walk a directory tree and write one insert statement per file
    Generate(GenerateArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Root directory of the image tree
    pub root: PathBuf,

    /// Output script path (default: image_migration.sql)
    #[arg(long = "output", short = 'o')]
    pub output: Option<PathBuf>,

    /// Target table name (default: Image)
    #[arg(long = "table", short = 't')]
    pub table: Option<String>,

    /// Identifier stored for each file
    #[arg(long = "identifier", short = 'i', value_enum)]
    pub identifier: Option<IdentifierMode>,

    /// Insert identifiers without escaping single quotes
    #[arg(long = "raw-identifiers", default_value_t = false)]
    pub raw_identifiers: bool,

    /// Visit directory entries in name order for a reproducible script
    #[arg(long = "sorted", overrides_with = "no_sorted")]
    pub sorted: bool,

    /// Keep filesystem order even if the configuration enables sorting
    #[arg(long = "no-sorted", overrides_with = "sorted")]
    pub no_sorted: bool,
}

impl GenerateArgs {
    /// The last of `--sorted` / `--no-sorted` given, if any.
    pub fn sorted_override(&self) -> Option<bool> {
        match (self.sorted, self.no_sorted) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Merges command-line values over the loaded configuration.
    pub fn to_options(&self, config: &Config) -> Result<GenerateOptions, ImgMigrateError> {
        let table = match &self.table {
            Some(table) if !ScriptConfig::is_valid_table(table) => {
                return Err(ImgMigrateError::Error(format!(
                    "Table name '{table}' is not a valid SQL identifier"
                )));
            }
            Some(table) => table.clone(),
            None => config.script.table.clone(),
        };

        let quoting = if self.raw_identifiers {
            IdentifierQuoting::Raw
        } else {
            config.script.quoting
        };

        Ok(GenerateOptions {
            root: self.root.clone(),
            output: self
                .output
                .clone()
                .unwrap_or_else(|| config.script.output.clone()),
            table,
            identifier: self.identifier.unwrap_or(config.script.identifier),
            quoting,
            sorted: self.sorted_override().unwrap_or(config.walk.sorted),
        })
    }
}

impl Cli {
    pub fn handle_command_line() -> Result<(), ImgMigrateError> {
        let args = Cli::parse();

        let config = Config::load_config(args.config.as_deref());
        let _logger = Self::start_logger(&config)?;
        debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());
        debug!("Effective configuration: {:?}", config);

        match args.command {
            Command::Generate(generate_args) => Self::generate(&generate_args, &config),
            Command::Config => Self::print_config(&config),
        }
    }

    fn start_logger(config: &Config) -> Result<LoggerHandle, ImgMigrateError> {
        // RUST_LOG, when set, replaces the configured spec
        let handle = Logger::try_with_env_or_str(config.logging.log_spec())?
            .log_to_stderr()
            .start()?;
        Ok(handle)
    }

    fn generate(args: &GenerateArgs, config: &Config) -> Result<(), ImgMigrateError> {
        let options = args.to_options(config)?;
        info!("Generate options: {:?}", options);

        let summary = Generator::generate(&options)?;
        println!("Wrote '{}'", options.output.display());
        println!("{summary}");

        Ok(())
    }

    fn print_config(config: &Config) -> Result<(), ImgMigrateError> {
        let toml_string = config
            .to_toml()
            .map_err(|e| ImgMigrateError::Error(format!("Failed to serialize config: {e}")))?;
        print!("{toml_string}");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn generate_args(argv: &[&str]) -> GenerateArgs {
        let cli = Cli::try_parse_from(argv).expect("Should parse");
        match cli.command {
            Command::Generate(args) => args,
            Command::Config => panic!("Expected generate command"),
        }
    }

    #[test]
    fn test_cli_parsing_requires_command() {
        let result = Cli::try_parse_from(["imgmigrate"]);
        assert!(result.is_err(), "Should reject a missing command");
    }

    #[test]
    fn test_cli_parsing_generate_requires_root() {
        let result = Cli::try_parse_from(["imgmigrate", "generate"]);
        assert!(result.is_err(), "Should reject generate without a root");
    }

    #[test]
    fn test_cli_parsing_generate_defaults() {
        let args = generate_args(&["imgmigrate", "generate", "/srv/images"]);
        assert_eq!(args.root, PathBuf::from("/srv/images"));
        assert!(args.output.is_none());
        assert!(args.table.is_none());
        assert!(args.identifier.is_none());
        assert!(!args.raw_identifiers);
        assert!(!args.sorted);
        assert!(!args.no_sorted);
    }

    #[test]
    fn test_cli_parsing_generate_all_flags() {
        let cli = Cli::try_parse_from([
            "imgmigrate",
            "generate",
            "/srv/images",
            "-o",
            "avatars.sql",
            "--table",
            "Avatar",
            "--identifier",
            "relative",
            "--raw-identifiers",
            "--sorted",
            "--config",
            "custom.toml",
        ])
        .expect("Should parse");
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));

        let Command::Generate(args) = cli.command else {
            panic!("Expected generate command");
        };
        assert_eq!(args.output, Some(PathBuf::from("avatars.sql")));
        assert_eq!(args.table.as_deref(), Some("Avatar"));
        assert_eq!(args.identifier, Some(IdentifierMode::Relative));
        assert!(args.raw_identifiers);
        assert!(args.sorted);
    }

    #[test]
    fn test_cli_parsing_invalid_arguments() {
        let result = Cli::try_parse_from(["imgmigrate", "generate", "/srv", "--identifier", "hash"]);
        assert!(result.is_err(), "Should reject unknown identifier modes");

        let result = Cli::try_parse_from(["imgmigrate", "config", "--invalid-flag"]);
        assert!(result.is_err(), "Should reject unknown flags on config");
    }

    #[test]
    fn test_options_fall_back_to_config() {
        let mut config = Config::default();
        config.script.table = "Banner".to_owned();
        config.script.identifier = IdentifierMode::Relative;
        config.script.quoting = IdentifierQuoting::Raw;
        config.walk.sorted = true;

        let options = generate_args(&["imgmigrate", "generate", "images"])
            .to_options(&config)
            .unwrap();
        assert_eq!(options.root, PathBuf::from("images"));
        assert_eq!(options.output, PathBuf::from("image_migration.sql"));
        assert_eq!(options.table, "Banner");
        assert_eq!(options.identifier, IdentifierMode::Relative);
        assert_eq!(options.quoting, IdentifierQuoting::Raw);
        assert!(options.sorted);
    }

    #[test]
    fn test_options_flags_override_config() {
        let options = generate_args(&[
            "imgmigrate",
            "generate",
            "images",
            "--output",
            "out.sql",
            "--table",
            "Avatar",
            "--raw-identifiers",
        ])
        .to_options(&Config::default())
        .unwrap();
        assert_eq!(options.output, PathBuf::from("out.sql"));
        assert_eq!(options.table, "Avatar");
        assert_eq!(options.identifier, IdentifierMode::Filename);
        assert_eq!(options.quoting, IdentifierQuoting::Raw);
        assert!(!options.sorted);
    }

    #[test]
    fn test_no_sorted_overrides_config() {
        let mut config = Config::default();
        config.walk.sorted = true;

        let options = generate_args(&["imgmigrate", "generate", "images", "--no-sorted"])
            .to_options(&config)
            .unwrap();
        assert!(!options.sorted);

        let options = generate_args(&["imgmigrate", "generate", "images"])
            .to_options(&config)
            .unwrap();
        assert!(options.sorted);
    }

    #[test]
    fn test_last_sort_flag_wins() {
        let args = generate_args(&["imgmigrate", "generate", "images", "--no-sorted", "--sorted"]);
        assert_eq!(args.sorted_override(), Some(true));

        let args = generate_args(&["imgmigrate", "generate", "images", "--sorted", "--no-sorted"]);
        assert_eq!(args.sorted_override(), Some(false));

        let args = generate_args(&["imgmigrate", "generate", "images"]);
        assert_eq!(args.sorted_override(), None);
    }

    #[test]
    fn test_options_reject_invalid_table() {
        let result = generate_args(&["imgmigrate", "generate", "images", "--table", "Image;--"])
            .to_options(&Config::default());
        assert!(matches!(result, Err(ImgMigrateError::Error(_))));
    }
}

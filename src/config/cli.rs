use crate::config::BulkConfig;
use crate::core::delivery::SearchMode;
use crate::utils::error::{BulkError, Result};
use crate::utils::validation::{self, Validate};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "bulk-buy")]
#[command(about = "Find the cheapest way to buy a card list across marketplaces")]
pub struct CliConfig {
    /// Shopping list, one `[N[x]] name` per line.
    #[arg(long)]
    pub from: PathBuf,

    /// TOML file with sources, engine and output settings.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Overrides `engine.delivery_fee`.
    #[arg(long)]
    pub delivery_fee: Option<f64>,

    /// JSON card dump used to map localized names to English ones.
    #[arg(long)]
    pub aliases: Option<PathBuf>,

    /// Overrides `output.path`.
    #[arg(long)]
    pub output_path: Option<String>,

    /// Overrides `search.mode` (auto, exact, heuristic).
    #[arg(long)]
    pub search_mode: Option<String>,

    #[arg(long, short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Print the plans without writing the report bundle")]
    pub dry_run: bool,
}

impl CliConfig {
    /// Loads the TOML file, if any, and folds the command-line overrides in.
    pub fn resolve(&self) -> Result<BulkConfig> {
        let mut config = match &self.config {
            Some(path) => BulkConfig::from_file(path)?,
            None => BulkConfig::default(),
        };
        if let Some(fee) = self.delivery_fee {
            config.engine.delivery_fee = Some(fee);
        }
        if let Some(path) = &self.output_path {
            config.output.path = path.clone();
        }
        if let Some(mode) = &self.search_mode {
            config.search.mode = Some(mode.clone());
        }
        config.validate()?;
        Ok(config)
    }

    pub fn search_mode(&self) -> Option<SearchMode> {
        self.search_mode.as_deref().and_then(SearchMode::parse)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if !self.from.exists() {
            return Err(BulkError::InvalidConfigValueError {
                field: "from".to_string(),
                value: self.from.display().to_string(),
                reason: "Shopping list file does not exist".to_string(),
            });
        }
        if let Some(path) = &self.output_path {
            validation::validate_path("output_path", path)?;
        }
        if let Some(mode) = &self.search_mode {
            if SearchMode::parse(mode).is_none() {
                return Err(BulkError::InvalidConfigValueError {
                    field: "search_mode".to_string(),
                    value: mode.clone(),
                    reason: "Valid modes: auto, exact, heuristic".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_overrides_config_file() {
        let mut config_file = NamedTempFile::new().unwrap();
        config_file
            .write_all(b"[engine]\ndelivery_fee = 100.0\n\n[search]\nmode = \"exact\"\n")
            .unwrap();
        let list = NamedTempFile::new().unwrap();

        let cli = CliConfig::parse_from([
            "bulk-buy",
            "--from",
            list.path().to_str().unwrap(),
            "--config",
            config_file.path().to_str().unwrap(),
            "--delivery-fee",
            "250",
            "--search-mode",
            "heuristic",
            "--output-path",
            "./reports",
        ]);
        assert!(cli.validate().is_ok());

        let config = cli.resolve().unwrap();
        assert_eq!(config.delivery_fee(), Some(250.0));
        assert_eq!(config.search_mode().unwrap(), SearchMode::Heuristic);
        assert_eq!(config.output_path(), "./reports");
    }

    #[test]
    fn test_cli_rejects_missing_list_and_bad_mode() {
        let cli = CliConfig::parse_from(["bulk-buy", "--from", "/definitely/not/here.txt"]);
        assert!(cli.validate().is_err());

        let list = NamedTempFile::new().unwrap();
        let cli = CliConfig::parse_from([
            "bulk-buy",
            "--from",
            list.path().to_str().unwrap(),
            "--search-mode",
            "fastest",
        ]);
        assert!(cli.validate().is_err());
        assert!(cli.search_mode().is_none());
    }

    #[test]
    fn test_from_is_mandatory() {
        assert!(CliConfig::try_parse_from(["bulk-buy"]).is_err());
    }
}

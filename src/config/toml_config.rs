use crate::adapters::http_source::HttpJsonSource;
use crate::adapters::static_source::StaticSource;
use crate::app::report::OutputFormat;
use crate::core::delivery::SearchMode;
use crate::domain::model::Currency;
use crate::domain::ports::OfferSource;
use crate::utils::error::{BulkError, Result};
use crate::utils::validation::{self, Validate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

const DEFAULT_MAX_CONCURRENT: usize = 8;
const DEFAULT_MAX_EXACT_NODES: u64 = 1_000_000;
const DEFAULT_SOURCE_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_BUNDLE_NAME: &str = "bulk_buy.zip";
const MAX_DEADLINE_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub delivery_fee: Option<f64>,
    pub deadline_seconds: Option<u64>,
    pub max_concurrent_fetches: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub mode: Option<String>,
    pub max_exact_nodes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    HttpJson,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub r#type: SourceKind,
    pub endpoint: Option<String>,
    pub path: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub formats: Vec<String>,
    pub bundle: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
            formats: vec!["csv".to_string(), "tsv".to_string(), "json".to_string()],
            bundle: None,
        }
    }
}

impl BulkConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BulkError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// `${VAR}` placeholders are replaced from the environment before parsing;
    /// unset variables are left as written.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| BulkError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn delivery_fee(&self) -> Option<f64> {
        self.engine.delivery_fee
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.engine.deadline_seconds.map(Duration::from_secs)
    }

    pub fn max_concurrent_fetches(&self) -> usize {
        self.engine
            .max_concurrent_fetches
            .unwrap_or(DEFAULT_MAX_CONCURRENT)
    }

    pub fn search_mode(&self) -> Result<SearchMode> {
        match self.search.mode.as_deref() {
            None => Ok(SearchMode::default()),
            Some(mode) => SearchMode::parse(mode).ok_or_else(|| BulkError::InvalidConfigValueError {
                field: "search.mode".to_string(),
                value: mode.to_string(),
                reason: "Valid modes: auto, exact, heuristic".to_string(),
            }),
        }
    }

    pub fn max_exact_nodes(&self) -> u64 {
        self.search.max_exact_nodes.unwrap_or(DEFAULT_MAX_EXACT_NODES)
    }

    pub fn output_path(&self) -> &str {
        &self.output.path
    }

    pub fn bundle_name(&self) -> &str {
        self.output.bundle.as_deref().unwrap_or(DEFAULT_BUNDLE_NAME)
    }

    pub fn output_formats(&self) -> Result<Vec<OutputFormat>> {
        self.output
            .formats
            .iter()
            .map(|f| {
                OutputFormat::parse(f).ok_or_else(|| BulkError::InvalidConfigValueError {
                    field: "output.formats".to_string(),
                    value: f.clone(),
                    reason: "Unsupported format. Valid formats: csv, tsv, json".to_string(),
                })
            })
            .collect()
    }

    /// Instantiates the configured sources in declaration order, which is
    /// also the tie-break order between equally priced offers.
    pub fn build_sources(&self) -> Result<Vec<Arc<dyn OfferSource>>> {
        self.sources.iter().map(SourceConfig::build).collect()
    }
}

impl SourceConfig {
    fn currency(&self) -> Result<Currency> {
        match self.currency.as_deref() {
            None => Ok(Currency::default()),
            Some(code) => Currency::parse(code).ok_or_else(|| BulkError::InvalidConfigValueError {
                field: format!("sources.{}.currency", self.name),
                value: code.to_string(),
                reason: "Valid currencies: RUB, USD, EUR".to_string(),
            }),
        }
    }

    fn required<'a>(&self, field: &str, value: &'a Option<String>) -> Result<&'a str> {
        validation::validate_required_field(&format!("sources.{}.{}", self.name, field), value)
            .map(String::as_str)
    }

    pub fn build(&self) -> Result<Arc<dyn OfferSource>> {
        match self.r#type {
            SourceKind::HttpJson => {
                let endpoint = self.required("endpoint", &self.endpoint)?;
                let timeout = Duration::from_secs(
                    self.timeout_seconds.unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECONDS),
                );
                let source = HttpJsonSource::new(self.name.clone(), endpoint, timeout)?
                    .with_currency(self.currency()?);
                Ok(Arc::new(source))
            }
            SourceKind::File => {
                let path = self.required("path", &self.path)?;
                Ok(Arc::new(StaticSource::from_json_file(self.name.clone(), path)?))
            }
        }
    }

    fn validate_at(&self, index: usize) -> Result<()> {
        validation::validate_non_empty_string(&format!("sources[{}].name", index), &self.name)?;
        match self.r#type {
            SourceKind::HttpJson => {
                let endpoint = self.required("endpoint", &self.endpoint)?;
                validation::validate_url(&format!("sources.{}.endpoint", self.name), endpoint)?;
                if let Some(timeout) = self.timeout_seconds {
                    validation::validate_range(
                        &format!("sources.{}.timeout_seconds", self.name),
                        timeout,
                        1,
                        600,
                    )?;
                }
            }
            SourceKind::File => {
                let path = self.required("path", &self.path)?;
                validation::validate_path(&format!("sources.{}.path", self.name), path)?;
            }
        }
        self.currency()?;
        Ok(())
    }
}

impl Validate for BulkConfig {
    fn validate(&self) -> Result<()> {
        if let Some(fee) = self.engine.delivery_fee {
            if !fee.is_finite() || fee < 0.0 {
                return Err(BulkError::InvalidConfigValueError {
                    field: "engine.delivery_fee".to_string(),
                    value: fee.to_string(),
                    reason: "Delivery fee must be a non-negative number".to_string(),
                });
            }
        }
        if let Some(seconds) = self.engine.deadline_seconds {
            validation::validate_range("engine.deadline_seconds", seconds, 1, MAX_DEADLINE_SECONDS)?;
        }
        validation::validate_positive_number(
            "engine.max_concurrent_fetches",
            self.max_concurrent_fetches(),
            1,
        )?;

        self.search_mode()?;
        validation::validate_range("search.max_exact_nodes", self.max_exact_nodes(), 1, u64::MAX)?;

        let mut names = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            source.validate_at(index)?;
            if !names.insert(source.name.as_str()) {
                return Err(BulkError::ConfigValidationError {
                    field: "sources".to_string(),
                    message: format!("source name {:?} is used more than once", source.name),
                });
            }
        }

        validation::validate_path("output.path", &self.output.path)?;
        validation::validate_non_empty_string("output.bundle", self.bundle_name())?;
        self.output_formats()?;
        Ok(())
    }
}

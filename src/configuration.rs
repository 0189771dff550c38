use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use url::Url;

use crate::{
    domain::locator::LocatorTable,
    services::{
        interaction::{ResultProbe, SearchForm},
        pagination::Paging,
        table_extractor::TableSpec,
    },
};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub webdriver: WebDriverSettings,
    pub waits: WaitSettings,
    pub retries: RetrySettings,
    pub county: CrawlJobSettings,
    pub zipcode: CrawlJobSettings,
    pub aggregate: AggregateSettings,
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub data_root: PathBuf,
}

impl Settings {
    pub fn data_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.application.data_root.join(relative)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebDriverSettings {
    pub server_url: String,
    pub headless: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub element_timeout_millis: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub poll_interval_millis: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub settle_millis: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub download_timeout_millis: u64,
}

impl WaitSettings {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_millis)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub click: u8,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub click_backoff_millis: u64,
    /// Extra attempts for a search that neither listed results nor said "none".
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub indeterminate: u8,
}

impl RetrySettings {
    pub fn click_backoff(&self) -> Duration {
        Duration::from_millis(self.click_backoff_millis)
    }
}

/// Everything needed to drive one search UI.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteProfile {
    pub base_url: Url,
    pub form: SearchForm,
    pub probe: ResultProbe,
    pub table: TableSpec,
    pub paging: Paging,
    pub locators: LocatorTable,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_pages: usize,
}

impl SiteProfile {
    pub fn form_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(&self.form.path)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum UniverseSource {
    /// Every non-blank option of a dropdown on the search form.
    Dropdown { field: String },
    /// A column of a reference CSV under the data root.
    Csv { path: PathBuf, column: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlJobSettings {
    pub output_dir: PathBuf,
    pub target_column: String,
    pub universe: UniverseSource,
    pub resume_from: Option<String>,
    #[serde(default)]
    pub migrate_from_outputs: bool,
    pub site: SiteProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregateSettings {
    pub input_dirs: Vec<PathBuf>,
    pub column_contains: String,
    pub registry_file: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CatalogColumns {
    pub link: usize,
    pub document_number: usize,
    pub date: usize,
    pub document_type: usize,
}

impl CatalogColumns {
    pub fn required(&self) -> usize {
        [self.link, self.document_number, self.date, self.document_type]
            .into_iter()
            .max()
            .unwrap_or_default()
            + 1
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    pub registry_file: PathBuf,
    pub pdf_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub download_log: PathBuf,
    pub download_counts: PathBuf,
    pub document_type: String,
    #[serde(default)]
    pub redownload_logged: bool,
    pub columns: CatalogColumns,
    pub site: SiteProfile,
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::{CatalogColumns, Environment};

    #[test]
    fn environment_parses_case_insensitively() {
        let env: Environment = "Production".to_string().try_into().unwrap();
        assert_eq!(env.as_str(), "production");
        assert!(Environment::try_from("staging".to_string()).is_err());
    }

    #[test]
    fn catalog_needs_one_past_highest_column() {
        let columns = CatalogColumns {
            link: 2,
            document_number: 6,
            date: 16,
            document_type: 12,
        };
        assert_eq!(columns.required(), 17);
    }
}

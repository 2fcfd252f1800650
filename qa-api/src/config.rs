use std::{str::FromStr, time::Duration};

use serde::Deserialize;
use serde_with::serde_as;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use strum::{Display, EnumString};

use crate::domain::search::{
    embedder::{DEFAULT_DIMENSIONS, DEFAULT_MODEL},
    IndexerConfig, SearchConfig, DEFAULT_QUEUE_CAPACITY,
};

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub indexing: IndexingSettings,
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub host: String,
    pub app_url: String,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
    #[serde(default)]
    pub run_migrations: bool,
}

#[serde_as]
#[derive(Deserialize, Clone)]
pub struct EmbeddingSettings {
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub request_timeout_secs: u64,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SearchSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub default_limit: i64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub max_limit: i64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub similarity_floor: f64,
}

#[serde_as]
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct IndexingSettings {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub batch_size: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub tag_batch_size: usize,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub batch_delay_ms: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub queue_capacity: usize,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        let defaults = SearchConfig::default();
        Self {
            default_limit: defaults.default_limit,
            max_limit: defaults.max_limit,
            similarity_floor: defaults.similarity_floor,
        }
    }
}

impl From<&SearchSettings> for SearchConfig {
    fn from(settings: &SearchSettings) -> Self {
        SearchConfig {
            default_limit: settings.default_limit,
            max_limit: settings.max_limit,
            similarity_floor: settings.similarity_floor,
            ..SearchConfig::default()
        }
    }
}

impl Default for IndexingSettings {
    fn default() -> Self {
        let defaults = IndexerConfig::default();
        Self {
            batch_size: defaults.batch_size,
            tag_batch_size: defaults.tag_batch_size,
            batch_delay_ms: defaults.batch_delay.as_millis() as u64,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl From<&IndexingSettings> for IndexerConfig {
    fn from(settings: &IndexingSettings) -> Self {
        IndexerConfig {
            batch_size: settings.batch_size,
            tag_batch_size: settings.tag_batch_size,
            batch_delay: Duration::from_millis(settings.batch_delay_ms),
        }
    }
}

pub fn read_config() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No current directory: {e}")))?;
    let config_directory = base_path.join("config");

    let environment = Environment::from_str(
        std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .as_str(),
    )
    .map_err(|e| config::ConfigError::Message(format!("Invalid APP_ENVIRONMENT: {e}")))?;
    let environment_filename = format!("{}.yaml", environment);

    let settings = config::Config::builder()
        .add_source(config::File::from(config_directory.join("base.yaml")))
        .add_source(config::File::from(
            config_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("QA")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[derive(Display, Debug, EnumString)]
pub enum Environment {
    #[strum(ascii_case_insensitive, serialize = "local")]
    Local,
    #[strum(ascii_case_insensitive, serialize = "production")]
    Production,
}

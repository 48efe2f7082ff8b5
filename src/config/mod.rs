//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{DEFAULT_DOMAIN, Declaration, Subtype};
use crate::domain::types::EntityType;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "domaincache";
const ENV_PREFIX: &str = "DOMAINCACHE";
const DEFAULT_REGION_CAPACITY: usize = 1000;

/// Command-line arguments for the domaincache binary.
#[derive(Debug, Parser)]
#[command(
    name = "domaincache",
    version,
    about = "Inspect and validate domain cache declarations"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "DOMAINCACHE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print every domain with its entity types and their eviction closures.
    Inspect,
    /// Print the entity types evicted by a cascading write of TYPE.
    Affected(AffectedArgs),
    /// Validate configuration and build the registry.
    Check,
}

#[derive(Debug, Args, Clone)]
pub struct AffectedArgs {
    /// Entity type whose region is written.
    #[arg(value_name = "TYPE")]
    pub entity: String,

    /// Domain the write belongs to.
    #[arg(long, value_name = "DOMAIN", default_value = DEFAULT_DOMAIN)]
    pub domain: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the maximum number of entries per cache region.
    #[arg(long = "store-region-capacity", value_name = "COUNT", global = true)]
    pub store_region_capacity: Option<usize>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub declarations: Vec<Declaration>,
    pub hierarchy: Vec<Subtype>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub region_capacity: NonZeroUsize,
    pub create_missing_regions: bool,
    pub regions: Vec<EntityType>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    store: RawStoreSettings,
    entities: Vec<Declaration>,
    hierarchy: Vec<Subtype>,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(capacity) = overrides.store_region_capacity {
            self.store.region_capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            store,
            entities,
            hierarchy,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let store = build_store_settings(store)?;
        let declarations = build_declarations(entities)?;
        let hierarchy = build_hierarchy(hierarchy)?;

        Ok(Self {
            logging,
            store,
            declarations,
            hierarchy,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let capacity = store.region_capacity.unwrap_or(DEFAULT_REGION_CAPACITY);
    let region_capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
        LoadError::invalid("store.region_capacity", "must be greater than zero")
    })?;

    let regions = store
        .regions
        .into_iter()
        .map(|name| {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                Err(LoadError::invalid(
                    "store.regions",
                    "region names must not be empty",
                ))
            } else {
                Ok(EntityType::new(trimmed))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StoreSettings {
        region_capacity,
        create_missing_regions: store.create_missing_regions.unwrap_or(true),
        regions,
    })
}

fn build_declarations(entities: Vec<Declaration>) -> Result<Vec<Declaration>, LoadError> {
    if entities.is_empty() {
        return Err(LoadError::invalid(
            "entities",
            "at least one cacheable entity type must be declared",
        ));
    }

    for declaration in &entities {
        if declaration.entity_type.as_str().trim().is_empty() {
            return Err(LoadError::invalid("entities.type", "must not be empty"));
        }
        if declaration.domain.trim().is_empty() {
            return Err(LoadError::invalid(
                "entities.domain",
                format!("domain of `{}` must not be empty", declaration.entity_type),
            ));
        }
    }

    Ok(entities)
}

fn build_hierarchy(hierarchy: Vec<Subtype>) -> Result<Vec<Subtype>, LoadError> {
    for subtype in &hierarchy {
        if subtype.entity_type.as_str().trim().is_empty()
            || subtype.extends.as_str().trim().is_empty()
        {
            return Err(LoadError::invalid(
                "hierarchy",
                "subtype and supertype names must not be empty",
            ));
        }
        if subtype.entity_type == subtype.extends {
            return Err(LoadError::invalid(
                "hierarchy",
                format!("`{}` cannot extend itself", subtype.entity_type),
            ));
        }
    }

    Ok(hierarchy)
}

/// Parse the process arguments and load settings for them.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    region_capacity: Option<usize>,
    create_missing_regions: Option<bool>,
    regions: Vec<String>,
}

//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::level_filters::LevelFilter;
use uuid::Uuid;

use crate::application::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::application::query::{DetailLevel, RankingSettings, RankingWeights};
use crate::cache::TtlPolicy;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "newsdesk";
const ENV_PREFIX: &str = "NEWSDESK";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Command-line arguments for the newsdesk binary.
#[derive(Debug, Parser)]
#[command(
    name = "newsdesk",
    version,
    about = "Query and maintain newsdesk articles"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "NEWSDESK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

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

    /// Enable or bypass the read cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Show one article by id or slug.
    Show(ShowArgs),
    /// List published articles.
    List(ListArgs),
    /// Search articles.
    Search(SearchArgs),
    /// Featured articles.
    Featured(LimitArgs),
    /// Articles ranked by recent engagement.
    Trending(TrendingArgs),
    /// Most viewed articles.
    Popular(PopularArgs),
    /// Articles related to one article.
    Related(RelatedArgs),
    /// Scheduled articles, soonest first.
    Scheduled(PageArgs),
    /// Articles awaiting editorial review, oldest first.
    #[command(name = "pending-review")]
    PendingReview(PageArgs),
    /// Aggregated statistics for a time window.
    Analytics(AnalyticsArgs),
    /// Article counts per status.
    #[command(name = "status-counts")]
    StatusCounts,
    /// Publish approved articles.
    #[command(name = "bulk-publish")]
    BulkPublish(BulkArgs),
    /// Move published articles back to draft.
    #[command(name = "bulk-unpublish")]
    BulkUnpublish(BulkArgs),
    /// Feature published articles.
    #[command(name = "bulk-feature")]
    BulkFeature(BulkArgs),
    /// Archive articles.
    #[command(name = "bulk-archive")]
    BulkArchive(BulkArgs),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DetailArg {
    #[default]
    Summary,
    Full,
    Detail,
}

impl From<DetailArg> for DetailLevel {
    fn from(value: DetailArg) -> Self {
        match value {
            DetailArg::Summary => DetailLevel::Summary,
            DetailArg::Full => DetailLevel::Full,
            DetailArg::Detail => DetailLevel::Detail,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Article id or slug.
    #[arg(value_name = "ID_OR_SLUG")]
    pub reference: String,

    #[arg(long, value_enum, default_value_t = DetailArg::Detail)]
    pub level: DetailArg,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Defaults to `query.default_page_size`.
    #[arg(long = "per-page")]
    pub per_page: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ListArgs {
    /// Category slug; direct children are included.
    #[arg(long)]
    pub category: Option<String>,

    /// Tag slug.
    #[arg(long)]
    pub tag: Option<String>,

    /// Author id or username.
    #[arg(long)]
    pub author: Option<String>,

    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub featured: bool,

    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub breaking: bool,

    /// Only articles published within this many days.
    #[arg(long)]
    pub days: Option<u32>,

    /// Article type, e.g. `news` or `opinion`.
    #[arg(long = "type")]
    pub article_type: Option<String>,

    /// latest|oldest|popular|trending; unknown values mean latest.
    #[arg(long, default_value = "latest")]
    pub sort: String,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SearchArgs {
    #[arg(value_name = "TEXT")]
    pub text: String,

    #[arg(long = "category-id")]
    pub category_id: Option<Uuid>,

    /// Any-of tag filter; repeat to add more.
    #[arg(long = "tag-id")]
    pub tag_ids: Vec<Uuid>,

    #[arg(long = "author-id")]
    pub author_id: Option<Uuid>,

    /// RFC 3339 lower bound on the publication time.
    #[arg(long, value_parser = parse_timestamp)]
    pub from: Option<OffsetDateTime>,

    /// RFC 3339 upper bound on the publication time.
    #[arg(long, value_parser = parse_timestamp)]
    pub to: Option<OffsetDateTime>,

    /// relevance|latest|oldest|popular|title; unknown values mean relevance.
    #[arg(long, default_value = "relevance")]
    pub sort: String,

    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Args, Clone)]
pub struct LimitArgs {
    #[arg(long, default_value_t = 6)]
    pub limit: u32,
}

#[derive(Debug, Args, Clone)]
pub struct TrendingArgs {
    #[arg(long, default_value_t = 24)]
    pub hours: u32,

    #[arg(long, default_value_t = 10)]
    pub limit: u32,
}

#[derive(Debug, Args, Clone)]
pub struct PopularArgs {
    #[arg(long, default_value_t = 7)]
    pub days: u32,

    #[arg(long, default_value_t = 10)]
    pub limit: u32,
}

#[derive(Debug, Args, Clone)]
pub struct RelatedArgs {
    #[arg(value_name = "ID")]
    pub id: Uuid,

    #[arg(long, default_value_t = 4)]
    pub limit: u32,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyticsArgs {
    /// RFC 3339 start of the window.
    #[arg(long, value_parser = parse_timestamp)]
    pub from: OffsetDateTime,

    /// RFC 3339 end of the window.
    #[arg(long, value_parser = parse_timestamp)]
    pub to: OffsetDateTime,
}

#[derive(Debug, Args, Clone)]
pub struct BulkArgs {
    #[arg(value_name = "ID", required = true, num_args = 1..)]
    pub ids: Vec<Uuid>,
}

fn parse_timestamp(value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|err| format!("expected RFC 3339: {err}"))
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub ranking: RankingSettings,
    pub query: QuerySettings,
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
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_entries: usize,
    pub ttl: TtlPolicy,
}

#[derive(Debug, Clone, Copy)]
pub struct QuerySettings {
    pub default_page_size: u32,
    pub max_page_size: u32,
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

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    ranking: RawRankingSettings,
    query: RawQuerySettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            cache,
            ranking,
            query,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            ranking: build_ranking_settings(ranking)?,
            query: build_query_settings(query)?,
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

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let max_entries = cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);
    if max_entries == 0 {
        return Err(LoadError::invalid(
            "cache.max_entries",
            "must be greater than zero",
        ));
    }

    let ttl = cache.ttl.into_policy();
    ttl.check_ordering()
        .map_err(|reason| LoadError::invalid("cache.ttl", reason))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        max_entries,
        ttl,
    })
}

fn build_ranking_settings(ranking: RawRankingSettings) -> Result<RankingSettings, LoadError> {
    let defaults = RankingSettings::default();
    let trending = ranking.trending.into_weights(defaults.trending);
    let listing_trending = ranking.listing_trending.into_weights(defaults.listing_trending);

    for (key, weights) in [
        ("ranking.trending", trending),
        ("ranking.listing_trending", listing_trending),
    ] {
        let values = [weights.views, weights.shares, weights.comments];
        if values.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(LoadError::invalid(
                key,
                "weights must be finite and non-negative",
            ));
        }
    }

    Ok(RankingSettings {
        trending,
        listing_trending,
    })
}

fn build_query_settings(query: RawQuerySettings) -> Result<QuerySettings, LoadError> {
    let max_page_size = query.max_page_size.unwrap_or(MAX_PAGE_SIZE);
    if max_page_size == 0 || max_page_size > MAX_PAGE_SIZE {
        return Err(LoadError::invalid(
            "query.max_page_size",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }

    let default_page_size = query.default_page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if default_page_size == 0 || default_page_size > max_page_size {
        return Err(LoadError::invalid(
            "query.default_page_size",
            "must be between 1 and query.max_page_size",
        ));
    }

    Ok(QuerySettings {
        default_page_size,
        max_page_size,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    max_entries: Option<usize>,
    ttl: RawTtlSettings,
}

/// Seconds per view family; unset values keep the default policy.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTtlSettings {
    entity: Option<u64>,
    featured: Option<u64>,
    trending: Option<u64>,
    popular: Option<u64>,
    category: Option<u64>,
    tag: Option<u64>,
    author: Option<u64>,
    related: Option<u64>,
    search: Option<u64>,
    listing: Option<u64>,
    analytics: Option<u64>,
    status_counts: Option<u64>,
}

impl RawTtlSettings {
    fn into_policy(self) -> TtlPolicy {
        let defaults = TtlPolicy::default();
        let pick = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };
        TtlPolicy {
            entity: pick(self.entity, defaults.entity),
            featured: pick(self.featured, defaults.featured),
            trending: pick(self.trending, defaults.trending),
            popular: pick(self.popular, defaults.popular),
            category: pick(self.category, defaults.category),
            tag: pick(self.tag, defaults.tag),
            author: pick(self.author, defaults.author),
            related: pick(self.related, defaults.related),
            search: pick(self.search, defaults.search),
            listing: pick(self.listing, defaults.listing),
            analytics: pick(self.analytics, defaults.analytics),
            status_counts: pick(self.status_counts, defaults.status_counts),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRankingSettings {
    trending: RawWeights,
    listing_trending: RawWeights,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWeights {
    views: Option<f64>,
    shares: Option<f64>,
    comments: Option<f64>,
}

impl RawWeights {
    fn into_weights(self, defaults: RankingWeights) -> RankingWeights {
        RankingWeights {
            views: self.views.unwrap_or(defaults.views),
            shares: self.shares.unwrap_or(defaults.shares),
            comments: self.comments.unwrap_or(defaults.comments),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQuerySettings {
    default_page_size: Option<u32>,
    max_page_size: Option<u32>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }

    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;

    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

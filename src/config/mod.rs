//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "yatube";
const ENV_PREFIX: &str = "YATUBE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_POSTS_PER_PAGE: u32 = 10;
const DEFAULT_TITLE_SYMBOLS: u32 = 30;
const DEFAULT_INDEX_TTL_SECS: u64 = 20;
const DEFAULT_INDEX_CAPACITY: usize = 256;
const DEFAULT_IDENTITY_HEADER: &str = "x-remote-user";
const DEFAULT_LOGIN_URL: &str = "/auth/login/";
const DEFAULT_UPLOAD_DIR: &str = "media";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;

/// Command-line arguments for the Yatube binary.
#[derive(Debug, Parser)]
#[command(name = "yatube", version, about = "Yatube community blog")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "YATUBE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply migrations and run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Manage post groups.
    #[command(name = "groups")]
    Groups(GroupsArgs),
    /// Manage local identity records.
    #[command(name = "users")]
    Users(UsersArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the number of posts shown per listing page.
    #[arg(long = "posts-per-page", value_name = "COUNT")]
    pub posts_per_page: Option<u32>,

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH")]
    pub uploads_directory: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct GroupsArgs {
    #[command(subcommand)]
    pub command: GroupsCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum GroupsCommand {
    /// Create a group; the slug is derived from the title unless supplied.
    #[command(name = "add")]
    Add(AddGroupArgs),
}

#[derive(Debug, Args, Clone)]
pub struct AddGroupArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[arg(long, value_name = "TITLE")]
    pub title: String,

    #[arg(long, value_name = "TEXT", default_value = "")]
    pub description: String,

    #[arg(long, value_name = "SLUG")]
    pub slug: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum UsersCommand {
    /// Register a username issued by the authentication front end.
    #[command(name = "add")]
    Add(AddUserArgs),
}

#[derive(Debug, Args, Clone)]
pub struct AddUserArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[arg(value_name = "USERNAME")]
    pub username: String,

    #[arg(long = "first-name", value_name = "NAME", default_value = "")]
    pub first_name: String,

    #[arg(long = "last-name", value_name = "NAME", default_value = "")]
    pub last_name: String,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub listing: ListingSettings,
    pub cache: CacheSettings,
    pub auth: AuthSettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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

#[derive(Debug, Clone, Copy)]
pub struct ListingSettings {
    pub posts_per_page: NonZeroU32,
    pub title_symbols: NonZeroU32,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            posts_per_page: NonZeroU32::new(DEFAULT_POSTS_PER_PAGE).unwrap_or(NonZeroU32::MIN),
            title_symbols: NonZeroU32::new(DEFAULT_TITLE_SYMBOLS).unwrap_or(NonZeroU32::MIN),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub index_ttl: Duration,
    pub index_capacity: NonZeroUsize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            index_ttl: Duration::from_secs(DEFAULT_INDEX_TTL_SECS),
            index_capacity: NonZeroUsize::new(DEFAULT_INDEX_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub identity_header: String,
    pub login_url: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub max_request_bytes: NonZeroU64,
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

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Groups(args)) => match &args.command {
            GroupsCommand::Add(add) => raw.apply_database_override(&add.database),
        },
        Some(Command::Users(args)) => match &args.command {
            UsersCommand::Add(add) => raw.apply_database_override(&add.database),
        },
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    listing: RawListingSettings,
    cache: RawCacheSettings,
    auth: RawAuthSettings,
    uploads: RawUploadSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(count) = overrides.posts_per_page {
            self.listing.posts_per_page = Some(count);
        }
        if let Some(directory) = overrides.uploads_directory.as_ref() {
            self.uploads.directory = Some(directory.clone());
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            listing,
            cache,
            auth,
            uploads,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            listing: build_listing_settings(listing)?,
            cache: build_cache_settings(cache)?,
            auth: build_auth_settings(auth)?,
            uploads: build_upload_settings(uploads)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
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

fn build_listing_settings(listing: RawListingSettings) -> Result<ListingSettings, LoadError> {
    let posts_per_page = non_zero_u32(
        listing
            .posts_per_page
            .unwrap_or(DEFAULT_POSTS_PER_PAGE)
            .into(),
        "listing.posts_per_page",
    )?;
    let title_symbols = non_zero_u32(
        listing.title_symbols.unwrap_or(DEFAULT_TITLE_SYMBOLS).into(),
        "listing.title_symbols",
    )?;

    Ok(ListingSettings {
        posts_per_page,
        title_symbols,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_seconds = cache.index_ttl_seconds.unwrap_or(DEFAULT_INDEX_TTL_SECS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.index_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let index_capacity = NonZeroUsize::new(
        cache.index_capacity.unwrap_or(DEFAULT_INDEX_CAPACITY),
    )
    .ok_or_else(|| LoadError::invalid("cache.index_capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        index_ttl: Duration::from_secs(ttl_seconds),
        index_capacity,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let identity_header = auth
        .identity_header
        .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.to_string())
        .trim()
        .to_ascii_lowercase();
    if axum::http::HeaderName::from_bytes(identity_header.as_bytes()).is_err() {
        return Err(LoadError::invalid(
            "auth.identity_header",
            format!("`{identity_header}` is not a valid header name"),
        ));
    }

    let login_url = auth
        .login_url
        .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());
    if !login_url.starts_with('/') {
        return Err(LoadError::invalid(
            "auth.login_url",
            "must be an absolute path starting with `/`",
        ));
    }

    Ok(AuthSettings {
        identity_header,
        login_url,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let directory = uploads
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "uploads.directory",
            "path must not be empty",
        ));
    }

    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings {
        directory,
        max_request_bytes,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
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
struct RawListingSettings {
    posts_per_page: Option<u32>,
    title_symbols: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    index_ttl_seconds: Option<u64>,
    index_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    identity_header: Option<String>,
    login_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    max_request_bytes: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
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

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

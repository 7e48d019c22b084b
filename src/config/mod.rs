//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::pagination::MAX_CATALOG_PAGE_SIZE;

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "kumoscan";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_PAGE_SIZE: u32 = 12;
const MAX_PAGE_SIZE: u32 = MAX_CATALOG_PAGE_SIZE;
const DEFAULT_PLACEHOLDER_COVER: &str = "/placeholder-manga.jpg";
const DEFAULT_IMAGE_HOST_ENDPOINT: &str = "https://api.imgbb.com/1/upload";
const DEFAULT_IMAGE_HOST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_IMAGE_BYTES: u64 = 16 * 1024 * 1024;
const DEFAULT_IDENTITY_ENDPOINT: &str =
    "https://identitytoolkit.googleapis.com/v1/accounts:lookup";
const DEFAULT_IDENTITY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 120;
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 128 * 1024 * 1024;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub catalog: CatalogSettings,
    pub image_host: ImageHostSettings,
    pub identity: IdentitySettings,
    pub rate_limit: RateLimitSettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
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
pub struct CatalogSettings {
    pub page_size: NonZeroU32,
    pub placeholder_cover: String,
}

#[derive(Debug, Clone)]
pub struct ImageHostSettings {
    pub endpoint: Url,
    /// Uploads fail with `Unconfigured` while this is absent.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_image_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub endpoint: Url,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
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

    builder = builder.add_source(Environment::with_prefix("KUMOSCAN").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
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
    catalog: RawCatalogSettings,
    image_host: RawImageHostSettings,
    identity: RawIdentitySettings,
    rate_limit: RawRateLimitSettings,
    uploads: RawUploadSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_database_override(&overrides.database);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(size) = overrides.catalog_page_size {
            self.catalog.page_size = Some(size);
        }
        if let Some(key) = overrides.image_host_api_key.as_ref() {
            self.image_host.api_key = Some(key.clone());
        }
        if let Some(key) = overrides.identity_api_key.as_ref() {
            self.identity.api_key = Some(key.clone());
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
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
            catalog,
            image_host,
            identity,
            rate_limit,
            uploads,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            catalog: build_catalog_settings(catalog)?,
            image_host: build_image_host_settings(image_host)?,
            identity: build_identity_settings(identity)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
            uploads: build_upload_settings(uploads)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "public and admin listeners must not share an address",
        ));
    }

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
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
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url: trimmed(database.url),
        max_connections,
    })
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> Result<CatalogSettings, LoadError> {
    let page_size = non_zero_u32(
        catalog.page_size.unwrap_or(DEFAULT_PAGE_SIZE).into(),
        "catalog.page_size",
    )?;
    if page_size.get() > MAX_PAGE_SIZE {
        return Err(LoadError::invalid(
            "catalog.page_size",
            format!("must not exceed {MAX_PAGE_SIZE}"),
        ));
    }

    let placeholder_cover = trimmed(catalog.placeholder_cover)
        .unwrap_or_else(|| DEFAULT_PLACEHOLDER_COVER.to_string());

    Ok(CatalogSettings {
        page_size,
        placeholder_cover,
    })
}

fn build_image_host_settings(
    image_host: RawImageHostSettings,
) -> Result<ImageHostSettings, LoadError> {
    let endpoint = parse_endpoint(
        image_host.endpoint.as_deref(),
        DEFAULT_IMAGE_HOST_ENDPOINT,
        "image_host.endpoint",
    )?;
    let timeout = positive_duration(
        image_host
            .timeout_seconds
            .unwrap_or(DEFAULT_IMAGE_HOST_TIMEOUT_SECS),
        "image_host.timeout_seconds",
    )?;
    let max_image_bytes = NonZeroU64::new(
        image_host
            .max_image_bytes
            .unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
    )
    .ok_or_else(|| LoadError::invalid("image_host.max_image_bytes", "must be greater than zero"))?;

    Ok(ImageHostSettings {
        endpoint,
        api_key: trimmed(image_host.api_key),
        timeout,
        max_image_bytes,
    })
}

fn build_identity_settings(identity: RawIdentitySettings) -> Result<IdentitySettings, LoadError> {
    let endpoint = parse_endpoint(
        identity.endpoint.as_deref(),
        DEFAULT_IDENTITY_ENDPOINT,
        "identity.endpoint",
    )?;
    let timeout = positive_duration(
        identity
            .timeout_seconds
            .unwrap_or(DEFAULT_IDENTITY_TIMEOUT_SECS),
        "identity.timeout_seconds",
    )?;

    Ok(IdentitySettings {
        endpoint,
        api_key: trimmed(identity.api_key),
        timeout,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds = non_zero_u32(
        rate_limit
            .window_seconds
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        "rate_limit.window_seconds",
    )?;
    let max_requests = non_zero_u32(
        rate_limit
            .max_requests
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS),
        "rate_limit.max_requests",
    )?;

    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings { max_request_bytes })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
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
struct RawCatalogSettings {
    page_size: Option<u32>,
    placeholder_cover: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawImageHostSettings {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_seconds: Option<u64>,
    max_image_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawIdentitySettings {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    max_request_bytes: Option<u64>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_endpoint(
    value: Option<&str>,
    default: &str,
    key: &'static str,
) -> Result<Url, LoadError> {
    let raw = value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default);
    let url = Url::parse(raw).map_err(|err| LoadError::invalid(key, err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "endpoint must use http or https"));
    }
    Ok(url)
}

fn positive_duration(seconds: u64, key: &'static str) -> Result<Duration, LoadError> {
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
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

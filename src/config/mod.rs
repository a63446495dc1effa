//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::roles::Role;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bookstore";
const ENV_PREFIX: &str = "BOOKSTORE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_API_VERSION: &str = "1.0";
const DEFAULT_PAGE_LIMIT: u32 = 3;
const DEFAULT_MAX_PAGE_LIMIT: u32 = 100;
const DEFAULT_CACHE_CAPACITY: usize = 1024;
const TOKEN_DIGEST_LEN: usize = 32;

/// Command-line arguments for the bookstore binary.
#[derive(Debug, Parser)]
#[command(name = "bookstore", version, about = "Bookstore catalog API server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BOOKSTORE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the catalog HTTP API.
    Serve(Box<ServeArgs>),
    /// Apply embedded database migrations and exit.
    Migrate(MigrateArgs),
    /// Print the SHA-256 digest of an access token for `auth.keys`.
    #[command(name = "hash-token")]
    HashToken(HashTokenArgs),
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
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
pub struct HashTokenArgs {
    /// The plaintext bearer token.
    #[arg(value_name = "TOKEN")]
    pub token: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the public base URL used for links and `Location` headers.
    #[arg(long = "api-public-base-url", value_name = "URL")]
    pub api_public_base_url: Option<String>,

    /// Override the schema version served when a request names none.
    #[arg(long = "api-default-version", value_name = "VERSION")]
    pub api_default_version: Option<String>,

    /// Toggle the listing response cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the maximum number of cached listing pages.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<usize>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub public_base_url: Url,
    pub default_version: String,
    pub default_page_limit: NonZeroU32,
    pub max_page_limit: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub keys: Vec<AccessKeySettings>,
}

/// A configured bearer token, stored as the digest of the token.
#[derive(Debug, Clone)]
pub struct AccessKeySettings {
    pub name: String,
    pub token_sha256: [u8; TOKEN_DIGEST_LEN],
    pub roles: Vec<Role>,
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
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        Some(Command::HashToken(_)) => {}
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
    api: RawApiSettings,
    cache: RawCacheSettings,
    auth: RawAuthSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
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
        if let Some(url) = overrides.api_public_base_url.as_ref() {
            self.api.public_base_url = Some(url.clone());
        }
        if let Some(version) = overrides.api_default_version.as_ref() {
            self.api.default_version = Some(version.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }

        self.apply_database_override(&overrides.database);
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
            api,
            cache,
            auth,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let api = build_api_settings(api, &server)?;
        let cache = build_cache_settings(cache)?;
        let auth = build_auth_settings(auth)?;

        Ok(Self {
            server,
            logging,
            database,
            api,
            cache,
            auth,
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
        addr,
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

    let acquire_secs = database
        .acquire_timeout_seconds
        .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS);
    if acquire_secs == 0 {
        return Err(LoadError::invalid(
            "database.acquire_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        acquire_timeout: Duration::from_secs(acquire_secs),
    })
}

fn build_api_settings(api: RawApiSettings, server: &ServerSettings) -> Result<ApiSettings, LoadError> {
    let public_base_url = match api.public_base_url {
        Some(raw) => Url::parse(raw.trim()).map_err(|err| {
            LoadError::invalid("api.public_base_url", format!("failed to parse: {err}"))
        })?,
        None => Url::parse(&format!("http://{}/", server.addr)).map_err(|err| {
            LoadError::invalid("api.public_base_url", format!("failed to derive: {err}"))
        })?,
    };
    if !matches!(public_base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.public_base_url",
            "scheme must be http or https",
        ));
    }

    let default_version = api
        .default_version
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
    if default_version.is_empty() {
        return Err(LoadError::invalid(
            "api.default_version",
            "version must not be empty",
        ));
    }

    let default_page_limit = non_zero_u32(
        api.default_page_limit.unwrap_or(DEFAULT_PAGE_LIMIT).into(),
        "api.default_page_limit",
    )?;
    let max_page_limit = non_zero_u32(
        api.max_page_limit.unwrap_or(DEFAULT_MAX_PAGE_LIMIT).into(),
        "api.max_page_limit",
    )?;
    if default_page_limit > max_page_limit {
        return Err(LoadError::invalid(
            "api.default_page_limit",
            "must not exceed api.max_page_limit",
        ));
    }

    Ok(ApiSettings {
        public_base_url,
        default_version,
        default_page_limit,
        max_page_limit,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let mut keys = Vec::with_capacity(auth.keys.len());
    for raw in auth.keys {
        let name = raw
            .name
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| LoadError::invalid("auth.keys.name", "name must not be empty"))?;

        let digest = raw.token_sha256.unwrap_or_default();
        let bytes = hex::decode(digest.trim()).map_err(|err| {
            LoadError::invalid(
                "auth.keys.token_sha256",
                format!("key `{name}`: invalid hex: {err}"),
            )
        })?;
        let token_sha256: [u8; TOKEN_DIGEST_LEN] = bytes.try_into().map_err(|_| {
            LoadError::invalid(
                "auth.keys.token_sha256",
                format!("key `{name}`: expected a {TOKEN_DIGEST_LEN}-byte SHA-256 digest"),
            )
        })?;

        let roles = raw
            .roles
            .iter()
            .map(|role| {
                Role::from_str(role.trim()).map_err(|()| {
                    LoadError::invalid(
                        "auth.keys.roles",
                        format!("key `{name}`: unknown role `{role}`"),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        keys.push(AccessKeySettings {
            name,
            token_sha256,
            roles,
        });
    }

    Ok(AuthSettings { keys })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
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
    acquire_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    public_base_url: Option<String>,
    default_version: Option<String>,
    default_page_limit: Option<u32>,
    max_page_limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    keys: Vec<RawAccessKey>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAccessKey {
    name: Option<String>,
    token_sha256: Option<String>,
    roles: Vec<String>,
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

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN_DIGEST: &str = "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918";

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.api.default_version, "1.0");
        assert_eq!(settings.api.default_page_limit.get(), 3);
        assert_eq!(settings.api.max_page_limit.get(), 100);
        assert_eq!(
            settings.api.public_base_url.as_str(),
            "http://127.0.0.1:8080/"
        );
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.capacity.get(), DEFAULT_CACHE_CAPACITY);
        assert!(settings.auth.keys.is_empty());
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.cache.enabled = Some(true);

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            cache_enabled: Some(false),
            database: DatabaseOverride {
                database_url: Some("postgres://localhost/books".to_string()),
            },
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert!(!settings.cache.enabled);
        assert_eq!(
            settings.database.url.as_deref(),
            Some("postgres://localhost/books")
        );
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["bookstore"]);
        assert!(args.command.is_none());

        let args = CliArgs::parse_from(["bookstore", "serve", "--server-port", "9000"]);
        match args.command {
            Some(Command::Serve(serve)) => assert_eq!(serve.overrides.server_port, Some(9000)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn blank_database_url_is_ignored() {
        let mut raw = RawSettings::default();
        raw.database.url = Some("   ".to_string());

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.database.url.is_none());
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.capacity = Some(0);

        let err = Settings::from_raw(raw).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { key: "cache.capacity", .. }));
    }

    #[test]
    fn default_limit_cannot_exceed_maximum() {
        let mut raw = RawSettings::default();
        raw.api.default_page_limit = Some(50);
        raw.api.max_page_limit = Some(10);

        let err = Settings::from_raw(raw).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "api.default_page_limit",
                ..
            }
        ));
    }

    #[test]
    fn public_base_url_must_be_http() {
        let mut raw = RawSettings::default();
        raw.api.public_base_url = Some("ftp://books.example.com".to_string());

        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn access_keys_are_decoded() {
        let mut raw = RawSettings::default();
        raw.auth.keys.push(RawAccessKey {
            name: Some("ops".to_string()),
            token_sha256: Some(ADMIN_DIGEST.to_string()),
            roles: vec!["ROLE_USER".to_string(), "ROLE_ADMIN".to_string()],
        });

        let settings = Settings::from_raw(raw).expect("valid settings");
        let key = &settings.auth.keys[0];

        assert_eq!(key.name, "ops");
        assert_eq!(hex::encode(key.token_sha256), ADMIN_DIGEST);
        assert_eq!(key.roles, vec![Role::User, Role::Admin]);
    }

    #[test]
    fn access_key_with_unknown_role_is_rejected() {
        let mut raw = RawSettings::default();
        raw.auth.keys.push(RawAccessKey {
            name: Some("ops".to_string()),
            token_sha256: Some(ADMIN_DIGEST.to_string()),
            roles: vec!["ROLE_ROOT".to_string()],
        });

        let err = Settings::from_raw(raw).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { key: "auth.keys.roles", .. }));
    }

    #[test]
    fn short_digest_is_rejected() {
        let mut raw = RawSettings::default();
        raw.auth.keys.push(RawAccessKey {
            name: Some("ops".to_string()),
            token_sha256: Some("abcd".to_string()),
            roles: Vec::new(),
        });

        let err = Settings::from_raw(raw).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "auth.keys.token_sha256",
                ..
            }
        ));
    }
}

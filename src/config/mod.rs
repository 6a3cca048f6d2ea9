//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    CliArgs, Command, DatabaseOverride, ExportArgs, ImportArgs, ServeArgs, ServeOverrides,
};

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::blog::BlogSettings;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sensive";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_MEDIA_DIR: &str = "media";
const DEFAULT_MEDIA_URL_PREFIX: &str = "/media";
const DEFAULT_SITE_TITLE: &str = "Sensive";
const DEFAULT_SITE_DESCRIPTION: &str = "A blog about everything";
const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_POPULAR_POSTS_LIMIT: u32 = 5;
const DEFAULT_POPULAR_TAGS_LIMIT: u32 = 5;
const DEFAULT_FRESH_POSTS_LIMIT: u32 = 5;
const DEFAULT_TAG_POSTS_LIMIT: u32 = 20;
const DEFAULT_TEASER_CHARS: u32 = 200;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub blog: BlogSettings,
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
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub directory: PathBuf,
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

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SENSIVE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::ExportSite(args)) => raw.apply_database_override(&args.database),
        Some(Command::ImportSite(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    media: RawMediaSettings,
    blog: RawBlogSettings,
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
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(directory) = overrides.media_directory.as_ref() {
            self.media.directory = Some(directory.clone());
        }
        if let Some(zone) = overrides.blog_timezone.as_ref() {
            self.blog.timezone = Some(zone.clone());
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
            media,
            blog,
        } = raw;

        let media_url_prefix = build_media_url_prefix(media.url_prefix.clone())?;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            media: build_media_settings(media)?,
            blog: build_blog_settings(blog, media_url_prefix)?,
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

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url,
        max_connections: non_zero_u32(max_value.into(), "database.max_connections")?,
    })
}

fn build_media_settings(media: RawMediaSettings) -> Result<MediaSettings, LoadError> {
    let directory = media
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "media.directory",
            "path must not be empty",
        ));
    }

    Ok(MediaSettings { directory })
}

/// Post images are served locally only under `/media`; any other prefix must
/// point at an external http(s) host mirroring the media directory.
fn build_media_url_prefix(prefix: Option<String>) -> Result<String, LoadError> {
    let prefix = prefix.unwrap_or_else(|| DEFAULT_MEDIA_URL_PREFIX.to_string());
    let trimmed = prefix.trim().trim_end_matches('/');
    let external = trimmed.starts_with("http://") || trimmed.starts_with("https://");
    if trimmed != DEFAULT_MEDIA_URL_PREFIX && !external {
        return Err(LoadError::invalid(
            "media.url_prefix",
            format!("must be `{DEFAULT_MEDIA_URL_PREFIX}` or an http(s) URL"),
        ));
    }
    Ok(trimmed.to_string())
}

fn build_blog_settings(
    blog: RawBlogSettings,
    media_url_prefix: String,
) -> Result<BlogSettings, LoadError> {
    let zone = blog
        .timezone
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let timezone = Tz::from_str(zone.trim())
        .map_err(|err| LoadError::invalid("blog.timezone", format!("`{zone}`: {err}")))?;

    let site_title = blog
        .site_title
        .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());
    if site_title.trim().is_empty() {
        return Err(LoadError::invalid(
            "blog.site_title",
            "must not be empty",
        ));
    }

    let limit = |value: Option<u32>, default: u32, key: &'static str| {
        non_zero_u32(value.unwrap_or(default).into(), key).map(NonZeroU32::get)
    };

    let teaser_chars = limit(
        blog.teaser_chars,
        DEFAULT_TEASER_CHARS,
        "blog.teaser_chars",
    )?;

    Ok(BlogSettings {
        footer_copy: blog
            .footer_copy
            .unwrap_or_else(|| format!("© {site_title}")),
        site_title,
        site_description: blog
            .site_description
            .unwrap_or_else(|| DEFAULT_SITE_DESCRIPTION.to_string()),
        contact_email: blog
            .contact_email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty()),
        timezone,
        popular_posts_limit: limit(
            blog.popular_posts_limit,
            DEFAULT_POPULAR_POSTS_LIMIT,
            "blog.popular_posts_limit",
        )?,
        popular_tags_limit: limit(
            blog.popular_tags_limit,
            DEFAULT_POPULAR_TAGS_LIMIT,
            "blog.popular_tags_limit",
        )?,
        fresh_posts_limit: limit(
            blog.fresh_posts_limit,
            DEFAULT_FRESH_POSTS_LIMIT,
            "blog.fresh_posts_limit",
        )?,
        tag_posts_limit: limit(
            blog.tag_posts_limit,
            DEFAULT_TAG_POSTS_LIMIT,
            "blog.tag_posts_limit",
        )?,
        teaser_chars: teaser_chars as usize,
        media_url_prefix,
    })
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
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMediaSettings {
    directory: Option<PathBuf>,
    url_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBlogSettings {
    site_title: Option<String>,
    site_description: Option<String>,
    footer_copy: Option<String>,
    contact_email: Option<String>,
    timezone: Option<String>,
    popular_posts_limit: Option<u32>,
    popular_tags_limit: Option<u32>,
    fresh_posts_limit: Option<u32>,
    tag_posts_limit: Option<u32>,
    teaser_chars: Option<u32>,
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

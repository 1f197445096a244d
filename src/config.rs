#![forbid(unsafe_code)]

//! Runtime configuration for the grabber server.
//!
//! Values are resolved once at startup into a [`ServerConfig`] and handed to
//! the router. Precedence is CLI override, then process environment, then the
//! `.env` file, then the built-in default.

use anyhow::{Context, Result, anyhow, bail};
use std::{
    collections::HashMap,
    env, fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_GRABBER_PORT: u16 = 5001;
pub const DEFAULT_GRABBER_HOST: &str = "127.0.0.1";
pub const DEFAULT_YTDLP_PROGRAM: &str = "yt-dlp";
/// Folder created under `<home>/Downloads`.
pub const DOWNLOAD_FOLDER_NAME: &str = "TikTok-Downloads";

const HOST_KEY: &str = "GRABBER_HOST";
const PORT_KEY: &str = "GRABBER_PORT";
const DOWNLOAD_DIR_KEY: &str = "GRABBER_DOWNLOAD_DIR";
const YTDLP_KEY: &str = "GRABBER_YTDLP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub download_dir: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub ytdlp_program: PathBuf,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Creates the download directory (and parents) when it is missing.
    pub fn prepare_download_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.download_dir)
            .with_context(|| format!("creating {}", self.download_dir.display()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub download_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ytdlp_program: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_server_config(overrides: ConfigOverrides) -> Result<ServerConfig> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    build_server_config(&file_vars, env_var_string, dirs::home_dir(), overrides)
}

fn build_server_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    home_dir: Option<PathBuf>,
    overrides: ConfigOverrides,
) -> Result<ServerConfig> {
    let download_dir = match overrides
        .download_dir
        .or_else(|| lookup_value(DOWNLOAD_DIR_KEY, file_vars, &env_lookup).map(PathBuf::from))
    {
        Some(dir) => dir,
        None => default_download_dir(home_dir.as_deref()).ok_or_else(|| {
            anyhow!("could not determine the home directory; set {DOWNLOAD_DIR_KEY}")
        })?,
    };

    let port = overrides
        .port
        .or_else(|| {
            lookup_value(PORT_KEY, file_vars, &env_lookup)
                .and_then(|value| value.parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_GRABBER_PORT);

    let host_raw = overrides
        .host
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| lookup_value(HOST_KEY, file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_GRABBER_HOST.to_string());
    let host = parse_loopback_host(&host_raw)?;

    let ytdlp_program = overrides
        .ytdlp_program
        .or_else(|| lookup_value(YTDLP_KEY, file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_YTDLP_PROGRAM));

    Ok(ServerConfig {
        download_dir,
        host,
        port,
        ytdlp_program,
    })
}

/// `<home>/Downloads/TikTok-Downloads`
pub fn default_download_dir(home_dir: Option<&Path>) -> Option<PathBuf> {
    home_dir.map(|home| home.join("Downloads").join(DOWNLOAD_FOLDER_NAME))
}

/// The server only ever listens on the loopback interface.
pub fn parse_loopback_host(value: &str) -> Result<IpAddr> {
    let trimmed = value.trim();
    let host = if trimmed.eq_ignore_ascii_case("localhost") {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        trimmed
            .parse::<IpAddr>()
            .with_context(|| format!("expected a loopback IP address for {HOST_KEY}, got {trimmed:?}"))?
    };
    if !host.is_loopback() {
        bail!("{host} is not a loopback address; the server only binds locally");
    }
    Ok(host)
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| {
        file_vars
            .get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// Parses `KEY=value` lines, tolerating `export`, comments and quotes.
/// A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let vars = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect();
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| {
            value
                .strip_prefix(*quote)
                .and_then(|inner| inner.strip_suffix(*quote))
        })
        .unwrap_or(value)
}

//! Probe definitions loaded from the YAML files of the probe config directory.
//!
//! Every file is resolved on its own: its `global.check_interval` only applies to the
//! probes declared in that file. Zero durations and codes are treated as unset.

use reqwest::{Method, Url};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::probes::ProbeKind;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_STATUS_CODE_ERROR_ABOVE: u16 = 400;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFile {
    #[serde(default)]
    pub global: GlobalSection,
    #[serde(default)]
    pub http: Vec<HttpProbeConfig>,
    #[serde(default)]
    pub ping: Vec<PingProbeConfig>,
    #[serde(default)]
    pub raw_tcp: Vec<RawTcpProbeConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalSection {
    #[serde(default, deserialize_with = "duration")]
    pub check_interval: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HttpProbeConfig {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default, rename = "content-type", alias = "content_type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub expected_status_code: Option<u16>,
    #[serde(default)]
    pub status_code_error_above: Option<u16>,
    #[serde(default)]
    pub verify_certificate: bool,
    #[serde(default, deserialize_with = "duration")]
    pub timeout: Option<Duration>,
    #[serde(default, deserialize_with = "duration")]
    pub check_interval: Option<Duration>,
}

impl HttpProbeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            content_type: None,
            body: None,
            headers: BTreeMap::new(),
            expected_status_code: None,
            status_code_error_above: None,
            verify_certificate: false,
            timeout: None,
            check_interval: None,
        }
    }

    pub fn method(&self) -> &str {
        match self.method.as_deref() {
            Some(method) if !method.is_empty() => method,
            _ => "GET",
        }
    }

    pub fn expected_status(&self) -> Option<u16> {
        self.expected_status_code.filter(|code| *code != 0)
    }

    pub fn error_threshold(&self) -> u16 {
        self.status_code_error_above
            .filter(|code| *code != 0)
            .unwrap_or(DEFAULT_STATUS_CODE_ERROR_ABOVE)
    }

    pub fn request_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let url = Url::parse(&self.url).map_err(|e| format!("invalid url '{}': {}", self.url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported url scheme '{}' in '{}'", url.scheme(), self.url));
        }

        Method::from_bytes(self.method().as_bytes())
            .map_err(|_| format!("invalid http method '{}' for {}", self.method(), self.url))?;

        for (name, code) in [
            ("expected_status_code", self.expected_status()),
            ("status_code_error_above", self.status_code_error_above.filter(|c| *c != 0)),
        ] {
            if let Some(code) = code {
                if !(100..=999).contains(&code) {
                    return Err(format!("{} {} is out of range for {}", name, code, self.url));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PingProbeConfig {
    pub host: String,
    #[serde(default, deserialize_with = "duration")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, deserialize_with = "duration")]
    pub retry_after: Option<Duration>,
    #[serde(default, deserialize_with = "duration")]
    pub check_interval: Option<Duration>,
}

impl PingProbeConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timeout: None,
            retry_count: 0,
            retry_after: None,
            check_interval: None,
        }
    }

    pub fn ping_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_PING_TIMEOUT)
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_after.unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTcpProbeConfig {
    pub host: String,
    #[serde(deserialize_with = "port")]
    pub port: u16,
    #[serde(default, deserialize_with = "duration")]
    pub timeout: Option<Duration>,
    #[serde(default, deserialize_with = "duration")]
    pub check_interval: Option<Duration>,
}

impl RawTcpProbeConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: None,
            check_interval: None,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TCP_TIMEOUT)
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeConfig {
    Http(HttpProbeConfig),
    Ping(PingProbeConfig),
    RawTcp(RawTcpProbeConfig),
}

impl ProbeConfig {
    pub fn kind(&self) -> ProbeKind {
        match self {
            ProbeConfig::Http(_) => ProbeKind::Http,
            ProbeConfig::Ping(_) => ProbeKind::Ping,
            ProbeConfig::RawTcp(_) => ProbeKind::RawTcp,
        }
    }

    /// Label identifying the probe target in the status sink and exported metrics.
    pub fn id(&self) -> String {
        match self {
            ProbeConfig::Http(config) => config.url.clone(),
            ProbeConfig::Ping(config) => config.host.clone(),
            ProbeConfig::RawTcp(config) => config.address(),
        }
    }

    fn check_interval(&self) -> Option<Duration> {
        match self {
            ProbeConfig::Http(config) => config.check_interval,
            ProbeConfig::Ping(config) => config.check_interval,
            ProbeConfig::RawTcp(config) => config.check_interval,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            ProbeConfig::Http(config) => config.validate(),
            ProbeConfig::Ping(config) => {
                if config.host.trim().is_empty() {
                    return Err("ping probe host cannot be empty".to_string());
                }
                Ok(())
            }
            ProbeConfig::RawTcp(config) => {
                if config.host.trim().is_empty() {
                    return Err("raw_tcp probe host cannot be empty".to_string());
                }
                if config.port == 0 {
                    return Err(format!("raw_tcp probe port for {} cannot be 0", config.host));
                }
                Ok(())
            }
        }
    }
}

/// A validated probe with its check interval resolved against the file defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProbe {
    pub interval: Duration,
    pub config: ProbeConfig,
}

impl ResolvedProbe {
    pub fn new(config: ProbeConfig, interval: Duration) -> Self {
        Self { interval, config }
    }

    pub fn kind(&self) -> ProbeKind {
        self.config.kind()
    }

    pub fn id(&self) -> String {
        self.config.id()
    }
}

impl ProbeFile {
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn probe_count(&self) -> usize {
        self.http.len() + self.ping.len() + self.raw_tcp.len()
    }

    /// Validates every probe and resolves intervals: the probe's own interval, then the
    /// file's `global.check_interval`, then `fallback`.
    pub fn resolve(self, source: &str, fallback: Duration) -> Result<Vec<ResolvedProbe>> {
        if fallback.is_zero() && self.global.check_interval.is_none() {
            return Err(AppError::invalid_probe(source, "no check interval available"));
        }
        let default_interval = self.global.check_interval.unwrap_or(fallback);

        let configs = self
            .http
            .into_iter()
            .map(ProbeConfig::Http)
            .chain(self.ping.into_iter().map(ProbeConfig::Ping))
            .chain(self.raw_tcp.into_iter().map(ProbeConfig::RawTcp));

        configs
            .map(|config| {
                config
                    .validate()
                    .map_err(|message| AppError::invalid_probe(source, message))?;
                let interval = config.check_interval().unwrap_or(default_interval);
                Ok(ResolvedProbe::new(config, interval))
            })
            .collect()
    }
}

/// Lists the `*.yaml` files of `dir` in file-name order.
pub fn probe_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn load_probe_file(path: &Path, fallback: Duration) -> Result<Vec<ResolvedProbe>> {
    let source = path.display().to_string();
    let contents = std::fs::read_to_string(path)?;
    let file = ProbeFile::parse(&contents)
        .map_err(|e| AppError::invalid_probe(source.as_str(), e.to_string()))?;

    debug!("Parsed {} probe definitions from {}", file.probe_count(), source);
    file.resolve(&source, fallback)
}

/// Loads and validates every probe file of the directory.
///
/// A directory without any `*.yaml` file is an error: running without probes is pointless.
pub fn load_probe_dir(dir: &Path, fallback: Duration) -> Result<Vec<ResolvedProbe>> {
    let files = probe_files(dir).map_err(|e| {
        AppError::Config(format!("Cannot read probe directory {}: {}", dir.display(), e))
    })?;

    if files.is_empty() {
        return Err(AppError::Config(format!(
            "No *.yaml probe file found in {}",
            dir.display()
        )));
    }

    info!("Found config files: {:?}", files);

    let mut probes = Vec::new();
    for file in &files {
        probes.extend(load_probe_file(file, fallback)?);
    }
    Ok(probes)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Seconds(u64),
    Text(String),
}

fn duration<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<DurationValue>::deserialize(deserializer)?;
    let parsed = match value {
        None => None,
        Some(DurationValue::Seconds(secs)) => Some(Duration::from_secs(secs)),
        Some(DurationValue::Text(text)) if text.trim().is_empty() => None,
        Some(DurationValue::Text(text)) => Some(
            humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)?,
        ),
    };
    Ok(parsed.filter(|d| !d.is_zero()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

fn port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", text))),
    }
}

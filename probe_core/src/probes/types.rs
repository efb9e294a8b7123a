//! Core types and traits shared by the probe executors

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ProbeError;

/// Failure reasons produced by one check. Empty means healthy.
pub type ProbeResult = Vec<String>;

/// Protocol family of a probe, used as the `probe` label of exported metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Http,
    Ping,
    RawTcp,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Http => "http",
            ProbeKind::Ping => "ping",
            ProbeKind::RawTcp => "raw_tcp",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol-specific health check.
///
/// `Ok` carries the failure reasons of a completed check, so a down target is still
/// `Ok`. `Err` means the check could not be carried out at all and its tick is lost.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self) -> Result<ProbeResult, ProbeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_kind_labels() {
        assert_eq!(ProbeKind::Http.to_string(), "http");
        assert_eq!(ProbeKind::Ping.to_string(), "ping");
        assert_eq!(ProbeKind::RawTcp.to_string(), "raw_tcp");
        assert_eq!(serde_json::to_string(&ProbeKind::RawTcp).unwrap(), "\"raw_tcp\"");
    }
}

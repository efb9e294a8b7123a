//! Protocol-specific probe executors
//!
//! Every executor runs a single check against one target and reports failure reasons,
//! an empty list meaning the target is up.
//!
//! - [`HttpProbe`]: one HTTP request, judged on its status code
//! - [`PingProbe`]: bursts of ICMP echo requests with a bounded retry loop
//! - [`RawTcpProbe`]: a TCP handshake with a timeout

pub mod error;
pub mod http;
pub mod ping;
pub mod rawtcp;
pub mod types;

pub use error::ProbeError;
pub use http::HttpProbe;
pub use ping::{PingProbe, PingStats, Pinger, SystemPinger};
pub use rawtcp::RawTcpProbe;
pub use types::{Probe, ProbeKind, ProbeResult};

use std::sync::Arc;

use crate::config::ProbeConfig;

/// Builds the executor matching a probe configuration.
pub fn create_probe(config: &ProbeConfig) -> Arc<dyn Probe> {
    match config {
        ProbeConfig::Http(config) => Arc::new(HttpProbe::new(config.clone())),
        ProbeConfig::Ping(config) => Arc::new(PingProbe::new(config.clone())),
        ProbeConfig::RawTcp(config) => Arc::new(RawTcpProbe::new(config.clone())),
    }
}

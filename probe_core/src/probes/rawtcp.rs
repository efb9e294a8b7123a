//! TCP connection health probing

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{Probe, ProbeError, ProbeResult};
use crate::config::RawTcpProbeConfig;

/// TCP probe that only checks that a connection can be established.
///
/// The stream is dropped as soon as the handshake completes, no data is exchanged.
#[derive(Debug, Clone)]
pub struct RawTcpProbe {
    config: RawTcpProbeConfig,
}

impl RawTcpProbe {
    pub fn new(config: RawTcpProbeConfig) -> Self {
        Self { config }
    }

    pub fn address(&self) -> String {
        self.config.address()
    }
}

#[async_trait]
impl Probe for RawTcpProbe {
    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let address = self.address();
        let connect_timeout = self.config.connect_timeout();
        debug!("TCP probe connecting to {}", address);

        let mut errors = Vec::new();

        match timeout(connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(_stream)) => {
                debug!("TCP port {} is open", self.config.port);
            }
            Ok(Err(io_error)) => {
                errors.push(format!("fail to connect: {}", io_error));
            }
            Err(_elapsed) => {
                errors.push(format!(
                    "fail to connect: connection timed out after {:?}",
                    connect_timeout
                ));
            }
        }

        for reason in &errors {
            warn!("{}", reason);
        }
        debug!("errors: {:?}", errors);

        Ok(errors)
    }
}

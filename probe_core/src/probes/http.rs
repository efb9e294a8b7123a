//! HTTP request health probing

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method};
use tracing::{debug, error, warn};

use super::{Probe, ProbeError, ProbeResult};
use crate::config::HttpProbeConfig;

const PROBE_USER_AGENT: &str = concat!("probe-monitor/", env!("CARGO_PKG_VERSION"));

pub const REQUEST_FAILED: &str = "request failed";

/// HTTP health probe that performs one request per check and validates the status code.
///
/// A fresh client is built for every check and the request asks the server to close the
/// connection, so nothing is pooled between checks.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    config: HttpProbeConfig,
}

impl HttpProbe {
    pub fn new(config: HttpProbeConfig) -> Self {
        Self { config }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Maps a response status to failure reasons.
    ///
    /// An expected status code takes precedence over the error threshold.
    pub fn classify(&self, status: u16) -> ProbeResult {
        let mut errors = Vec::new();

        if let Some(expected) = self.config.expected_status() {
            if status != expected {
                errors.push(format!(
                    "status code not as expected ({} != {})",
                    status, expected
                ));
            }
        } else {
            let threshold = self.config.error_threshold();
            if status >= threshold {
                errors.push(format!("status code {} >= {}", status, threshold));
            }
        }

        errors
    }

    fn headers(&self) -> Result<HeaderMap, String> {
        let mut headers = HeaderMap::new();

        for (name, value) in &self.config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| format!("invalid header name '{}': {}", name, e))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| format!("invalid value for header '{}': {}", name, e))?;
            headers.insert(name, value);
        }

        if let Some(content_type) = self.config.content_type.as_deref().filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(content_type)
                .map_err(|e| format!("invalid content type '{}': {}", content_type, e))?;
            headers.insert(CONTENT_TYPE, value);
        }

        headers.insert(USER_AGENT, HeaderValue::from_static(PROBE_USER_AGENT));
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        Ok(headers)
    }

    fn build_request(&self) -> Result<reqwest::RequestBuilder, String> {
        let method = Method::from_bytes(self.config.method().as_bytes())
            .map_err(|e| format!("invalid method '{}': {}", self.config.method(), e))?;

        let client = Client::builder()
            .timeout(self.config.request_timeout())
            .danger_accept_invalid_certs(!self.config.verify_certificate)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| format!("cannot build http client: {}", e))?;

        let mut request = client
            .request(method, self.config.url.as_str())
            .headers(self.headers()?);

        if let Some(body) = &self.config.body {
            request = request.body(body.clone());
        }

        Ok(request)
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        debug!("HTTP probe requesting {} {}", self.config.method(), self.config.url);

        let request = match self.build_request() {
            Ok(request) => request,
            Err(e) => {
                error!("Fail to create request: {}", e);
                warn!("{}", REQUEST_FAILED);
                return Ok(vec![REQUEST_FAILED.to_string()]);
            }
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Fail to do request: {}", e);
                warn!("{}", REQUEST_FAILED);
                return Ok(vec![REQUEST_FAILED.to_string()]);
            }
        };

        let status = response.status().as_u16();
        debug!("Status code: {}", status);

        let errors = self.classify(status);
        for reason in &errors {
            warn!("{}", reason);
        }
        debug!("errors: {:?}", errors);

        Ok(errors)
    }
}

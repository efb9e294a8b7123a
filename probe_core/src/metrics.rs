//! Prometheus exposition of the probe status gauge

use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::status::StatusSink;

pub const UP_METRIC: &str = "probe_monitor_up";

/// Renders the status sink as the `probe_monitor_up{probe, id}` gauge.
#[derive(Clone)]
pub struct MetricsExporter {
    registry: Registry,
    up: IntGaugeVec,
    status: StatusSink,
}

impl MetricsExporter {
    pub fn new(status: StatusSink) -> Result<Self> {
        let registry = Registry::new();
        let up = IntGaugeVec::new(
            Opts::new(UP_METRIC, "Whether the last check of the probe succeeded (1) or failed (0)"),
            &["probe", "id"],
        )?;
        registry.register(Box::new(up.clone()))?;

        Ok(Self { registry, up, status })
    }

    /// Copies the current snapshot into the gauge and encodes the registry as text.
    pub fn render(&self) -> Result<String> {
        for entry in self.status.snapshot() {
            self.up
                .with_label_values(&[entry.probe.as_str(), entry.id.as_str()])
                .set(i64::from(entry.value));
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;

        String::from_utf8(buffer)
            .map_err(|e| anyhow::anyhow!("metrics are not utf-8: {}", e).into())
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::ProbeKind;
    use crate::status::ProbeStatus;

    #[test]
    fn test_render_empty_sink() {
        let exporter = MetricsExporter::new(StatusSink::new()).unwrap();
        let text = exporter.render().unwrap();
        assert!(!text.contains("probe_monitor_up{"));
    }

    #[test]
    fn test_render_gauges() {
        let sink = StatusSink::new();
        let exporter = MetricsExporter::new(sink.clone()).unwrap();

        sink.set(ProbeKind::Http, "https://example.com/health", ProbeStatus::Up);
        sink.set(ProbeKind::RawTcp, "db:5432", ProbeStatus::Down);

        let text = exporter.render().unwrap();
        let health = "probe_monitor_up{id=\"https://example.com/health\",probe=\"http\"}";
        assert!(text.contains("# TYPE probe_monitor_up gauge"));
        assert!(text.contains(&format!("{} 1", health)));
        assert!(text.contains("probe_monitor_up{id=\"db:5432\",probe=\"raw_tcp\"} 0"));

        sink.set(ProbeKind::Http, "https://example.com/health", ProbeStatus::Down);
        let text = exporter.render().unwrap();
        assert!(text.contains(&format!("{} 0", health)));
    }

    #[test]
    fn test_content_type() {
        let exporter = MetricsExporter::new(StatusSink::new()).unwrap();
        assert!(exporter.content_type().starts_with("text/plain"));
    }
}

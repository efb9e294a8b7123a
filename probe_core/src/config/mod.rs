pub mod probes;
pub mod settings;

pub use probes::{
    load_probe_dir, load_probe_file, HttpProbeConfig, PingProbeConfig, ProbeConfig, ProbeFile,
    RawTcpProbeConfig, ResolvedProbe,
};
pub use settings::{AppConfig, MonitoringConfig, ServerConfig};

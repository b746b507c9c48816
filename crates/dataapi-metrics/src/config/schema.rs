use serde::{Deserialize, Deserializer};
use dataapi_core::error::{DataApiError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataApiConfig {
    pub version: u32,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DataApiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(DataApiError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        // An unused port is never parsed.
        if self.metrics.enable_metrics {
            self.metrics.validate()?;
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Port the `/metrics` endpoint listens on. Accepts `"9100"` or `9100`.
    #[serde(default = "default_http_port", deserialize_with = "port_string")]
    pub http_port: String,

    /// When false the exporter is never started.
    #[serde(default)]
    pub enable_metrics: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            enable_metrics: false,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        self.port().map(|_| ())
    }

    /// Parsed listen port.
    pub fn port(&self) -> Result<u16> {
        match self.http_port.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(DataApiError::Config(format!(
                "metrics.http_port must be a port in 1..=65535, got {:?}",
                self.http_port
            ))),
            Ok(port) => Ok(port),
        }
    }
}

fn default_http_port() -> String {
    "9100".into()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Num(u64),
    Text(String),
}

fn port_string<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match PortValue::deserialize(d)? {
        PortValue::Num(n) => n.to_string(),
        PortValue::Text(s) => s,
    })
}

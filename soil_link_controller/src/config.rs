// Controller configuration.
//
// `ControllerConfig` is loaded from an optional JSON file and then patched by
// command-line flags (see `main.rs`). Every field has a default, so an empty
// object `{}` is a valid file; the only hard requirement is that at least one
// device port ends up set. A port of 0 means "not connected", the same as
// leaving it out.
//
// The runtime subset the controller threads need is split out as
// `RelaySettings` by `settings()`.

use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use soil_link_protocol::DeviceSlot;
use thiserror::Error;

use crate::controller::{
    DEFAULT_COAP_MOISTURE, DEFAULT_GATEWAY_REPLY_LEN, DEFAULT_PREAMBLE_LEN, RelaySettings,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("must provide at least one device port")]
    NoDevices,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Address the emulated devices listen on.
    pub host: IpAddr,
    pub monitor_port: Option<u16>,
    pub actuator_port: Option<u16>,
    pub gateway_port: Option<u16>,
    /// Bytes discarded from each device before protocol traffic starts.
    pub preamble_len: usize,
    /// Bytes read back from the gateway per CoAP request.
    pub gateway_reply_len: usize,
    /// Moisture value sent by the one-shot `coap` shell command and by the
    /// gateway experiment.
    pub coap_moisture: u32,
    /// JSON-lines file that gateway experiment summaries are appended to.
    pub report_path: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            monitor_port: None,
            actuator_port: None,
            gateway_port: None,
            preamble_len: DEFAULT_PREAMBLE_LEN,
            gateway_reply_len: DEFAULT_GATEWAY_REPLY_LEN,
            coap_moisture: DEFAULT_COAP_MOISTURE,
            report_path: None,
        }
    }
}

impl ControllerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    fn port(&self, slot: DeviceSlot) -> Option<u16> {
        let port = match slot {
            DeviceSlot::Monitor => self.monitor_port,
            DeviceSlot::Actuator => self.actuator_port,
            DeviceSlot::Gateway => self.gateway_port,
        };
        port.filter(|&p| p != 0)
    }

    /// Where the device for `slot` listens, if it is configured.
    pub fn device_addr(&self, slot: DeviceSlot) -> Option<SocketAddr> {
        self.port(slot).map(|port| SocketAddr::new(self.host, port))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if DeviceSlot::ALL.iter().all(|&slot| self.port(slot).is_none()) {
            return Err(ConfigError::NoDevices);
        }
        Ok(())
    }

    pub fn settings(&self) -> RelaySettings {
        RelaySettings {
            preamble_len: self.preamble_len,
            gateway_reply_len: self.gateway_reply_len,
            coap_moisture: self.coap_moisture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = ControllerConfig::from_json("{}").unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.settings(), RelaySettings::default());
    }

    #[test]
    fn needs_at_least_one_port() {
        let config = ControllerConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoDevices)));

        let config = ControllerConfig::from_json(r#"{"monitor_port": 0}"#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoDevices)));

        let config = ControllerConfig::from_json(r#"{"gateway_port": 7003}"#).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn device_addresses_use_host() {
        let config = ControllerConfig::from_json(
            r#"{"host": "127.0.0.2", "monitor_port": 7001, "actuator_port": 0}"#,
        )
        .unwrap();
        assert_eq!(
            config.device_addr(DeviceSlot::Monitor),
            Some("127.0.0.2:7001".parse().unwrap())
        );
        assert_eq!(config.device_addr(DeviceSlot::Actuator), None);
        assert_eq!(config.device_addr(DeviceSlot::Gateway), None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = ControllerConfig::from_json(r#"{"monitor": 7001}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.json");
        fs::write(
            &path,
            r#"{"actuator_port": 7002, "preamble_len": 0, "report_path": "out.jsonl"}"#,
        )
        .unwrap();

        let config = ControllerConfig::load(&path).unwrap();
        assert_eq!(config.actuator_port, Some(7002));
        assert_eq!(config.settings().preamble_len, 0);
        assert_eq!(config.report_path, Some(PathBuf::from("out.jsonl")));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ControllerConfig::load(Path::new("/nonexistent/controller.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/controller.json"));
    }
}

//! Endpoint Descriptors and Pool Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identity of a slave-facing communication interface.
///
/// Equality and hashing over the full descriptor make this the key for
/// connection pools and per-endpoint configuration. The unit id is not part
/// of the endpoint; several slaves behind one gateway share a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Udp { host: String, port: u16 },
    Serial { path: String, baud_rate: u32 },
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        Self::Udp {
            host: host.into(),
            port,
        }
    }

    pub fn serial(path: impl Into<String>, baud_rate: u32) -> Self {
        Self::Serial {
            path: path.into(),
            baud_rate,
        }
    }

    fn is_serial(&self) -> bool {
        matches!(self, Self::Serial { .. })
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Udp { host, port } => write!(f, "udp://{host}:{port}"),
            Self::Serial { path, baud_rate } => write!(f, "serial://{path}@{baud_rate}"),
        }
    }
}

/// Per-endpoint connection pool settings.
///
/// Applied to acquisitions made after the configuration change; transactions
/// already holding a connection finish under the old settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPoolConfiguration {
    /// Concurrent connections to the endpoint. 1 serializes all
    /// transactions, which most serial devices and many TCP gateways need.
    pub max_connections: usize,
    /// Timeout for establishing one connection
    pub connect_timeout_ms: u64,
    /// Wait between consecutive connect attempts within one acquisition
    pub reconnect_delay_ms: u64,
    /// Minimum quiet time between consecutive transactions on the endpoint
    pub inter_transaction_delay_ms: u64,
    /// Connection attempts per acquisition
    pub connect_max_tries: u32,
}

impl EndpointPoolConfiguration {
    /// Defaults matching common device expectations: serial buses need a
    /// longer quiet gap expressed in frame silence, TCP and UDP a shorter
    /// fixed one.
    pub fn default_for(endpoint: &Endpoint) -> Self {
        Self {
            max_connections: 1,
            connect_timeout_ms: 5000,
            reconnect_delay_ms: 1000,
            inter_transaction_delay_ms: if endpoint.is_serial() { 35 } else { 60 },
            connect_max_tries: 1,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn inter_transaction_delay(&self) -> Duration {
        Duration::from_millis(self.inter_transaction_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::tcp("10.0.0.5", 502).to_string(), "tcp://10.0.0.5:502");
        assert_eq!(
            Endpoint::serial("/dev/ttyUSB0", 9600).to_string(),
            "serial:///dev/ttyUSB0@9600"
        );
    }

    #[test]
    fn test_endpoint_as_map_key() {
        let mut map = HashMap::new();
        map.insert(Endpoint::tcp("a", 502), 1);
        map.insert(Endpoint::udp("a", 502), 2);
        assert_eq!(map.get(&Endpoint::tcp("a", 502)), Some(&1));
        assert_eq!(map.get(&Endpoint::udp("a", 502)), Some(&2));
        assert_eq!(map.get(&Endpoint::tcp("a", 503)), None);
    }

    #[test]
    fn test_default_inter_transaction_delay() {
        let tcp = EndpointPoolConfiguration::default_for(&Endpoint::tcp("a", 502));
        assert_eq!(tcp.inter_transaction_delay(), Duration::from_millis(60));
        assert_eq!(tcp.max_connections, 1);
        let udp = EndpointPoolConfiguration::default_for(&Endpoint::udp("a", 502));
        assert_eq!(udp.inter_transaction_delay(), Duration::from_millis(60));
        let serial =
            EndpointPoolConfiguration::default_for(&Endpoint::serial("/dev/ttyS0", 19200));
        assert_eq!(serial.inter_transaction_delay(), Duration::from_millis(35));
    }
}

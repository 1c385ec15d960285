//! Device sessions: the connection seam and its TCP implementation.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info};

use super::frame::Frame;
use crate::config::DeviceConfig;
use crate::error::{DriverError, Result};

/// An established, logged-in connection to the device.
#[async_trait]
pub trait Session: Send {
    /// Write one complete frame.
    async fn write(&mut self, frame: &Frame) -> Result<()>;
}

/// Opens sessions.
///
/// Implementations must write `handshake` as the very first bytes of the new
/// connection, before the session is handed back.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, handshake: Frame) -> Result<Box<dyn Session>>;
}

/// Plain TCP connector.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    timeout_duration: Duration,
}

impl TcpConnector {
    pub fn new(host: &str, port: u16, timeout_duration: Duration) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            timeout_duration,
        }
    }

    pub fn from_config(device: &DeviceConfig) -> Self {
        Self::new(&device.host, device.port, Duration::from_secs(device.timeout_secs))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, handshake: Frame) -> Result<Box<dyn Session>> {
        let addr = &self.addr;
        info!("TCP connecting to {addr} (timeout={:?})", self.timeout_duration);

        let stream = timeout(self.timeout_duration, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                error!("Connection timeout to {addr}");
                DriverError::Timeout(format!("Connection timeout to {addr}"))
            })?
            .map_err(|e| {
                error!("Failed to connect to {addr}: {e}");
                DriverError::ConnectionFailed(format!("Failed to connect to {addr}: {e}"))
            })?;

        let mut session = TcpSession {
            stream,
            timeout_duration: self.timeout_duration,
        };
        session.write(&handshake).await?;
        info!("Connected to {addr}, login sent");

        Ok(Box::new(session))
    }
}

/// Session over a TCP stream.
pub struct TcpSession {
    stream: TcpStream,
    timeout_duration: Duration,
}

#[async_trait]
impl Session for TcpSession {
    async fn write(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.as_bytes();
        debug!("TX kind={} ({} bytes): {:02X?}", frame.kind(), bytes.len(), &bytes[..bytes.len().min(32)]);

        timeout(self.timeout_duration, async {
            self.stream.write_all(bytes).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| DriverError::Timeout("Write timeout".to_string()))?
        .map_err(|e| {
            error!("Write failed: {e}");
            DriverError::ConnectionFailed(format!("Write failed: {e}"))
        })
    }
}

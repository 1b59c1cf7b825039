//! Relay output sinks

use std::future::Future;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::error::RelayError;

/// Destination for relayed lines. Writes carry no backpressure towards the
/// forwarding task.
pub trait RelaySink: Send {
    fn write(&mut self, payload: &[u8]) -> impl Future<Output = Result<(), RelayError>> + Send;
}

/// Writes payload bytes unchanged to a byte stream
pub struct RawSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> RawSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl RawSink<SerialStream> {
    /// Open a serial device as the monitor link
    pub fn open_serial(device: &str, baud_rate: u32) -> Result<Self, RelayError> {
        let port = tokio_serial::new(device, baud_rate).open_native_async()?;
        debug!(device, baud_rate, "serial sink opened");
        Ok(Self::new(port))
    }
}

impl<W: AsyncWrite + Unpin + Send> RelaySink for RawSink<W> {
    async fn write(&mut self, payload: &[u8]) -> Result<(), RelayError> {
        self.writer.write_all(payload).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Emits each line as a log record
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl RelaySink for LogSink {
    async fn write(&mut self, payload: &[u8]) -> Result<(), RelayError> {
        let text = String::from_utf8_lossy(payload);
        info!(target: "canspy::monitor", "{}", text.trim_end_matches('\r'));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_raw_sink_writes_bytes_unchanged() {
        let mut sink = RawSink::new(Vec::new());
        sink.write(b"t1232aabb\r").await.unwrap();
        sink.write(b"r7ff3\r").await.unwrap();
        assert_eq!(sink.get_ref().as_slice(), b"t1232aabb\rr7ff3\r");
    }

    #[tokio::test]
    async fn test_log_sink_accepts_lines() {
        let mut sink = LogSink;
        sink.write(b"t0010\r").await.unwrap();
    }
}

//! Relay task

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::RelayReceiver;
use crate::error::RelayError;
use crate::message::{RelayMessage, TextBuffer};
use crate::sink::RelaySink;

/// How the relay task waits for lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveMode {
    /// Drain the inbox once per period, never wait on the channel
    #[default]
    NonBlocking,
    /// Wait without time bound for each line
    Blocking,
}

/// Relay task configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub mode: ReceiveMode,
    /// Sleep between polls in non-blocking mode (milliseconds)
    pub poll_period_ms: u64,
    /// Inbox capacity in messages
    pub inbox_depth: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::serial()
    }
}

impl RelayConfig {
    /// Polling relay feeding a raw serial link
    pub fn serial() -> Self {
        Self {
            mode: ReceiveMode::NonBlocking,
            poll_period_ms: 100,
            inbox_depth: 16,
        }
    }

    /// Blocking relay feeding the log
    pub fn logging() -> Self {
        Self {
            mode: ReceiveMode::Blocking,
            ..Self::serial()
        }
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }
}

/// Result of one receive step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing pending
    Idle,
    /// A line of this many bytes was written to the sink
    Delivered(usize),
    /// A message was denied or malformed and dropped
    Rejected,
    /// The sink refused the line
    SinkFailed,
}

/// Moves lines from the relay channel to a sink
pub struct RelayTask<S: RelaySink> {
    config: RelayConfig,
    receiver: RelayReceiver,
    sink: S,
    lost_seen: u64,
    loss_reports: u64,
}

impl<S: RelaySink> RelayTask<S> {
    pub fn new(config: RelayConfig, receiver: RelayReceiver, sink: S) -> Self {
        Self {
            config,
            receiver,
            sink,
            lost_seen: 0,
            loss_reports: 0,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Number of "frame lost" notices emitted so far
    pub fn loss_reports(&self) -> u64 {
        self.loss_reports
    }

    /// One non-blocking receive step.
    ///
    /// Only [`RelayError::Disconnected`] is returned as an error; denied or
    /// malformed messages are logged and reported as [`PollOutcome::Rejected`].
    pub async fn poll_once(&mut self) -> Result<PollOutcome, RelayError> {
        self.report_losses();
        match self.receiver.try_recv() {
            Ok(None) => Ok(PollOutcome::Idle),
            Ok(Some(message)) => self.handle(Ok(message)).await,
            Err(e) => self.handle(Err(e)).await,
        }
    }

    /// Drain what is pending without waiting: at most `inbox_depth` receive
    /// steps, stopping at the first empty poll. Returns the number of lines
    /// delivered.
    pub async fn poll_cycle(&mut self) -> Result<usize, RelayError> {
        let mut delivered = 0;
        for _ in 0..self.config.inbox_depth.max(1) {
            match self.poll_once().await? {
                PollOutcome::Idle => break,
                PollOutcome::Delivered(_) => delivered += 1,
                PollOutcome::Rejected | PollOutcome::SinkFailed => {}
            }
        }
        Ok(delivered)
    }

    /// One blocking receive step: waits for the next message
    pub async fn wait_once(&mut self) -> Result<PollOutcome, RelayError> {
        let result = self.receiver.recv().await;
        self.report_losses();
        self.handle(result).await
    }

    /// Run until the sending side is gone
    pub async fn run(mut self) -> Result<(), RelayError> {
        info!(
            mode = ?self.config.mode,
            peer = %self.receiver.peer(),
            "relay task started"
        );

        loop {
            let step = match self.config.mode {
                ReceiveMode::NonBlocking => self.poll_cycle().await.map(|_| ()),
                ReceiveMode::Blocking => self.wait_once().await.map(|_| ()),
            };

            match step {
                Ok(_) => {}
                Err(RelayError::Disconnected) => {
                    info!("relay peer disconnected, stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }

            if self.config.mode == ReceiveMode::NonBlocking {
                tokio::time::sleep(self.config.poll_period()).await;
            }
        }
    }

    async fn handle(
        &mut self,
        received: Result<RelayMessage, RelayError>,
    ) -> Result<PollOutcome, RelayError> {
        let message = match received {
            Ok(message) => message,
            Err(RelayError::Disconnected) => return Err(RelayError::Disconnected),
            Err(e) => {
                warn!(error = %e, "relay message rejected");
                return Ok(PollOutcome::Rejected);
            }
        };

        let text = TextBuffer::from_message(&message);
        match self.sink.write(text.as_bytes()).await {
            Ok(()) => {
                debug!(line = %text.as_text().trim_end(), "line relayed");
                Ok(PollOutcome::Delivered(message.len()))
            }
            Err(e) => {
                warn!(error = %e, "relay sink write failed");
                Ok(PollOutcome::SinkFailed)
            }
        }
    }

    fn report_losses(&mut self) {
        let lost = self.receiver.lost();
        if lost > self.lost_seen {
            warn!(dropped = lost - self.lost_seen, "at least one frame was lost");
            self.lost_seen = lost;
            self.loss_reports += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RelaySender;
    use crate::directory::TaskDirectory;
    use crate::message::MAX_PAYLOAD;
    use crate::sink::RawSink;
    use crate::{FORWARDER_TASK, RELAY_TASK};
    use tokio::io::AsyncReadExt;

    fn pair(depth: usize) -> (TaskDirectory, RelaySender, RelayReceiver) {
        let directory = TaskDirectory::new();
        let spy = directory.register(FORWARDER_TASK, depth).unwrap();
        let snif = directory.register(RELAY_TASK, depth).unwrap();
        let tx = spy.connect(RELAY_TASK).unwrap();
        let rx = snif.listen(FORWARDER_TASK).unwrap();
        (directory, tx, rx)
    }

    #[tokio::test]
    async fn test_poll_once_delivers_to_sink() {
        let (_dir, tx, rx) = pair(4);
        let mut task = RelayTask::new(RelayConfig::serial(), rx, RawSink::new(Vec::new()));

        assert_eq!(task.poll_once().await.unwrap(), PollOutcome::Idle);

        tx.try_send(b"t1232aabb\r").unwrap();
        assert_eq!(task.poll_once().await.unwrap(), PollOutcome::Delivered(10));
        assert_eq!(task.sink().get_ref().as_slice(), b"t1232aabb\r");
    }

    #[tokio::test]
    async fn test_full_size_payload_delivered() {
        let (_dir, tx, rx) = pair(4);
        let mut task = RelayTask::new(RelayConfig::serial(), rx, RawSink::new(Vec::new()));

        let payload = [b'7'; MAX_PAYLOAD];
        tx.try_send(&payload).unwrap();
        assert_eq!(
            task.poll_once().await.unwrap(),
            PollOutcome::Delivered(MAX_PAYLOAD)
        );
        assert_eq!(task.sink().get_ref().as_slice(), &payload[..]);
    }

    #[tokio::test]
    async fn test_denied_message_skipped() {
        let directory = TaskDirectory::new();
        let spy = directory.register(FORWARDER_TASK, 4).unwrap();
        let other = directory.register("OTHER", 4).unwrap();
        let snif = directory.register(RELAY_TASK, 4).unwrap();
        let rx = snif.listen(FORWARDER_TASK).unwrap();
        let mut task = RelayTask::new(RelayConfig::serial(), rx, RawSink::new(Vec::new()));

        other.connect(RELAY_TASK).unwrap().try_send(b"bogus\r").unwrap();
        spy.connect(RELAY_TASK).unwrap().try_send(b"t0010\r").unwrap();

        assert_eq!(task.poll_once().await.unwrap(), PollOutcome::Rejected);
        assert_eq!(task.poll_once().await.unwrap(), PollOutcome::Delivered(6));
        assert_eq!(task.sink().get_ref().as_slice(), b"t0010\r");
    }

    #[tokio::test]
    async fn test_loss_reported_once_per_burst() {
        let (_dir, tx, rx) = pair(1);
        let mut task = RelayTask::new(RelayConfig::serial(), rx, RawSink::new(Vec::new()));

        tx.try_send(b"a").unwrap();
        assert!(tx.try_send(b"b").is_err());
        assert!(tx.try_send(b"c").is_err());

        task.poll_once().await.unwrap();
        task.poll_once().await.unwrap();
        assert_eq!(task.loss_reports(), 1);

        tx.try_send(b"d").unwrap();
        assert!(tx.try_send(b"e").is_err());
        task.poll_once().await.unwrap();
        assert_eq!(task.loss_reports(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_non_blocking() {
        let (directory, tx, rx) = pair(4);
        let (writer, mut reader) = tokio::io::duplex(256);
        let task = RelayTask::new(RelayConfig::serial(), rx, RawSink::new(writer));
        let handle = tokio::spawn(task.run());

        tx.try_send(b"t1232aabb\r").unwrap();
        tx.try_send(b"r7ff3\r").unwrap();

        let mut buf = [0u8; 16];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"t1232aabb\rr7ff3\r");

        drop(tx);
        drop(directory);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_poll_cycle_stops_when_inbox_empty() {
        let (_dir, tx, rx) = pair(4);
        let mut task = RelayTask::new(RelayConfig::serial(), rx, RawSink::new(Vec::new()));

        assert_eq!(task.poll_cycle().await.unwrap(), 0);
        tx.try_send(b"t1000\r").unwrap();
        tx.try_send(b"t2000\r").unwrap();
        assert_eq!(task.poll_cycle().await.unwrap(), 2);
        assert_eq!(task.sink().get_ref().as_slice(), b"t1000\rt2000\r");
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_of_lines_relayed_within_one_period() {
        let config = RelayConfig::serial();
        let (directory, tx, rx) = pair(config.inbox_depth);
        let (writer, mut reader) = tokio::io::duplex(1024);
        let start = tokio::time::Instant::now();
        let task = RelayTask::new(config.clone(), rx, RawSink::new(writer));
        let handle = tokio::spawn(task.run());

        // Two queues of eight hold seven frames each
        let lines: Vec<String> = (0..14).map(|id| format!("t{:03x}0\r", id)).collect();
        let expected = lines.concat();
        let mut buf = vec![0u8; expected.len()];

        for line in &lines {
            tx.try_send(line.as_bytes()).unwrap();
        }
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, expected.as_bytes());
        assert!(start.elapsed() < config.poll_period());

        for line in &lines {
            tx.try_send(line.as_bytes()).unwrap();
        }
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, expected.as_bytes());
        assert!(start.elapsed() <= config.poll_period());
        assert_eq!(tx.lost(), 0);

        drop(tx);
        drop(directory);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_blocking() {
        let (directory, tx, rx) = pair(4);
        let (writer, mut reader) = tokio::io::duplex(256);
        let task = RelayTask::new(RelayConfig::logging(), rx, RawSink::new(writer));
        let handle = tokio::spawn(task.run());

        tx.try_send(b"R01abcdef0\r").unwrap();

        let mut buf = [0u8; 11];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"R01abcdef0\r");

        drop(tx);
        drop(directory);
        handle.await.unwrap().unwrap();
    }
}

use crate::config::{Config, DEFAULT_BAUD, DEFAULT_TIMEOUT_MS};
use crate::error::TerminalError;
use log::{debug, info, trace};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Settings used to open a serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    pub path: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl PortSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn from_config(path: impl Into<String>, config: &Config) -> Self {
        Self::new(path)
            .with_baud_rate(config.baud)
            .with_timeout(config.timeout)
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The open, exclusive connection to a serial device.
pub struct SerialSession {
    settings: PortSettings,
    stream: SerialStream,
}

impl SerialSession {
    pub fn open(settings: PortSettings) -> Result<Self, TerminalError> {
        // Async streams ignore the builder timeout; the reader applies
        // `settings.timeout` itself.
        let stream = tokio_serial::new(&settings.path, settings.baud_rate)
            .open_native_async()
            .map_err(|source| TerminalError::PortOpen {
                port: settings.path.clone(),
                source,
            })?;

        info!(
            "Opened serial port {} at {} baud",
            settings.path, settings.baud_rate
        );

        Ok(Self { settings, stream })
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    /// Splits the session into its inbound and outbound directions.
    ///
    /// The halves share the underlying handle and coordinate access to it
    /// internally, so the reader and the writer can live on different tasks
    /// without a lock of our own. The handle is released once both halves
    /// are dropped.
    pub fn into_split(self) -> (ReadHalf<SerialStream>, SessionWriter<WriteHalf<SerialStream>>) {
        let (reader, writer) = tokio::io::split(self.stream);
        (reader, SessionWriter::new(self.settings.path, writer))
    }
}

/// Outbound direction of a session.
pub struct SessionWriter<W> {
    port: String,
    writer: W,
}

impl<W: AsyncWrite + Unpin> SessionWriter<W> {
    pub fn new(port: impl Into<String>, writer: W) -> Self {
        Self {
            port: port.into(),
            writer,
        }
    }

    /// Sends `text` followed by a newline. Text that is not valid UTF-8 is
    /// rejected before anything reaches the device.
    pub async fn write_line(&mut self, text: &[u8]) -> Result<(), TerminalError> {
        let text = std::str::from_utf8(text)?;

        trace!("Sending line to {}: {}", self.port, text);
        self.writer
            .write_all(format!("{}\n", text).as_bytes())
            .await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Flushes pending output and releases this half of the handle.
    pub async fn close(mut self) -> Result<(), TerminalError> {
        self.writer.shutdown().await?;
        debug!("Closed outbound side of {}", self.port);
        Ok(())
    }
}

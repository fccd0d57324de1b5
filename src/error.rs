use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("No serial ports found.")]
    NoPortsFound,

    #[error("Invalid choice '{0}'. Exiting.")]
    InvalidSelection(String),

    #[error("Error opening serial port {port}: {source}")]
    PortOpen {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("Cannot open log file {path:?}: {source}")]
    LogOpen {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot send message due to encoding issue: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Read error: {0}")]
    Read(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log file is already closed")]
    LogClosed,
}

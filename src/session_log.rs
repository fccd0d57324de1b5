use crate::error::TerminalError;
use crate::log_record::LogRecord;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Append-only text log of received lines.
///
/// The file is opened once and held until [`SessionLog::close`]. Every record
/// is flushed as soon as it is written so an abrupt exit loses nothing that
/// was already displayed.
pub struct SessionLog {
    path: PathBuf,
    file: Option<File>,
}

impl SessionLog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TerminalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| TerminalError::LogOpen {
                path: path.clone(),
                source,
            })?;

        debug!("Opened log file {:?}", path);

        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&mut self, record: &LogRecord) -> Result<(), TerminalError> {
        let file = self.file.as_mut().ok_or(TerminalError::LogClosed)?;
        // One write per record keeps lines whole in the file.
        file.write_all(format!("{}\n", record).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Flushes and releases the file. Later calls do nothing.
    pub async fn close(&mut self) -> Result<(), TerminalError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            debug!("Closed log file {:?}", self.path);
        }
        Ok(())
    }
}

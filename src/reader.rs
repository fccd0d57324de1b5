use crate::error::TerminalError;
use crate::log_record::LogRecord;
use crate::session_log::SessionLog;
use colored::Colorize;
use log::{error, info, trace, warn};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Turns one raw line into display text. Undecodable bytes become U+FFFD and
/// trailing whitespace (including `\r\n`) is dropped. Blank lines yield `None`.
pub fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

pub fn display_record(display: &mut impl Write, record: &LogRecord) -> std::io::Result<()> {
    // Leading newline moves past a pending "> " prompt.
    writeln!(display, "\n[{}] {}", record.timestamp, record.line.cyan())?;
    display.flush()
}

/// Reads lines from the device until the stream ends or a read fails.
///
/// A line ends at `\n`, or when `read_timeout` passes with bytes pending, so
/// prompts the device leaves unterminated still show up. Each non-empty line
/// is stamped once; the same record is shown on `display` and appended to
/// `log`, so both carry the same timestamp.
pub async fn run<R, D>(
    reader: R,
    log: Arc<Mutex<SessionLog>>,
    mut display: D,
    read_timeout: Duration,
) -> Result<(), TerminalError>
where
    R: AsyncRead + Unpin,
    D: Write,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();

    loop {
        // read_until keeps what it consumed in `buffer` when cancelled.
        let read = timeout(read_timeout, reader.read_until(b'\n', &mut buffer)).await;
        match read {
            Err(_) if buffer.is_empty() => continue,
            Err(_) => trace!("Read timeout with {} pending bytes", buffer.len()),
            Ok(Ok(0)) if buffer.is_empty() => {
                info!("Serial stream ended");
                return Ok(());
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(TerminalError::Read(e)),
        }

        if let Some(line) = decode_line(&buffer) {
            trace!("Received line: {}", line);
            let record = LogRecord::now(line);

            if let Err(e) = display_record(&mut display, &record) {
                warn!("Failed to display received line: {}", e);
            }
            if let Err(e) = log.lock().await.append(&record).await {
                warn!("Failed to write log record: {}", e);
            }
        }
        buffer.clear();
    }
}

/// Starts the reader in the background. The handle is never awaited for
/// completion; teardown aborts it.
pub fn spawn<R>(reader: R, log: Arc<Mutex<SessionLog>>, read_timeout: Duration) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match run(reader, log, std::io::stdout(), read_timeout).await {
            Ok(()) => {
                println!("\n{}", "Serial device closed the connection.".yellow());
            }
            Err(e) => {
                error!("Reader task stopped: {}", e);
                println!("\n{}", e.to_string().red());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::tempdir;
    use tokio::io::{AsyncWriteExt, ReadBuf};

    const TIMEOUT: Duration = Duration::from_millis(100);

    /// Yields its data once, then fails every read.
    struct FailingReader {
        data: Option<&'static [u8]>,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device unplugged",
                ))),
            }
        }
    }

    fn is_timestamp(s: &str) -> bool {
        chrono::NaiveTime::parse_from_str(s, "%H:%M:%S").is_ok() && s.len() == 8
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"hello\r\n"), Some("hello".to_string()));
        assert_eq!(decode_line(b"  indented \t\n"), Some("  indented".to_string()));
        assert_eq!(decode_line(b"\r\n"), None);
        assert_eq!(decode_line(b"   "), None);
        assert_eq!(decode_line(b"temp\xff=21\n"), Some("temp\u{fffd}=21".to_string()));
    }

    #[tokio::test]
    async fn test_each_line_logged_once_with_display_timestamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("serial_log.txt");
        let log = Arc::new(Mutex::new(SessionLog::open(&path).await.unwrap()));

        let (mut device, host) = tokio::io::duplex(256);
        device
            .write_all(b"boot ok\r\n\r\n  \nsensor=\xff42\nlast line without newline")
            .await
            .unwrap();
        drop(device);

        let mut display = Vec::new();
        run(host, Arc::clone(&log), &mut display, TIMEOUT).await.unwrap();
        log.lock().await.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let logged: Vec<&str> = content.lines().collect();
        assert_eq!(logged.len(), 3);
        assert!(content.ends_with('\n'));

        let expected = ["boot ok", "sensor=\u{fffd}42", "last line without newline"];
        for (entry, text) in logged.iter().zip(expected) {
            let (timestamp, line) = entry.split_at(8);
            assert!(is_timestamp(timestamp), "bad timestamp in {:?}", entry);
            assert_eq!(line, format!(" {}", text));
        }

        let shown = String::from_utf8(display).unwrap();
        for entry in &logged {
            let timestamp = &entry[..8];
            assert!(shown.contains(&format!("[{}] ", timestamp)));
        }
        assert!(shown.contains("boot ok"));
    }

    #[tokio::test]
    async fn test_read_error_stops_task() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("serial_log.txt");
        let log = Arc::new(Mutex::new(SessionLog::open(&path).await.unwrap()));

        let reader = FailingReader {
            data: Some(b"before failure\n"),
        };
        let mut display = Vec::new();
        let result = run(reader, Arc::clone(&log), &mut display, TIMEOUT).await;

        assert!(matches!(result, Err(TerminalError::Read(_))));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with(" before failure\n"));
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_closed_log_does_not_stop_display() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("serial_log.txt");
        let mut log = SessionLog::open(&path).await.unwrap();
        log.close().await.unwrap();
        let log = Arc::new(Mutex::new(log));

        let (mut device, host) = tokio::io::duplex(64);
        device.write_all(b"one\ntwo\n").await.unwrap();
        drop(device);

        let mut display = Vec::new();
        run(host, log, &mut display, TIMEOUT).await.unwrap();

        let shown = String::from_utf8(display).unwrap();
        assert!(shown.contains("one") && shown.contains("two"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_unterminated_line_flushed_after_timeout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("serial_log.txt");
        let log = Arc::new(Mutex::new(SessionLog::open(&path).await.unwrap()));

        // The device end stays open, so only the timeout can end the line.
        let (mut device, host) = tokio::io::duplex(64);
        device.write_all(b"Password: ").await.unwrap();

        let mut display = Vec::new();
        let still_running = tokio::time::timeout(
            Duration::from_millis(600),
            run(host, Arc::clone(&log), &mut display, TIMEOUT),
        )
        .await;
        assert!(still_running.is_err());

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.ends_with(" Password:\n"), "log was {:?}", content);
        assert!(String::from_utf8(display).unwrap().contains("Password:"));
        drop(device);
    }

    #[tokio::test]
    async fn test_idle_timeout_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("serial_log.txt");
        let log = Arc::new(Mutex::new(SessionLog::open(&path).await.unwrap()));

        let (device, host) = tokio::io::duplex(64);
        let mut display = Vec::new();
        let still_running = tokio::time::timeout(
            Duration::from_millis(350),
            run(host, Arc::clone(&log), &mut display, TIMEOUT),
        )
        .await;

        assert!(still_running.is_err());
        assert!(display.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        drop(device);
    }
}

use crate::console::{self, ConsoleExit};
use crate::error::TerminalError;
use crate::reader;
use crate::session::SessionWriter;
use crate::session_log::SessionLog;
use colored::Colorize;
use log::{info, warn};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

/// Runs an open session: background reader plus console loop, then teardown.
///
/// Teardown runs for every way the console can stop: the reader is aborted,
/// the outbound half is closed and the log is closed, in that order.
pub async fn run_session<R, W, I>(
    read_half: R,
    mut writer: SessionWriter<W>,
    log: Arc<Mutex<SessionLog>>,
    input: &mut mpsc::Receiver<Vec<u8>>,
    output: &mut impl Write,
    interrupt: I,
    read_timeout: Duration,
) -> Result<ConsoleExit, TerminalError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    let reader_handle = reader::spawn(read_half, Arc::clone(&log), read_timeout);

    let exit = console::run(input, &mut writer, output, interrupt).await;
    match exit {
        Ok(ConsoleExit::Interrupted) => {
            let _ = writeln!(output, "\n{}", "User interrupted.".yellow());
        }
        Ok(ConsoleExit::EndOfInput) => info!("Standard input closed"),
        Ok(ConsoleExit::Command) => {}
        Err(ref e) => warn!("Console stopped: {}", e),
    }

    let _ = writeln!(output, "{}", "Closing serial port...".blue());
    reader_handle.abort();
    let _ = reader_handle.await;
    if let Err(e) = writer.close().await {
        warn!("Failed to close serial port cleanly: {}", e);
    }
    log.lock().await.close().await?;

    exit
}

/// Reports the outcome of a run on `output` and picks the process exit status.
pub fn exit_status(result: &anyhow::Result<()>, output: &mut impl Write) -> u8 {
    match result {
        Ok(()) => EXIT_OK,
        Err(e) => {
            // Terminal errors already name their cause; others carry context.
            let message = match e.downcast_ref::<TerminalError>() {
                Some(e) => e.to_string(),
                None => format!("{:#}", e),
            };
            let _ = writeln!(output, "{}", message.red());
            EXIT_FAILURE
        }
    }
}

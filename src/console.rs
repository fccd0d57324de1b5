use crate::error::TerminalError;
use crate::session::SessionWriter;
use colored::Colorize;
use log::{debug, warn};
use std::future::Future;
use std::io::{BufRead, Write};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

const INPUT_QUEUE: usize = 16;

/// What a line of user input asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Exit,
    Send(&'a [u8]),
}

impl<'a> ConsoleCommand<'a> {
    pub fn parse(raw: &'a [u8]) -> Self {
        // Undecodable input is still trimmed so `write_line` can reject it.
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text.trim().as_bytes(),
            Err(_) => raw.trim_ascii(),
        };
        if text.eq_ignore_ascii_case(b"exit") || text.eq_ignore_ascii_case(b"quit") {
            ConsoleCommand::Exit
        } else {
            ConsoleCommand::Send(text)
        }
    }
}

/// Why the console loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    Command,
    Interrupted,
    EndOfInput,
}

/// Reads standard input on its own thread and forwards raw lines.
///
/// A blocking read on stdin cannot be cancelled, so it stays off the runtime;
/// the thread is left behind when the process exits.
pub fn spawn_stdin_reader() -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel(INPUT_QUEUE);

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdin = stdin.lock();
        loop {
            let mut line = Vec::new();
            match stdin.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read standard input: {}", e);
                    break;
                }
            }
        }
        debug!("Standard input reader finished");
    });

    rx
}

/// Forwards input lines to the device until the user quits, input ends or
/// `interrupt` completes.
pub async fn run<W, I>(
    input: &mut mpsc::Receiver<Vec<u8>>,
    writer: &mut SessionWriter<W>,
    output: &mut impl Write,
    interrupt: I,
) -> Result<ConsoleExit, TerminalError>
where
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    loop {
        write!(output, "> ")?;
        output.flush()?;

        let raw = tokio::select! {
            line = input.recv() => match line {
                Some(line) => line,
                None => return Ok(ConsoleExit::EndOfInput),
            },
            _ = &mut interrupt => return Ok(ConsoleExit::Interrupted),
        };

        match ConsoleCommand::parse(&raw) {
            ConsoleCommand::Exit => return Ok(ConsoleExit::Command),
            ConsoleCommand::Send(text) => match writer.write_line(text).await {
                Ok(()) => {}
                Err(e @ TerminalError::Encoding(_)) => {
                    writeln!(output, "{}", e.to_string().red())?;
                }
                Err(e) => {
                    warn!("Write to serial port failed: {}", e);
                    writeln!(output, "{}", format!("Write error: {}", e).red())?;
                }
            },
        }
    }
}

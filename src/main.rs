mod config;
mod console;
mod error;
mod log_record;
mod port_selector;
mod reader;
mod session;
mod session_log;
mod terminal;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use log::{info, warn, LevelFilter};
use session::{PortSettings, SerialSession};
use session_log::SessionLog;
use simple_logger::SimpleLogger;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let result = run().await;
    ExitCode::from(terminal::exit_status(&result, &mut std::io::stdout()))
}

async fn run() -> Result<()> {
    let cli = config::Cli::parse();
    let config = config::load_config(&cli)?;
    info!("Configuration loaded: {:?}", config);

    let log = SessionLog::open(&config.log_file).await?;
    info!("Logging received lines to {:?}", log.path());

    let port = match config.port.clone() {
        Some(port) => port,
        // Selection blocks on stdin, so keep it off the async workers.
        None => tokio::task::spawn_blocking(select_port).await??,
    };

    let session = SerialSession::open(PortSettings::from_config(port, &config))?;
    let settings = session.settings().clone();
    println!(
        "{}",
        format!(
            "Connected to {} at {} baud.",
            settings.path, settings.baud_rate
        )
        .green()
    );

    let mut stdout = std::io::stdout();
    if config.clear_screen {
        clear_screen(&mut stdout)?;
    }
    println!("{}", "Serial Terminal Ready.".green().bold());
    println!("{}\n", "Type 'exit' or press Ctrl+C to quit.".dimmed());

    let log = Arc::new(Mutex::new(log));
    let (read_half, writer) = session.into_split();
    let mut input = console::spawn_stdin_reader();
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    terminal::run_session(
        read_half,
        writer,
        log,
        &mut input,
        &mut stdout,
        interrupt,
        settings.timeout,
    )
    .await?;
    Ok(())
}

fn select_port() -> Result<String> {
    let ports = port_selector::list_ports()?;

    let mut stdout = std::io::stdout();
    port_selector::print_ports(&ports, &mut stdout)?;
    let choice = port_selector::prompt_choice(&ports, &mut std::io::stdin().lock(), &mut stdout)?;

    info!("Selected port {} ({})", choice.device, choice.description);
    Ok(choice.device)
}

fn clear_screen(output: &mut impl Write) -> std::io::Result<()> {
    // ANSI: erase display, cursor home.
    write!(output, "\x1B[2J\x1B[1;1H")?;
    output.flush()
}

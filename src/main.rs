//! # natter
//!
//! Command-line entry point: `natter server` runs the chat relay,
//! `natter client <server_ip>` joins one from the terminal.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use natter_client::{ChatClient, ClientError};
use natter_settings::NatterSettings;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

/// Multi-client TCP chat relay.
#[derive(Parser, Debug)]
#[command(name = "natter", version, about = "Multi-client TCP chat relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the chat server.
    Server {
        /// Address to bind.
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,
        /// Maximum concurrent connections.
        #[arg(long)]
        max_clients: Option<usize>,
        /// Settings file (defaults to `~/.natter/settings.json`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Connect to a chat server.
    Client {
        /// Server IP address or host name.
        server_ip: String,
        /// Server port.
        #[arg(long)]
        port: Option<u16>,
        /// Nickname to join with; prompted for when omitted.
        #[arg(long)]
        nickname: Option<String>,
        /// Settings file (defaults to `~/.natter/settings.json`).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage(&e),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("natter: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let code = match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "natter failed");
            eprintln!("natter: {e:#}");
            ExitCode::FAILURE
        }
    };
    // A pending stdin read must not keep the process alive.
    runtime.shutdown_background();
    code
}

/// Usage goes to standard output. Asking for help or the version is not
/// an error; anything else exits with status 1.
fn usage(e: &clap::Error) -> ExitCode {
    println!("{}", e.render());
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Settings errors already name the file or key at fault.
fn load(config: Option<&PathBuf>) -> Result<NatterSettings> {
    let settings = match config {
        Some(path) => natter_settings::load_settings_from_path(path)?,
        None => natter_settings::load_settings()?,
    };
    Ok(settings)
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Server {
            host,
            port,
            max_clients,
            config,
        } => {
            let mut settings = load(config.as_ref())?;
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            if let Some(max_clients) = max_clients {
                settings.server.max_clients = max_clients;
            }
            init_logging(&settings)?;
            run_server(settings).await
        }
        Command::Client {
            server_ip,
            port,
            nickname,
            config,
        } => {
            let mut settings = load(config.as_ref())?;
            if let Some(port) = port {
                settings.client.port = port;
            }
            settings.client.validate()?;
            init_logging(&settings)?;
            run_client(&settings, &server_ip, nickname).await
        }
    }
}

fn init_logging(settings: &NatterSettings) -> Result<()> {
    natter_logging::init_logging(&settings.logging).context("failed to initialize logging")
}

async fn run_server(settings: NatterSettings) -> Result<()> {
    let server = natter_server::start(settings.server)
        .await
        .context("failed to start server")?;
    info!(addr = %server.local_addr(), "chat server started, waiting for connections");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    info!("received ctrl+c");
    server.shutdown().await;
    Ok(())
}

async fn run_client(
    settings: &NatterSettings,
    server_ip: &str,
    nickname: Option<String>,
) -> Result<()> {
    let addr = format!("{server_ip}:{}", settings.client.port);
    let client = ChatClient::connect(&addr)
        .await?
        .with_settings(&settings.client);

    let mut input = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    let nickname = match nickname {
        Some(nickname) => nickname,
        None => {
            stdout.write_all(b"Enter your nickname: ").await?;
            stdout.flush().await?;
            let mut line = String::new();
            let _ = input.read_line(&mut line).await?;
            line.trim_end_matches(['\r', '\n']).to_owned()
        }
    };
    if nickname.is_empty() {
        return Err(ClientError::EmptyNickname.into());
    }

    stdout
        .write_all(format!("Connected to server as {nickname}!\n").as_bytes())
        .await?;
    stdout.flush().await?;

    let exit = client.run(&nickname, input, stdout).await?;
    info!(?exit, "client finished");
    Ok(())
}

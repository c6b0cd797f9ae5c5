//! Terminal chat client.

use natter_core::messages::{DISCONNECTED_NOTICE, decode_line};
use natter_settings::ClientSettings;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
    ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::errors::{ClientError, Result};

/// Why [`ChatClient::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientExit {
    /// The user typed the quit command.
    Quit,
    /// The input stream ended.
    InputClosed,
    /// The server closed the connection.
    ServerClosed,
}

/// One connection to a natter server.
pub struct ChatClient<S = TcpStream> {
    stream: S,
    read_buffer_bytes: usize,
    quit_command: String,
}

impl ChatClient<TcpStream> {
    /// Connect to `addr` (`host:port`) with default client settings.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_owned(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not set TCP_NODELAY");
        }
        info!(addr, "connected");
        Ok(Self::from_stream(stream))
    }
}

impl<S> ChatClient<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wrap an already connected transport.
    pub fn from_stream(stream: S) -> Self {
        Self::from_stream_with(stream, &ClientSettings::default())
    }

    /// Wrap an already connected transport using `settings`.
    pub fn from_stream_with(stream: S, settings: &ClientSettings) -> Self {
        Self {
            stream,
            read_buffer_bytes: settings.read_buffer_bytes.max(1),
            quit_command: settings.quit_command.clone(),
        }
    }

    /// Apply client settings to an existing connection.
    #[must_use]
    pub fn with_settings(self, settings: &ClientSettings) -> Self {
        Self::from_stream_with(self.stream, settings)
    }

    /// Send `nickname`, then relay `input` lines to the server and server
    /// messages to `output` until one side stops.
    pub async fn run<I, O>(self, nickname: &str, input: I, output: O) -> Result<ClientExit>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let nickname = decode_line(nickname.as_bytes());
        if nickname.is_empty() {
            return Err(ClientError::EmptyNickname);
        }

        let (reader, mut writer) = tokio::io::split(self.stream);
        writer.write_all(nickname.as_bytes()).await?;
        writer.flush().await?;

        let exit = tokio::select! {
            sent = send_input(input, &mut writer, &self.quit_command) => sent?,
            received = receive(reader, output, self.read_buffer_bytes) => received?,
        };

        if exit != ClientExit::ServerClosed {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "shutdown failed");
            }
        }
        info!(?exit, "chat session ended");
        Ok(exit)
    }
}

/// Send each non-empty input line as one message.
async fn send_input<I, S>(
    input: I,
    writer: &mut WriteHalf<S>,
    quit_command: &str,
) -> Result<ClientExit>
where
    I: AsyncBufRead + Unpin,
    S: AsyncWrite,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end_matches('\r');
        if line == quit_command {
            return Ok(ClientExit::Quit);
        }
        // The server cannot see a zero-length message.
        if line.is_empty() {
            continue;
        }
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(ClientExit::InputClosed)
}

/// Print each chunk from the server on its own line.
async fn receive<S, O>(mut reader: ReadHalf<S>, mut output: O, buffer: usize) -> Result<ClientExit>
where
    S: AsyncRead,
    O: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "read from server failed");
                break;
            }
        };
        let text = String::from_utf8_lossy(&buf[..n]);
        output.write_all(text.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    output.write_all(DISCONNECTED_NOTICE.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(ClientExit::ServerClosed)
}

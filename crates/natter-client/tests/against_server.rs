#![allow(missing_docs)]
//! The client against a real natter server.

use std::time::Duration;

use natter_client::{ChatClient, ClientExit};
use natter_server::{ServerHandle, start};
use natter_settings::ServerSettings;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

async fn server() -> ServerHandle {
    start(ServerSettings {
        host: "127.0.0.1".into(),
        port: 0,
        ..ServerSettings::default()
    })
    .await
    .unwrap()
}

/// Spawn a client whose input and output are in-memory pipes.
fn spawn_client(
    client: ChatClient,
    nickname: &'static str,
) -> (
    DuplexStream,
    DuplexStream,
    tokio::task::JoinHandle<natter_client::Result<ClientExit>>,
) {
    let (input_tx, input_rx) = tokio::io::duplex(1024);
    let (output_tx, output_rx) = tokio::io::duplex(16 * 1024);
    let task =
        tokio::spawn(async move { client.run(nickname, BufReader::new(input_rx), output_tx).await });
    (input_tx, output_rx, task)
}

async fn read_until(output: &mut DuplexStream, expected: &str) -> String {
    let mut seen = String::new();
    let mut buf = [0u8; 1024];
    while !seen.contains(expected) {
        let n = tokio::time::timeout(Duration::from_secs(5), output.read(&mut buf))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {expected:?}; saw {seen:?}"))
            .unwrap();
        assert!(n > 0, "output closed before {expected:?}; saw {seen:?}");
        seen.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
    seen
}

#[tokio::test]
async fn two_clients_chat_then_quit() {
    let server = server().await;
    let addr = server.local_addr().to_string();

    let alice = ChatClient::connect(&addr).await.unwrap();
    let (mut alice_in, mut alice_out, alice_task) = spawn_client(alice, "alice");
    let _ = read_until(&mut alice_out, "alice has joined the chat!").await;

    let bob = ChatClient::connect(&addr).await.unwrap();
    let (mut bob_in, mut bob_out, bob_task) = spawn_client(bob, "bob");
    let _ = read_until(&mut alice_out, "bob has joined the chat!").await;
    let _ = read_until(&mut bob_out, "bob has joined the chat!").await;

    alice_in.write_all(b"hi\n").await.unwrap();
    let _ = read_until(&mut bob_out, "alice: hi\n").await;

    bob_in.write_all(b"/quit\n").await.unwrap();
    assert_eq!(bob_task.await.unwrap().unwrap(), ClientExit::Quit);
    let _ = read_until(&mut alice_out, "bob has left the chat!").await;

    drop(alice_in);
    assert_eq!(alice_task.await.unwrap().unwrap(), ClientExit::InputClosed);

    server.shutdown().await;
}

#[tokio::test]
async fn server_shutdown_disconnects_client() {
    let server = server().await;
    let addr = server.local_addr().to_string();

    let client = ChatClient::connect(&addr).await.unwrap();
    let (_input, mut output, task) = spawn_client(client, "carol");
    let _ = read_until(&mut output, "carol has joined the chat!").await;

    server.shutdown().await;
    let _ = read_until(&mut output, "Disconnected from server.\n").await;
    assert_eq!(task.await.unwrap().unwrap(), ClientExit::ServerClosed);
}

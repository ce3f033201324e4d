//! TCP transport to the relay
//!
//! The connection lives on the tokio runtime. The game loop never awaits: it
//! pushes [`NetCommand`]s into a std channel and drains [`NetEvent`]s from
//! another one between frames.

use crate::error::{Error, Result};
use crate::protocol::{read_frame, write_frame, ClientMessage, ServerMessage};
use std::sync::mpsc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// Channel message from the game loop to the network task
#[derive(Debug)]
pub enum NetCommand {
    Send(ClientMessage),
    Disconnect,
}

/// Events received from the network
#[derive(Debug)]
pub enum NetEvent {
    Connected,
    Message(ServerMessage),
    /// Connection lost or refused
    Disconnected { reason: String },
}

/// Game-loop side of a relay connection
pub struct Connection {
    cmd_tx: mpsc::Sender<NetCommand>,
    event_rx: mpsc::Receiver<NetEvent>,
}

impl Connection {
    /// Queue a message for the relay
    pub fn send(&self, msg: ClientMessage) -> Result<()> {
        self.cmd_tx.send(NetCommand::Send(msg)).map_err(|_| Error::ChannelClosed)
    }

    /// Check for incoming network events (non-blocking)
    pub fn poll_events(&self) -> Vec<NetEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Block until the next event or the timeout
    #[cfg(test)]
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<NetEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(NetCommand::Disconnect);
    }
}

/// Connect to the relay on the given runtime
pub fn spawn_connect(handle: &tokio::runtime::Handle, addr: String) -> Connection {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();

    handle.spawn(async move {
        info!("Connecting to relay at {}", addr);
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                let _ = event_tx.send(NetEvent::Connected);
                run_connection(stream, event_tx, cmd_rx).await;
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", addr, e);
                let _ = event_tx.send(NetEvent::Disconnected {
                    reason: format!("Failed to connect: {}", e),
                });
            }
        }
    });

    Connection { cmd_tx, event_rx }
}

async fn run_connection(stream: TcpStream, event_tx: mpsc::Sender<NetEvent>, cmd_rx: mpsc::Receiver<NetCommand>) {
    let (read_half, write_half) = stream.into_split();
    let reader = tokio::spawn(read_loop(read_half, event_tx.clone()));

    if let Err(e) = write_loop(write_half, cmd_rx).await {
        error!("Relay write failed: {}", e);
        let _ = event_tx.send(NetEvent::Disconnected {
            reason: format!("Write failed: {}", e),
        });
    }
    reader.abort();
    debug!("Connection closed");
}

/// Forward relay messages to the game loop until the stream ends.
/// Frames that do not decode are skipped.
async fn read_loop(mut reader: OwnedReadHalf, event_tx: mpsc::Sender<NetEvent>) {
    loop {
        match read_frame::<_, ServerMessage>(&mut reader).await {
            Ok(Some(msg)) => {
                if event_tx.send(NetEvent::Message(msg)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                let _ = event_tx.send(NetEvent::Disconnected {
                    reason: "Connection closed".to_string(),
                });
                break;
            }
            Err(Error::MalformedFrame(e)) => {
                warn!("Skipping undecodable relay frame: {}", e);
            }
            Err(e) => {
                error!("Relay read failed: {}", e);
                let _ = event_tx.send(NetEvent::Disconnected {
                    reason: format!("Read failed: {}", e),
                });
                break;
            }
        }
    }
}

/// Poll the command channel and write frames until told to stop
async fn write_loop(mut writer: OwnedWriteHalf, cmd_rx: mpsc::Receiver<NetCommand>) -> Result<()> {
    let mut poll_interval = interval(Duration::from_millis(16));
    loop {
        poll_interval.tick().await;
        loop {
            match cmd_rx.try_recv() {
                Ok(NetCommand::Send(msg)) => {
                    debug!("Sending {}", msg.name());
                    write_frame(&mut writer, &msg).await?;
                }
                Ok(NetCommand::Disconnect) | Err(mpsc::TryRecvError::Disconnected) => {
                    let _ = writer.shutdown().await;
                    return Ok(());
                }
                Err(mpsc::TryRecvError::Empty) => break,
            }
        }
    }
}

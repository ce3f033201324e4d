//! Messages exchanged with the relay, and their wire framing
//!
//! Frames are a 4-byte big-endian length followed by a JSON body.
//!
//! Pairing flow:
//! 1. `LookForOpponents` puts a client in the pool, relay answers `OpponentPool`
//! 2. `InviteSent` → relay forwards `InviteReceived` with a session token
//! 3. Invitee answers `InviteAccepted` or `InviteDeclined`
//! 4. After the countdown both sides send `StartGame`, then `UpdatedClientScreen`
//! 5. The first `GameOver` decides the match; relay broadcasts the notice

use crate::error::{Error, Result};
use crate::floor_raise::Difficulty;
use crate::snapshot::BoardSnapshot;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest frame accepted in either direction
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Per-connection identifier handed out by the relay
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token naming one invitation and the match that follows it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

/// A player as listed in the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentInfo {
    pub id: PlayerId,
    pub name: String,
}

/// Relay's verdict on a finished match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverNotice {
    pub winner: PlayerId,
    pub loser: PlayerId,
    pub loser_lines_cleared: u32,
    /// The loser left rather than topping out
    pub disqualified: bool,
}

/// Client → relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Announce ourselves after connecting
    Hello { name: String },
    LookForOpponents,
    InviteSent { sent_to: PlayerId, difficulty: Difficulty },
    InviteDeclined { session: SessionToken },
    InviteAccepted { session: SessionToken },
    /// Relayed to the opponent as `GameStarted`
    StartGame { opponent: PlayerId, snapshot: BoardSnapshot },
    /// Relayed to the opponent as `OpponentScreen`
    UpdatedClientScreen { opponent_id: PlayerId, snapshot: BoardSnapshot },
    /// We topped out
    GameOver { lines_cleared: u32 },
    /// We left the pairing
    OpponentUnmounted,
}

/// Relay → client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    LoggedInUsers { count: u32 },
    SocketId { id: PlayerId },
    OpponentPool { opponents: Vec<OpponentInfo> },
    /// Ack for our own invitation
    InviteSent { to: OpponentInfo, session: SessionToken },
    InviteReceived { from: OpponentInfo, difficulty: Difficulty, session: SessionToken },
    InvitationDeclined { session: SessionToken },
    InvitationAccepted { opponent: OpponentInfo, difficulty: Difficulty, session: SessionToken },
    GameStarted { from: PlayerId, snapshot: BoardSnapshot },
    OpponentScreen { from: PlayerId, snapshot: BoardSnapshot },
    GameOver(GameOverNotice),
    /// The paired peer went away
    PeerDisconnected { id: PlayerId },
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Hello { .. } => "hello",
            ClientMessage::LookForOpponents => "look-for-opponents",
            ClientMessage::InviteSent { .. } => "invite-sent",
            ClientMessage::InviteDeclined { .. } => "invite-declined",
            ClientMessage::InviteAccepted { .. } => "invite-accepted",
            ClientMessage::StartGame { .. } => "start-game",
            ClientMessage::UpdatedClientScreen { .. } => "updated-client-screen",
            ClientMessage::GameOver { .. } => "game-over",
            ClientMessage::OpponentUnmounted => "opponent-unmounted",
        }
    }
}

/// Serialize a message to bytes with length prefix
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge(json.len(), MAX_FRAME_LEN));
    }
    let len = json.len() as u32;
    let mut data = len.to_be_bytes().to_vec();
    data.extend(json);
    Ok(data)
}

/// Decode the body of a frame whose length prefix was already consumed
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(Error::MalformedFrame)
}

/// Read a length-prefixed message. `Ok(None)` on a clean end of stream.
/// A body that does not decode yields [`Error::MalformedFrame`] after the
/// whole frame has been consumed.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncReadExt + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge(len, MAX_FRAME_LEN));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    decode_body(&data).map(Some)
}

/// Write one framed message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let data = encode_frame(msg)?;
    writer.write_all(&data).await?;
    Ok(())
}

//! # chatprobe-adapters
//!
//! Channel adapters connecting chatprobe to a messaging gateway.
//!
//! The gateway speaks JSON event frames over a websocket:
//!
//! ```text
//! client → gateway   {"event":"sendMessage","data":{"to":"<identity>","message":"<text>"}}
//! gateway → client   {"event":"newMessage","data":{"type":"list","body":{...},"from":"...","timestamp":0}}
//! client ↔ gateway   {"event":"ping"} / {"event":"pong"}
//! ```
//!
//! [`connect`] returns the two halves the run driver needs: a
//! [`chatprobe_core::MessageSender`] and an ordered stream of
//! [`chatprobe_core::ChannelEvent`]s with arrival ids assigned.

mod frame;
mod websocket;

pub use frame::{Frame, OutgoingMessage};
pub use websocket::{ChannelSettings, WebSocketSender, connect};

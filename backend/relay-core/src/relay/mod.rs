//! WebSocket relay: browser media in, transcoder push out.
//!
//! This module implements the client-facing side of the relay:
//!
//! - Connection acceptance on the configured path ([`start_relay_server`])
//! - Stream key extraction from the connection query
//! - One session per connection, piping binary frames into a transcoder
//! - Diagnostic notices back to the client
//! - A session table keyed by stream key ([`SessionTable`])
//!
//! # Protocol
//!
//! 1. Client connects to `ws://host:port/rtmp?key=<stream key>`
//! 2. Server sends `HELLO` as soon as the upgrade completes
//! 3. Binary frames are media chunks, written to the transcoder in order
//! 4. Text frames are ignored
//! 5. Server sends `transcoder diagnostic output` per transcoder stderr chunk
//! 6. On setup failure the server sends `ERROR <reason>` then closes
//!
//! Either side ending the session ends the other: a client disconnect stops
//! the transcoder, and a transcoder exit closes the connection.

mod handle;
pub mod message;
mod server;
mod session;
mod session_table;

pub use handle::RelayServerHandle;
pub use message::InboundMessage;
pub use server::{extract_stream_key, start_relay_server};
pub use session::SessionEnd;
pub use session_table::{InsertRejection, SessionEntry, SessionTable};

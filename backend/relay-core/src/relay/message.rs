//! Classification of client frames.

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

/// What the relay does with a frame it received from the client.
///
/// Close frames never reach this type; the session treats them as the end of
/// the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Encoded media chunk for the transcoder.
    Media(Bytes),
    /// Text from the client. Logged and discarded.
    Control(String),
    /// Ping, pong and raw frames. Handled by the protocol layer.
    Unknown,
}

impl From<Message> for InboundMessage {
    fn from(message: Message) -> Self {
        match message {
            Message::Binary(data) => InboundMessage::Media(data),
            Message::Text(text) => InboundMessage::Control(text.as_str().to_owned()),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) | Message::Close(_) => {
                InboundMessage::Unknown
            }
        }
    }
}

pub(crate) fn text_message(text: &str) -> Message {
    Message::Text(text.into())
}

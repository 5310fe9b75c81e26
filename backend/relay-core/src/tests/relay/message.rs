use crate::relay::InboundMessage;

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

/// **VALUE**: Verifies binary frames are classified as media with their payload intact.
///
/// **BUG THIS CATCHES**: Would catch media being copied or truncated before the feed.
#[test]
fn given_binary_frame_when_classified_then_media_with_same_bytes() {
    // GIVEN: A binary frame
    let payload = Bytes::from_static(&[0x1a, 0x45, 0xdf, 0xa3, 0x00]);

    // WHEN: Classifying
    let inbound = InboundMessage::from(Message::Binary(payload.clone()));

    // THEN: Media with identical bytes
    assert_eq!(inbound, InboundMessage::Media(payload));
}

/// **VALUE**: Verifies text frames are control messages, never media.
///
/// **WHY THIS MATTERS**: Only binary frames may reach the transcoder; a text frame written
/// to stdin would corrupt the container stream.
#[test]
fn given_text_frame_when_classified_then_control() {
    // GIVEN: A text frame
    let message = Message::Text("start".into());

    // WHEN: Classifying
    let inbound = InboundMessage::from(message);

    // THEN: Control
    assert_eq!(inbound, InboundMessage::Control("start".to_string()));
}

#[test]
fn given_ping_frame_when_classified_then_unknown() {
    // GIVEN: A ping
    let message = Message::Ping(Bytes::from_static(b"hb"));

    // WHEN/THEN: Unknown
    assert_eq!(InboundMessage::from(message), InboundMessage::Unknown);
}

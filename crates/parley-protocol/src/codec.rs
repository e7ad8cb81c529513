//! Codec for encoding and decoding Parley frames.
//!
//! Each frame travels as a 4-byte big-endian length prefix followed by a
//! MessagePack map with named fields. One WebSocket message may carry several
//! frames, or a frame may be split across messages, so decoding works from a
//! growing buffer.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::frames::Frame;

/// Maximum frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Not enough data to decode frame.
    #[error("Incomplete frame: need {0} more bytes")]
    Incomplete(usize),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Read the length prefix at the front of `data`, if present.
fn frame_len(data: &[u8]) -> Result<Option<usize>, ProtocolError> {
    let Some(prefix) = data.get(..LENGTH_PREFIX_SIZE) else {
        return Ok(None);
    };
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    Ok(Some(len))
}

/// Encode a frame to a length-prefixed buffer.
///
/// # Errors
///
/// Returns an error if the frame is too large or encoding fails.
pub fn encode(frame: &Frame) -> Result<Bytes, ProtocolError> {
    let payload = rmp_serde::to_vec_named(frame)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

/// Decode exactly one frame from the front of `data`.
///
/// # Errors
///
/// Returns an error if the data is incomplete, too large, or invalid.
pub fn decode(data: &[u8]) -> Result<Frame, ProtocolError> {
    let len = frame_len(data)?
        .ok_or_else(|| ProtocolError::Incomplete(LENGTH_PREFIX_SIZE - data.len()))?;
    let total = LENGTH_PREFIX_SIZE + len;
    if data.len() < total {
        return Err(ProtocolError::Incomplete(total - data.len()));
    }
    Ok(rmp_serde::from_slice(&data[LENGTH_PREFIX_SIZE..total])?)
}

/// Try to decode a frame from a buffer, advancing it past the frame.
///
/// Returns `Ok(None)` when the buffer does not yet hold a whole frame.
///
/// # Errors
///
/// Returns an error if the frame is too large or invalid. A payload that
/// fails to decode is still consumed, so the caller can keep reading.
pub fn decode_from(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    let Some(len) = frame_len(buf)? else {
        return Ok(None);
    };
    if buf.len() < LENGTH_PREFIX_SIZE + len {
        return Ok(None);
    }

    buf.advance(LENGTH_PREFIX_SIZE);
    let payload = buf.split_to(len);
    Ok(Some(rmp_serde::from_slice(&payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::ChatMessage;
    use serde::Serialize;

    #[test]
    fn test_room_joined_with_history() {
        let frame = Frame::RoomJoined {
            id: 2,
            room_id: "XYZ".into(),
            messages: Some(vec![
                ChatMessage::new("hi").from_user("Ann", "🐱"),
                ChatMessage::new("Bob joined").system(),
            ]),
        };

        let decoded = decode(&encode(&frame).unwrap()).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn test_message_fields_are_flat() {
        // Broadcast messages carry their fields next to the type tag
        #[derive(Serialize)]
        struct Flat<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
            body: &'a str,
            user_nickname: &'a str,
        }

        let payload = rmp_serde::to_vec_named(&Flat {
            kind: "message",
            body: "hello",
            user_nickname: "Ann",
        })
        .unwrap();
        let frame: Frame = rmp_serde::from_slice(&payload).unwrap();

        match frame {
            Frame::Message(msg) => {
                assert_eq!(msg.body, "hello");
                assert_eq!(msg.user_nickname.as_deref(), Some("Ann"));
                assert!(msg.user_icon.is_none());
                assert!(!msg.is_system_message);
            }
            other => panic!("Expected message frame, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_frame_type() {
        #[derive(Serialize)]
        struct Foreign {
            #[serde(rename = "type")]
            kind: &'static str,
            video_time: u64,
        }

        let payload = rmp_serde::to_vec_named(&Foreign {
            kind: "sync_video",
            video_time: 42,
        })
        .unwrap();
        let mut buf = BytesMut::new();
        buf.put_u32(payload.len() as u32);
        buf.extend_from_slice(&payload);

        assert_eq!(decode(&buf).unwrap(), Frame::Unknown);
    }

    #[test]
    fn test_decode_incomplete() {
        let encoded = encode(&Frame::create_room(1, "Ann", "🐱")).unwrap();

        match decode(&encoded[..5]) {
            Err(ProtocolError::Incomplete(_)) => {}
            other => panic!("Expected Incomplete error, got {:?}", other),
        }
        match decode(&encoded[..2]) {
            Err(ProtocolError::Incomplete(2)) => {}
            other => panic!("Expected Incomplete(2), got {:?}", other),
        }
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let frame = Frame::send_message("hello");
        let mut data = encode(&frame).unwrap().to_vec();
        data.extend_from_slice(&encode(&Frame::send_message("next")).unwrap());

        assert!(data.len() > LENGTH_PREFIX_SIZE);
        assert_eq!(decode(&data).unwrap(), frame);
    }

    #[test]
    fn test_frame_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_FRAME_SIZE + 1) as u32);

        match decode_from(&mut buf) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
    }

    #[test]
    fn test_streaming_decode() {
        let first = encode(&Frame::UserId {
            user_id: "u-1".into(),
        })
        .unwrap();
        let second = encode(&Frame::TypingPresence {
            users_typing: vec!["u-2".into()],
        })
        .unwrap();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&first);
        buf.extend_from_slice(&second[..3]);

        assert!(matches!(
            decode_from(&mut buf).unwrap(),
            Some(Frame::UserId { .. })
        ));
        // Second frame is split across reads
        assert!(decode_from(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&second[3..]);
        assert!(matches!(
            decode_from(&mut buf).unwrap(),
            Some(Frame::TypingPresence { .. })
        ));
        assert!(buf.is_empty());
    }
}

//! Wire format for client messages.
//!
//! Clients send fixed-size frames; the server answers each frame with a
//! plain-text acknowledgment that is not frame-aligned.
//!
//! ```text
//! Request:  <id: i32 big-endian><payload: 1024 bytes, NUL-padded>
//! Response: Message:<id> written to server file
//! ```

use bytes::{Buf, BufMut, BytesMut};

/// Size of the text buffer carried in every frame.
pub const PAYLOAD_SIZE: usize = 1024;

/// Total frame size on the wire (id + payload).
pub const FRAME_SIZE: usize = 4 + PAYLOAD_SIZE;

/// A single client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i32,
    pub payload: String,
}

impl Message {
    #[allow(dead_code)] // Client side of the codec
    pub fn new(id: i32, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Decode a frame.
    ///
    /// The payload ends at the first NUL byte, or at the end of the buffer
    /// when the sender filled it completely. Invalid UTF-8 is replaced.
    pub fn decode(frame: &[u8; FRAME_SIZE]) -> Self {
        let mut buf = &frame[..];
        let id = buf.get_i32();
        let text = match buf.iter().position(|&b| b == 0) {
            Some(end) => &buf[..end],
            None => buf,
        };

        Self {
            id,
            payload: String::from_utf8_lossy(text).into_owned(),
        }
    }

    /// Encode into exactly `FRAME_SIZE` bytes.
    ///
    /// Payloads longer than `PAYLOAD_SIZE - 1` bytes are truncated so the
    /// buffer always keeps a terminating NUL.
    #[allow(dead_code)] // Client side of the codec
    pub fn encode(&self) -> BytesMut {
        let mut frame = BytesMut::with_capacity(FRAME_SIZE);
        frame.put_i32(self.id);

        let text = self.payload.as_bytes();
        let len = text.len().min(PAYLOAD_SIZE - 1);
        frame.put_slice(&text[..len]);
        frame.put_bytes(0, PAYLOAD_SIZE - len);

        debug_assert_eq!(frame.len(), FRAME_SIZE);
        frame
    }
}

/// Acknowledgment sent back after a message has been logged.
pub fn ack(id: i32) -> String {
    format!("Message:{id} written to server file")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(bytes: &[u8]) -> [u8; FRAME_SIZE] {
        let mut frame = [0u8; FRAME_SIZE];
        frame[..bytes.len()].copy_from_slice(bytes);
        frame
    }

    #[test]
    fn test_decode_network_byte_order() {
        let mut raw = vec![0x00, 0x00, 0x01, 0x02];
        raw.extend_from_slice(b"Hello world");
        let msg = Message::decode(&frame_of(&raw));
        assert_eq!(msg.id, 258);
        assert_eq!(msg.payload, "Hello world");
    }

    #[test]
    fn test_decode_negative_id() {
        let msg = Message::decode(&frame_of(&[0xff, 0xff, 0xff, 0xff]));
        assert_eq!(msg.id, -1);
        assert_eq!(msg.payload, "");
    }

    #[test]
    fn test_decode_full_buffer_without_nul() {
        let mut frame = [b'a'; FRAME_SIZE];
        frame[..4].copy_from_slice(&7i32.to_be_bytes());
        let msg = Message::decode(&frame);
        assert_eq!(msg.id, 7);
        assert_eq!(msg.payload.len(), PAYLOAD_SIZE);
    }

    #[test]
    fn test_decode_stops_at_first_nul() {
        let mut raw = 3i32.to_be_bytes().to_vec();
        raw.extend_from_slice(b"abc\0garbage");
        let msg = Message::decode(&frame_of(&raw));
        assert_eq!(msg.payload, "abc");
    }

    #[test]
    fn test_encode_layout() {
        let frame = Message::new(1, "Hello world").encode();
        assert_eq!(frame.len(), FRAME_SIZE);
        assert_eq!(&frame[..4], &[0, 0, 0, 1]);
        assert_eq!(&frame[4..15], b"Hello world");
        assert!(frame[15..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_truncates_long_payload() {
        let long = "x".repeat(PAYLOAD_SIZE * 2);
        let frame = Message::new(9, long).encode();
        assert_eq!(frame.len(), FRAME_SIZE);
        assert_eq!(frame[FRAME_SIZE - 1], 0);

        let mut fixed = [0u8; FRAME_SIZE];
        fixed.copy_from_slice(&frame);
        assert_eq!(Message::decode(&fixed).payload.len(), PAYLOAD_SIZE - 1);
    }

    #[test]
    fn test_ack() {
        assert_eq!(ack(1), "Message:1 written to server file");
        assert_eq!(ack(-5), "Message:-5 written to server file");
    }
}

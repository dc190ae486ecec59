//! Frame encoding/decoding
//!
//! Every APT frame starts with a fixed 6-byte header:
//! - 2 bytes: message id (little-endian)
//! - 1 byte: param1, or low byte of the payload length
//! - 1 byte: param2, or high byte of the payload length
//! - 1 byte: destination address, bit 7 set when a payload follows
//! - 1 byte: source address
//!
//! A *short* frame is the header alone. A *long* frame is followed by as many
//! payload bytes as the length field declares, read separately.

use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

use super::{
    messages, MessageId, ProtocolError, Session, Transport, DEFAULT_DEST, DEFAULT_SRC, HEADER_LEN,
    LONG_FRAME_FLAG, MAX_PAYLOAD_SIZE,
};

/// Destination and source addresses stamped on outgoing frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    /// Controller address (the flag bit is managed by the codec)
    pub dest: u8,
    /// Host address
    pub src: u8,
}

impl Default for Address {
    fn default() -> Self {
        Self {
            dest: DEFAULT_DEST,
            src: DEFAULT_SRC,
        }
    }
}

/// Raw 6-byte frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message identifier
    pub message_id: u16,
    /// param1, or low byte of the payload length
    pub field_a: u8,
    /// param2, or high byte of the payload length
    pub field_b: u8,
    /// Destination byte as it appeared on the wire, flag included
    pub dest: u8,
    /// Source address
    pub src: u8,
}

impl Header {
    /// Decode a header from the first 6 bytes of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HEADER_LEN {
            return Err(ProtocolError::Framing(format!(
                "header needs {} bytes, got {}",
                HEADER_LEN,
                data.len()
            )));
        }

        Ok(Self {
            message_id: LittleEndian::read_u16(&data[0..2]),
            field_a: data[2],
            field_b: data[3],
            dest: data[4],
            src: data[5],
        })
    }

    /// Encode the header
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        LittleEndian::write_u16(&mut bytes[0..2], self.message_id);
        bytes[2] = self.field_a;
        bytes[3] = self.field_b;
        bytes[4] = self.dest;
        bytes[5] = self.src;
        bytes
    }

    /// Whether a payload follows this header
    pub fn is_long(&self) -> bool {
        self.dest & LONG_FRAME_FLAG != 0
    }

    /// Payload length declared by a long header
    pub fn payload_len(&self) -> usize {
        self.field_a as usize | (self.field_b as usize) << 8
    }
}

/// Frame contents after the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Two single-byte parameters
    Short {
        /// First parameter, usually the channel
        param1: u8,
        /// Second parameter
        param2: u8,
    },
    /// Variable-length payload
    Long(Vec<u8>),
}

/// A decoded protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw message identifier
    pub message_id: u16,
    /// Destination address with the long-frame flag stripped
    pub dest: u8,
    /// Source address
    pub src: u8,
    /// Parameters or payload
    pub body: Body,
}

impl Frame {
    /// Known message identifier, if any
    pub fn id(&self) -> Option<MessageId> {
        MessageId::from_code(self.message_id)
    }

    /// `(param1, param2)` of a short frame
    pub fn params(&self) -> Option<(u8, u8)> {
        match self.body {
            Body::Short { param1, param2 } => Some((param1, param2)),
            Body::Long(_) => None,
        }
    }

    /// Payload of a long frame
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Long(data) => Some(data),
            Body::Short { .. } => None,
        }
    }

    /// Channel the frame refers to
    ///
    /// param1 for short frames, the leading u16 of the payload for long ones.
    pub fn channel(&self) -> Option<u16> {
        match &self.body {
            Body::Short { param1, .. } => Some(*param1 as u16),
            Body::Long(data) if data.len() >= 2 => Some(LittleEndian::read_u16(&data[0..2])),
            Body::Long(_) => None,
        }
    }

    /// Encode to wire bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let address = Address {
            dest: self.dest,
            src: self.src,
        };
        match &self.body {
            Body::Short { param1, param2 } => {
                Ok(encode_short(address, self.message_id, *param1, *param2))
            }
            Body::Long(data) => encode_long(address, self.message_id, data),
        }
    }
}

/// Encode a header-only frame
pub fn encode_short(address: Address, message_id: u16, param1: u8, param2: u8) -> Vec<u8> {
    Header {
        message_id,
        field_a: param1,
        field_b: param2,
        dest: address.dest & !LONG_FRAME_FLAG,
        src: address.src,
    }
    .to_bytes()
    .to_vec()
}

/// Encode a header followed by `payload`
pub fn encode_long(
    address: Address,
    message_id: u16,
    payload: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::Framing(format!(
            "payload of {} bytes exceeds {}",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let len = payload.len() as u16;
    let header = Header {
        message_id,
        field_a: (len & 0xFF) as u8,
        field_b: (len >> 8) as u8,
        dest: address.dest | LONG_FRAME_FLAG,
        src: address.src,
    };

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(payload);
    Ok(bytes)
}

/// Decode a header, failing with a framing error on fewer than 6 bytes
pub fn decode_header(data: &[u8]) -> Result<Header, ProtocolError> {
    Header::from_bytes(data)
}

/// Complete a frame from its header, reading the payload if one is flagged
///
/// A payload that does not arrive in full within the session timeout is a
/// framing error: the header has already been consumed, so the stream is
/// out of step either way.
pub fn decode_body<T: Transport>(
    header: Header,
    session: &mut Session<T>,
) -> Result<Frame, ProtocolError> {
    let dest = header.dest & !LONG_FRAME_FLAG;

    if !header.is_long() {
        return Ok(Frame {
            message_id: header.message_id,
            dest,
            src: header.src,
            body: Body::Short {
                param1: header.field_a,
                param2: header.field_b,
            },
        });
    }

    let len = header.payload_len();
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::Framing(format!(
            "{} declares {} payload bytes, limit is {}",
            messages::describe(header.message_id),
            len,
            MAX_PAYLOAD_SIZE
        )));
    }

    let timeout = session.timeout();
    let payload = session.read_exact(len, timeout).map_err(|e| match e {
        ProtocolError::Timeout { expected, received } => ProtocolError::Framing(format!(
            "{} declared {} payload bytes, received {}",
            messages::describe(header.message_id),
            expected,
            received
        )),
        other => other,
    })?;

    Ok(Frame {
        message_id: header.message_id,
        dest,
        src: header.src,
        body: Body::Long(payload),
    })
}

/// Read the next whole frame using the session's active timeout
pub fn read_frame<T: Transport>(session: &mut Session<T>) -> Result<Frame, ProtocolError> {
    let timeout = session.timeout();
    let raw = session.read_exact(HEADER_LEN, timeout)?;
    let header = decode_header(&raw)?;
    let frame = decode_body(header, session)?;

    match &frame.body {
        Body::Short { param1, param2 } => debug!(
            "RX {} p1={} p2={}",
            messages::describe(frame.message_id),
            param1,
            param2
        ),
        Body::Long(data) => debug!(
            "RX {} payload={:02x?}",
            messages::describe(frame.message_id),
            data
        ),
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockTransport;
    use std::time::Duration;

    #[test]
    fn test_encode_short_layout() {
        let bytes = encode_short(Address::default(), 0x0443, 1, 0);
        assert_eq!(bytes, vec![0x43, 0x04, 0x01, 0x00, 0x50, 0x01]);
    }

    #[test]
    fn test_encode_long_layout() {
        let bytes = encode_long(Address::default(), 0x0450, &[1, 0, 0xE8, 0x03, 0, 0]).unwrap();
        assert_eq!(
            bytes,
            vec![
                0x50, 0x04, // id
                0x06, 0x00, // length
                0xD0, 0x01, // dest | 0x80, src
                1, 0, 0xE8, 0x03, 0, 0,
            ]
        );
    }

    #[test]
    fn test_header_roundtrip_short() {
        let bytes = encode_short(Address::default(), 0x0465, 2, 1);
        let header = decode_header(&bytes).unwrap();
        assert_eq!(header.message_id, 0x0465);
        assert!(!header.is_long());
        assert_eq!((header.field_a, header.field_b), (2, 1));
    }

    #[test]
    fn test_header_declares_long_length() {
        let payload = vec![0u8; 300];
        let bytes = encode_long(Address::default(), 0x0006, &payload).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 300);
        let header = decode_header(&bytes[..HEADER_LEN]).unwrap();
        assert!(header.is_long());
        assert_eq!(header.payload_len(), 300);
    }

    #[test]
    fn test_decode_header_too_short() {
        assert!(matches!(
            decode_header(&[0x64, 0x04, 1]),
            Err(ProtocolError::Framing(_))
        ));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(encode_long(Address::default(), 0x0413, &payload).is_err());
    }

    #[test]
    fn test_decode_body_reads_payload() {
        let mock = MockTransport::new();
        mock.push_rx(&[3, 0, 0xAA, 0xBB]);
        let mut session = Session::new(mock, Duration::from_millis(20));

        let header = decode_header(&[0x15, 0x04, 4, 0, 0x81, 0x50]).unwrap();
        let frame = decode_body(header, &mut session).unwrap();
        assert_eq!(frame.payload(), Some(&[3u8, 0, 0xAA, 0xBB][..]));
        assert_eq!(frame.dest, 0x01);
        assert_eq!(frame.channel(), Some(3));
        assert_eq!(frame.id(), Some(MessageId::MotGetVelParams));
    }

    #[test]
    fn test_decode_body_short_payload_is_framing_error() {
        let mock = MockTransport::new();
        mock.push_rx(&[3, 0]);
        let mut session = Session::new(mock, Duration::from_millis(20));

        let header = decode_header(&[0x15, 0x04, 14, 0, 0x81, 0x50]).unwrap();
        assert!(matches!(
            decode_body(header, &mut session),
            Err(ProtocolError::Framing(_))
        ));
    }

    #[test]
    fn test_read_frame_short() {
        let mock = MockTransport::new();
        mock.push_rx(&encode_short(Address { dest: 0x01, src: 0x50 }, 0x0444, 1, 0));
        let mut session = Session::new(mock, Duration::from_millis(20));

        let frame = read_frame(&mut session).unwrap();
        assert_eq!(frame.id(), Some(MessageId::MotMoveHomed));
        assert_eq!(frame.params(), Some((1, 0)));
        assert_eq!(frame.payload(), None);
    }

    #[test]
    fn test_frame_to_bytes_roundtrip() {
        let frame = Frame {
            message_id: 0x0464,
            dest: 0x01,
            src: 0x50,
            body: Body::Long(vec![1, 0, 2, 3]),
        };
        let bytes = frame.to_bytes().unwrap();

        let mock = MockTransport::new();
        mock.push_rx(&bytes);
        let mut session = Session::new(mock, Duration::from_millis(20));
        assert_eq!(read_frame(&mut session).unwrap(), frame);
    }
}

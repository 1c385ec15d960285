//! Frame assembly: a fixed header followed by an append-only field log.

use std::fmt;

use crate::error::{DriverError, Result};

/// Header width in bytes: payload length (2 bytes BE) then kind (1 byte).
pub const HEADER_SIZE: usize = 3;

/// A complete frame as written to the device.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// Raw wire bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Total length on the wire.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Payload length declared in the header.
    pub fn declared_len(&self) -> usize {
        u16::from_be_bytes([self.0[0], self.0[1]]) as usize
    }

    /// Kind tag from the header.
    pub fn kind(&self) -> u8 {
        self.0[2]
    }

    /// Everything after the header.
    pub fn payload(&self) -> &[u8] {
        &self.0[HEADER_SIZE..]
    }

    /// Space-separated uppercase hex, for logs and the CLI.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ")
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame(kind={}, len={}, [{}])", self.kind(), self.len(), self.to_hex())
    }
}

/// Builds a frame from typed fields.
///
/// Fields are appended in call order with network byte order. The declared
/// length is checked against the accumulated payload in [`FrameBuilder::build`].
#[derive(Debug)]
pub struct FrameBuilder {
    total_length: usize,
    kind: u8,
    payload: Vec<u8>,
}

impl FrameBuilder {
    pub fn new(total_length: usize, kind: u8) -> Self {
        Self {
            total_length,
            kind,
            payload: Vec::with_capacity(total_length),
        }
    }

    pub fn add_byte(mut self, value: u8) -> Self {
        self.payload.push(value);
        self
    }

    pub fn add_short(mut self, value: u16) -> Self {
        self.payload.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn add_int(mut self, value: u32) -> Self {
        self.payload.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Raw string bytes, no length prefix.
    pub fn add_string(mut self, value: &str) -> Self {
        self.payload.extend_from_slice(value.as_bytes());
        self
    }

    pub fn add_bytes(mut self, bytes: &[u8]) -> Self {
        self.payload.extend_from_slice(bytes);
        self
    }

    /// Prepend the header and return the finished frame.
    pub fn build(self) -> Result<Frame> {
        if self.payload.len() != self.total_length {
            return Err(DriverError::encoding(format!(
                "declared length {} but payload has {} bytes",
                self.total_length,
                self.payload.len()
            )));
        }
        let declared = u16::try_from(self.total_length)
            .map_err(|_| DriverError::encoding(format!("payload too large: {} bytes", self.total_length)))?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        bytes.extend_from_slice(&declared.to_be_bytes());
        bytes.push(self.kind);
        bytes.extend_from_slice(&self.payload);

        Ok(Frame(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_header_and_length() {
        let frame = FrameBuilder::new(7, 9)
            .add_byte(0x01)
            .add_short(0x0203)
            .add_int(0x0405_0607)
            .build()
            .unwrap();

        assert_eq!(frame.len(), HEADER_SIZE + 7);
        assert_eq!(frame.declared_len(), 7);
        assert_eq!(frame.kind(), 9);
        assert_eq!(frame.payload(), &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
    }

    #[test]
    fn test_string_has_no_length_prefix() {
        let frame = FrameBuilder::new(3, 1).add_string("abc").build().unwrap();
        assert_eq!(frame.payload(), b"abc");
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let short = FrameBuilder::new(4, 1).add_short(1).build();
        assert!(matches!(short, Err(DriverError::Encoding(_))));

        let long = FrameBuilder::new(1, 1).add_short(1).build();
        assert!(matches!(long, Err(DriverError::Encoding(_))));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let big = vec![0u8; u16::MAX as usize + 1];
        let result = FrameBuilder::new(big.len(), 1).add_bytes(&big).build();
        assert!(matches!(result, Err(DriverError::Encoding(_))));
    }

    #[test]
    fn test_empty_payload() {
        let frame = FrameBuilder::new(0, 5).build().unwrap();
        assert_eq!(frame.as_bytes(), &[0x00, 0x00, 0x05]);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_to_hex() {
        let frame = FrameBuilder::new(2, 0xAB).add_bytes(&[0x0F, 0xF0]).build().unwrap();
        assert_eq!(frame.to_hex(), "00 02 AB 0F F0");
    }
}

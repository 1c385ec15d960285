//! ErgoWifi frame layouts and checksum calculation.

use super::frame::{Frame, FrameBuilder};
use super::sequence::MessageSequence;
use crate::error::{DriverError, Result};

// Frame kinds
pub const KIND_LOGIN: u8 = 1;
pub const KIND_COMMAND: u8 = 7;

// Login constants
pub(crate) const LOGIN_MARKER: u8 = 3;
/// Session timeout requested at login, in seconds.
pub const LOGIN_SESSION_TIMEOUT_SECS: u16 = 180;
/// marker(1) + user id(4) + token length(2) + terminator(1) + timeout(2)
const LOGIN_FIXED_LEN: usize = 10;

// Command block constants
pub(crate) const COMMAND_MARKER: [u8; 2] = [0x04, 0x01];
pub(crate) const BLOCK_PREFIX: [u8; 11] = [0xAA, 0x03, 0x00, 0x0F, 0x00, 0x12, 0x23, 0x34, 0x45, 0x00, 0x00];
pub(crate) const BLOCK_TRAILER: [u8; 2] = [0x40, 0x55];
/// prefix(11) + command bytes(6) + checksum(1) + trailer(2)
pub const COMMAND_BLOCK_LEN: usize = BLOCK_PREFIX.len() + 6 + 1 + BLOCK_TRAILER.len();
/// device id(4) + message id(2) + flag(1)
const COMMAND_FIXED_LEN: usize = 7;

/// Build the login frame sent as the first bytes on a new connection.
pub fn login_frame(user_id: u32, authorize: &str) -> Result<Frame> {
    let token_len = u16::try_from(authorize.len())
        .map_err(|_| DriverError::encoding(format!("authorize token too long: {} bytes", authorize.len())))?;

    FrameBuilder::new(authorize.len() + LOGIN_FIXED_LEN, KIND_LOGIN)
        .add_byte(LOGIN_MARKER)
        .add_int(user_id)
        .add_short(token_len)
        .add_string(authorize)
        .add_byte(0)
        .add_short(LOGIN_SESSION_TIMEOUT_SECS)
        .build()
}

/// Marker bytes followed by the command code in little-endian order.
pub fn command_bytes(command: u32) -> [u8; 6] {
    let code = command.to_le_bytes();
    [COMMAND_MARKER[0], COMMAND_MARKER[1], code[0], code[1], code[2], code[3]]
}

/// One's-complement of the byte sum, truncated to 8 bits.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// The fixed-structure block carrying one command.
pub fn command_block(command: u32) -> [u8; COMMAND_BLOCK_LEN] {
    let cmd = command_bytes(command);
    let mut block = [0u8; COMMAND_BLOCK_LEN];

    let (prefix, rest) = block.split_at_mut(BLOCK_PREFIX.len());
    prefix.copy_from_slice(&BLOCK_PREFIX);
    rest[..cmd.len()].copy_from_slice(&cmd);
    rest[cmd.len()] = checksum(&cmd);
    rest[cmd.len() + 1..].copy_from_slice(&BLOCK_TRAILER);

    block
}

/// Build a command frame, taking the next id from `sequence`.
pub fn command_frame(sequence: &MessageSequence, device_id: u32, command: u32) -> Result<Frame> {
    let message_id = sequence.next_id();
    let block = command_block(command);

    FrameBuilder::new(block.len() + COMMAND_FIXED_LEN, KIND_COMMAND)
        .add_int(device_id)
        .add_short(message_id)
        .add_byte(0)
        .add_bytes(&block)
        .build()
}

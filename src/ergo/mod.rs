//! ErgoWifi binary TCP protocol driver.
//!
//! Builds login and command frames, opens authenticated sessions and sends
//! commands once or on a cancellable repeat schedule.

mod auth;
mod controller;
mod frame;
mod protocol;
mod repeat;
mod sequence;
mod session;


// Re-export public API
pub use auth::{AuthDetails, AuthProvider, StaticAuth};
pub use controller::{CommandDispatcher, Controller, DEFAULT_REPEAT_WAIT, Dispatch, SkipReason};
pub use frame::{Frame, FrameBuilder, HEADER_SIZE};
pub use protocol::{
    COMMAND_BLOCK_LEN, KIND_COMMAND, KIND_LOGIN, LOGIN_SESSION_TIMEOUT_SECS, checksum, command_block, command_bytes,
    command_frame, login_frame,
};
pub use repeat::{RepeatOptions, RepeatOutcome, RepeatTimer};
pub use sequence::{MESSAGE_ID_MAX, MESSAGE_ID_MIN, MessageSequence};
pub use session::{Connector, Session, TcpConnector, TcpSession};

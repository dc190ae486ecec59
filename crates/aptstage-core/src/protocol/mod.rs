//! APT Serial Protocol Communication
//!
//! Implements the Thorlabs APT binary protocol used by single-channel motion
//! controllers driving a rotation stage.
//!
//! Every exchange is synchronous: a request is written and the very next frame
//! on the wire is taken as its reply. There is no background reader, so only
//! one request may be in flight per [`Connection`].

mod connection;
mod error;
pub mod frame;
pub mod messages;
pub mod mock;
mod motion;
pub mod params;
pub mod serial;
mod transport;

pub use connection::{Connection, ConnectionConfig};
pub use error::ProtocolError;
pub use frame::{Address, Body, Frame, Header};
pub use messages::MessageId;
pub use motion::{Direction, MotionState, MoveCompletion, StopMode};
pub use params::{
    BowIndex, ButtonParameters, DeviceReport, FirmwareVersion, HardwareInfo, HomeParameters,
    JogParameters, MotionStatus, Parameter, PidParameters, Position, PotentiometerParameters,
    VelocityParameters,
};
pub use serial::{open_port, SerialTransport};
pub use transport::{Session, TimeoutScope, Transport};

/// Default baud rate for controller communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default timeout for command replies in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Default time to wait for a move to report completion, in milliseconds
pub const DEFAULT_MOTION_TIMEOUT_MS: u64 = 120_000;

/// Generic USB controller address
pub const DEFAULT_DEST: u8 = 0x50;

/// Host address
pub const DEFAULT_SRC: u8 = 0x01;

/// Size of every frame header
pub const HEADER_LEN: usize = 6;

/// Destination bit marking a frame that carries a payload
pub const LONG_FRAME_FLAG: u8 = 0x80;

/// Largest payload accepted in either direction
pub const MAX_PAYLOAD_SIZE: usize = 512;

//! # aptstage Core Library
//!
//! Protocol driver for Thorlabs APT motion controllers driving a motorized
//! rotation stage over a USB serial link.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Framing of the APT short/long binary message format
//! - A timeout-bounded transport session over any byte stream
//! - Typed encode/decode for every controller parameter block
//! - Parameter get/set and blocking motion commands
//!
//! ## Example
//!
//! ```rust,ignore
//! use aptstage_core::protocol::{Connection, ConnectionConfig};
//!
//! let config = ConnectionConfig::default();
//! let mut conn = Connection::open(&config)?;
//!
//! let velocity = conn.get_velocity(1)?;
//! println!("max velocity: {}", velocity.max_velocity);
//!
//! conn.move_home(1)?;
//! conn.move_absolute_degrees(1, 45.0)?;
//! ```

pub mod protocol;
pub mod units;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        Connection, ConnectionConfig, Direction, MoveCompletion, Parameter, ProtocolError,
        StopMode, Transport,
    };
    pub use crate::units::{counts, degrees};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

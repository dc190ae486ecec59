#![allow(dead_code)]

use aptstage_core::protocol::frame::{encode_long, encode_short};
use aptstage_core::protocol::mock::MockTransport;
use aptstage_core::protocol::{Address, Connection, ConnectionConfig, MessageId};
use tracing_subscriber::EnvFilter;

/// Addresses as seen on frames coming back from the controller
pub const FROM_CONTROLLER: Address = Address {
    dest: 0x01,
    src: 0x50,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn short_reply(id: MessageId, param1: u8, param2: u8) -> Vec<u8> {
    encode_short(FROM_CONTROLLER, id.code(), param1, param2)
}

pub fn long_reply(id: MessageId, payload: &[u8]) -> Vec<u8> {
    encode_long(FROM_CONTROLLER, id.code(), payload).expect("payload fits")
}

pub fn connection(
    mock: &MockTransport,
    timeout_ms: u64,
    motion_timeout_ms: u64,
) -> Connection<MockTransport> {
    init_tracing();
    let config = ConnectionConfig {
        timeout_ms,
        motion_timeout_ms,
        ..ConnectionConfig::default()
    };
    Connection::with_transport(mock.clone(), &config)
}

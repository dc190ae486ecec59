mod common;

use std::time::{Duration, Instant};

use aptstage_core::protocol::mock::MockTransport;
use aptstage_core::protocol::{
    Direction, MessageId, MotionStatus, Parameter, Position, ProtocolError, StopMode,
};
use common::{connection, long_reply, short_reply};
use pretty_assertions::assert_eq;

#[test]
fn test_move_absolute_completes_after_delay() {
    let mock = MockTransport::new();
    mock.on_message(
        MessageId::MotMoveAbsolute,
        short_reply(MessageId::MotMoveCompleted, 1, 0),
        Duration::from_millis(50),
    );
    let mut conn = connection(&mock, 20, 2000);

    let start = Instant::now();
    let done = conn.move_absolute(1, Some(1000)).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(done.channel, 1);
    assert_eq!(done.kind, MessageId::MotMoveCompleted);
    assert_eq!(done.status, None);
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(2000));

    let writes = mock.writes();
    assert_eq!(mock.written_ids(), vec![0x0450, 0x0453]);
    assert_eq!(
        Position::decode(&writes[0][6..]).unwrap(),
        Position {
            channel: 1,
            counts: 1000
        }
    );
    assert_eq!(writes[1], vec![0x53, 0x04, 1, 0, 0x50, 0x01]);
}

#[test]
fn test_move_without_completion_hits_motion_timeout() {
    let mock = MockTransport::new();
    let mut conn = connection(&mock, 20, 300);

    let start = Instant::now();
    let result = conn.move_absolute(1, Some(1000));
    let elapsed = start.elapsed();

    match result {
        Err(ProtocolError::MotionTimeout { channel, timeout }) => {
            assert_eq!(channel, 1);
            assert_eq!(timeout, Duration::from_millis(300));
        }
        other => panic!("expected motion timeout, got {:?}", other),
    }
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(600));
    assert_eq!(conn.session().timeout(), Duration::from_millis(20));
}

#[test]
fn test_timeout_restored_after_framing_error() {
    let mock = MockTransport::new();
    let mut header = long_reply(MessageId::MotMoveCompleted, &[0u8; 14]);
    header.truncate(8);
    mock.on_message(MessageId::MotMoveHome, header, Duration::ZERO);
    let mut conn = connection(&mock, 25, 200);

    assert!(matches!(conn.move_home(1), Err(ProtocolError::Framing(_))));
    assert_eq!(conn.session().timeout(), Duration::from_millis(25));
}

#[test]
fn test_closed_stream_fails_move_immediately() {
    let mock = MockTransport::new();
    mock.close();
    let mut conn = connection(&mock, 20, 2000);

    let start = Instant::now();
    let err = conn.move_home(1).unwrap_err();
    let elapsed = start.elapsed();

    match &err {
        ProtocolError::IoError(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("expected EOF, got {:?}", other),
    }
    assert!(err.is_desync());
    assert!(elapsed < Duration::from_millis(500));
    assert_eq!(conn.session().timeout(), Duration::from_millis(20));
}

#[test]
fn test_move_to_wide_channel_writes_nothing() {
    let mock = MockTransport::new();
    let mut conn = connection(&mock, 20, 1000);

    assert!(matches!(
        conn.move_absolute(300, Some(1000)),
        Err(ProtocolError::InvalidChannel(300))
    ));
    assert!(matches!(
        conn.move_relative(300, Some(-50)),
        Err(ProtocolError::InvalidChannel(300))
    ));
    assert!(mock.writes().is_empty());
}

#[test]
fn test_unrelated_frames_are_skipped() {
    let status = MotionStatus {
        channel: 1,
        position: 0,
        velocity: 0,
        motor_current: 0,
        status_bits: 0x8000_0200,
    };
    let mut replies = long_reply(MessageId::MotGetDcStatusUpdate, &status.encode());
    replies.extend(short_reply(MessageId::MotMoveCompleted, 2, 0));
    replies.extend(short_reply(MessageId::MotMoveHomed, 1, 0));

    let mock = MockTransport::new();
    mock.on_message(MessageId::MotMoveHome, replies, Duration::from_millis(10));
    let mut conn = connection(&mock, 20, 1000);

    let done = conn.move_home(1).unwrap();
    assert_eq!(done.kind, MessageId::MotMoveHomed);
    assert_eq!(done.channel, 1);
    assert_eq!(mock.written_ids(), vec![0x0443]);
}

#[test]
fn test_long_completion_carries_status() {
    let status = MotionStatus {
        channel: 1,
        position: 16380,
        velocity: 0,
        motor_current: 12,
        status_bits: 0x8000_0400,
    };
    let mock = MockTransport::new();
    mock.on_message(
        MessageId::MotMoveRelative,
        long_reply(MessageId::MotMoveCompleted, &status.encode()),
        Duration::from_millis(5),
    );
    let mut conn = connection(&mock, 20, 1000);

    let done = conn.move_relative(1, None).unwrap();
    assert_eq!(done.status, Some(status));
    assert_eq!(mock.written_ids(), vec![0x0448]);
}

#[test]
fn test_device_error_during_move() {
    let mock = MockTransport::new();
    mock.on_message(
        MessageId::MotMoveJog,
        short_reply(MessageId::HwResponse, 0, 0),
        Duration::ZERO,
    );
    let mut conn = connection(&mock, 20, 1000);

    assert!(matches!(
        conn.move_jog(1, Direction::Reverse),
        Err(ProtocolError::Device { .. })
    ));
    assert_eq!(mock.writes()[0], vec![0x6A, 0x04, 1, 2, 0x50, 0x01]);
}

#[test]
fn test_velocity_and_stop_do_not_wait() {
    let mock = MockTransport::new();
    let mut conn = connection(&mock, 20, 5000);

    let start = Instant::now();
    conn.move_velocity(1, Direction::Forward).unwrap();
    conn.stop(1, StopMode::Immediate).unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));

    assert_eq!(
        mock.writes(),
        vec![
            vec![0x57, 0x04, 1, 1, 0x50, 0x01],
            vec![0x65, 0x04, 1, 1, 0x50, 0x01],
        ]
    );
}

#[test]
fn test_await_stopped_ignores_completed() {
    let mut replies = short_reply(MessageId::MotMoveCompleted, 1, 0);
    replies.extend(short_reply(MessageId::MotMoveStopped, 1, 0));

    let mock = MockTransport::new();
    mock.on_message(MessageId::MotMoveStop, replies, Duration::from_millis(5));
    let mut conn = connection(&mock, 20, 1000);

    conn.stop(1, StopMode::default()).unwrap();
    let done = conn.await_stopped(1).unwrap();
    assert_eq!(done.kind, MessageId::MotMoveStopped);
}

#[test]
fn test_move_absolute_degrees_truncates() {
    let mock = MockTransport::new();
    mock.on_message(
        MessageId::MotMoveAbsolute,
        short_reply(MessageId::MotMoveCompleted, 1, 0),
        Duration::ZERO,
    );
    let mut conn = connection(&mock, 20, 1000);

    conn.move_absolute_degrees(1, 10.0009).unwrap();
    let set = Position::decode(&mock.writes()[0][6..]).unwrap();
    assert_eq!(set.counts, 16381);
}

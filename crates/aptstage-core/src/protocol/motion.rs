//! Motion commands
//!
//! Home, relative, absolute and jog moves block until the controller sends a
//! completion frame for the channel, bounded by the connection's motion
//! timeout rather than the reply timeout. Velocity moves and stop return as
//! soon as the command is written.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use super::{
    connection::{check_error_report, short_channel},
    frame, messages, Connection, MessageId, MotionStatus, Parameter, ProtocolError, Transport,
};
use crate::units;

/// Direction of a jog or velocity move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Positive counts
    Forward,
    /// Negative counts
    Reverse,
}

impl Direction {
    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => 2,
        }
    }
}

/// How a stop command brings the motor to rest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopMode {
    /// Abrupt stop
    Immediate,
    /// Decelerate along the velocity profile
    #[default]
    Profiled,
}

impl StopMode {
    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            StopMode::Immediate => 1,
            StopMode::Profiled => 2,
        }
    }
}

/// Progress of a single blocking move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Nothing sent yet
    Idle,
    /// Trigger frame written
    CommandSent,
    /// Waiting for the completion frame
    AwaitingCompletion,
    /// Completion frame received
    Completed,
    /// Motion deadline passed; the motor may still be moving
    TimedOut,
}

impl MotionState {
    /// Whether a move in this state is finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, MotionState::Completed | MotionState::TimedOut)
    }

    /// Whether `next` is a legal successor
    pub fn can_advance_to(self, next: MotionState) -> bool {
        use MotionState::*;
        matches!(
            (self, next),
            (Idle, CommandSent)
                | (CommandSent, AwaitingCompletion)
                | (AwaitingCompletion, Completed)
                | (AwaitingCompletion, TimedOut)
        )
    }
}

struct MoveRun {
    channel: u16,
    trigger: MessageId,
    state: MotionState,
}

impl MoveRun {
    fn new(channel: u16, trigger: MessageId) -> Self {
        Self {
            channel,
            trigger,
            state: MotionState::Idle,
        }
    }

    fn advance(&mut self, next: MotionState) {
        debug_assert!(self.state.can_advance_to(next));
        debug!(
            channel = self.channel,
            "{}: {:?} -> {:?}", self.trigger, self.state, next
        );
        self.state = next;
    }
}

/// Completion notice for a finished move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCompletion {
    /// Channel that finished moving
    pub channel: u16,
    /// `MOVE_COMPLETED`, `MOVE_HOMED` or `MOVE_STOPPED`
    pub kind: MessageId,
    /// Status block, when the controller sent one
    pub status: Option<MotionStatus>,
}

impl<T: Transport> Connection<T> {
    /// Home the channel and wait for `MOVE_HOMED`
    pub fn move_home(&mut self, channel: u16) -> Result<MoveCompletion, ProtocolError> {
        self.run_move(channel, MessageId::MotMoveHome, 0)
    }

    /// Move by `distance` counts, or by the stored distance when `None`
    pub fn move_relative(
        &mut self,
        channel: u16,
        distance: Option<i32>,
    ) -> Result<MoveCompletion, ProtocolError> {
        short_channel(channel)?;
        if let Some(distance) = distance {
            self.set_relative_distance(channel, distance)?;
        }
        self.run_move(channel, MessageId::MotMoveRelative, 0)
    }

    /// Move to `position` counts, or to the stored target when `None`
    pub fn move_absolute(
        &mut self,
        channel: u16,
        position: Option<i32>,
    ) -> Result<MoveCompletion, ProtocolError> {
        short_channel(channel)?;
        if let Some(position) = position {
            self.set_absolute_position(channel, position)?;
        }
        self.run_move(channel, MessageId::MotMoveAbsolute, 0)
    }

    /// Move to an angle in degrees
    pub fn move_absolute_degrees(
        &mut self,
        channel: u16,
        degrees: f64,
    ) -> Result<MoveCompletion, ProtocolError> {
        self.move_absolute(channel, Some(units::counts(degrees)))
    }

    /// Jog once using the stored jog parameters
    pub fn move_jog(
        &mut self,
        channel: u16,
        direction: Direction,
    ) -> Result<MoveCompletion, ProtocolError> {
        self.run_move(channel, MessageId::MotMoveJog, direction.code())
    }

    /// Start moving at the profile velocity until [`stop`](Self::stop)
    pub fn move_velocity(
        &mut self,
        channel: u16,
        direction: Direction,
    ) -> Result<(), ProtocolError> {
        self.send_short(
            MessageId::MotMoveVelocity,
            short_channel(channel)?,
            direction.code(),
        )
    }

    /// Stop any move on the channel without waiting for `MOVE_STOPPED`
    pub fn stop(&mut self, channel: u16, mode: StopMode) -> Result<(), ProtocolError> {
        self.send_short(MessageId::MotMoveStop, short_channel(channel)?, mode.code())
    }

    /// Wait for the channel's `MOVE_STOPPED` after a [`stop`](Self::stop)
    pub fn await_stopped(&mut self, channel: u16) -> Result<MoveCompletion, ProtocolError> {
        self.await_completion(channel, |id| id == MessageId::MotMoveStopped)
    }

    fn run_move(
        &mut self,
        channel: u16,
        trigger: MessageId,
        param2: u8,
    ) -> Result<MoveCompletion, ProtocolError> {
        let param1 = short_channel(channel)?;
        let mut run = MoveRun::new(channel, trigger);

        self.send_short(trigger, param1, param2)?;
        run.advance(MotionState::CommandSent);
        run.advance(MotionState::AwaitingCompletion);

        match self.await_completion(channel, MessageId::is_move_completion) {
            Ok(done) => {
                run.advance(MotionState::Completed);
                Ok(done)
            }
            Err(e) => {
                if matches!(e, ProtocolError::MotionTimeout { .. }) {
                    run.advance(MotionState::TimedOut);
                }
                Err(e)
            }
        }
    }

    /// Read frames until an accepted completion for `channel` arrives
    ///
    /// Unrelated frames, such as status updates or completions for other
    /// channels, are skipped. The whole wait shares one deadline.
    fn await_completion(
        &mut self,
        channel: u16,
        accept: impl Fn(MessageId) -> bool,
    ) -> Result<MoveCompletion, ProtocolError> {
        let timeout = self.motion_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(channel, ?timeout, "no move completion before deadline");
                return Err(ProtocolError::MotionTimeout { channel, timeout });
            }

            let result = {
                let mut scope = self.session.with_timeout(remaining);
                frame::read_frame(&mut *scope)
            };
            let frame = match result {
                Ok(frame) => frame,
                Err(ProtocolError::Timeout { received: 0, .. }) => continue,
                Err(e) => return Err(e),
            };

            check_error_report(&frame)?;
            match frame.id() {
                Some(kind) if accept(kind) && frame.channel() == Some(channel) => {
                    let status = frame.payload().and_then(|data| {
                        MotionStatus::decode(data)
                            .map_err(|e| debug!("ignoring completion status: {}", e))
                            .ok()
                    });
                    return Ok(MoveCompletion {
                        channel,
                        kind,
                        status,
                    });
                }
                _ => debug!(
                    "skipping {} while waiting on channel {}",
                    messages::describe(frame.message_id),
                    channel
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use MotionState::*;
        assert!(Idle.can_advance_to(CommandSent));
        assert!(CommandSent.can_advance_to(AwaitingCompletion));
        assert!(AwaitingCompletion.can_advance_to(Completed));
        assert!(AwaitingCompletion.can_advance_to(TimedOut));
        assert!(!Idle.can_advance_to(Completed));
        assert!(!Completed.can_advance_to(AwaitingCompletion));
        assert!(TimedOut.is_terminal());
        assert!(!CommandSent.is_terminal());
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(Direction::Forward.code(), 1);
        assert_eq!(Direction::Reverse.code(), 2);
        assert_eq!(StopMode::default(), StopMode::Profiled);
        assert_eq!(StopMode::Immediate.code(), 1);
    }
}

//! Connection management
//!
//! [`Connection`] maps typed parameter operations onto request/reply frame
//! exchanges. Set operations are fire-and-forget; get operations send a short
//! REQ frame and take the next frame on the wire as the GET reply.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    frame::{self, encode_long, encode_short, Address, Frame},
    messages,
    params::{
        BowIndex, ButtonParameters, DeviceReport, HardwareInfo, HomeParameters, JogParameters,
        Parameter, PidParameters, Position, PotentiometerParameters, VelocityParameters,
    },
    serial::{open_port, SerialTransport},
    MessageId, ProtocolError, Session, Transport, DEFAULT_BAUD_RATE, DEFAULT_DEST,
    DEFAULT_MOTION_TIMEOUT_MS, DEFAULT_SRC, DEFAULT_TIMEOUT_MS,
};

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Controller address
    pub dest: u8,
    /// Host address
    pub src: u8,
    /// Reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Move completion timeout in milliseconds
    pub motion_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            dest: DEFAULT_DEST,
            src: DEFAULT_SRC,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            motion_timeout_ms: DEFAULT_MOTION_TIMEOUT_MS,
        }
    }
}

impl ConnectionConfig {
    /// Parse a JSON document, missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Reply timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Move completion timeout
    pub fn motion_timeout(&self) -> Duration {
        Duration::from_millis(self.motion_timeout_ms)
    }

    /// Addresses stamped on outgoing frames
    pub fn address(&self) -> Address {
        Address {
            dest: self.dest,
            src: self.src,
        }
    }
}

/// Channel number as a short-frame parameter byte
pub(crate) fn short_channel(channel: u16) -> Result<u8, ProtocolError> {
    u8::try_from(channel).map_err(|_| ProtocolError::InvalidChannel(channel))
}

/// Synchronous command dispatcher for one controller
///
/// Not safe for concurrent outstanding requests: every method writes a
/// frame and, where a reply is expected, consumes the next frame from the
/// transport. Share a `Connection` between threads only behind a mutex.
pub struct Connection<T: Transport = SerialTransport> {
    pub(crate) session: Session<T>,
    address: Address,
    pub(crate) motion_timeout: Duration,
}

impl Connection<SerialTransport> {
    /// Open the configured serial port
    pub fn open(config: &ConnectionConfig) -> Result<Self, ProtocolError> {
        let transport = open_port(&config.port_name, Some(config.baud_rate))?;
        info!(port = %config.port_name, baud = config.baud_rate, "connected");
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> Connection<T> {
    /// Drive a controller over an arbitrary transport
    pub fn with_transport(transport: T, config: &ConnectionConfig) -> Self {
        Self {
            session: Session::new(transport, config.timeout()),
            address: config.address(),
            motion_timeout: config.motion_timeout(),
        }
    }

    /// Underlying session
    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Underlying session, for timeout changes or buffer clearing
    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    /// Addresses stamped on outgoing frames
    pub fn address(&self) -> Address {
        self.address
    }

    /// Time a move may take before it is reported as timed out
    pub fn motion_timeout(&self) -> Duration {
        self.motion_timeout
    }

    /// Change the move completion timeout
    pub fn set_motion_timeout(&mut self, timeout: Duration) {
        self.motion_timeout = timeout;
    }

    /// Close the connection and hand back the transport
    pub fn into_transport(self) -> T {
        debug!(counters = ?self.session.counters(), "connection closed");
        self.session.into_inner()
    }

    /// Send a header-only frame
    pub fn send_short(
        &mut self,
        id: MessageId,
        param1: u8,
        param2: u8,
    ) -> Result<(), ProtocolError> {
        debug!("TX {} p1={} p2={}", id, param1, param2);
        let bytes = encode_short(self.address, id.code(), param1, param2);
        self.session.write(&bytes)
    }

    /// Send a frame with a payload
    pub fn send_long(&mut self, id: MessageId, payload: &[u8]) -> Result<(), ProtocolError> {
        debug!("TX {} payload={:02x?}", id, payload);
        let bytes = encode_long(self.address, id.code(), payload)?;
        self.session.write(&bytes)
    }

    /// Read the next frame within the reply timeout
    pub fn receive(&mut self) -> Result<Frame, ProtocolError> {
        frame::read_frame(&mut self.session)
    }

    /// Send a REQ frame and return the next frame as its reply
    ///
    /// The reply's message id is not matched against the request; ordering on
    /// the single outstanding exchange is what pairs them. Error reports the
    /// controller sends instead of a reply are turned into
    /// [`ProtocolError::Device`].
    pub fn request(
        &mut self,
        id: MessageId,
        param1: u8,
        param2: u8,
    ) -> Result<Frame, ProtocolError> {
        self.send_short(id, param1, param2)?;
        let reply = self.receive()?;
        check_error_report(&reply)?;
        Ok(reply)
    }

    fn set_param<P: Parameter>(&mut self, id: MessageId, param: &P) -> Result<(), ProtocolError> {
        self.send_long(id, &param.encode())
    }

    fn get_param<P: Parameter>(&mut self, id: MessageId, channel: u16) -> Result<P, ProtocolError> {
        let reply = self.request(id, short_channel(channel)?, 0)?;
        let payload = reply.payload().ok_or(ProtocolError::MalformedPayload {
            kind: P::KIND,
            expected: P::SIZE,
            actual: 0,
        })?;
        P::decode(payload)
    }

    fn get_position_like(&mut self, id: MessageId, channel: u16) -> Result<i32, ProtocolError> {
        let position: Position = self.get_param(id, channel)?;
        expect_channel(channel, position.channel)?;
        Ok(position.counts)
    }

    /// Blink the front panel LED
    pub fn identify(&mut self) -> Result<(), ProtocolError> {
        self.send_short(MessageId::ModIdentify, 0, 0)
    }

    /// Tell the controller the host is going away
    pub fn disconnect(&mut self) -> Result<(), ProtocolError> {
        self.send_short(MessageId::HwDisconnect, 0, 0)
    }

    /// Start periodic unsolicited status updates
    pub fn start_update_messages(&mut self) -> Result<(), ProtocolError> {
        self.send_short(MessageId::HwStartUpdateMsgs, 0, 0)
    }

    /// Stop periodic unsolicited status updates
    pub fn stop_update_messages(&mut self) -> Result<(), ProtocolError> {
        self.send_short(MessageId::HwStopUpdateMsgs, 0, 0)
    }

    /// Query model, serial number and firmware
    pub fn get_hardware_info(&mut self) -> Result<HardwareInfo, ProtocolError> {
        let reply = self.request(MessageId::HwReqInfo, 0, 0)?;
        let payload = reply.payload().ok_or(ProtocolError::MalformedPayload {
            kind: HardwareInfo::KIND,
            expected: HardwareInfo::SIZE,
            actual: 0,
        })?;
        HardwareInfo::decode(payload)
    }

    /// Enable or disable the drive on a channel
    pub fn set_channel_state(&mut self, channel: u16, enabled: bool) -> Result<(), ProtocolError> {
        let state = if enabled { 1 } else { 2 };
        self.send_short(MessageId::ModSetChanEnableState, short_channel(channel)?, state)
    }

    /// Whether the drive on a channel is enabled
    pub fn get_channel_state(&mut self, channel: u16) -> Result<bool, ProtocolError> {
        let reply = self.request(MessageId::ModReqChanEnableState, short_channel(channel)?, 0)?;
        let (reply_channel, state) = reply.params().ok_or_else(|| {
            ProtocolError::Framing(format!(
                "{} carried a payload, expected parameters",
                messages::describe(reply.message_id)
            ))
        })?;
        expect_channel(channel, reply_channel as u16)?;
        Ok(state == 1)
    }

    /// Overwrite the encoder counter
    pub fn set_encoder_counter(&mut self, channel: u16, counts: i32) -> Result<(), ProtocolError> {
        self.set_param(MessageId::MotSetEncCounter, &Position { channel, counts })
    }

    /// Current encoder counter
    pub fn get_encoder_counter(&mut self, channel: u16) -> Result<i32, ProtocolError> {
        self.get_position_like(MessageId::MotReqEncCounter, channel)
    }

    /// Overwrite the position counter
    pub fn set_position_counter(&mut self, channel: u16, counts: i32) -> Result<(), ProtocolError> {
        self.set_param(MessageId::MotSetPosCounter, &Position { channel, counts })
    }

    /// Current position counter
    pub fn get_position_counter(&mut self, channel: u16) -> Result<i32, ProtocolError> {
        self.get_position_like(MessageId::MotReqPosCounter, channel)
    }

    /// Set the velocity profile
    pub fn set_velocity(&mut self, params: &VelocityParameters) -> Result<(), ProtocolError> {
        self.set_param(MessageId::MotSetVelParams, params)
    }

    /// Read the velocity profile
    pub fn get_velocity(&mut self, channel: u16) -> Result<VelocityParameters, ProtocolError> {
        self.get_param(MessageId::MotReqVelParams, channel)
    }

    /// Set jog parameters
    pub fn set_jog(&mut self, params: &JogParameters) -> Result<(), ProtocolError> {
        self.set_param(MessageId::MotSetJogParams, params)
    }

    /// Read jog parameters
    pub fn get_jog(&mut self, channel: u16) -> Result<JogParameters, ProtocolError> {
        self.get_param(MessageId::MotReqJogParams, channel)
    }

    /// Set homing parameters
    pub fn set_home(&mut self, params: &HomeParameters) -> Result<(), ProtocolError> {
        self.set_param(MessageId::MotSetHomeParams, params)
    }

    /// Read homing parameters
    pub fn get_home(&mut self, channel: u16) -> Result<HomeParameters, ProtocolError> {
        self.get_param(MessageId::MotReqHomeParams, channel)
    }

    /// Set servo loop gains
    pub fn set_pid(&mut self, params: &PidParameters) -> Result<(), ProtocolError> {
        self.set_param(MessageId::MotSetDcPidParams, params)
    }

    /// Read servo loop gains
    pub fn get_pid(&mut self, channel: u16) -> Result<PidParameters, ProtocolError> {
        self.get_param(MessageId::MotReqDcPidParams, channel)
    }

    /// Set velocity wheel mapping
    pub fn set_pot(&mut self, params: &PotentiometerParameters) -> Result<(), ProtocolError> {
        self.set_param(MessageId::MotSetPotParams, params)
    }

    /// Read velocity wheel mapping
    pub fn get_pot(&mut self, channel: u16) -> Result<PotentiometerParameters, ProtocolError> {
        self.get_param(MessageId::MotReqPotParams, channel)
    }

    /// Set front panel button behaviour
    pub fn set_button(&mut self, params: &ButtonParameters) -> Result<(), ProtocolError> {
        self.set_param(MessageId::MotSetButtonParams, params)
    }

    /// Read front panel button behaviour
    pub fn get_button(&mut self, channel: u16) -> Result<ButtonParameters, ProtocolError> {
        self.get_param(MessageId::MotReqButtonParams, channel)
    }

    /// Select the S-curve profile
    pub fn set_bow_index(&mut self, channel: u16, bow_index: u16) -> Result<(), ProtocolError> {
        self.set_param(MessageId::MotSetBowIndex, &BowIndex { channel, bow_index })
    }

    /// Current S-curve profile
    pub fn get_bow_index(&mut self, channel: u16) -> Result<u16, ProtocolError> {
        let bow: BowIndex = self.get_param(MessageId::MotReqBowIndex, channel)?;
        expect_channel(channel, bow.channel)?;
        Ok(bow.bow_index)
    }

    /// Distance used by the next relative move
    pub fn set_relative_distance(
        &mut self,
        channel: u16,
        distance: i32,
    ) -> Result<(), ProtocolError> {
        self.set_param(
            MessageId::MotSetMoveRelParams,
            &Position {
                channel,
                counts: distance,
            },
        )
    }

    /// Stored relative move distance
    pub fn get_relative_distance(&mut self, channel: u16) -> Result<i32, ProtocolError> {
        self.get_position_like(MessageId::MotReqMoveRelParams, channel)
    }

    /// Target used by the next absolute move
    pub fn set_absolute_position(
        &mut self,
        channel: u16,
        position: i32,
    ) -> Result<(), ProtocolError> {
        self.set_param(
            MessageId::MotSetMoveAbsParams,
            &Position {
                channel,
                counts: position,
            },
        )
    }

    /// Stored absolute move target
    pub fn get_absolute_position(&mut self, channel: u16) -> Result<i32, ProtocolError> {
        self.get_position_like(MessageId::MotReqMoveAbsParams, channel)
    }
}

fn expect_channel(requested: u16, reported: u16) -> Result<(), ProtocolError> {
    if requested == reported {
        Ok(())
    } else {
        Err(ProtocolError::Framing(format!(
            "reply for channel {} while channel {} was requested",
            reported, requested
        )))
    }
}

/// Turn a controller error report into an error
pub(crate) fn check_error_report(frame: &Frame) -> Result<(), ProtocolError> {
    let Some(id) = frame.id().filter(|id| id.is_error_report()) else {
        return Ok(());
    };

    if id != MessageId::HwRichResponse {
        warn!("controller reported an unspecified error");
        return Err(ProtocolError::Device {
            code: 0,
            message: "unspecified hardware response".to_string(),
        });
    }

    let report = frame
        .payload()
        .map(DeviceReport::decode)
        .transpose()?
        .ok_or(ProtocolError::MalformedPayload {
            kind: DeviceReport::KIND,
            expected: DeviceReport::SIZE,
            actual: 0,
        })?;
    warn!(
        "controller reported error {:#06x} while handling {}: {}",
        report.code,
        messages::describe(report.message_id),
        report.notes
    );
    Err(ProtocolError::Device {
        code: report.code,
        message: report.notes,
    })
}

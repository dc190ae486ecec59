//! Parameter structures
//!
//! Each record mirrors one APT payload layout field for field, little-endian,
//! no padding. Values are not range-checked: the controller is the authority
//! on what it accepts.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Little-endian payload writer
pub struct PayloadBuilder {
    payload: Vec<u8>,
}

impl PayloadBuilder {
    /// Create a builder with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            payload: Vec::with_capacity(capacity),
        }
    }

    /// Add a single byte
    pub fn u8(mut self, value: u8) -> Self {
        self.payload.push(value);
        self
    }

    /// Add a 16-bit unsigned value
    pub fn u16(mut self, value: u16) -> Self {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add a 16-bit signed value
    pub fn i16(mut self, value: i16) -> Self {
        let mut bytes = [0u8; 2];
        LittleEndian::write_i16(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add a 32-bit unsigned value
    pub fn u32(mut self, value: u32) -> Self {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add a 32-bit signed value
    pub fn i32(mut self, value: i32) -> Self {
        let mut bytes = [0u8; 4];
        LittleEndian::write_i32(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add a NUL-padded string field of exactly `width` bytes
    pub fn text(mut self, value: &str, width: usize) -> Self {
        let bytes = value.as_bytes();
        let n = bytes.len().min(width);
        self.payload.extend_from_slice(&bytes[..n]);
        self.payload.resize(self.payload.len() + (width - n), 0);
        self
    }

    /// Add `n` zero bytes
    pub fn zeros(mut self, n: usize) -> Self {
        self.payload.resize(self.payload.len() + n, 0);
        self
    }

    /// Finish the payload
    pub fn build(self) -> Vec<u8> {
        self.payload
    }
}

/// Sequential little-endian reader over a payload whose length was checked
pub struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> &'a [u8] {
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    /// Next byte
    pub fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    /// Next 16-bit unsigned value
    pub fn u16(&mut self) -> u16 {
        LittleEndian::read_u16(self.take(2))
    }

    /// Next 16-bit signed value
    pub fn i16(&mut self) -> i16 {
        LittleEndian::read_i16(self.take(2))
    }

    /// Next 32-bit unsigned value
    pub fn u32(&mut self) -> u32 {
        LittleEndian::read_u32(self.take(4))
    }

    /// Next 32-bit signed value
    pub fn i32(&mut self) -> i32 {
        LittleEndian::read_i32(self.take(4))
    }

    /// Next NUL-padded string field of `width` bytes
    pub fn text(&mut self, width: usize) -> String {
        let raw = self.take(width);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    /// Skip `n` bytes
    pub fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

/// A fixed-size payload record
///
/// Implementors spell out their field order in `write_fields`/`read_fields`;
/// the provided `encode`/`decode` add the length check.
pub trait Parameter: Sized {
    /// Human-readable kind, used in error messages
    const KIND: &'static str;
    /// Exact encoded size in bytes
    const SIZE: usize;

    /// Append fields in wire order
    fn write_fields(&self, builder: PayloadBuilder) -> PayloadBuilder;

    /// Read fields in wire order from a payload of exactly `SIZE` bytes
    fn read_fields(reader: &mut PayloadReader<'_>) -> Self;

    /// Encode to a payload of `SIZE` bytes
    fn encode(&self) -> Vec<u8> {
        self.write_fields(PayloadBuilder::with_capacity(Self::SIZE))
            .build()
    }

    /// Decode a payload, which must be exactly `SIZE` bytes long
    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != Self::SIZE {
            return Err(ProtocolError::MalformedPayload {
                kind: Self::KIND,
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        Ok(Self::read_fields(&mut PayloadReader::new(data)))
    }
}

/// Velocity profile (`MOT_*_VELPARAMS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityParameters {
    /// Channel being addressed
    pub channel: u16,
    /// Start velocity in encoder counts/s
    pub min_velocity: u32,
    /// Acceleration in encoder counts/s²
    pub acceleration: u32,
    /// Final velocity in encoder counts/s
    pub max_velocity: u32,
}

impl Parameter for VelocityParameters {
    const KIND: &'static str = "velocity";
    const SIZE: usize = 14;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.channel)
            .u32(self.min_velocity)
            .u32(self.acceleration)
            .u32(self.max_velocity)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            channel: r.u16(),
            min_velocity: r.u32(),
            acceleration: r.u32(),
            max_velocity: r.u32(),
        }
    }
}

/// Jog move settings (`MOT_*_JOGPARAMS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JogParameters {
    /// Channel being addressed
    pub channel: u16,
    /// 1 = continuous, 2 = single step
    pub mode: u16,
    /// Step size in encoder counts
    pub step_size: u32,
    /// Start velocity in encoder counts/s
    pub min_velocity: u32,
    /// Acceleration in encoder counts/s²
    pub acceleration: u32,
    /// Final velocity in encoder counts/s
    pub max_velocity: u32,
    /// 1 = immediate, 2 = profiled
    pub stop_mode: u16,
}

impl Parameter for JogParameters {
    const KIND: &'static str = "jog";
    const SIZE: usize = 22;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.channel)
            .u16(self.mode)
            .u32(self.step_size)
            .u32(self.min_velocity)
            .u32(self.acceleration)
            .u32(self.max_velocity)
            .u16(self.stop_mode)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            channel: r.u16(),
            mode: r.u16(),
            step_size: r.u32(),
            min_velocity: r.u32(),
            acceleration: r.u32(),
            max_velocity: r.u32(),
            stop_mode: r.u16(),
        }
    }
}

/// Homing settings (`MOT_*_HOMEPARAMS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeParameters {
    /// Channel being addressed
    pub channel: u16,
    /// 1 = forward, 2 = reverse
    pub home_direction: u16,
    /// 1 = hardware reverse, 4 = hardware forward
    pub limit_switch: u16,
    /// Homing velocity in encoder counts/s
    pub home_velocity: u32,
    /// Distance of home from the limit switch, in encoder counts
    pub offset_distance: i32,
}

impl Parameter for HomeParameters {
    const KIND: &'static str = "home";
    const SIZE: usize = 14;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.channel)
            .u16(self.home_direction)
            .u16(self.limit_switch)
            .u32(self.home_velocity)
            .i32(self.offset_distance)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            channel: r.u16(),
            home_direction: r.u16(),
            limit_switch: r.u16(),
            home_velocity: r.u32(),
            offset_distance: r.i32(),
        }
    }
}

/// DC servo loop gains (`MOT_*_DCPIDPARAMS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidParameters {
    /// Channel being addressed
    pub channel: u16,
    /// Proportional gain
    pub proportional: u32,
    /// Integral gain
    pub integral: u32,
    /// Differential gain
    pub differential: u32,
    /// Cap on the integrator sum
    pub integral_limit: u32,
    /// Bit mask selecting which of the above the controller applies
    pub filter_control: u16,
}

impl Parameter for PidParameters {
    const KIND: &'static str = "PID";
    const SIZE: usize = 20;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.channel)
            .u32(self.proportional)
            .u32(self.integral)
            .u32(self.differential)
            .u32(self.integral_limit)
            .u16(self.filter_control)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            channel: r.u16(),
            proportional: r.u32(),
            integral: r.u32(),
            differential: r.u32(),
            integral_limit: r.u32(),
            filter_control: r.u16(),
        }
    }
}

/// Velocity wheel mapping (`MOT_*_POTPARAMS`)
///
/// Windows are deflections from the pot mid position in ADC counts (0-127);
/// each velocity applies beyond the preceding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PotentiometerParameters {
    pub channel: u16,
    pub zero_window: u16,
    pub velocity_1: u32,
    pub window_1: u16,
    pub velocity_2: u32,
    pub window_2: u16,
    pub velocity_3: u32,
    pub window_3: u16,
    pub velocity_4: u32,
}

impl Parameter for PotentiometerParameters {
    const KIND: &'static str = "potentiometer";
    const SIZE: usize = 26;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.channel)
            .u16(self.zero_window)
            .u32(self.velocity_1)
            .u16(self.window_1)
            .u32(self.velocity_2)
            .u16(self.window_2)
            .u32(self.velocity_3)
            .u16(self.window_3)
            .u32(self.velocity_4)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            channel: r.u16(),
            zero_window: r.u16(),
            velocity_1: r.u32(),
            window_1: r.u16(),
            velocity_2: r.u32(),
            window_2: r.u16(),
            velocity_3: r.u32(),
            window_3: r.u16(),
            velocity_4: r.u32(),
        }
    }
}

/// Front panel button behaviour (`MOT_*_BUTTONPARAMS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonParameters {
    /// Channel being addressed
    pub channel: u16,
    /// 1 = buttons jog, 2 = buttons go to stored positions
    pub mode: u16,
    /// Top button position in encoder counts
    pub position_1: i32,
    /// Bottom button position in encoder counts
    pub position_2: i32,
    /// Hold time for button 1, ms
    pub timeout_1: u16,
    /// Hold time for button 2, ms
    pub timeout_2: u16,
}

impl Parameter for ButtonParameters {
    const KIND: &'static str = "button";
    const SIZE: usize = 16;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.channel)
            .u16(self.mode)
            .i32(self.position_1)
            .i32(self.position_2)
            .u16(self.timeout_1)
            .u16(self.timeout_2)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            channel: r.u16(),
            mode: r.u16(),
            position_1: r.i32(),
            position_2: r.i32(),
            timeout_1: r.u16(),
            timeout_2: r.u16(),
        }
    }
}

/// S-curve profile selector (`MOT_*_BOWINDEX`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BowIndex {
    /// Channel being addressed
    pub channel: u16,
    /// 0 = trapezoidal, 1-18 = S-curve
    pub bow_index: u16,
}

impl Parameter for BowIndex {
    const KIND: &'static str = "bow index";
    const SIZE: usize = 4;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.channel).u16(self.bow_index)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            channel: r.u16(),
            bow_index: r.u16(),
        }
    }
}

/// Channel plus a signed count
///
/// Shared by the encoder/position counters and the relative and absolute
/// move targets, which all use the same 6-byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Channel being addressed
    pub channel: u16,
    /// Position or distance in encoder counts
    pub counts: i32,
}

impl Parameter for Position {
    const KIND: &'static str = "position";
    const SIZE: usize = 6;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.channel).i32(self.counts)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            channel: r.u16(),
            counts: r.i32(),
        }
    }
}

/// Firmware revision triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct FirmwareVersion {
    pub major: u8,
    pub interim: u8,
    pub minor: u8,
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.interim, self.minor)
    }
}

/// Controller identity (`HW_GET_INFO`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    /// Unit serial number
    pub serial_number: u32,
    /// Model string, up to 8 ASCII characters
    pub model: String,
    /// Hardware type code
    pub hardware_type: u16,
    /// Firmware revision
    pub firmware: FirmwareVersion,
    /// Free-form notes, up to 48 ASCII characters
    pub notes: String,
    /// Hardware revision
    pub hardware_version: u16,
    /// Modification state
    pub modification_state: u16,
    /// Number of motor channels
    pub channels: u16,
}

impl Parameter for HardwareInfo {
    const KIND: &'static str = "hardware info";
    const SIZE: usize = 84;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u32(self.serial_number)
            .text(&self.model, 8)
            .u16(self.hardware_type)
            .u8(self.firmware.minor)
            .u8(self.firmware.interim)
            .u8(self.firmware.major)
            .zeros(1)
            .text(&self.notes, 48)
            .zeros(12)
            .u16(self.hardware_version)
            .u16(self.modification_state)
            .u16(self.channels)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        let serial_number = r.u32();
        let model = r.text(8);
        let hardware_type = r.u16();
        let minor = r.u8();
        let interim = r.u8();
        let major = r.u8();
        r.skip(1);
        let notes = r.text(48);
        r.skip(12);
        Self {
            serial_number,
            model,
            hardware_type,
            firmware: FirmwareVersion {
                major,
                interim,
                minor,
            },
            notes,
            hardware_version: r.u16(),
            modification_state: r.u16(),
            channels: r.u16(),
        }
    }
}

/// DC servo status block carried by move completion frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionStatus {
    /// Channel being reported
    pub channel: u16,
    /// Position in encoder counts
    pub position: i32,
    /// Velocity, controller units
    pub velocity: u16,
    /// Motor current in mA
    pub motor_current: i16,
    /// Status bit field
    pub status_bits: u32,
}

impl MotionStatus {
    const FORWARD_LIMIT: u32 = 0x0000_0001;
    const REVERSE_LIMIT: u32 = 0x0000_0002;
    const MOVING_FORWARD: u32 = 0x0000_0010;
    const MOVING_REVERSE: u32 = 0x0000_0020;
    const JOGGING_FORWARD: u32 = 0x0000_0040;
    const JOGGING_REVERSE: u32 = 0x0000_0080;
    const HOMING: u32 = 0x0000_0200;
    const HOMED: u32 = 0x0000_0400;
    const ENABLED: u32 = 0x8000_0000;

    /// Motor is moving or jogging in either direction, or homing
    pub fn is_moving(&self) -> bool {
        self.status_bits
            & (Self::MOVING_FORWARD
                | Self::MOVING_REVERSE
                | Self::JOGGING_FORWARD
                | Self::JOGGING_REVERSE
                | Self::HOMING)
            != 0
    }

    /// Homing has completed since power-up
    pub fn is_homed(&self) -> bool {
        self.status_bits & Self::HOMED != 0
    }

    /// Either hardware limit switch is active
    pub fn at_limit(&self) -> bool {
        self.status_bits & (Self::FORWARD_LIMIT | Self::REVERSE_LIMIT) != 0
    }

    /// Channel drive is enabled
    pub fn is_enabled(&self) -> bool {
        self.status_bits & Self::ENABLED != 0
    }
}

impl Parameter for MotionStatus {
    const KIND: &'static str = "motion status";
    const SIZE: usize = 14;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.channel)
            .i32(self.position)
            .u16(self.velocity)
            .i16(self.motor_current)
            .u32(self.status_bits)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            channel: r.u16(),
            position: r.i32(),
            velocity: r.u16(),
            motor_current: r.i16(),
            status_bits: r.u32(),
        }
    }
}

/// Error report sent in place of a reply (`HW_RICHRESPONSE`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReport {
    /// Message the controller was handling
    pub message_id: u16,
    /// Controller specific error code
    pub code: u16,
    /// Description, up to 64 ASCII characters
    pub notes: String,
}

impl Parameter for DeviceReport {
    const KIND: &'static str = "device report";
    const SIZE: usize = 68;

    fn write_fields(&self, b: PayloadBuilder) -> PayloadBuilder {
        b.u16(self.message_id).u16(self.code).text(&self.notes, 64)
    }

    fn read_fields(r: &mut PayloadReader<'_>) -> Self {
        Self {
            message_id: r.u16(),
            code: r.u16(),
            notes: r.text(64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_layout() {
        let params = VelocityParameters {
            channel: 3,
            min_velocity: 0,
            acceleration: 20000,
            max_velocity: 400000,
        };
        let bytes = params.encode();
        assert_eq!(
            bytes,
            vec![
                3, 0, // channel
                0, 0, 0, 0, // min
                0x20, 0x4E, 0, 0, // 20000
                0x80, 0x1A, 0x06, 0, // 400000
            ]
        );
        assert_eq!(VelocityParameters::decode(&bytes).unwrap(), params);
    }

    #[test]
    fn test_signed_fields() {
        let home = HomeParameters {
            channel: 1,
            home_direction: 2,
            limit_switch: 1,
            home_velocity: 73291,
            offset_distance: -4096,
        };
        let bytes = home.encode();
        assert_eq!(&bytes[10..14], &(-4096i32).to_le_bytes());
        assert_eq!(HomeParameters::decode(&bytes).unwrap(), home);
    }

    #[test]
    fn test_encoded_sizes_match() {
        let jog = JogParameters {
            channel: 1,
            mode: 2,
            step_size: 1638,
            min_velocity: 0,
            acceleration: 1,
            max_velocity: 2,
            stop_mode: 2,
        };
        assert_eq!(jog.encode().len(), JogParameters::SIZE);

        let pot = PotentiometerParameters {
            channel: 1,
            zero_window: 20,
            velocity_1: 1,
            window_1: 50,
            velocity_2: 2,
            window_2: 80,
            velocity_3: 3,
            window_3: 100,
            velocity_4: 4,
        };
        assert_eq!(pot.encode().len(), PotentiometerParameters::SIZE);
        assert_eq!(PotentiometerParameters::decode(&pot.encode()).unwrap(), pot);
    }

    #[test]
    fn test_wrong_length_rejected() {
        match BowIndex::decode(&[1, 0, 2]) {
            Err(ProtocolError::MalformedPayload {
                kind,
                expected,
                actual,
            }) => {
                assert_eq!(kind, "bow index");
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("expected malformed payload, got {:?}", other),
        }
        assert!(Position::decode(&[0u8; 7]).is_err());
    }

    #[test]
    fn test_hardware_info_strings() {
        let info = HardwareInfo {
            serial_number: 83_812_345,
            model: "TDC001".to_string(),
            hardware_type: 16,
            firmware: FirmwareVersion {
                major: 2,
                interim: 0,
                minor: 11,
            },
            notes: "APT DC Motor Controller".to_string(),
            hardware_version: 1,
            modification_state: 0,
            channels: 1,
        };
        let bytes = info.encode();
        assert_eq!(bytes.len(), HardwareInfo::SIZE);
        assert_eq!(&bytes[4..12], b"TDC001\0\0");
        assert_eq!(info.firmware.to_string(), "2.0.11");
        assert_eq!(HardwareInfo::decode(&bytes).unwrap(), info);
    }

    #[test]
    fn test_motion_status_bits() {
        let status = MotionStatus {
            channel: 1,
            position: 1000,
            velocity: 0,
            motor_current: -3,
            status_bits: 0x8000_0400,
        };
        assert!(status.is_homed());
        assert!(status.is_enabled());
        assert!(!status.is_moving());
        assert!(!status.at_limit());
        assert_eq!(MotionStatus::decode(&status.encode()).unwrap(), status);
    }
}

//! Serial port handling
//!
//! Provides the concrete [`Transport`] for a controller on a USB serial port.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use tracing::{debug, warn};

use super::{ProtocolError, Transport, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

/// Serial port wrapper implementing [`Transport`]
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Wrap an already opened port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Port name as reported by the driver, if any
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::from)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}

/// Open a serial port with default settings
pub fn open_port(name: &str, baud_rate: Option<u32>) -> Result<SerialTransport, ProtocolError> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
    debug!(port = name, baud, "opening serial port");

    let mut port = serialport::new(name, baud)
        .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
        .open()
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;

    configure_port(port.as_mut())?;
    clear_buffers(port.as_mut())?;
    Ok(SerialTransport::new(port))
}

/// Configure a serial port for controller communication
///
/// Standard 8N1 without flow control, with RTS asserted afterwards.
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;

    if let Err(e) = port.write_request_to_send(true) {
        warn!("failed to set RTS high: {} (continuing)", e);
    }

    Ok(())
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))
}

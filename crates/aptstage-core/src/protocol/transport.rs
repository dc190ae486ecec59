//! Transport session
//!
//! A [`Session`] owns a byte-stream [`Transport`] and turns its timeout-bounded
//! reads into "exactly N bytes or an error". It has no protocol knowledge.

use std::io::{self, ErrorKind, Read, Write};
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use tracing::trace;

use super::ProtocolError;

/// A duplex byte stream with a settable read timeout
///
/// `read` must return `ErrorKind::TimedOut` (or `WouldBlock`) when the timeout
/// elapses without data, and `Ok(0)` only when the stream is closed.
pub trait Transport: Read + Write + Send {
    /// Set timeout for subsequent reads
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard any bytes received but not yet read
    fn clear_input_buffer(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_timeout(timeout)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        (**self).clear_input_buffer()
    }
}

/// Byte-stream session with a default read timeout
///
/// Only one request may be outstanding at a time. Callers sharing a session
/// across threads must hold a mutex for a whole request/response exchange.
pub struct Session<T> {
    transport: T,
    timeout: Duration,
    tx_bytes: u64,
    rx_bytes: u64,
}

impl<T: Transport> Session<T> {
    /// Wrap a transport with the given default read timeout
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            tx_bytes: 0,
            rx_bytes: 0,
        }
    }

    /// Currently active read timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the default read timeout for the rest of the session
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Override the read timeout until the returned scope is dropped
    ///
    /// The previous timeout is restored on every exit path, including early
    /// returns through `?` and unwinding.
    pub fn with_timeout(&mut self, timeout: Duration) -> TimeoutScope<'_, T> {
        let previous = std::mem::replace(&mut self.timeout, timeout);
        trace!(?previous, ?timeout, "timeout override");
        TimeoutScope {
            session: self,
            previous,
        }
    }

    /// Write all bytes and flush
    pub fn write(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        trace!(len = data.len(), bytes = ?data, "write");
        self.transport.write_all(data)?;
        self.transport.flush()?;
        self.tx_bytes = self.tx_bytes.saturating_add(data.len() as u64);
        Ok(())
    }

    /// Read exactly `n` bytes before `timeout` elapses
    ///
    /// Never returns a partially filled buffer: a short read is reported as
    /// [`ProtocolError::Timeout`] with the count that did arrive. A closed
    /// stream is an [`ErrorKind::UnexpectedEof`] I/O error.
    pub fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; n];
        let deadline = Instant::now() + timeout;
        let mut filled = 0;

        while filled < n {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                trace!(filled, n, "read_exact: deadline reached");
                return Err(ProtocolError::Timeout {
                    expected: n,
                    received: filled,
                });
            }

            self.transport.set_timeout(remaining)?;
            match self.transport.read(&mut buf[filled..]) {
                Ok(0) => {
                    trace!(filled, n, "read_exact: stream closed");
                    return Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("stream closed after {} of {} bytes", filled, n),
                    )
                    .into());
                }
                Ok(k) => filled += k,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.rx_bytes = self.rx_bytes.saturating_add(n as u64);
        trace!(len = n, bytes = ?buf, "read");
        Ok(buf)
    }

    /// Drop anything buffered on the receive side
    pub fn clear_input(&mut self) -> Result<(), ProtocolError> {
        self.transport.clear_input_buffer()?;
        Ok(())
    }

    /// Cumulative (tx, rx) byte counters
    pub fn counters(&self) -> (u64, u64) {
        (self.tx_bytes, self.rx_bytes)
    }

    /// Borrow the underlying transport
    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session and return the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}

/// Scoped read-timeout override, see [`Session::with_timeout`]
pub struct TimeoutScope<'a, T: Transport> {
    session: &'a mut Session<T>,
    previous: Duration,
}

impl<T: Transport> Deref for TimeoutScope<'_, T> {
    type Target = Session<T>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<T: Transport> DerefMut for TimeoutScope<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<T: Transport> Drop for TimeoutScope<'_, T> {
    fn drop(&mut self) {
        self.session.timeout = self.previous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockTransport;

    #[test]
    fn test_read_exact_full() {
        let mock = MockTransport::new();
        mock.push_rx(&[1, 2, 3, 4]);
        let mut session = Session::new(mock, Duration::from_millis(50));

        let bytes = session.read_exact(3, Duration::from_millis(50)).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(session.counters(), (0, 3));
    }

    #[test]
    fn test_read_exact_zero_bytes() {
        let mut session = Session::new(MockTransport::new(), Duration::from_millis(10));
        assert!(session.read_exact(0, Duration::ZERO).unwrap().is_empty());
    }

    #[test]
    fn test_read_exact_short_read_is_timeout() {
        let mock = MockTransport::new();
        mock.push_rx(&[9, 9]);
        let mut session = Session::new(mock, Duration::from_millis(20));

        match session.read_exact(6, Duration::from_millis(20)) {
            Err(ProtocolError::Timeout { expected, received }) => {
                assert_eq!(expected, 6);
                assert_eq!(received, 2);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_read_exact_closed_stream_is_eof() {
        let mock = MockTransport::new();
        mock.push_rx(&[7]);
        mock.close();
        let mut session = Session::new(mock, Duration::from_millis(500));

        let start = Instant::now();
        match session.read_exact(6, Duration::from_millis(500)) {
            Err(ProtocolError::IoError(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected EOF, got {:?}", other),
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_with_timeout_restores() {
        let mut session = Session::new(MockTransport::new(), Duration::from_millis(100));
        {
            let scope = session.with_timeout(Duration::from_secs(5));
            assert_eq!(scope.timeout(), Duration::from_secs(5));
        }
        assert_eq!(session.timeout(), Duration::from_millis(100));
    }
}

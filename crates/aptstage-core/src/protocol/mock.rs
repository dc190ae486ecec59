//! Scripted in-memory transport
//!
//! Stands in for a controller in tests and demos. Replies are armed by the
//! message id of a written frame and become readable after a delay measured
//! from that write, so timing behaviour can be exercised against a real clock.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use byteorder::{ByteOrder, LittleEndian};

use super::{MessageId, Transport};

struct Rule {
    trigger: u16,
    reply: Vec<u8>,
    delay: Duration,
}

struct Scheduled {
    due: Instant,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    writes: Vec<Vec<u8>>,
    rx: VecDeque<u8>,
    rules: VecDeque<Rule>,
    pending: Vec<Scheduled>,
    timeout: Duration,
    closed: bool,
}

impl MockState {
    fn release_due(&mut self, now: Instant) {
        self.pending.sort_by_key(|s| s.due);
        while self.pending.first().is_some_and(|s| s.due <= now) {
            let s = self.pending.remove(0);
            self.rx.extend(s.bytes);
        }
    }
}

/// Cloneable handle to a scripted transport
///
/// Clones share state, so a test can keep one handle for inspection while the
/// other is owned by a [`Connection`](super::Connection).
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create an empty transport with nothing to read
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make bytes readable immediately
    pub fn push_rx(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    /// Reply with `reply` once a frame carrying `trigger` is written
    ///
    /// Each rule fires once, in the order rules were added.
    pub fn on_message(&self, trigger: MessageId, reply: Vec<u8>, delay: Duration) {
        self.lock().rules.push_back(Rule {
            trigger: trigger.code(),
            reply,
            delay,
        });
    }

    /// Behave like a closed stream once buffered bytes are drained
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Every write call, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Message ids of every written frame, in order
    pub fn written_ids(&self) -> Vec<u16> {
        self.lock()
            .writes
            .iter()
            .filter(|w| w.len() >= 2)
            .map(|w| LittleEndian::read_u16(&w[0..2]))
            .collect()
    }

    /// Read timeout most recently set by the session
    pub fn last_timeout(&self) -> Duration {
        self.lock().timeout
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = Instant::now();
        loop {
            let wait_until = {
                let mut state = self.lock();
                let now = Instant::now();
                state.release_due(now);

                if !state.rx.is_empty() {
                    let n = buf.len().min(state.rx.len());
                    for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
                if state.closed && state.pending.is_empty() {
                    return Ok(0);
                }

                let deadline = start + state.timeout;
                match state.pending.first().map(|s| s.due) {
                    Some(due) if due <= deadline => due,
                    _ => {
                        drop(state);
                        std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                        return Err(io::Error::new(io::ErrorKind::TimedOut, "mock read timed out"));
                    }
                }
            };
            std::thread::sleep(wait_until.saturating_duration_since(Instant::now()));
        }
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.writes.push(buf.to_vec());

        if buf.len() >= 2 {
            let code = LittleEndian::read_u16(&buf[0..2]);
            if let Some(pos) = state.rules.iter().position(|r| r.trigger == code) {
                if let Some(rule) = state.rules.remove(pos) {
                    state.pending.push(Scheduled {
                        due: Instant::now() + rule.delay,
                        bytes: rule.reply,
                    });
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.lock().timeout = timeout;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.lock().rx.clear();
        Ok(())
    }
}

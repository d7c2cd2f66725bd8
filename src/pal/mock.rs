//! Scripted In-Memory Serial Port
//!
//! Test double for [`SerialPort`]. Incoming bytes are queued by the test
//! (directly or through a write responder) and outgoing bytes are
//! captured, so driver and transport receive loops can be exercised
//! without hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::Result;
use crate::pal::SerialPort;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct MockInner {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    responder: Option<Responder>,
}

#[derive(Default)]
struct MockShared {
    inner: Mutex<MockInner>,
    available: Condvar,
}

/// A cloneable scripted serial port.
#[derive(Clone, Default)]
pub(crate) struct MockSerialPort {
    shared: Arc<MockShared>,
}

impl MockSerialPort {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the reading side to consume.
    pub(crate) fn push_rx(&self, data: &[u8]) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.rx.extend(data.iter().copied());
        self.shared.available.notify_all();
    }

    /// Everything written so far.
    pub(crate) fn written(&self) -> Vec<u8> {
        self.shared.inner.lock().unwrap().tx.clone()
    }

    /// Everything written so far, as a lossy string.
    pub(crate) fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    /// Install a responder invoked on every write; its return bytes are
    /// queued for reading. Lets a test play the role of the modem.
    pub(crate) fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.shared.inner.lock().unwrap().responder = Some(Box::new(responder));
    }
}

impl SerialPort for MockSerialPort {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = std::time::Instant::now() + timeout;
        let mut inner = self.shared.inner.lock().unwrap();

        while inner.rx.is_empty() {
            let now = std::time::Instant::now();
            if now >= deadline {
                return Ok(0);
            }
            let (guard, _) = self
                .shared
                .available
                .wait_timeout(inner, deadline - now)
                .unwrap();
            inner = guard;
        }

        let mut n = 0;
        while n < buf.len() {
            match inner.rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.tx.extend_from_slice(data);

        if let Some(mut responder) = inner.responder.take() {
            let reply = responder(data);
            inner.responder = Some(responder);
            if !reply.is_empty() {
                inner.rx.extend(reply.iter().copied());
                self.shared.available.notify_all();
            }
        }
        Ok(())
    }

    fn try_clone(&self) -> Result<Box<dyn SerialPort>> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_returns_queued_bytes() {
        let mock = MockSerialPort::new();
        mock.push_rx(b"hello");

        let mut port: Box<dyn SerialPort> = Box::new(mock.clone());
        let mut buf = [0u8; 16];
        let n = port.read(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_read_times_out_empty() {
        let mut mock = MockSerialPort::new();
        let mut buf = [0u8; 4];
        assert_eq!(mock.read(&mut buf, Duration::from_millis(5)).unwrap(), 0);
    }

    #[test]
    fn test_responder_round_trip() {
        let mock = MockSerialPort::new();
        mock.set_responder(|data| {
            if data == b"AT\r\n" {
                b"OK\r\n".to_vec()
            } else {
                Vec::new()
            }
        });

        let mut port: Box<dyn SerialPort> = Box::new(mock.clone());
        port.write_all(b"AT\r\n").unwrap();
        assert_eq!(mock.written_string(), "AT\r\n");

        let mut buf = [0u8; 8];
        let n = port.read(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(&buf[..n], b"OK\r\n");
    }
}

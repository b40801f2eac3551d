//! We use this mocking module in unit tests to emulate the charger's HID endpoint.
//!
//! Two modes are supported. Scripted replies are handed out in order, one per read. Without
//! a script the mock behaves like a charger register file: writes are stored and reads return
//! what was stored (zero when never written).

use fugit::MillisDurationU32;

use crate::framer::{EXCEPTION_FLAG, PROTOCOL_ID};
use crate::transport::{HidTransport, Report};

/// Our mock type used to emulate a charger on the other end of a HID link.
pub struct MockHid {
    /// Every report sent by the master, in order.
    sent: heapless::Vec<Report, 128>,
    /// Replies handed out before falling back to the register file.
    scripted: heapless::Deque<Report, 16>,
    /// Register file used when no reply is scripted.
    registers: heapless::Vec<(u16, u16), 512>,
    /// Register address which answers with an exception instead of data.
    reject: Option<(u16, u8)>,
    /// Reply pending for the next read.
    pending: Option<Report>,
    pub opened: usize,
    pub closed: usize,
    /// Flag to simulate a failing open.
    should_error_on_open: bool,
    /// Flag to simulate write errors.
    should_error_on_write: bool,
    /// Flag to simulate a device which never answers.
    should_stay_silent: bool,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockHidError {
    /// Simulated timeout error
    #[error("Simulated timeout")]
    Timeout,
    /// Generic simulated error for testing
    #[error("Simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockHidError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockHidError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockHidError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockHid {
    type Error = MockHidError;
}

impl HidTransport for MockHid {
    fn open(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_open {
            return Err(MockHidError::SimulatedError);
        }
        self.opened += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.closed += 1;
        Ok(())
    }

    fn write_report(&mut self, report: &Report) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockHidError::SimulatedError);
        }
        self.sent
            .push(*report)
            .map_err(|_| MockHidError::SimulatedError)?;
        self.pending = match self.scripted.pop_front() {
            Some(reply) => Some(reply),
            None => Some(self.answer(report)),
        };
        Ok(())
    }

    fn read_report(
        &mut self,
        report: &mut Report,
        _timeout: MillisDurationU32,
    ) -> Result<usize, Self::Error> {
        if self.should_stay_silent {
            return Ok(0);
        }
        match self.pending.take() {
            Some(reply) => {
                *report = reply;
                Ok(report.len())
            }
            None => Ok(0),
        }
    }
}

impl MockHid {
    /// Create a new MockHid with an empty register file.
    pub fn new() -> Self {
        Self {
            sent: heapless::Vec::new(),
            scripted: heapless::Deque::new(),
            registers: heapless::Vec::new(),
            reject: None,
            pending: None,
            opened: 0,
            closed: 0,
            should_error_on_open: false,
            should_error_on_write: false,
            should_stay_silent: false,
        }
    }

    /// Queue a raw reply for the next unanswered request.
    pub fn push_reply(&mut self, reply: &[u8]) {
        let mut report = [0u8; 64];
        report[..reply.len()].copy_from_slice(reply);
        assert!(self.scripted.push_back(report).is_ok());
    }

    /// Answer any request starting at `address` with exception `code`.
    pub fn reject_address(&mut self, address: u16, code: u8) {
        self.reject = Some((address, code));
    }

    pub fn set_open_error(&mut self, should_error: bool) {
        self.should_error_on_open = should_error;
    }

    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.should_stay_silent = silent;
    }

    /// Reports sent so far.
    pub fn sent(&self) -> &[Report] {
        &self.sent
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Register value as the firmware holds it.
    pub fn register(&self, address: u16) -> u16 {
        self.registers
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    pub fn set_register(&mut self, address: u16, value: u16) {
        match self.registers.iter_mut().find(|(a, _)| *a == address) {
            Some(slot) => slot.1 = value,
            None => assert!(self.registers.push((address, value)).is_ok()),
        }
    }

    /// Load a little-endian host buffer into consecutive registers, as the firmware would hold it.
    pub fn load_bytes(&mut self, start: u16, bytes: &[u8]) {
        for (i, pair) in bytes.chunks(2).enumerate() {
            let low = pair[0];
            let high = pair.get(1).copied().unwrap_or(0);
            self.set_register(start + i as u16, u16::from_le_bytes([low, high]));
        }
    }

    /// Read consecutive registers back as a little-endian host buffer.
    pub fn dump_bytes(&self, start: u16, out: &mut [u8]) {
        for (i, pair) in out.chunks_mut(2).enumerate() {
            let bytes = self.register(start + i as u16).to_le_bytes();
            pair.copy_from_slice(&bytes[..pair.len()]);
        }
    }

    /// Reply to `request` from the register file.
    fn answer(&mut self, request: &Report) -> Report {
        let function = request[2];
        let start = u16::from_be_bytes([request[3], request[4]]);
        let count = u16::from_be_bytes([request[5], request[6]]);
        let mut reply = [0u8; 64];
        reply[1] = PROTOCOL_ID;

        if let Some((address, code)) = self.reject {
            if address == start {
                reply[0] = 4;
                reply[2] = function | EXCEPTION_FLAG;
                reply[3] = code;
                return reply;
            }
        }

        match function {
            0x03 | 0x04 => {
                let byte_count = (count * 2) as u8;
                reply[0] = byte_count + 4;
                reply[2] = function;
                reply[3] = byte_count;
                for i in 0..count {
                    let value = self.register(start + i).to_be_bytes();
                    let at = 4 + 2 * i as usize;
                    reply[at..at + 2].copy_from_slice(&value);
                }
            }
            0x10 => {
                for i in 0..count {
                    let at = 8 + 2 * i as usize;
                    let value = u16::from_be_bytes([request[at], request[at + 1]]);
                    self.set_register(start + i, value);
                }
                reply[0] = 7;
                reply[2] = function;
                reply[3..7].copy_from_slice(&request[3..7]);
            }
            _ => {
                reply[0] = 4;
                reply[2] = function | EXCEPTION_FLAG;
                reply[3] = 0x01;
            }
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::Error;
    use fugit::ExtU32;

    #[test]
    fn test_error_kinds() {
        assert_eq!(MockHidError::Timeout.kind(), embedded_io::ErrorKind::TimedOut);
        assert_eq!(
            MockHidError::SimulatedError.kind(),
            embedded_io::ErrorKind::Other
        );
    }

    #[test]
    fn test_register_file_write_then_read() {
        let mut mock = MockHid::new();
        let mut write = [0u8; 64];
        write[..10].copy_from_slice(&[10, 0x30, 0x10, 0x80, 0x00, 0x00, 0x01, 0x02, 0x12, 0x34]);
        mock.write_report(&write).unwrap();
        let mut reply = [0u8; 64];
        assert_eq!(mock.read_report(&mut reply, 100.millis()).unwrap(), 64);
        assert_eq!(reply[2], 0x10);
        assert_eq!(mock.register(0x8000), 0x1234);

        let mut read = [0u8; 64];
        read[..7].copy_from_slice(&[7, 0x30, 0x03, 0x80, 0x00, 0x00, 0x01]);
        mock.write_report(&read).unwrap();
        mock.read_report(&mut reply, 100.millis()).unwrap();
        assert_eq!(&reply[..6], &[6, 0x30, 0x03, 2, 0x12, 0x34]);
        assert_eq!(mock.sent().len(), 2);
    }

    #[test]
    fn test_scripted_reply_wins() {
        let mut mock = MockHid::new();
        mock.push_reply(&[4, 0x30, 0x83, 0x02]);
        let mut read = [0u8; 64];
        read[..7].copy_from_slice(&[7, 0x30, 0x03, 0x80, 0x00, 0x00, 0x01]);
        mock.write_report(&read).unwrap();
        let mut reply = [0u8; 64];
        mock.read_report(&mut reply, 100.millis()).unwrap();
        assert_eq!(&reply[..4], &[4, 0x30, 0x83, 0x02]);
    }

    #[test]
    fn test_silent_device() {
        let mut mock = MockHid::new();
        mock.set_silent(true);
        let request = [0u8; 64];
        mock.write_report(&request).unwrap();
        let mut reply = [0u8; 64];
        assert_eq!(mock.read_report(&mut reply, 100.millis()).unwrap(), 0);
    }

    #[test]
    fn test_bytes_are_little_endian_registers() {
        let mut mock = MockHid::new();
        mock.load_bytes(0x8C00, &[0xAA, 0x55, 0x01]);
        assert_eq!(mock.register(0x8C00), 0x55AA);
        assert_eq!(mock.register(0x8C01), 0x0001);
        let mut out = [0u8; 3];
        mock.dump_bytes(0x8C00, &mut out);
        assert_eq!(out, [0xAA, 0x55, 0x01]);
    }

}

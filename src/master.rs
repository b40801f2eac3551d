//! Chunked register reads and writes on top of the [framer](crate::framer).
//!
//! Register ranges longer than one report are split into full chunks followed by the remainder.
//! The firmware keeps its register bytes swapped relative to the host, so register data is
//! exchanged with callers as little-endian byte buffers: one register is `[low, high]`.

use core::ops::{Deref, DerefMut};

use fugit::{ExtU32, MillisDurationU32};
use log::{debug, info, warn};
use rmodbus::{ModbusProto, client::ModbusRequest};

use crate::{
    error::{Error, ModbusError, Result},
    framer,
    registers::{Limits, RegisterKind},
    transport::HidTransport,
};

/// rmodbus frames for TCP carry a 7 byte MBAP header in front of the function code.
const MBAP_LEN: usize = 7;
const FRAME_LEN: usize = 80;

/// Per session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Fixed time to wait for each response report.
    pub timeout: MillisDurationU32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: 1000.millis(),
        }
    }
}

/// You can create a HidMaster using any interface which implements [HidTransport].
pub struct HidMaster<T: HidTransport> {
    transport: T,
    config: SessionConfig,
}

impl<T: HidTransport> HidMaster<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Give back the transport.
    pub fn release(self) -> T {
        self.transport
    }

    /// Open the device for a sequence of transactions.
    ///
    /// The device is closed again when the returned guard is dropped, whatever the outcome of
    /// the transactions run through it.
    pub fn session(&mut self) -> Result<Session<'_, T>, T::Error> {
        self.transport.open().map_err(Error::Transport)?;
        info!("HID device opened");
        Ok(Session { master: self })
    }

    /// Read `count` registers starting at `start` into `out` as little-endian bytes.
    ///
    /// `out` should hold `2 * count` bytes, anything past its end is dropped.
    pub fn read_registers(
        &mut self,
        kind: RegisterKind,
        start: u16,
        count: u16,
        out: &mut [u8],
    ) -> Result<(), T::Error> {
        check_range(start, count)?;
        let mut register = start;
        let mut offset = 0usize;
        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(Limits::READ_REGISTERS_MAX);
            debug!("read {chunk} registers at 0x{register:04X}");

            let mut frame: heapless::Vec<u8, FRAME_LEN> = heapless::Vec::new();
            let mut request = ModbusRequest::new(0, ModbusProto::TcpUdp);
            match kind {
                RegisterKind::Holding => request.generate_get_holdings(register, chunk, &mut frame)?,
                RegisterKind::Input => request.generate_get_inputs(register, chunk, &mut frame)?,
            }

            let mut wire = [0u8; Limits::REPORT_SIZE];
            let received = framer::transact(
                &mut self.transport,
                frame[MBAP_LEN],
                &frame[MBAP_LEN + 1..],
                &mut wire,
                self.config.timeout,
            )?;
            if received < 2 * chunk as usize {
                return Err(ModbusError::LengthMismatch.into());
            }

            for (i, pair) in wire[..2 * chunk as usize].chunks_exact(2).enumerate() {
                let at = offset + 2 * i;
                if let Some(low) = out.get_mut(at) {
                    *low = pair[1];
                }
                if let Some(high) = out.get_mut(at + 1) {
                    *high = pair[0];
                }
            }

            register = register.wrapping_add(chunk);
            offset += 2 * chunk as usize;
            remaining -= chunk;
        }
        Ok(())
    }

    /// Write `count` registers starting at `start` from the little-endian bytes in `data`.
    pub fn write_registers(&mut self, start: u16, count: u16, data: &[u8]) -> Result<(), T::Error> {
        if data.len() < 2 * count as usize {
            return Err(ModbusError::LengthMismatch.into());
        }
        check_range(start, count)?;

        let mut register = start;
        let mut remaining = count;
        let mut words = data.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]]));
        while remaining > 0 {
            let chunk = remaining.min(Limits::WRITE_REGISTERS_MAX);
            debug!("write {chunk} registers at 0x{register:04X}");

            let mut values: heapless::Vec<u16, { Limits::WRITE_REGISTERS_MAX as usize }> =
                heapless::Vec::new();
            for value in words.by_ref().take(chunk as usize) {
                values
                    .push(value)
                    .map_err(|_| ModbusError::LengthMismatch)?;
            }

            // rmodbus emits big-endian words, which is the swapped order the firmware expects.
            let mut frame: heapless::Vec<u8, FRAME_LEN> = heapless::Vec::new();
            let mut request = ModbusRequest::new(0, ModbusProto::TcpUdp);
            request.generate_set_holdings_bulk(register, &values, &mut frame)?;

            framer::transact(
                &mut self.transport,
                frame[MBAP_LEN],
                &frame[MBAP_LEN + 1..],
                &mut [],
                self.config.timeout,
            )?;

            register = register.wrapping_add(chunk);
            remaining -= chunk;
        }
        Ok(())
    }
}

/// Refuse ranges running past the last register address.
fn check_range(start: u16, count: u16) -> core::result::Result<(), ModbusError> {
    if u32::from(start) + u32::from(count) > 0x1_0000 {
        warn!("{count} registers at 0x{start:04X} run past the address space");
        return Err(ModbusError::NoRegister);
    }
    Ok(())
}

/// An open device. Closes the device when dropped.
pub struct Session<'a, T: HidTransport> {
    master: &'a mut HidMaster<T>,
}

impl<T: HidTransport> Deref for Session<'_, T> {
    type Target = HidMaster<T>;

    fn deref(&self) -> &Self::Target {
        self.master
    }
}

impl<T: HidTransport> DerefMut for Session<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.master
    }
}

impl<T: HidTransport> Drop for Session<'_, T> {
    fn drop(&mut self) {
        match self.master.transport.close() {
            Ok(()) => info!("HID device closed"),
            Err(e) => warn!("closing HID device failed: {e:?}"),
        }
    }
}

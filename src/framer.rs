//! Modbus PDUs tunnelled through HID reports.
//!
//! Every report is 64 bytes: `[length, 0x30, function, pdu...]`. A transaction is exactly one
//! report out and one report back, there are no retries at this layer.

use fugit::MillisDurationU32;
use log::trace;

use crate::{
    error::{Error, ModbusError},
    registers::Limits,
    transport::{HidTransport, Report},
};

/// Second byte of every report.
pub const PROTOCOL_ID: u8 = 0x30;
/// Set on the echoed function code when the charger raises an exception.
pub const EXCEPTION_FLAG: u8 = 0x80;

const LEN: usize = 0;
const TYPE: usize = 1;
const FUNCTION: usize = 2;
const PDU: usize = 3;

/// Function codes the charger implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteMultipleRegisters = 0x10,
}

impl TryFrom<u8> for FunctionCode {
    type Error = ModbusError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x03 => Ok(FunctionCode::ReadHoldingRegisters),
            0x04 => Ok(FunctionCode::ReadInputRegisters),
            0x10 => Ok(FunctionCode::WriteMultipleRegisters),
            _ => Err(ModbusError::IllegalFunctionLocal),
        }
    }
}

/// Wrap a PDU into a request report.
///
/// Read PDUs are `[regHi, regLo, cntHi, cntLo]`, write PDUs append the byte count and data.
pub fn encode_request(function: FunctionCode, pdu: &[u8]) -> Result<Report, ModbusError> {
    let len = match function {
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => 7,
        FunctionCode::WriteMultipleRegisters => {
            let byte_count = *pdu.get(4).ok_or(ModbusError::LengthMismatch)? as usize;
            7 + byte_count + 1
        }
    };
    if len > Limits::REPORT_SIZE {
        return Err(ModbusError::LengthMismatch);
    }
    let body = pdu.get(..len - PDU).ok_or(ModbusError::LengthMismatch)?;

    let mut report = [0u8; Limits::REPORT_SIZE];
    report[LEN] = len as u8;
    report[TYPE] = PROTOCOL_ID;
    report[FUNCTION] = function as u8;
    report[PDU..len].copy_from_slice(body);
    Ok(report)
}

/// Validate a response report and copy any register data, still in wire order, into `out`.
///
/// Returns the number of data bytes the charger sent. Bytes which do not fit in `out` are
/// dropped.
pub fn decode_response(
    function: FunctionCode,
    report: &Report,
    out: &mut [u8],
) -> Result<usize, ModbusError> {
    let len = report[LEN] as usize;
    if len > Limits::REPORT_SIZE {
        return Err(ModbusError::LengthMismatch);
    }

    let echoed = report[FUNCTION];
    if echoed == function as u8 {
        match function {
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                let byte_count = report[PDU] as usize;
                if len != byte_count + 4 || len & 0x01 != 0 {
                    return Err(ModbusError::LengthMismatch);
                }
                let data = &report[PDU + 1..PDU + 1 + byte_count];
                let n = data.len().min(out.len());
                out[..n].copy_from_slice(&data[..n]);
                Ok(byte_count)
            }
            FunctionCode::WriteMultipleRegisters => Ok(0),
        }
    } else if echoed == function as u8 | EXCEPTION_FLAG {
        // An exception byte of 0 would mean success, which the charger never sends here.
        Err(ModbusError::from_code(report[PDU]).unwrap_or(ModbusError::Invalid))
    } else {
        Err(ModbusError::ReturnMismatch)
    }
}

/// Run one transaction: send `pdu` with `function`, wait up to `timeout` for the answer.
///
/// Register data of read responses lands in `out` in wire (big endian) order.
pub fn transact<T: HidTransport>(
    transport: &mut T,
    function: u8,
    pdu: &[u8],
    out: &mut [u8],
    timeout: MillisDurationU32,
) -> Result<usize, Error<T::Error>> {
    let function = FunctionCode::try_from(function)?;
    let request = encode_request(function, pdu)?;
    trace!("write {:02X?}", &request[..]);
    transport
        .write_report(&request)
        .map_err(Error::Transport)?;

    let mut response = [0u8; Limits::REPORT_SIZE];
    let received = transport
        .read_report(&mut response, timeout)
        .map_err(Error::Transport)?;
    if received == 0 {
        return Err(ModbusError::TimedOut.into());
    }
    trace!("read  {:02X?}", &response[..]);

    Ok(decode_response(function, &response, out)?)
}

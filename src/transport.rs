//! The HID transport the Modbus master runs on.
//!
//! Implement [`HidTransport`] for anything which can move one fixed size report each way.
//! Errors are reported through [`embedded_io`] so that time outs can be told apart from other
//! I/O failures via [`embedded_io::ErrorKind::TimedOut`].

use fugit::MillisDurationU32;

use crate::registers::Limits;

/// One HID report, without the report ID.
pub type Report = [u8; Limits::REPORT_SIZE];

/// A USB HID device handle carrying the charger's Modbus reports.
///
/// Only one exchange may be outstanding at a time. Callers which share a transport between
/// threads must lock around the whole chunked operation, not individual reports.
pub trait HidTransport: embedded_io::ErrorType {
    /// Acquire the device handle.
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Release the device handle.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Send one report, blocking until it was accepted.
    fn write_report(&mut self, report: &Report) -> Result<(), Self::Error>;

    /// Receive one report.
    ///
    /// Returns the number of bytes received, `0` when `timeout` expired without data.
    fn read_report(
        &mut self,
        report: &mut Report,
        timeout: MillisDurationU32,
    ) -> Result<usize, Self::Error>;
}

impl<T: HidTransport + ?Sized> HidTransport for &mut T {
    fn open(&mut self) -> Result<(), Self::Error> {
        T::open(self)
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        T::close(self)
    }

    fn write_report(&mut self, report: &Report) -> Result<(), Self::Error> {
        T::write_report(self, report)
    }

    fn read_report(
        &mut self,
        report: &mut Report,
        timeout: MillisDurationU32,
    ) -> Result<usize, Self::Error> {
        T::read_report(self, report, timeout)
    }
}

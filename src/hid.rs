//! [`HidTransport`] over the `hidapi` crate, for talking to a charger plugged into this host.

use fugit::MillisDurationU32;
use hidapi::{HidApi, HidDevice};
use log::{debug, trace};
use thiserror::Error;

use crate::{
    registers::Limits,
    transport::{HidTransport, Report},
};

/// USB identity of the charger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidConfig {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0x0483,
            product_id: 0x5751,
        }
    }
}

#[derive(Error, Debug)]
pub enum HidApiError {
    #[error("HID device is not open")]
    NotOpen,
    #[error("HID write accepted no bytes")]
    WriteZero,
    #[error(transparent)]
    Hid(#[from] hidapi::HidError),
}

impl embedded_io::Error for HidApiError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            HidApiError::NotOpen => embedded_io::ErrorKind::NotConnected,
            HidApiError::WriteZero => embedded_io::ErrorKind::WriteZero,
            HidApiError::Hid(_) => embedded_io::ErrorKind::Other,
        }
    }
}

/// The charger's HID endpoint. Opened per session and closed again afterwards.
pub struct HidApiTransport {
    api: HidApi,
    config: HidConfig,
    device: Option<HidDevice>,
}

impl HidApiTransport {
    pub fn new(config: HidConfig) -> Result<Self, HidApiError> {
        Ok(Self {
            api: HidApi::new()?,
            config,
            device: None,
        })
    }

    fn device(&self) -> Result<&HidDevice, HidApiError> {
        self.device.as_ref().ok_or(HidApiError::NotOpen)
    }
}

impl embedded_io::ErrorType for HidApiTransport {
    type Error = HidApiError;
}

impl HidTransport for HidApiTransport {
    fn open(&mut self) -> Result<(), Self::Error> {
        if self.device.is_some() {
            return Ok(());
        }
        let device = self
            .api
            .open(self.config.vendor_id, self.config.product_id)?;

        // Drop anything left over from an aborted exchange.
        let mut stale = [0u8; Limits::REPORT_SIZE];
        while device.read_timeout(&mut stale, 1)? > 0 {
            trace!("discarded stale report");
        }

        debug!(
            "opened HID device {:04X}:{:04X}",
            self.config.vendor_id, self.config.product_id
        );
        self.device = Some(device);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        // Dropping the handle closes it.
        self.device = None;
        Ok(())
    }

    fn write_report(&mut self, report: &Report) -> Result<(), Self::Error> {
        // The charger uses no numbered reports, hidapi wants report ID 0 in front.
        let mut buffer = [0u8; Limits::REPORT_SIZE + 1];
        buffer[1..].copy_from_slice(report);
        match self.device()?.write(&buffer)? {
            0 => Err(HidApiError::WriteZero),
            _ => Ok(()),
        }
    }

    fn read_report(
        &mut self,
        report: &mut Report,
        timeout: MillisDurationU32,
    ) -> Result<usize, Self::Error> {
        let millis = i32::try_from(timeout.to_millis()).unwrap_or(i32::MAX);
        Ok(self.device()?.read_timeout(report, millis)?)
    }
}

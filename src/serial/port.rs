//! OS serial ports through the `serialport` crate

use std::io::{self, Read, Write};
use std::time::Duration;

use super::{DataBits, LinkError, LinkResult, Parity, PortParams, StopBits};

/// Read timeout on OS ports. Bounds how long the reader takes to notice a
/// stop request.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A duplex byte stream with modem control lines
pub trait SerialIo: Read + Write + Send {
    /// Second handle to the same port, used by the reader thread
    fn try_clone_io(&self) -> io::Result<Box<dyn SerialIo>>;

    fn set_dtr(&mut self, level: bool) -> io::Result<()>;

    fn set_rts(&mut self, level: bool) -> io::Result<()>;
}

/// Opens and enumerates ports
pub trait Connector: Send {
    fn connect(&self, port: &str, params: &PortParams) -> LinkResult<Box<dyn SerialIo>>;

    /// Names of the ports currently present
    fn available_ports(&self) -> Vec<String>;
}

/// Connector for the host's serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn connect(&self, port: &str, params: &PortParams) -> LinkResult<Box<dyn SerialIo>> {
        params.validate()?;
        let handle = serialport::new(port, params.baud_rate)
            .parity(params.parity.into())
            .data_bits(params.data_bits.into())
            .stop_bits(params.stop_bits.into())
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| LinkError::PortOpenFailed {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(SystemPort(handle)))
    }

    fn available_ports(&self) -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                tracing::warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }
}

struct SystemPort(Box<dyn serialport::SerialPort>);

impl Read for SystemPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for SystemPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl SerialIo for SystemPort {
    fn try_clone_io(&self) -> io::Result<Box<dyn SerialIo>> {
        let clone = self.0.try_clone()?;
        Ok(Box::new(SystemPort(clone)))
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        Ok(self.0.write_data_terminal_ready(level)?)
    }

    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        Ok(self.0.write_request_to_send(level)?)
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

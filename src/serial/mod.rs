//! Serial link
//!
//! [`SerialLink`] owns one open port at a time and a background reader
//! thread that pushes received chunks through a callback. The control
//! thread feeds those events back through [`SerialLink::accept`], which
//! drops anything from an earlier session and tears the link down on a
//! read failure.
//!
//! The OS side sits behind [`Connector`] and [`SerialIo`] so the same link
//! runs against real hardware or an in-memory device.

mod link;
mod memory;
mod port;
mod watch;

use std::io;

use serde::{Deserialize, Serialize};

pub use link::{EventCallback, SerialLink, CLOSE_WAIT, READ_CHUNK};
pub use memory::{MemoryConnector, MemoryDevice};
pub use port::{Connector, SerialIo, SystemConnector, READ_TIMEOUT};
pub use watch::{ConnectionWatch, WatchAction};

/// Serial link errors
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to open {port}: {reason}")]
    PortOpenFailed { port: String, reason: String },

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("{0}")]
    ReadFailed(String),

    #[error("device {0} disconnected")]
    DeviceVanished(String),

    #[error("port is not open")]
    NotOpen,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type LinkResult<T> = Result<T, LinkError>;

/// Identifies one open/close cycle of a link
pub type SessionId = u64;

/// Message from the reader thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Data { session: SessionId, bytes: Vec<u8> },
    ReadFailed { session: SessionId, reason: String },
}

impl LinkEvent {
    pub fn session(&self) -> SessionId {
        match self {
            LinkEvent::Data { session, .. } | LinkEvent::ReadFailed { session, .. } => *session,
        }
    }
}

/// What an accepted event means for the control thread
#[derive(Debug)]
pub enum LinkInput {
    Bytes(Vec<u8>),
    /// The link has already been closed
    Lost(LinkError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = LinkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(LinkError::InvalidParameter(format!(
                "data bits must be 5..=8, got {other}"
            ))),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Stop bits. 1.5 is not offered because the OS backend cannot set it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopBits {
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

/// Line settings used to open a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortParams {
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
}

impl Default for PortParams {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
        }
    }
}

impl PortParams {
    pub fn validate(&self) -> LinkResult<()> {
        if self.baud_rate == 0 {
            return Err(LinkError::InvalidParameter("baud rate must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_bits_range() {
        assert_eq!(DataBits::try_from(7).unwrap(), DataBits::Seven);
        assert!(matches!(
            DataBits::try_from(9),
            Err(LinkError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_params_serde_names() {
        assert_eq!(serde_json::to_string(&Parity::Even).unwrap(), "\"Even\"");
        assert_eq!(serde_json::to_string(&StopBits::Two).unwrap(), "\"2\"");
        assert_eq!(serde_json::to_string(&DataBits::Six).unwrap(), "6");
        let bits: DataBits = serde_json::from_str("5").unwrap();
        assert_eq!(bits, DataBits::Five);
    }

    #[test]
    fn test_params_validate() {
        assert!(PortParams::default().validate().is_ok());
        let params = PortParams {
            baud_rate: 0,
            ..PortParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_event_session() {
        let event = LinkEvent::ReadFailed {
            session: 4,
            reason: "gone".into(),
        };
        assert_eq!(event.session(), 4);
    }
}

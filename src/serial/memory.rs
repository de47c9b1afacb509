//! In-memory serial devices
//!
//! Used by the integration tests and by the binary's `--loopback` mode.
//! A [`MemoryConnector`] is a registry of named [`MemoryDevice`]s; plugging
//! and unplugging a device changes what `available_ports` reports.

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{Connector, LinkError, LinkResult, PortParams, SerialIo};

/// How long a read waits for data before reporting a timeout
const READ_WAIT: Duration = Duration::from_millis(20);

#[derive(Debug, Default)]
struct DeviceState {
    /// Bytes waiting to be read by the host
    incoming: VecDeque<u8>,
    /// Bytes the host has written
    written: Vec<u8>,
    fail_next_read: Option<String>,
    /// Reads block until cleared, like a driver call that never returns
    hang_reads: bool,
    fail_writes: bool,
    fail_open: bool,
    loopback: bool,
    dtr: bool,
    rts: bool,
    opened: usize,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<DeviceState>,
    readable: Condvar,
}

/// A simulated device; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    shared: Arc<Shared>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device that echoes everything written to it
    pub fn loopback() -> Self {
        let device = Self::new();
        device.lock().loopback = true;
        device
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes for the host to read
    pub fn inject(&self, bytes: &[u8]) {
        self.lock().incoming.extend(bytes);
        self.shared.readable.notify_all();
    }

    /// Take everything the host wrote so far
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().written)
    }

    /// Make the next read fail with `reason`
    pub fn fail_next_read(&self, reason: impl Into<String>) {
        self.lock().fail_next_read = Some(reason.into());
        self.shared.readable.notify_all();
    }

    /// Block every read until called again with `false`
    pub fn hang_reads(&self, hang: bool) {
        self.lock().hang_reads = hang;
        self.shared.readable.notify_all();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn dtr(&self) -> bool {
        self.lock().dtr
    }

    pub fn rts(&self) -> bool {
        self.lock().rts
    }

    /// Number of times the device has been opened
    pub fn open_count(&self) -> usize {
        self.lock().opened
    }
}

impl Read for MemoryDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        while state.hang_reads {
            state = self
                .shared
                .readable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.incoming.is_empty() && state.fail_next_read.is_none() {
            state = self
                .shared
                .readable
                .wait_timeout(state, READ_WAIT)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }

        if let Some(reason) = state.fail_next_read.take() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, reason));
        }
        if state.incoming.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }

        let n = buf.len().min(state.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write rejected"));
        }
        state.written.extend_from_slice(buf);
        if state.loopback {
            state.incoming.extend(buf);
            self.shared.readable.notify_all();
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialIo for MemoryDevice {
    fn try_clone_io(&self) -> io::Result<Box<dyn SerialIo>> {
        Ok(Box::new(self.clone()))
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        self.lock().dtr = level;
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        self.lock().rts = level;
        Ok(())
    }
}

/// Registry of plugged-in memory devices; clones share the registry
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    devices: Arc<Mutex<BTreeMap<String, MemoryDevice>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn devices(&self) -> MutexGuard<'_, BTreeMap<String, MemoryDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plug in a device under `name`, replacing any previous one
    pub fn add(&self, name: impl Into<String>, device: MemoryDevice) {
        self.devices().insert(name.into(), device);
    }

    /// Unplug a device; open handles keep working until closed
    pub fn remove(&self, name: &str) -> Option<MemoryDevice> {
        self.devices().remove(name)
    }

    pub fn device(&self, name: &str) -> Option<MemoryDevice> {
        self.devices().get(name).cloned()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, port: &str, params: &PortParams) -> LinkResult<Box<dyn SerialIo>> {
        params.validate()?;
        let device = self
            .device(port)
            .ok_or_else(|| LinkError::PortOpenFailed {
                port: port.to_string(),
                reason: "no such device".to_string(),
            })?;

        let mut state = device.lock();
        if state.fail_open {
            return Err(LinkError::PortOpenFailed {
                port: port.to_string(),
                reason: "device busy".to_string(),
            });
        }
        state.opened += 1;
        drop(state);

        Ok(Box::new(device))
    }

    fn available_ports(&self) -> Vec<String> {
        self.devices().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_injected() {
        let mut device = MemoryDevice::new();
        device.inject(b"hello");
        let mut buf = [0u8; 3];
        assert_eq!(device.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(device.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
    }

    #[test]
    fn test_read_times_out_when_empty() {
        let mut device = MemoryDevice::new();
        let err = device.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_fail_next_read_once() {
        let mut device = MemoryDevice::new();
        device.fail_next_read("unplugged");
        let err = device.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.to_string(), "unplugged");
        assert_eq!(
            device.read(&mut [0u8; 4]).unwrap_err().kind(),
            io::ErrorKind::TimedOut
        );
    }

    #[test]
    fn test_hung_read_waits_for_release() {
        let device = MemoryDevice::new();
        device.hang_reads(true);
        device.inject(b"x");

        let mut reader = device.clone();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            reader.read(&mut buf).map(|n| buf[..n].to_vec())
        });

        std::thread::sleep(Duration::from_millis(100));
        assert!(!handle.is_finished());

        device.hang_reads(false);
        assert_eq!(handle.join().unwrap().unwrap(), b"x".to_vec());
    }

    #[test]
    fn test_loopback_echoes() {
        let mut device = MemoryDevice::loopback();
        device.write_all(b"ping").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(device.read(&mut buf).unwrap(), 4);
        assert_eq!(device.take_written(), b"ping".to_vec());
    }

    #[test]
    fn test_connector_registry() {
        let connector = MemoryConnector::new();
        connector.add("COM2", MemoryDevice::new());
        connector.add("COM1", MemoryDevice::new());
        assert_eq!(connector.available_ports(), vec!["COM1", "COM2"]);

        assert!(connector.connect("COM1", &PortParams::default()).is_ok());
        assert_eq!(connector.device("COM1").unwrap().open_count(), 1);

        connector.remove("COM1");
        assert!(matches!(
            connector.connect("COM1", &PortParams::default()),
            Err(LinkError::PortOpenFailed { .. })
        ));
    }

    #[test]
    fn test_connect_fail_open() {
        let connector = MemoryConnector::new();
        let device = MemoryDevice::new();
        device.fail_open(true);
        connector.add("ttyUSB0", device);
        assert!(connector.connect("ttyUSB0", &PortParams::default()).is_err());
    }
}

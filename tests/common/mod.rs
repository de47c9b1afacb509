//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serial_monitor::app::{Monitor, Settings};
use serial_monitor::core::OverflowSink;
use serial_monitor::serial::{EventCallback, LinkEvent, MemoryConnector, MemoryDevice, SerialLink};

pub const PORT: &str = "/dev/ttyUSB0";

/// A monitor wired to one in-memory device, with reader events collected
/// on a channel
pub struct Rig {
    pub monitor: Monitor,
    pub events: mpsc::Receiver<LinkEvent>,
    pub connector: MemoryConnector,
    pub device: MemoryDevice,
}

impl Rig {
    pub fn new(settings: Settings, sink: Box<dyn OverflowSink>, device: MemoryDevice) -> Self {
        let connector = MemoryConnector::new();
        connector.add(PORT, device.clone());

        let (tx, events) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callback: EventCallback = Arc::new(move |event| {
            if let Ok(tx) = tx.lock() {
                let _ = tx.send(event);
            }
        });
        let link = SerialLink::new(Box::new(connector.clone()), callback);

        Self {
            monitor: Monitor::new(settings, link, sink),
            events,
            connector,
            device,
        }
    }

    /// Feed reader events to the monitor until `done` holds or the timeout
    /// passes
    pub fn pump_until(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&Monitor) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        while !done(&self.monitor) {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            if let Ok(event) = self.events.recv_timeout(left.min(Duration::from_millis(50))) {
                self.monitor.handle_link_event(event);
            }
        }
        true
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.monitor.buffer().lines().map(|l| l.text()).collect()
    }
}

/// Settings with timestamps off so log lines compare exactly
pub fn quiet_settings() -> Settings {
    Settings {
        show_timestamp: false,
        ..Settings::default()
    }
}
